//! Usage analysis pass
//!
//! First pass over a program. Collects register, type, export and
//! interpolant usage, and allocates resource descriptors together with the
//! provenance of their bits.

use super::decode::{decode, InstructionConsumer, SkippedInstruction};
use super::deps::{DependencyGraph, DependencyNode, GuestState};
use super::opcodes::*;
use super::resource::{ResourceDescriptor, ResourceHandle, ResourceKind};
use super::types::*;
use og_core::config::ShaderConfig;
use og_core::error::{GcnError, RegisterFile, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed-size register bitmap that rejects out-of-range runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMask {
    file: RegisterFile,
    limit: u32,
    bits: [u64; 4],
}

impl RegisterMask {
    pub const fn new(file: RegisterFile, limit: u32) -> Self {
        Self {
            file,
            limit,
            bits: [0; 4],
        }
    }

    pub const fn scalar() -> Self {
        Self::new(RegisterFile::Scalar, SGPR_COUNT as u32)
    }

    pub const fn vector() -> Self {
        Self::new(RegisterFile::Vector, VGPR_COUNT as u32)
    }

    pub const fn temp() -> Self {
        Self::new(RegisterFile::Temp, TMP_COUNT as u32)
    }

    /// Mark `count` registers starting at `start`
    pub fn set_run(&mut self, start: u32, count: u32) -> Result<()> {
        let in_range = start
            .checked_add(count)
            .is_some_and(|end| end <= self.limit);
        if !in_range {
            return Err(GcnError::OperandOutOfRange {
                file: self.file,
                start,
                count,
                limit: self.limit,
            });
        }
        for reg in start..start + count {
            self.bits[(reg / 64) as usize] |= 1 << (reg % 64);
        }
        Ok(())
    }

    pub fn contains(&self, reg: u32) -> bool {
        reg < self.limit && self.bits[(reg / 64) as usize] & (1 << (reg % 64)) != 0
    }

    pub fn count(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Set registers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.limit).filter(move |&reg| self.contains(reg))
    }
}

/// Export targets written by the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportUsage {
    pub mrt: u8,
    pub mrtz: bool,
    pub pos: u8,
    pub param: u32,
}

/// Analyzer output consumed by the translator
#[derive(Debug)]
pub struct UsageReport {
    pub sgprs: RegisterMask,
    pub vgprs: RegisterMask,
    pub tmps: RegisterMask,
    pub types: TypeMask,
    pub exports: ExportUsage,
    /// Interpolated attributes read by VINTRP
    pub attrs: u32,
    /// False once a vector register pair is used as one 64-bit value
    pub vgprs_independent: bool,
    pub buffers: Vec<ResourceHandle>,
    pub textures: Vec<ResourceHandle>,
    pub samplers: Vec<ResourceHandle>,
    pub dependencies: DependencyGraph,
    pub program_length: usize,
    pub instructions: usize,
    pub skipped: Vec<SkippedInstruction>,
}

impl Default for UsageReport {
    fn default() -> Self {
        Self {
            sgprs: RegisterMask::scalar(),
            vgprs: RegisterMask::vector(),
            tmps: RegisterMask::temp(),
            types: TypeMask::empty(),
            exports: ExportUsage::default(),
            attrs: 0,
            vgprs_independent: true,
            buffers: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            dependencies: DependencyGraph::new(),
            program_length: 0,
            instructions: 0,
            skipped: Vec::new(),
        }
    }
}

/// Descriptors compare by their current contents
fn same_descriptors(a: &[ResourceHandle], b: &[ResourceHandle]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| *x.read() == *y.read())
}

impl PartialEq for UsageReport {
    fn eq(&self, other: &Self) -> bool {
        self.sgprs == other.sgprs
            && self.vgprs == other.vgprs
            && self.tmps == other.tmps
            && self.types == other.types
            && self.exports == other.exports
            && self.attrs == other.attrs
            && self.vgprs_independent == other.vgprs_independent
            && same_descriptors(&self.buffers, &other.buffers)
            && same_descriptors(&self.textures, &other.textures)
            && same_descriptors(&self.samplers, &other.samplers)
            && self.dependencies == other.dependencies
            && self.program_length == other.program_length
            && self.instructions == other.instructions
            && self.skipped == other.skipped
    }
}

impl UsageReport {
    /// Re-read every descriptor payload from guest state.
    ///
    /// All descriptors are attempted; the first failure is returned.
    pub fn refresh_resources(&self, guest: &dyn GuestState) -> Result<()> {
        let mut first_error = None;
        for handle in self.buffers.iter().chain(&self.textures).chain(&self.samplers) {
            if let Err(e) = handle.write().refresh(guest) {
                warn!("descriptor refresh failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn resource_count(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.samplers.len()
    }
}

/// Provenance of one scalar register
#[derive(Debug, Clone)]
enum Slot {
    /// Not written yet; holds caller-supplied user data
    Initial,
    Known(Arc<DependencyNode>),
    Unknown,
}

/// Usage-collecting instruction consumer
pub struct Analyzer {
    report: UsageReport,
    slots: Vec<Slot>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            report: UsageReport::default(),
            slots: vec![Slot::Initial; SGPR_COUNT],
        }
    }

    pub fn finish(self) -> UsageReport {
        self.report
    }

    fn mark_operand(&mut self, insn: &Instruction, op: &Operand) -> Result<()> {
        let count = op.count as u32;
        match op.kind {
            OperandKind::None | OperandKind::Imm => {}
            OperandKind::Sgpr => self.report.sgprs.set_run(op.id, count)?,
            OperandKind::Vgpr => {
                self.report.vgprs.set_run(op.id, count)?;
                let wide_value = insn.type_src.is_64bit() || insn.type_dst.is_64bit();
                if count > 1 && wide_value && is_valu(insn.encoding) {
                    self.report.vgprs_independent = false;
                }
            }
            OperandKind::Tmp => self.report.tmps.set_run(op.id, 1)?,
            OperandKind::Attr => self.report.attrs |= 1 << op.id,
            OperandKind::ExpMrt => self.report.exports.mrt |= 1 << op.id,
            OperandKind::ExpMrtz => self.report.exports.mrtz = true,
            OperandKind::ExpPos => self.report.exports.pos |= 1 << op.id,
            OperandKind::ExpParam => self.report.exports.param |= 1 << op.id,
        }
        Ok(())
    }

    /// Provenance of a scalar register read, or `None` when it was computed
    fn provenance(&mut self, reg: u32) -> Option<Arc<DependencyNode>> {
        let slot = self.slots.get_mut(reg as usize)?;
        match slot {
            Slot::Initial => {
                let node = self.report.dependencies.scalar_register(reg);
                *slot = Slot::Known(Arc::clone(&node));
                Some(node)
            }
            Slot::Known(node) => Some(Arc::clone(node)),
            Slot::Unknown => None,
        }
    }

    /// Provenance of a descriptor base register, with a register fallback
    fn descriptor_source(&mut self, insn: &Instruction, reg: u32) -> Arc<DependencyNode> {
        self.provenance(reg).unwrap_or_else(|| {
            warn!(
                offset = insn.offset,
                "{}: provenance of s{} unknown, assuming user data",
                insn.mnemonic(),
                reg
            );
            self.report.dependencies.scalar_register(reg)
        })
    }

    fn operand_provenance(&mut self, op: &Operand, lane: u8) -> Option<Arc<DependencyNode>> {
        match op.kind {
            OperandKind::Sgpr => self.provenance(op.id + lane as u32),
            OperandKind::Imm => {
                let bits = op.constant.lane_bits(lane, DataType::B32);
                Some(self.report.dependencies.immediate(bits as u64))
            }
            _ => None,
        }
    }

    fn set_slot(&mut self, reg: u32, slot: Slot) {
        if let Some(s) = self.slots.get_mut(reg as usize) {
            *s = slot;
        }
    }

    fn clear_scalar_dest(&mut self, op: &Operand) {
        if op.kind == OperandKind::Sgpr && op.is_used() {
            for lane in 0..op.count as u32 {
                self.set_slot(op.id + lane, Slot::Unknown);
            }
        }
    }

    fn allocate(&mut self, kind: ResourceKind, dependency: Arc<DependencyNode>, wide: bool) {
        let handle = ResourceDescriptor::new(kind, dependency, wide).into_handle();
        let list = match kind {
            ResourceKind::Buffer => &mut self.report.buffers,
            ResourceKind::Texture => &mut self.report.textures,
            ResourceKind::Sampler => &mut self.report.samplers,
        };
        list.push(handle);
        debug!("allocated {} descriptor #{}", kind.name(), list.len() - 1);
    }

    /// Track scalar value provenance and allocate descriptors
    fn track(&mut self, insn: &Instruction) {
        match insn.opcode {
            Opcode::Sop1(Sop1Op::SMovB32 | Sop1Op::SMovB64) | Opcode::Sopk(SopkOp::SMovkI32) => {
                let lanes = insn.dst.count;
                let src = insn.src[0];
                let nodes: Vec<_> = (0..lanes)
                    .map(|lane| self.operand_provenance(&src, lane))
                    .collect();
                for (lane, node) in nodes.into_iter().enumerate() {
                    let slot = node.map_or(Slot::Unknown, Slot::Known);
                    self.set_slot(insn.dst.id + lane as u32, slot);
                }
            }
            Opcode::Smrd(op) => self.track_smrd(insn, op),
            Opcode::Mimg(op) => {
                let Fields::Mimg(f) = insn.fields else {
                    return;
                };
                let texture = self.descriptor_source(insn, insn.src[1].id);
                self.allocate(ResourceKind::Texture, texture, !f.r128);
                if op.uses_sampler() {
                    let sampler = self.descriptor_source(insn, insn.src[2].id);
                    self.allocate(ResourceKind::Sampler, sampler, false);
                }
            }
            _ => {
                self.clear_scalar_dest(&insn.dst);
                if let Some(extra) = insn.implicit_dst() {
                    self.clear_scalar_dest(extra);
                }
            }
        }
    }

    fn track_smrd(&mut self, insn: &Instruction, op: SmrdOp) {
        use SmrdOp::*;
        match op {
            SLoadDword | SLoadDwordx2 | SLoadDwordx4 | SLoadDwordx8 | SLoadDwordx16 => {
                let base = self.descriptor_source(insn, insn.src[0].id);
                let offset = insn.src[1];
                for lane in 0..insn.dst.count as u32 {
                    let offset_node = match offset.kind {
                        OperandKind::Imm => Some(
                            self.report
                                .dependencies
                                .immediate(offset.constant.bits() as u64 + 4 * lane as u64),
                        ),
                        // a register offset only describes the first dword
                        _ if lane == 0 => self.operand_provenance(&offset, 0),
                        _ => None,
                    };
                    let slot = match offset_node {
                        Some(off) => {
                            Slot::Known(self.report.dependencies.memory_indirect(&base, &off))
                        }
                        None => Slot::Unknown,
                    };
                    self.set_slot(insn.dst.id + lane, slot);
                }
            }
            SBufferLoadDword | SBufferLoadDwordx2 | SBufferLoadDwordx4 | SBufferLoadDwordx8
            | SBufferLoadDwordx16 => {
                let source = self.descriptor_source(insn, insn.src[0].id);
                self.allocate(ResourceKind::Buffer, source, false);
                self.clear_scalar_dest(&insn.dst);
            }
            SMemtime | SDcacheInv => self.clear_scalar_dest(&insn.dst),
        }
    }
}

fn is_valu(encoding: Encoding) -> bool {
    matches!(
        encoding,
        Encoding::Vop1 | Encoding::Vop2 | Encoding::Vop3 | Encoding::Vopc
    )
}

impl InstructionConsumer for Analyzer {
    fn consume(&mut self, insn: &Instruction) -> Result<()> {
        self.report.types |= insn.type_src.mask() | insn.type_dst.mask();

        for op in insn.operands().filter(|op| op.is_used()) {
            self.mark_operand(insn, op)?;
        }

        self.track(insn);
        Ok(())
    }
}

/// Run the analysis pass over a program
pub fn analyze(bytes: &[u8], config: &ShaderConfig) -> Result<UsageReport> {
    let mut analyzer = Analyzer::new();
    let outcome = decode(bytes, config.max_scan_bytes, &mut analyzer)?;

    for skip in &outcome.skipped {
        debug!(offset = skip.offset, "analysis skipped instruction: {}", skip.error);
    }

    let mut report = analyzer.finish();
    report.program_length = outcome.program_length;
    report.instructions = outcome.consumed;
    report.skipped = outcome.skipped;

    info!(
        instructions = report.instructions,
        skipped = report.skipped.len(),
        sgprs = report.sgprs.count(),
        vgprs = report.vgprs.count(),
        resources = report.resource_count(),
        "analysis complete"
    );
    Ok(report)
}
