//! SPIR-V translation pass
//!
//! Second pass over a program. The module skeleton (types, register
//! variables, resource bindings and the stage interface) is declared from the
//! analyzer's report before the first instruction is visited; every handler
//! then appends to a single entry-point function.

use super::analyze::UsageReport;
use super::decode::{decode, InstructionConsumer, SkippedInstruction};
use super::opcodes::*;
use super::resource::{ResourceHandle, ResourceKind};
use super::spirv::*;
use super::types::*;
use og_core::config::ShaderConfig;
use og_core::error::{GcnError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the generated entry point
pub const ENTRY_POINT: &str = "main";

/// Location of the first non-primary position export
const EXTRA_POSITION_LOCATION: u32 = 32;

/// One descriptor bound by the translated module
#[derive(Debug, Clone)]
pub struct ResourceBinding {
    pub kind: ResourceKind,
    /// Index in the analyzer's list for `kind`
    pub index: usize,
    pub set: u32,
    pub binding: u32,
    pub resource: ResourceHandle,
}

/// Translated SPIR-V module
#[derive(Debug)]
pub struct TranslationModule {
    pub words: Vec<u32>,
    pub stage: ShaderStage,
    pub bindings: Vec<ResourceBinding>,
    pub entry_point: &'static str,
    /// Instructions left out of the module
    pub skipped: Vec<SkippedInstruction>,
}

impl TranslationModule {
    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Module size in bytes
    pub fn len(&self) -> usize {
        self.words.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

fn sgpr_name(reg: u32) -> String {
    match reg {
        SGPR_VCC_LO => "vcc_lo".to_string(),
        SGPR_VCC_HI => "vcc_hi".to_string(),
        SGPR_M0 => "m0".to_string(),
        SGPR_EXEC_LO => "exec_lo".to_string(),
        SGPR_EXEC_HI => "exec_hi".to_string(),
        n => format!("s{}", n),
    }
}

fn tmp_name(reg: u32) -> &'static str {
    match reg {
        TMP_SCC => "scc",
        TMP_VCCZ => "vccz",
        _ => "execz",
    }
}

fn unsupported(insn: &Instruction) -> GcnError {
    GcnError::Unsupported {
        offset: insn.offset,
        mnemonic: insn.mnemonic(),
    }
}

/// Translating instruction consumer
pub struct Translator {
    b: SpirVBuilder,
    stage: ShaderStage,
    names: bool,
    main: u32,
    local_size: [u32; 3],
    sgprs: Vec<u32>,
    vgprs: Vec<u32>,
    tmps: Vec<u32>,
    buffers: Vec<u32>,
    textures: Vec<u32>,
    samplers: Vec<u32>,
    next_buffer: usize,
    next_texture: usize,
    next_sampler: usize,
    mrt: Vec<u32>,
    mrtz: u32,
    pos: Vec<u32>,
    params: Vec<u32>,
    attrs: Vec<u32>,
    interface: Vec<u32>,
    bindings: Vec<ResourceBinding>,
    /// Set once the function body has been closed by a program end
    ended: bool,
}

impl Translator {
    /// Declare the module skeleton for `report`
    pub fn new(report: &UsageReport, stage: ShaderStage, config: &ShaderConfig) -> Self {
        let mut t = Self {
            b: SpirVBuilder::new(),
            stage,
            names: config.emit_debug_names,
            main: 0,
            local_size: config.compute_local_size,
            sgprs: vec![0; SGPR_COUNT],
            vgprs: vec![0; VGPR_COUNT],
            tmps: vec![0; TMP_COUNT],
            buffers: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            next_buffer: 0,
            next_texture: 0,
            next_sampler: 0,
            mrt: vec![0; MRT_COUNT],
            mrtz: 0,
            pos: vec![0; POS_COUNT],
            params: vec![0; PARAM_COUNT],
            attrs: vec![0; ATTR_COUNT],
            interface: Vec::new(),
            bindings: Vec::new(),
            ended: false,
        };

        if !report.vgprs_independent {
            warn!("vector registers are used as 64-bit pairs; translating lanes independently");
        }

        t.b.add_capability(CAP_SHADER);
        t.b.add_glsl_import();
        t.b.add_memory_model();

        t.declare_types(report);
        t.declare_registers(report);
        t.declare_resources(report, stage.descriptor_set());
        t.declare_interface(report);

        let void = t.b.type_void();
        let func_ty = t.b.type_function(void);
        t.main = t.b.begin_function(void, func_ty);
        if t.names {
            t.b.add_name(t.main, ENTRY_POINT);
        }
        t.seed_inputs();
        t
    }

    fn name(&mut self, id: u32, name: &str) {
        if self.names {
            self.b.add_name(id, name);
        }
    }

    fn declare_types(&mut self, report: &UsageReport) {
        let used = report.types;
        let has_registers =
            !report.sgprs.is_empty() || !report.vgprs.is_empty() || !report.tmps.is_empty();

        if has_registers || used.intersects(TypeMask::B32 | TypeMask::U32 | TypeMask::B64) {
            self.b.type_int(32, false);
        }
        if used.contains(TypeMask::I32) {
            self.b.type_int(32, true);
        }
        if used.contains(TypeMask::F32) {
            self.b.type_float(32);
        }
        if used.contains(TypeMask::F64) {
            self.b.type_float(64);
        }
        if used.contains(TypeMask::I64) {
            self.b.type_int(64, true);
        }
        if used.contains(TypeMask::U64) {
            self.b.type_int(64, false);
        }
    }

    fn declare_registers(&mut self, report: &UsageReport) {
        let uint = self.b.type_int(32, false);
        let ptr = self.b.add_pointer_type(STORAGE_PRIVATE, uint);
        let zero = self.b.constant_u32(0);

        for reg in report.sgprs.iter() {
            let var = self.b.add_variable_with_init(ptr, STORAGE_PRIVATE, zero);
            self.name(var, &sgpr_name(reg));
            self.sgprs[reg as usize] = var;
        }
        for reg in report.vgprs.iter() {
            let var = self.b.add_variable_with_init(ptr, STORAGE_PRIVATE, zero);
            self.name(var, &format!("v{}", reg));
            self.vgprs[reg as usize] = var;
        }
        for reg in report.tmps.iter() {
            let var = self.b.add_variable_with_init(ptr, STORAGE_PRIVATE, zero);
            self.name(var, tmp_name(reg));
            self.tmps[reg as usize] = var;
        }
    }

    /// One binding per descriptor: buffers, then textures, then samplers
    fn declare_resources(&mut self, report: &UsageReport, set: u32) {
        let mut binding = 0;

        if !report.buffers.is_empty() {
            let uint = self.b.type_int(32, false);
            let array = self.b.type_runtime_array(uint);
            self.b.decorate(array, DECORATION_ARRAY_STRIDE, &[4]);

            for (index, handle) in report.buffers.iter().enumerate() {
                let block = self.b.type_struct(&[array]);
                self.b.decorate(block, DECORATION_BUFFER_BLOCK, &[]);
                self.b.member_decorate(block, 0, DECORATION_OFFSET, &[0]);
                self.b.member_decorate(block, 0, DECORATION_NON_WRITABLE, &[]);
                let ptr = self.b.add_pointer_type(STORAGE_UNIFORM, block);
                let var = self.b.add_variable(ptr, STORAGE_UNIFORM);
                self.name(var, &format!("buffer{}", index));
                self.bind(var, ResourceKind::Buffer, index, handle, set, &mut binding);
                self.buffers.push(var);
            }
        }

        if !report.textures.is_empty() {
            let float = self.b.type_float(32);
            let image = self.b.type_image_2d(float);
            let ptr = self.b.add_pointer_type(STORAGE_UNIFORM_CONSTANT, image);
            for (index, handle) in report.textures.iter().enumerate() {
                let var = self.b.add_variable(ptr, STORAGE_UNIFORM_CONSTANT);
                self.name(var, &format!("texture{}", index));
                self.bind(var, ResourceKind::Texture, index, handle, set, &mut binding);
                self.textures.push(var);
            }
        }

        if !report.samplers.is_empty() {
            let sampler = self.b.type_sampler();
            let ptr = self.b.add_pointer_type(STORAGE_UNIFORM_CONSTANT, sampler);
            for (index, handle) in report.samplers.iter().enumerate() {
                let var = self.b.add_variable(ptr, STORAGE_UNIFORM_CONSTANT);
                self.name(var, &format!("sampler{}", index));
                self.bind(var, ResourceKind::Sampler, index, handle, set, &mut binding);
                self.samplers.push(var);
            }
        }
    }

    fn bind(
        &mut self,
        var: u32,
        kind: ResourceKind,
        index: usize,
        handle: &ResourceHandle,
        set: u32,
        binding: &mut u32,
    ) {
        self.b.decorate(var, DECORATION_DESCRIPTOR_SET, &[set]);
        self.b.decorate(var, DECORATION_BINDING, &[*binding]);
        debug!(kind = kind.name(), index, set, binding = *binding, "declared resource binding");
        self.bindings.push(ResourceBinding {
            kind,
            index,
            set,
            binding: *binding,
            resource: Arc::clone(handle),
        });
        *binding += 1;
    }

    fn interface_var(&mut self, storage: u32, ty: u32, name: &str) -> u32 {
        let ptr = self.b.add_pointer_type(storage, ty);
        let var = self.b.add_variable(ptr, storage);
        self.name(var, name);
        self.interface.push(var);
        var
    }

    fn declare_interface(&mut self, report: &UsageReport) {
        let exports = report.exports;
        match self.stage {
            ShaderStage::Pixel => {
                let float = self.b.type_float(32);
                let vec4 = self.b.type_vector(float, 4);
                for i in 0..ATTR_COUNT {
                    if report.attrs & (1 << i) != 0 {
                        let var = self.interface_var(STORAGE_INPUT, vec4, &format!("attr{}", i));
                        self.b.add_location(var, i as u32);
                        self.attrs[i] = var;
                    }
                }
                for i in 0..MRT_COUNT {
                    if exports.mrt & (1 << i) != 0 {
                        let var = self.interface_var(STORAGE_OUTPUT, vec4, &format!("mrt{}", i));
                        self.b.add_location(var, i as u32);
                        self.mrt[i] = var;
                    }
                }
                if exports.mrtz {
                    let var = self.interface_var(STORAGE_OUTPUT, float, "depth");
                    self.b.add_builtin(var, BUILTIN_FRAG_DEPTH);
                    self.mrtz = var;
                }
                if exports.pos != 0 || exports.param != 0 {
                    warn!("pixel program exports vertex outputs; they will be dropped");
                }
            }
            ShaderStage::Vertex => {
                let float = self.b.type_float(32);
                let vec4 = self.b.type_vector(float, 4);
                for i in 0..POS_COUNT {
                    if exports.pos & (1 << i) != 0 {
                        let var = self.interface_var(STORAGE_OUTPUT, vec4, &format!("pos{}", i));
                        if i == 0 {
                            self.b.add_builtin(var, BUILTIN_POSITION);
                        } else {
                            self.b.add_location(var, EXTRA_POSITION_LOCATION + i as u32 - 1);
                        }
                        self.pos[i] = var;
                    }
                }
                for i in 0..PARAM_COUNT {
                    if exports.param & (1 << i) != 0 {
                        let var = self.interface_var(STORAGE_OUTPUT, vec4, &format!("param{}", i));
                        self.b.add_location(var, i as u32);
                        self.params[i] = var;
                    }
                }
                if exports.mrt != 0 || exports.mrtz {
                    warn!("vertex program exports render targets; they will be dropped");
                }
            }
            ShaderStage::Compute => {
                if exports != Default::default() {
                    warn!("compute program exports outputs; they will be dropped");
                }
            }
        }
    }

    /// Copy stage inputs into the vector registers the hardware preloads
    fn seed_inputs(&mut self) {
        let uint = self.b.type_int(32, false);
        match self.stage {
            ShaderStage::Vertex if self.vgprs[0] != 0 => {
                let var = self.interface_var(STORAGE_INPUT, uint, "vertex_index");
                self.b.add_builtin(var, BUILTIN_VERTEX_INDEX);
                let index = self.b.emit(OP_LOAD, uint, &[var]);
                self.b.emit_void(OP_STORE, &[self.vgprs[0], index]);
            }
            ShaderStage::Compute if self.vgprs[..3].iter().any(|&v| v != 0) => {
                let uvec3 = self.b.type_vector(uint, 3);
                let var = self.interface_var(STORAGE_INPUT, uvec3, "local_invocation_id");
                self.b.add_builtin(var, BUILTIN_LOCAL_INVOCATION_ID);
                let id = self.b.emit(OP_LOAD, uvec3, &[var]);
                for axis in 0..3 {
                    let reg = self.vgprs[axis];
                    if reg != 0 {
                        let c = self.b.emit(OP_COMPOSITE_EXTRACT, uint, &[id, axis as u32]);
                        self.b.emit_void(OP_STORE, &[reg, c]);
                    }
                }
            }
            _ => {}
        }
    }

    /// Close the function and serialize the module
    pub fn finish(mut self, skipped: Vec<SkippedInstruction>) -> TranslationModule {
        if !self.ended {
            self.b.emit_void(OP_RETURN, &[]);
        }
        self.b.end_function();

        let model = match self.stage {
            ShaderStage::Vertex => EXEC_MODEL_VERTEX,
            ShaderStage::Pixel => EXEC_MODEL_FRAGMENT,
            ShaderStage::Compute => EXEC_MODEL_GL_COMPUTE,
        };
        self.b
            .add_entry_point(model, self.main, ENTRY_POINT, &self.interface);
        match self.stage {
            ShaderStage::Pixel => {
                self.b
                    .add_execution_mode(self.main, EXEC_MODE_ORIGIN_UPPER_LEFT, &[]);
                if self.mrtz != 0 {
                    self.b
                        .add_execution_mode(self.main, EXEC_MODE_DEPTH_REPLACING, &[]);
                }
            }
            ShaderStage::Compute => {
                self.b
                    .add_execution_mode(self.main, EXEC_MODE_LOCAL_SIZE, &self.local_size);
            }
            ShaderStage::Vertex => {}
        }

        TranslationModule {
            words: self.b.build(),
            stage: self.stage,
            bindings: self.bindings,
            entry_point: ENTRY_POINT,
            skipped,
        }
    }

    //=========================================================================
    // TYPES, CONSTANTS, CASTS
    //=========================================================================

    fn t_uint(&mut self) -> u32 {
        self.b.type_int(32, false)
    }

    fn t_int(&mut self) -> u32 {
        self.b.type_int(32, true)
    }

    fn t_float(&mut self) -> u32 {
        self.b.type_float(32)
    }

    fn t_bool(&mut self) -> u32 {
        self.b.type_bool()
    }

    fn t_vec(&mut self, count: u32) -> u32 {
        let float = self.t_float();
        self.b.type_vector(float, count)
    }

    /// SPIR-V type of one 32-bit lane of `ty`
    fn t_value(&mut self, ty: DataType) -> u32 {
        match ty {
            DataType::F32 => self.t_float(),
            DataType::I32 => self.t_int(),
            _ => self.t_uint(),
        }
    }

    fn c_uint(&mut self, value: u32) -> u32 {
        self.b.constant_u32(value)
    }

    fn c_float(&mut self, value: f32) -> u32 {
        self.b.constant_f32(value)
    }

    fn is_reinterpreted(ty: DataType) -> bool {
        matches!(ty, DataType::F32 | DataType::I32)
    }

    /// Reinterpret a register value as `ty`
    fn from_storage(&mut self, value: u32, ty: DataType) -> u32 {
        if Self::is_reinterpreted(ty) {
            let target = self.t_value(ty);
            self.b.emit(OP_BITCAST, target, &[value])
        } else {
            value
        }
    }

    fn to_storage(&mut self, value: u32, ty: DataType) -> u32 {
        if Self::is_reinterpreted(ty) {
            let uint = self.t_uint();
            self.b.emit(OP_BITCAST, uint, &[value])
        } else {
            value
        }
    }

    //=========================================================================
    // OPERAND ACCESS
    //=========================================================================

    fn register_var(&self, insn: &Instruction, op: &Operand) -> Result<u32> {
        let table = match op.kind {
            OperandKind::Sgpr => &self.sgprs,
            OperandKind::Vgpr => &self.vgprs,
            OperandKind::Tmp => &self.tmps,
            _ => return Err(unsupported(insn)),
        };
        match table.get(op.id as usize) {
            Some(&var) if var != 0 => Ok(var),
            _ => Err(GcnError::InvalidModule(format!(
                "{} at 0x{:x} touches {:?} register {} missing from the usage report",
                insn.mnemonic(),
                insn.offset,
                op.kind,
                op.id
            ))),
        }
    }

    /// Load register `lane` of `op` as a value of type `ty`
    fn load(&mut self, insn: &Instruction, op: &Operand, lane: u8, ty: DataType) -> Result<u32> {
        if !op.is_used() {
            return Err(unsupported(insn));
        }
        if op.kind == OperandKind::Imm {
            let target = self.t_value(ty);
            return Ok(self.b.constant(target, op.constant.lane_bits(lane, ty)));
        }
        let var = self.register_var(insn, &op.lane(lane))?;
        let uint = self.t_uint();
        let raw = self.b.emit(OP_LOAD, uint, &[var]);
        Ok(self.from_storage(raw, ty))
    }

    fn store(
        &mut self,
        insn: &Instruction,
        op: &Operand,
        lane: u8,
        value: u32,
        ty: DataType,
    ) -> Result<()> {
        let var = self.register_var(insn, &op.lane(lane))?;
        let raw = self.to_storage(value, ty);
        self.b.emit_void(OP_STORE, &[var, raw]);
        Ok(())
    }

    /// Source operand with VOP3 input modifiers applied
    fn src(&mut self, insn: &Instruction, index: usize, ty: DataType) -> Result<u32> {
        let mut value = self.load(insn, &insn.src[index], 0, ty)?;
        if ty == DataType::F32 {
            if let Some(f) = insn.vop3() {
                let float = self.t_float();
                if f.abs & (1 << index) != 0 {
                    value = self.b.ext_inst(float, GLSL_FABS, &[value]);
                }
                if f.neg & (1 << index) != 0 {
                    value = self.b.emit(OP_FNEGATE, float, &[value]);
                }
            }
        }
        Ok(value)
    }

    /// Store the result with VOP3 output modifiers applied
    fn write_dst(&mut self, insn: &Instruction, value: u32, ty: DataType) -> Result<()> {
        let mut value = value;
        if ty == DataType::F32 {
            if let Some(f) = insn.vop3() {
                let float = self.t_float();
                let scale = match f.omod {
                    1 => Some(2.0),
                    2 => Some(4.0),
                    3 => Some(0.5),
                    _ => None,
                };
                if let Some(scale) = scale {
                    let c = self.c_float(scale);
                    value = self.b.emit(OP_FMUL, float, &[value, c]);
                }
                if f.clamp {
                    let (lo, hi) = (self.c_float(0.0), self.c_float(1.0));
                    value = self.b.ext_inst(float, GLSL_FCLAMP, &[value, lo, hi]);
                }
            }
        }
        self.store(insn, &insn.dst, 0, value, ty)
    }

    /// Load `sources` operands as `src_ty`, combine them and store as `dst_ty`
    fn alu(
        &mut self,
        insn: &Instruction,
        sources: usize,
        src_ty: DataType,
        dst_ty: DataType,
        f: impl FnOnce(&mut Self, &[u32]) -> u32,
    ) -> Result<()> {
        let mut args = [0u32; 3];
        for (i, arg) in args.iter_mut().enumerate().take(sources) {
            *arg = self.src(insn, i, src_ty)?;
        }
        let result = f(self, &args[..sources]);
        self.write_dst(insn, result, dst_ty)
    }

    //=========================================================================
    // EXPRESSION HELPERS
    //=========================================================================

    fn uop(&mut self, opcode: u16, args: &[u32]) -> u32 {
        let uint = self.t_uint();
        self.b.emit(opcode, uint, args)
    }

    fn fop(&mut self, opcode: u16, args: &[u32]) -> u32 {
        let float = self.t_float();
        self.b.emit(opcode, float, args)
    }

    fn cmp(&mut self, opcode: u16, args: &[u32]) -> u32 {
        let bool_ty = self.t_bool();
        self.b.emit(opcode, bool_ty, args)
    }

    fn glsl(&mut self, ty: u32, instruction: u32, args: &[u32]) -> u32 {
        self.b.ext_inst(ty, instruction, args)
    }

    /// Clamp to the 16-bit range and return the result as uint
    fn saturate16(&mut self, signed: bool, value: u32) -> u32 {
        if signed {
            let int = self.t_int();
            let lo = self.b.constant_i32(i16::MIN.into());
            let hi = self.b.constant_i32(i16::MAX.into());
            let clamped = self.glsl(int, GLSL_SCLAMP, &[value, lo, hi]);
            let uint = self.t_uint();
            self.b.emit(OP_BITCAST, uint, &[clamped])
        } else {
            let uint = self.t_uint();
            let max = self.c_uint(u16::MAX.into());
            self.glsl(uint, GLSL_UMIN, &[value, max])
        }
    }

    /// Truncate a float onto the f16 grid so half packing rounds toward zero.
    ///
    /// Dropping the low 13 mantissa bits makes every normal half value exact;
    /// finite values past the half range saturate to +-65504 and NaN or
    /// infinity pass through. Half denormals still follow the packing rounding.
    fn half_toward_zero(&mut self, value: u32) -> u32 {
        let (uint, float) = (self.t_uint(), self.t_float());
        let bits = self.b.emit(OP_BITCAST, uint, &[value]);
        let mask = self.c_uint(0xFFFF_E000);
        let kept = self.uop(OP_BITWISE_AND, &[bits, mask]);
        let truncated = self.b.emit(OP_BITCAST, float, &[kept]);
        let (lo, hi) = (self.c_float(-65504.0), self.c_float(65504.0));
        let clamped = self.glsl(float, GLSL_FCLAMP, &[truncated, lo, hi]);
        let inf = self.cmp(OP_IS_INF, &[value]);
        let nan = self.cmp(OP_IS_NAN, &[value]);
        let special = self.cmp(OP_LOGICAL_OR, &[inf, nan]);
        self.b.emit(OP_SELECT, float, &[special, value, clamped])
    }

    /// 1 when `cond` holds, else 0
    fn bool_to_uint(&mut self, cond: u32) -> u32 {
        let (one, zero) = (self.c_uint(1), self.c_uint(0));
        self.uop(OP_SELECT, &[cond, one, zero])
    }

    fn nonzero(&mut self, value: u32) -> u32 {
        let zero = self.c_uint(0);
        self.cmp(OP_INOT_EQUAL, &[value, zero])
    }

    fn low_bits(&mut self, value: u32, bits: u32) -> u32 {
        let mask = self.c_uint((1u32 << bits) - 1);
        self.uop(OP_BITWISE_AND, &[value, mask])
    }

    /// Bitfield extract with the width clamped to the remaining bits
    fn bit_extract(&mut self, signed: bool, value: u32, offset: u32, width: u32) -> u32 {
        let c32 = self.c_uint(32);
        let room = self.uop(OP_ISUB, &[c32, offset]);
        let uint = self.t_uint();
        let width = self.glsl(uint, GLSL_UMIN, &[width, room]);
        let opcode = if signed {
            OP_BIT_FIELD_S_EXTRACT
        } else {
            OP_BIT_FIELD_U_EXTRACT
        };
        self.uop(opcode, &[value, offset, width])
    }

    /// Low 24 bits, sign- or zero-extended
    fn extend24(&mut self, signed: bool, value: u32) -> u32 {
        let (zero, c24) = (self.c_uint(0), self.c_uint(24));
        let opcode = if signed {
            OP_BIT_FIELD_S_EXTRACT
        } else {
            OP_BIT_FIELD_U_EXTRACT
        };
        self.uop(opcode, &[value, zero, c24])
    }

    /// ((1 << size) - 1) << offset
    fn bit_mask(&mut self, size: u32, offset: u32) -> u32 {
        let size = self.low_bits(size, 5);
        let offset = self.low_bits(offset, 5);
        let one = self.c_uint(1);
        let shifted = self.uop(OP_SHIFT_LEFT_LOGICAL, &[one, size]);
        let mask = self.uop(OP_ISUB, &[shifted, one]);
        self.uop(OP_SHIFT_LEFT_LOGICAL, &[mask, offset])
    }

    /// Count of leading zeros from the MSB, or all ones when `msb` is -1
    fn leading_bit(&mut self, msb: u32) -> u32 {
        let (all, c31) = (self.c_uint(u32::MAX), self.c_uint(31));
        let none = self.cmp(OP_IEQUAL, &[msb, all]);
        let from_top = self.uop(OP_ISUB, &[c31, msb]);
        self.uop(OP_SELECT, &[none, all, from_top])
    }

    fn min_max(&mut self, ty: DataType, max: bool) -> u32 {
        match (ty, max) {
            (DataType::F32, false) => GLSL_FMIN,
            (DataType::F32, true) => GLSL_FMAX,
            (DataType::I32, false) => GLSL_SMIN,
            (DataType::I32, true) => GLSL_SMAX,
            (_, false) => GLSL_UMIN,
            (_, true) => GLSL_UMAX,
        }
    }

    /// Comparison of two values of type `ty`, as a bool
    fn compare(&mut self, ty: DataType, cond: Condition, a: u32, b: u32) -> Option<u32> {
        use Condition::*;
        let opcode = if ty.is_float() {
            match cond {
                Lt => OP_FORD_LESS_THAN,
                Eq => OP_FORD_EQUAL,
                Le => OP_FORD_LESS_THAN_EQUAL,
                Gt => OP_FORD_GREATER_THAN,
                Lg => OP_FORD_NOT_EQUAL,
                Ge => OP_FORD_GREATER_THAN_EQUAL,
                O => OP_ORDERED,
                U => OP_UNORDERED,
                Nge => OP_FUNORD_LESS_THAN,
                Nlg => OP_FUNORD_EQUAL,
                Ngt => OP_FUNORD_LESS_THAN_EQUAL,
                Nle => OP_FUNORD_GREATER_THAN,
                Neq => OP_FUNORD_NOT_EQUAL,
                Nlt => OP_FUNORD_GREATER_THAN_EQUAL,
                False => return Some(self.b.constant_bool(false)),
                True => return Some(self.b.constant_bool(true)),
                None => return Option::None,
            }
        } else {
            let signed = ty.is_signed();
            match cond {
                Lt if signed => OP_SLESS_THAN,
                Lt => OP_ULESS_THAN,
                Le if signed => OP_SLESS_THAN_EQUAL,
                Le => OP_ULESS_THAN_EQUAL,
                Gt if signed => OP_SGREATER_THAN,
                Gt => OP_UGREATER_THAN,
                Ge if signed => OP_SGREATER_THAN_EQUAL,
                Ge => OP_UGREATER_THAN_EQUAL,
                Eq => OP_IEQUAL,
                Lg => OP_INOT_EQUAL,
                False => return Some(self.b.constant_bool(false)),
                True => return Some(self.b.constant_bool(true)),
                _ => return Option::None,
            }
        };
        Some(self.cmp(opcode, &[a, b]))
    }

    /// Write SCC when the instruction carries it as a second destination
    fn write_scc(&mut self, insn: &Instruction, bit: u32) -> Result<()> {
        match insn.implicit_dst() {
            Some(op) if op.kind == OperandKind::Tmp => self.store(insn, op, 0, bit, DataType::U32),
            _ => Ok(()),
        }
    }

    /// SCC for results that report "non-zero"
    fn write_scc_nonzero(&mut self, insn: &Instruction, value: u32) -> Result<()> {
        if insn.implicit_dst().is_none() {
            return Ok(());
        }
        let c = self.nonzero(value);
        let bit = self.bool_to_uint(c);
        self.write_scc(insn, bit)
    }

    /// Store a lane mask bit into a register pair, refreshing its zero flag
    fn write_mask(&mut self, insn: &Instruction, op: &Operand, bit: u32) -> Result<()> {
        let zero = self.c_uint(0);
        self.store(insn, op, 0, bit, DataType::U32)?;
        if op.count > 1 {
            self.store(insn, op, 1, zero, DataType::U32)?;
        }

        let flag = match op.id {
            SGPR_VCC_LO if op.kind == OperandKind::Sgpr => TMP_VCCZ,
            SGPR_EXEC_LO if op.kind == OperandKind::Sgpr => TMP_EXECZ,
            _ => return Ok(()),
        };
        let var = self.tmps[flag as usize];
        if var != 0 {
            let is_zero = self.cmp(OP_IEQUAL, &[bit, zero]);
            let value = self.bool_to_uint(is_zero);
            self.b.emit_void(OP_STORE, &[var, value]);
        }
        Ok(())
    }

    fn take_resource(&mut self, insn: &Instruction, kind: ResourceKind) -> Result<u32> {
        let (vars, next) = match kind {
            ResourceKind::Buffer => (&self.buffers, &mut self.next_buffer),
            ResourceKind::Texture => (&self.textures, &mut self.next_texture),
            ResourceKind::Sampler => (&self.samplers, &mut self.next_sampler),
        };
        let var = vars.get(*next).copied().ok_or_else(|| {
            GcnError::InvalidModule(format!(
                "{} at 0x{:x} needs {} #{} but only {} were analyzed",
                insn.mnemonic(),
                insn.offset,
                kind.name(),
                *next,
                vars.len()
            ))
        })?;
        *next += 1;
        Ok(var)
    }

    //=========================================================================
    // SCALAR ALU
    //=========================================================================

    fn sop2(&mut self, insn: &Instruction, op: Sop2Op) -> Result<()> {
        use Sop2Op::*;
        let u = DataType::U32;
        match op {
            SAddU32 | SSubU32 | SAddI32 | SSubI32 | SMulI32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let b = self.load(insn, &insn.src[1], 0, u)?;
                let opcode = match op {
                    SAddU32 | SAddI32 => OP_IADD,
                    SMulI32 => OP_IMUL,
                    _ => OP_ISUB,
                };
                let r = self.uop(opcode, &[a, b]);
                self.store(insn, &insn.dst, 0, r, u)?;

                let scc = match op {
                    SAddU32 => {
                        let carry = self.cmp(OP_ULESS_THAN, &[r, a]);
                        self.bool_to_uint(carry)
                    }
                    SSubU32 => {
                        let borrow = self.cmp(OP_ULESS_THAN, &[a, b]);
                        self.bool_to_uint(borrow)
                    }
                    SAddI32 => self.add_overflow(a, b, r),
                    SSubI32 => self.sub_overflow(a, b, r),
                    _ => return Ok(()),
                };
                self.write_scc(insn, scc)
            }
            SMinI32 | SMinU32 | SMaxI32 | SMaxU32 => {
                let ty = insn.type_src;
                let max = matches!(op, SMaxI32 | SMaxU32);
                let a = self.load(insn, &insn.src[0], 0, ty)?;
                let b = self.load(insn, &insn.src[1], 0, ty)?;
                let t = self.t_value(ty);
                let inst = self.min_max(ty, max);
                let r = self.glsl(t, inst, &[a, b]);
                self.store(insn, &insn.dst, 0, r, ty)?;
                // SCC is set when src0 was selected
                let cond = if max { Condition::Gt } else { Condition::Lt };
                let picked = self.compare(ty, cond, a, b).ok_or_else(|| unsupported(insn))?;
                let bit = self.bool_to_uint(picked);
                self.write_scc(insn, bit)
            }
            SCselectB32 | SCselectB64 => {
                let scc = self.load(insn, &insn.src[2], 0, u)?;
                let cond = self.nonzero(scc);
                for lane in 0..insn.dst.count {
                    let a = self.load(insn, &insn.src[0], lane, u)?;
                    let b = self.load(insn, &insn.src[1], lane, u)?;
                    let r = self.uop(OP_SELECT, &[cond, a, b]);
                    self.store(insn, &insn.dst, lane, r, u)?;
                }
                Ok(())
            }
            SAndB32 | SAndB64 | SOrB32 | SOrB64 | SXorB32 | SXorB64 | SAndn2B32 | SAndn2B64
            | SOrn2B32 | SOrn2B64 | SNandB32 | SNandB64 | SNorB32 | SNorB64 | SXnorB32
            | SXnorB64 => {
                let mut any = None;
                for lane in 0..insn.dst.count {
                    let a = self.load(insn, &insn.src[0], lane, u)?;
                    let b = self.load(insn, &insn.src[1], lane, u)?;
                    let r = self.bitwise(op, a, b);
                    self.store(insn, &insn.dst, lane, r, u)?;
                    any = Some(match any {
                        Some(prev) => self.uop(OP_BITWISE_OR, &[prev, r]),
                        None => r,
                    });
                }
                match any {
                    Some(v) => self.write_scc_nonzero(insn, v),
                    None => Ok(()),
                }
            }
            SLshlB32 | SLshrB32 | SAshrI32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let b = self.load(insn, &insn.src[1], 0, u)?;
                let shift = self.low_bits(b, 5);
                let opcode = match op {
                    SLshlB32 => OP_SHIFT_LEFT_LOGICAL,
                    SLshrB32 => OP_SHIFT_RIGHT_LOGICAL,
                    _ => OP_SHIFT_RIGHT_ARITHMETIC,
                };
                let r = self.uop(opcode, &[a, shift]);
                self.store(insn, &insn.dst, 0, r, u)?;
                self.write_scc_nonzero(insn, r)
            }
            SBfmB32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let b = self.load(insn, &insn.src[1], 0, u)?;
                let r = self.bit_mask(a, b);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SBfeU32 | SBfeI32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let b = self.load(insn, &insn.src[1], 0, u)?;
                // src1: offset in [4:0], width in [22:16]
                let offset = self.low_bits(b, 5);
                let c16 = self.c_uint(16);
                let high = self.uop(OP_SHIFT_RIGHT_LOGICAL, &[b, c16]);
                let width = self.low_bits(high, 7);
                let r = self.bit_extract(op == SBfeI32, a, offset, width);
                self.store(insn, &insn.dst, 0, r, u)?;
                self.write_scc_nonzero(insn, r)
            }
            _ => Err(unsupported(insn)),
        }
    }

    fn bitwise(&mut self, op: Sop2Op, a: u32, b: u32) -> u32 {
        use Sop2Op::*;
        match op {
            SAndB32 | SAndB64 => self.uop(OP_BITWISE_AND, &[a, b]),
            SOrB32 | SOrB64 => self.uop(OP_BITWISE_OR, &[a, b]),
            SXorB32 | SXorB64 => self.uop(OP_BITWISE_XOR, &[a, b]),
            SAndn2B32 | SAndn2B64 => {
                let nb = self.uop(OP_NOT, &[b]);
                self.uop(OP_BITWISE_AND, &[a, nb])
            }
            SOrn2B32 | SOrn2B64 => {
                let nb = self.uop(OP_NOT, &[b]);
                self.uop(OP_BITWISE_OR, &[a, nb])
            }
            SNandB32 | SNandB64 => {
                let r = self.uop(OP_BITWISE_AND, &[a, b]);
                self.uop(OP_NOT, &[r])
            }
            SNorB32 | SNorB64 => {
                let r = self.uop(OP_BITWISE_OR, &[a, b]);
                self.uop(OP_NOT, &[r])
            }
            _ => {
                let r = self.uop(OP_BITWISE_XOR, &[a, b]);
                self.uop(OP_NOT, &[r])
            }
        }
    }

    /// Signed overflow of `r = a + b`: ((a ^ r) & (b ^ r)) >> 31
    fn add_overflow(&mut self, a: u32, b: u32, r: u32) -> u32 {
        let x = self.uop(OP_BITWISE_XOR, &[a, r]);
        let y = self.uop(OP_BITWISE_XOR, &[b, r]);
        let both = self.uop(OP_BITWISE_AND, &[x, y]);
        let c31 = self.c_uint(31);
        self.uop(OP_SHIFT_RIGHT_LOGICAL, &[both, c31])
    }

    /// Signed overflow of `r = a - b`: ((a ^ b) & (a ^ r)) >> 31
    fn sub_overflow(&mut self, a: u32, b: u32, r: u32) -> u32 {
        let x = self.uop(OP_BITWISE_XOR, &[a, b]);
        let y = self.uop(OP_BITWISE_XOR, &[a, r]);
        let both = self.uop(OP_BITWISE_AND, &[x, y]);
        let c31 = self.c_uint(31);
        self.uop(OP_SHIFT_RIGHT_LOGICAL, &[both, c31])
    }

    fn sopk(&mut self, insn: &Instruction, op: SopkOp) -> Result<()> {
        use SopkOp::*;
        let u = DataType::U32;
        match op {
            SMovkI32 => {
                let k = self.load(insn, &insn.src[0], 0, u)?;
                self.store(insn, &insn.dst, 0, k, u)
            }
            SCmovkI32 => {
                let k = self.load(insn, &insn.src[0], 0, u)?;
                let scc = self.load(insn, &insn.src[1], 0, u)?;
                let old = self.load(insn, &insn.dst, 0, u)?;
                let cond = self.nonzero(scc);
                let r = self.uop(OP_SELECT, &[cond, k, old]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SAddkI32 | SMulkI32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let k = self.load(insn, &insn.src[1], 0, u)?;
                let opcode = if op == SAddkI32 { OP_IADD } else { OP_IMUL };
                let r = self.uop(opcode, &[a, k]);
                self.store(insn, &insn.dst, 0, r, u)?;
                if op == SAddkI32 {
                    let overflow = self.add_overflow(a, k, r);
                    self.write_scc(insn, overflow)?;
                }
                Ok(())
            }
            _ if op.is_compare() => {
                let ty = insn.type_src;
                let a = self.load(insn, &insn.src[0], 0, ty)?;
                let k = self.load(insn, &insn.src[1], 0, ty)?;
                let c = self.compare(ty, insn.cond, a, k).ok_or_else(|| unsupported(insn))?;
                let bit = self.bool_to_uint(c);
                self.store(insn, &insn.dst, 0, bit, u)
            }
            _ => Err(unsupported(insn)),
        }
    }

    fn sop1(&mut self, insn: &Instruction, op: Sop1Op) -> Result<()> {
        use Sop1Op::*;
        let u = DataType::U32;
        match op {
            SMovB32 | SMovB64 | SWqmB32 | SWqmB64 => {
                let tracks_scc = insn.implicit_dst().is_some();
                let mut any = None;
                for lane in 0..insn.dst.count {
                    let v = self.load(insn, &insn.src[0], lane, u)?;
                    self.store(insn, &insn.dst, lane, v, u)?;
                    if !tracks_scc {
                        continue;
                    }
                    any = Some(match any {
                        Some(prev) => self.uop(OP_BITWISE_OR, &[prev, v]),
                        None => v,
                    });
                }
                match any {
                    Some(v) => self.write_scc_nonzero(insn, v),
                    None => Ok(()),
                }
            }
            SCmovB32 | SCmovB64 => {
                let scc = self.load(insn, &insn.src[1], 0, u)?;
                let cond = self.nonzero(scc);
                for lane in 0..insn.dst.count {
                    let v = self.load(insn, &insn.src[0], lane, u)?;
                    let old = self.load(insn, &insn.dst, lane, u)?;
                    let r = self.uop(OP_SELECT, &[cond, v, old]);
                    self.store(insn, &insn.dst, lane, r, u)?;
                }
                Ok(())
            }
            SNotB32 | SNotB64 => {
                let mut any = None;
                for lane in 0..insn.dst.count {
                    let v = self.load(insn, &insn.src[0], lane, u)?;
                    let r = self.uop(OP_NOT, &[v]);
                    self.store(insn, &insn.dst, lane, r, u)?;
                    any = Some(match any {
                        Some(prev) => self.uop(OP_BITWISE_OR, &[prev, r]),
                        None => r,
                    });
                }
                match any {
                    Some(v) => self.write_scc_nonzero(insn, v),
                    None => Ok(()),
                }
            }
            SBrevB32 => {
                let v = self.load(insn, &insn.src[0], 0, u)?;
                let r = self.uop(OP_BIT_REVERSE, &[v]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SBcnt1I32B32 | SBcnt1I32B64 => {
                let mut total = None;
                for lane in 0..insn.src[0].count {
                    let v = self.load(insn, &insn.src[0], lane, u)?;
                    let n = self.uop(OP_BIT_COUNT, &[v]);
                    total = Some(match total {
                        Some(prev) => self.uop(OP_IADD, &[prev, n]),
                        None => n,
                    });
                }
                let r = total.ok_or_else(|| unsupported(insn))?;
                self.store(insn, &insn.dst, 0, r, u)?;
                self.write_scc_nonzero(insn, r)
            }
            SFf1I32B32 => {
                let v = self.load(insn, &insn.src[0], 0, u)?;
                let uint = self.t_uint();
                let r = self.glsl(uint, GLSL_FIND_I_LSB, &[v]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SFlbitI32B32 => {
                let v = self.load(insn, &insn.src[0], 0, u)?;
                let uint = self.t_uint();
                let msb = self.glsl(uint, GLSL_FIND_U_MSB, &[v]);
                let r = self.leading_bit(msb);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SSextI32I8 | SSextI32I16 => {
                let v = self.load(insn, &insn.src[0], 0, u)?;
                let zero = self.c_uint(0);
                let bits = self.c_uint(if op == SSextI32I8 { 8 } else { 16 });
                let r = self.uop(OP_BIT_FIELD_S_EXTRACT, &[v, zero, bits]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            SAbsI32 => {
                let i = DataType::I32;
                let v = self.load(insn, &insn.src[0], 0, i)?;
                let int = self.t_int();
                let r = self.glsl(int, GLSL_SABS, &[v]);
                self.store(insn, &insn.dst, 0, r, i)?;
                let raw = self.to_storage(r, i);
                self.write_scc_nonzero(insn, raw)
            }
            _ => Err(unsupported(insn)),
        }
    }

    fn sopc(&mut self, insn: &Instruction, op: SopcOp) -> Result<()> {
        use SopcOp::*;
        let u = DataType::U32;
        let bit = match op {
            SBitcmp0B32 | SBitcmp1B32 => {
                let a = self.load(insn, &insn.src[0], 0, u)?;
                let b = self.load(insn, &insn.src[1], 0, u)?;
                let index = self.low_bits(b, 5);
                let shifted = self.uop(OP_SHIFT_RIGHT_LOGICAL, &[a, index]);
                let set = self.low_bits(shifted, 1);
                if op == SBitcmp0B32 {
                    let one = self.c_uint(1);
                    self.uop(OP_BITWISE_XOR, &[set, one])
                } else {
                    set
                }
            }
            SBitcmp0B64 | SBitcmp1B64 => return Err(unsupported(insn)),
            _ => {
                let ty = insn.type_src;
                let a = self.load(insn, &insn.src[0], 0, ty)?;
                let b = self.load(insn, &insn.src[1], 0, ty)?;
                let c = self.compare(ty, insn.cond, a, b).ok_or_else(|| unsupported(insn))?;
                self.bool_to_uint(c)
            }
        };
        self.store(insn, &insn.dst, 0, bit, u)
    }

    fn sopp(&mut self, insn: &Instruction, op: SoppOp) -> Result<()> {
        use SoppOp::*;
        match op {
            SNop | SWaitcnt | SSetprio => Ok(()),
            SEndpgm => {
                self.b.emit_void(OP_RETURN, &[]);
                self.ended = true;
                Ok(())
            }
            _ => Err(unsupported(insn)),
        }
    }

    //=========================================================================
    // SCALAR MEMORY
    //=========================================================================

    fn smrd(&mut self, insn: &Instruction, op: SmrdOp) -> Result<()> {
        use SmrdOp::*;
        match op {
            // descriptor fetches only feed provenance
            SLoadDword | SLoadDwordx2 | SLoadDwordx4 | SLoadDwordx8 | SLoadDwordx16 => Ok(()),
            SBufferLoadDword | SBufferLoadDwordx2 | SBufferLoadDwordx4 | SBufferLoadDwordx8
            | SBufferLoadDwordx16 => self.buffer_load(insn),
            SMemtime | SDcacheInv => Err(unsupported(insn)),
        }
    }

    fn buffer_load(&mut self, insn: &Instruction) -> Result<()> {
        let buffer = self.take_resource(insn, ResourceKind::Buffer)?;
        let u = DataType::U32;

        let offset = &insn.src[1];
        let index = if offset.kind == OperandKind::Imm {
            self.c_uint(offset.constant.bits() / 4)
        } else {
            let bytes = self.load(insn, offset, 0, u)?;
            let two = self.c_uint(2);
            self.uop(OP_SHIFT_RIGHT_LOGICAL, &[bytes, two])
        };

        let uint = self.t_uint();
        let ptr = self.b.add_pointer_type(STORAGE_UNIFORM, uint);
        let member = self.c_uint(0);
        for lane in 0..insn.dst.count {
            let element = if lane == 0 {
                index
            } else {
                let step = self.c_uint(lane as u32);
                self.uop(OP_IADD, &[index, step])
            };
            let address = self.b.emit(OP_ACCESS_CHAIN, ptr, &[buffer, member, element]);
            let value = self.b.emit(OP_LOAD, uint, &[address]);
            self.store(insn, &insn.dst, lane, value, u)?;
        }
        Ok(())
    }

    //=========================================================================
    // VECTOR ALU
    //=========================================================================

    fn vop2(&mut self, insn: &Instruction, op: Vop2Op) -> Result<()> {
        use Vop2Op::*;
        let (f, i, u, b) = (DataType::F32, DataType::I32, DataType::U32, DataType::B32);
        match op {
            VCndmaskB32 => {
                let mask = self.load(insn, &insn.src[2], 0, u)?;
                let cond = self.nonzero(mask);
                self.alu(insn, 2, b, b, |t, s| t.uop(OP_SELECT, &[cond, s[1], s[0]]))
            }
            VAddF32 => self.alu(insn, 2, f, f, |t, s| t.fop(OP_FADD, s)),
            VSubF32 => self.alu(insn, 2, f, f, |t, s| t.fop(OP_FSUB, s)),
            VSubrevF32 => self.alu(insn, 2, f, f, |t, s| t.fop(OP_FSUB, &[s[1], s[0]])),
            VMulF32 | VMulLegacyF32 => self.alu(insn, 2, f, f, |t, s| t.fop(OP_FMUL, s)),
            VMinF32 | VMinLegacyF32 | VMaxF32 | VMaxLegacyF32 | VMinI32 | VMaxI32 | VMinU32
            | VMaxU32 => {
                let ty = insn.type_src;
                let max = matches!(op, VMaxF32 | VMaxLegacyF32 | VMaxI32 | VMaxU32);
                self.alu(insn, 2, ty, ty, |t, s| {
                    let result = t.t_value(ty);
                    let inst = t.min_max(ty, max);
                    t.glsl(result, inst, s)
                })
            }
            VLshrB32 | VLshrrevB32 | VAshrI32 | VAshrrevI32 | VLshlB32 | VLshlrevB32 => {
                let opcode = match op {
                    VLshrB32 | VLshrrevB32 => OP_SHIFT_RIGHT_LOGICAL,
                    VAshrI32 | VAshrrevI32 => OP_SHIFT_RIGHT_ARITHMETIC,
                    _ => OP_SHIFT_LEFT_LOGICAL,
                };
                let reversed = matches!(op, VLshrrevB32 | VAshrrevI32 | VLshlrevB32);
                self.alu(insn, 2, u, u, |t, s| {
                    let (value, amount) = if reversed { (s[1], s[0]) } else { (s[0], s[1]) };
                    let amount = t.low_bits(amount, 5);
                    t.uop(opcode, &[value, amount])
                })
            }
            VAndB32 => self.alu(insn, 2, b, b, |t, s| t.uop(OP_BITWISE_AND, s)),
            VOrB32 => self.alu(insn, 2, b, b, |t, s| t.uop(OP_BITWISE_OR, s)),
            VXorB32 => self.alu(insn, 2, b, b, |t, s| t.uop(OP_BITWISE_XOR, s)),
            VBfmB32 => self.alu(insn, 2, b, b, |t, s| t.bit_mask(s[0], s[1])),
            VMacF32 | VMacLegacyF32 | VMadmkF32 | VMadakF32 => self.alu(insn, 3, f, f, |t, s| {
                let product = t.fop(OP_FMUL, &[s[0], s[1]]);
                t.fop(OP_FADD, &[product, s[2]])
            }),
            VBcntU32B32 => self.alu(insn, 2, u, u, |t, s| {
                let n = t.uop(OP_BIT_COUNT, &[s[0]]);
                t.uop(OP_IADD, &[n, s[1]])
            }),
            VAddI32 | VSubI32 | VSubrevI32 => {
                let a = self.src(insn, 0, u)?;
                let c = self.src(insn, 1, u)?;
                let (lhs, rhs) = if op == VSubrevI32 { (c, a) } else { (a, c) };
                let (r, carry) = if op == VAddI32 {
                    let r = self.uop(OP_IADD, &[lhs, rhs]);
                    (r, self.cmp(OP_ULESS_THAN, &[r, lhs]))
                } else {
                    let r = self.uop(OP_ISUB, &[lhs, rhs]);
                    (r, self.cmp(OP_ULESS_THAN, &[lhs, rhs]))
                };
                self.write_dst(insn, r, u)?;
                if let Some(carry_out) = insn.implicit_dst().copied() {
                    let bit = self.bool_to_uint(carry);
                    self.write_mask(insn, &carry_out, bit)?;
                }
                Ok(())
            }
            VMulI32I24 | VMulU32U24 => {
                let signed = op == VMulI32I24;
                self.alu(insn, 2, u, u, |t, s| {
                    let x = t.extend24(signed, s[0]);
                    let y = t.extend24(signed, s[1]);
                    t.uop(OP_IMUL, &[x, y])
                })
            }
            VLdexpF32 => {
                let x = self.src(insn, 0, f)?;
                let exp = self.load(insn, &insn.src[1], 0, i)?;
                let float = self.t_float();
                let r = self.glsl(float, GLSL_LDEXP, &[x, exp]);
                self.write_dst(insn, r, f)
            }
            VCvtPknormI16F32 | VCvtPknormU16F32 | VCvtPkrtzF16F32 => {
                let inst = match op {
                    VCvtPknormI16F32 => GLSL_PACK_SNORM_2X16,
                    VCvtPknormU16F32 => GLSL_PACK_UNORM_2X16,
                    _ => GLSL_PACK_HALF_2X16,
                };
                let mut x = self.src(insn, 0, f)?;
                let mut y = self.src(insn, 1, f)?;
                if op == VCvtPkrtzF16F32 {
                    x = self.half_toward_zero(x);
                    y = self.half_toward_zero(y);
                }
                let vec2 = self.t_vec(2);
                let pair = self.b.emit(OP_COMPOSITE_CONSTRUCT, vec2, &[x, y]);
                let uint = self.t_uint();
                let r = self.glsl(uint, inst, &[pair]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            VCvtPkU16U32 => {
                let x = self.load(insn, &insn.src[0], 0, u)?;
                let y = self.load(insn, &insn.src[1], 0, u)?;
                let x = self.saturate16(false, x);
                let y = self.saturate16(false, y);
                let c16 = self.c_uint(16);
                let r = self.uop(OP_BIT_FIELD_INSERT, &[x, y, c16, c16]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            VCvtPkI16I32 => {
                let x = self.load(insn, &insn.src[0], 0, i)?;
                let y = self.load(insn, &insn.src[1], 0, i)?;
                let x = self.saturate16(true, x);
                let y = self.saturate16(true, y);
                let c16 = self.c_uint(16);
                let r = self.uop(OP_BIT_FIELD_INSERT, &[x, y, c16, c16]);
                self.store(insn, &insn.dst, 0, r, u)
            }
            _ => Err(unsupported(insn)),
        }
    }

    fn vop1(&mut self, insn: &Instruction, op: Vop1Op) -> Result<()> {
        use Vop1Op::*;
        let (f, i, u, b) = (DataType::F32, DataType::I32, DataType::U32, DataType::B32);
        match op {
            VNop => Ok(()),
            VMovB32 | VReadfirstlaneB32 => self.alu(insn, 1, b, b, |_, s| s[0]),
            VCvtF32I32 => self.alu(insn, 1, i, f, |t, s| t.fop(OP_CONVERT_S_TO_F, s)),
            VCvtF32U32 => self.alu(insn, 1, u, f, |t, s| t.fop(OP_CONVERT_U_TO_F, s)),
            VCvtU32F32 => self.alu(insn, 1, f, u, |t, s| t.uop(OP_CONVERT_F_TO_U, s)),
            VCvtI32F32 => self.alu(insn, 1, f, i, |t, s| {
                let int = t.t_int();
                t.b.emit(OP_CONVERT_F_TO_S, int, s)
            }),
            VCvtF16F32 => self.alu(insn, 1, f, u, |t, s| {
                let zero = t.c_float(0.0);
                let vec2 = t.t_vec(2);
                let pair = t.b.emit(OP_COMPOSITE_CONSTRUCT, vec2, &[s[0], zero]);
                let uint = t.t_uint();
                t.glsl(uint, GLSL_PACK_HALF_2X16, &[pair])
            }),
            VCvtF32F16 => self.alu(insn, 1, u, f, |t, s| {
                let vec2 = t.t_vec(2);
                let pair = t.glsl(vec2, GLSL_UNPACK_HALF_2X16, s);
                let float = t.t_float();
                t.b.emit(OP_COMPOSITE_EXTRACT, float, &[pair, 0])
            }),
            VCvtRpiI32F32 | VCvtFlrI32F32 => {
                let round = op == VCvtRpiI32F32;
                self.alu(insn, 1, f, i, |t, s| {
                    let mut x = s[0];
                    if round {
                        let half = t.c_float(0.5);
                        x = t.fop(OP_FADD, &[x, half]);
                    }
                    let float = t.t_float();
                    let floor = t.glsl(float, GLSL_FLOOR, &[x]);
                    let int = t.t_int();
                    t.b.emit(OP_CONVERT_F_TO_S, int, &[floor])
                })
            }
            VCvtF32Ubyte0 | VCvtF32Ubyte1 | VCvtF32Ubyte2 | VCvtF32Ubyte3 => {
                let byte = op.raw() - VCvtF32Ubyte0.raw();
                self.alu(insn, 1, u, f, |t, s| {
                    let (offset, eight) = (t.c_uint(byte * 8), t.c_uint(8));
                    let v = t.uop(OP_BIT_FIELD_U_EXTRACT, &[s[0], offset, eight]);
                    t.fop(OP_CONVERT_U_TO_F, &[v])
                })
            }
            VFractF32 => self.float_unary(insn, GLSL_FRACT),
            VTruncF32 => self.float_unary(insn, GLSL_TRUNC),
            VCeilF32 => self.float_unary(insn, GLSL_CEIL),
            VRndneF32 => self.float_unary(insn, GLSL_ROUND_EVEN),
            VFloorF32 => self.float_unary(insn, GLSL_FLOOR),
            VExpF32 | VExpLegacyF32 => self.float_unary(insn, GLSL_EXP2),
            VLogF32 | VLogClampF32 | VLogLegacyF32 => self.float_unary(insn, GLSL_LOG2),
            VRcpF32 | VRcpClampF32 | VRcpLegacyF32 | VRcpIflagF32 => {
                self.alu(insn, 1, f, f, |t, s| {
                    let one = t.c_float(1.0);
                    t.fop(OP_FDIV, &[one, s[0]])
                })
            }
            VRsqF32 | VRsqClampF32 | VRsqLegacyF32 => {
                self.float_unary(insn, GLSL_INVERSE_SQRT)
            }
            VSqrtF32 => self.float_unary(insn, GLSL_SQRT),
            VSinF32 | VCosF32 => {
                // input is in revolutions
                let inst = if op == VSinF32 { GLSL_SIN } else { GLSL_COS };
                self.alu(insn, 1, f, f, |t, s| {
                    let tau = t.c_float(std::f32::consts::TAU);
                    let radians = t.fop(OP_FMUL, &[s[0], tau]);
                    let float = t.t_float();
                    t.glsl(float, inst, &[radians])
                })
            }
            VNotB32 => self.alu(insn, 1, b, b, |t, s| t.uop(OP_NOT, s)),
            VBfrevB32 => self.alu(insn, 1, b, b, |t, s| t.uop(OP_BIT_REVERSE, s)),
            VFfbhU32 | VFfbhI32 => {
                let inst = if op == VFfbhU32 {
                    GLSL_FIND_U_MSB
                } else {
                    GLSL_FIND_S_MSB
                };
                self.alu(insn, 1, u, u, |t, s| {
                    let uint = t.t_uint();
                    let msb = t.glsl(uint, inst, s);
                    t.leading_bit(msb)
                })
            }
            VFfblB32 => self.alu(insn, 1, b, b, |t, s| {
                let uint = t.t_uint();
                t.glsl(uint, GLSL_FIND_I_LSB, s)
            }),
            _ => Err(unsupported(insn)),
        }
    }

    fn float_unary(&mut self, insn: &Instruction, inst: u32) -> Result<()> {
        self.alu(insn, 1, DataType::F32, DataType::F32, |t, s| {
            let float = t.t_float();
            t.glsl(float, inst, s)
        })
    }

    fn vopc(&mut self, insn: &Instruction, _op: VopcOp) -> Result<()> {
        let ty = insn.type_src;
        if ty.is_64bit() {
            return Err(unsupported(insn));
        }
        let a = self.src(insn, 0, ty)?;
        let b = self.src(insn, 1, ty)?;
        let c = self.compare(ty, insn.cond, a, b).ok_or_else(|| unsupported(insn))?;
        let bit = self.bool_to_uint(c);
        self.write_mask(insn, &insn.dst, bit)?;
        if let Some(exec) = insn.implicit_dst().copied() {
            self.write_mask(insn, &exec, bit)?;
        }
        Ok(())
    }

    fn vop3(&mut self, insn: &Instruction, op: Vop3Op) -> Result<()> {
        use Vop3Op::*;
        let (f, u, b) = (DataType::F32, DataType::U32, DataType::B32);
        match op {
            VMadLegacyF32 | VMadF32 => self.alu(insn, 3, f, f, |t, s| {
                let product = t.fop(OP_FMUL, &[s[0], s[1]]);
                t.fop(OP_FADD, &[product, s[2]])
            }),
            VFmaF32 => self.alu(insn, 3, f, f, |t, s| {
                let float = t.t_float();
                t.glsl(float, GLSL_FMA, s)
            }),
            VMadI32I24 | VMadU32U24 => {
                let signed = op == VMadI32I24;
                self.alu(insn, 3, u, u, |t, s| {
                    let x = t.extend24(signed, s[0]);
                    let y = t.extend24(signed, s[1]);
                    let product = t.uop(OP_IMUL, &[x, y]);
                    t.uop(OP_IADD, &[product, s[2]])
                })
            }
            VBfeU32 | VBfeI32 => {
                let signed = op == VBfeI32;
                self.alu(insn, 3, u, u, |t, s| {
                    let offset = t.low_bits(s[1], 5);
                    let width = t.low_bits(s[2], 5);
                    t.bit_extract(signed, s[0], offset, width)
                })
            }
            VBfiB32 => self.alu(insn, 3, b, b, |t, s| {
                let kept = t.uop(OP_BITWISE_AND, &[s[0], s[1]]);
                let inverse = t.uop(OP_NOT, &[s[0]]);
                let inserted = t.uop(OP_BITWISE_AND, &[inverse, s[2]]);
                t.uop(OP_BITWISE_OR, &[kept, inserted])
            }),
            VAlignbitB32 => self.alu(insn, 3, b, b, |t, s| {
                // ({s0, s1} >> s2[4:0])[31:0]
                let shift = t.low_bits(s[2], 5);
                let low = t.uop(OP_SHIFT_RIGHT_LOGICAL, &[s[1], shift]);
                let c32 = t.c_uint(32);
                let back = t.uop(OP_ISUB, &[c32, shift]);
                let high = t.uop(OP_SHIFT_LEFT_LOGICAL, &[s[0], back]);
                let merged = t.uop(OP_BITWISE_OR, &[low, high]);
                let zero = t.c_uint(0);
                let aligned = t.cmp(OP_IEQUAL, &[shift, zero]);
                t.uop(OP_SELECT, &[aligned, s[1], merged])
            }),
            VMin3F32 | VMin3I32 | VMin3U32 | VMax3F32 | VMax3I32 | VMax3U32 => {
                let ty = insn.type_src;
                let max = matches!(op, VMax3F32 | VMax3I32 | VMax3U32);
                self.alu(insn, 3, ty, ty, |t, s| {
                    let result = t.t_value(ty);
                    let inst = t.min_max(ty, max);
                    let first = t.glsl(result, inst, &[s[0], s[1]]);
                    t.glsl(result, inst, &[first, s[2]])
                })
            }
            VMed3F32 | VMed3I32 | VMed3U32 => {
                let ty = insn.type_src;
                self.alu(insn, 3, ty, ty, |t, s| {
                    let result = t.t_value(ty);
                    let (min, max) = (t.min_max(ty, false), t.min_max(ty, true));
                    let lo = t.glsl(result, min, &[s[0], s[1]]);
                    let hi = t.glsl(result, max, &[s[0], s[1]]);
                    let capped = t.glsl(result, min, &[hi, s[2]]);
                    t.glsl(result, max, &[lo, capped])
                })
            }
            VSadU32 => self.alu(insn, 3, u, u, |t, s| {
                let greater = t.cmp(OP_UGREATER_THAN, &[s[0], s[1]]);
                let forward = t.uop(OP_ISUB, &[s[0], s[1]]);
                let backward = t.uop(OP_ISUB, &[s[1], s[0]]);
                let diff = t.uop(OP_SELECT, &[greater, forward, backward]);
                t.uop(OP_IADD, &[diff, s[2]])
            }),
            VMulLoU32 | VMulLoI32 => self.alu(insn, 2, u, u, |t, s| t.uop(OP_IMUL, s)),
            _ => Err(unsupported(insn)),
        }
    }

    //=========================================================================
    // INTERPOLATION, IMAGES, EXPORTS
    //=========================================================================

    fn vintrp(&mut self, insn: &Instruction, op: VintrpOp) -> Result<()> {
        let Fields::Vintrp(fields) = insn.fields else {
            return Err(unsupported(insn));
        };
        match op {
            // interpolation happens in the fixed-function stage
            VintrpOp::VInterpP1F32 => Ok(()),
            VintrpOp::VInterpP2F32 | VintrpOp::VInterpMovF32 => {
                let var = self.attrs.get(fields.attr as usize).copied().unwrap_or(0);
                if var == 0 {
                    return Err(unsupported(insn));
                }
                let vec4 = self.t_vec(4);
                let value = self.b.emit(OP_LOAD, vec4, &[var]);
                let float = self.t_float();
                let channel =
                    self.b
                        .emit(OP_COMPOSITE_EXTRACT, float, &[value, fields.chan as u32]);
                self.store(insn, &insn.dst, 0, channel, DataType::F32)
            }
        }
    }

    fn mimg(&mut self, insn: &Instruction, op: MimgOp) -> Result<()> {
        use MimgOp::*;
        let Fields::Mimg(fields) = insn.fields else {
            return Err(unsupported(insn));
        };

        // descriptors are consumed even when the op is skipped
        let texture = self.take_resource(insn, ResourceKind::Texture)?;
        let sampler = if op.uses_sampler() {
            Some(self.take_resource(insn, ResourceKind::Sampler)?)
        } else {
            None
        };
        let sampler = match (op, sampler) {
            (ImageSample | ImageSampleL | ImageSampleB | ImageSampleLz, Some(s)) => s,
            _ => return Err(unsupported(insn)),
        };

        let f = DataType::F32;
        let float = self.t_float();
        let image_ty = self.b.type_image_2d(float);
        let sampler_ty = self.b.type_sampler();
        let sampled_ty = self.b.type_sampled_image(image_ty);
        let image = self.b.emit(OP_LOAD, image_ty, &[texture]);
        let state = self.b.emit(OP_LOAD, sampler_ty, &[sampler]);
        let combined = self.b.emit(OP_SAMPLED_IMAGE, sampled_ty, &[image, state]);

        // address order: [bias] x y [slice] [lod]
        let addr = insn.src[0];
        let first = (op == ImageSampleB) as u8;
        let x = self.load(insn, &addr, first, f)?;
        let y = self.load(insn, &addr, first + 1, f)?;
        let vec2 = self.t_vec(2);
        let coord = self.b.emit(OP_COMPOSITE_CONSTRUCT, vec2, &[x, y]);

        let vec4 = self.t_vec(4);
        let implicit = self.stage == ShaderStage::Pixel;
        let texel = match op {
            ImageSample if implicit => {
                self.b
                    .emit(OP_IMAGE_SAMPLE_IMPLICIT_LOD, vec4, &[combined, coord])
            }
            ImageSampleB if implicit => {
                let bias = self.load(insn, &addr, 0, f)?;
                self.b.emit(
                    OP_IMAGE_SAMPLE_IMPLICIT_LOD,
                    vec4,
                    &[combined, coord, IMAGE_OPERANDS_BIAS, bias],
                )
            }
            ImageSampleL => {
                let lod = self.load(insn, &addr, 2 + fields.da as u8, f)?;
                self.b.emit(
                    OP_IMAGE_SAMPLE_EXPLICIT_LOD,
                    vec4,
                    &[combined, coord, IMAGE_OPERANDS_LOD, lod],
                )
            }
            // outside the pixel stage there are no derivatives, use the base level
            _ => {
                let lod = self.c_float(0.0);
                self.b.emit(
                    OP_IMAGE_SAMPLE_EXPLICIT_LOD,
                    vec4,
                    &[combined, coord, IMAGE_OPERANDS_LOD, lod],
                )
            }
        };

        let mut lane = 0;
        for channel in 0..4u32 {
            if fields.dmask & (1 << channel) != 0 {
                let value = self.b.emit(OP_COMPOSITE_EXTRACT, float, &[texel, channel]);
                self.store(insn, &insn.dst, lane, value, f)?;
                lane += 1;
            }
        }
        Ok(())
    }

    fn exp(&mut self, insn: &Instruction) -> Result<()> {
        let Fields::Exp(fields) = insn.fields else {
            return Err(unsupported(insn));
        };
        if !insn.dst.is_used() {
            // null target
            return Ok(());
        }

        let zero = self.c_float(0.0);
        let mut components = [zero; 4];
        if fields.compr {
            let vec2 = self.t_vec(2);
            let float = self.t_float();
            for i in 0..2 {
                if insn.src[i].is_used() {
                    let packed = self.load(insn, &insn.src[i], 0, DataType::U32)?;
                    let pair = self.glsl(vec2, GLSL_UNPACK_HALF_2X16, &[packed]);
                    components[2 * i] = self.b.emit(OP_COMPOSITE_EXTRACT, float, &[pair, 0]);
                    components[2 * i + 1] = self.b.emit(OP_COMPOSITE_EXTRACT, float, &[pair, 1]);
                }
            }
        } else {
            for (i, component) in components.iter_mut().enumerate() {
                if insn.src[i].is_used() {
                    *component = self.load(insn, &insn.src[i], 0, DataType::F32)?;
                }
            }
        }

        let vec4 = self.t_vec(4);
        let value = self.b.emit(OP_COMPOSITE_CONSTRUCT, vec4, &components);
        self.set_interface_value(insn, &insn.dst, value)
    }

    /// Write a vec4 to the output behind an export target
    fn set_interface_value(&mut self, insn: &Instruction, dst: &Operand, value: u32) -> Result<()> {
        let slot = dst.id as usize;
        let var = match dst.kind {
            OperandKind::ExpMrt => self.mrt.get(slot).copied(),
            OperandKind::ExpPos => self.pos.get(slot).copied(),
            OperandKind::ExpParam => self.params.get(slot).copied(),
            OperandKind::ExpMrtz => Some(self.mrtz),
            _ => None,
        }
        .unwrap_or(0);
        if var == 0 {
            return Err(unsupported(insn));
        }

        let value = if dst.kind == OperandKind::ExpMrtz {
            let float = self.t_float();
            self.b.emit(OP_COMPOSITE_EXTRACT, float, &[value, 0])
        } else {
            value
        };
        self.b.emit_void(OP_STORE, &[var, value]);
        Ok(())
    }
}

impl InstructionConsumer for Translator {
    fn consume(&mut self, insn: &Instruction) -> Result<()> {
        // the block is terminated; nothing after a program end is reachable
        if self.ended {
            return Ok(());
        }
        match insn.opcode {
            Opcode::Sop2(op) => self.sop2(insn, op),
            Opcode::Sopk(op) => self.sopk(insn, op),
            Opcode::Sop1(op) => self.sop1(insn, op),
            Opcode::Sopc(op) => self.sopc(insn, op),
            Opcode::Sopp(op) => self.sopp(insn, op),
            Opcode::Smrd(op) => self.smrd(insn, op),
            Opcode::Vop2(op) => self.vop2(insn, op),
            Opcode::Vop1(op) => self.vop1(insn, op),
            Opcode::Vopc(op) => self.vopc(insn, op),
            Opcode::Vop3(op) => self.vop3(insn, op),
            Opcode::Vintrp(op) => self.vintrp(insn, op),
            Opcode::Mimg(op) => self.mimg(insn, op),
            Opcode::Exp => self.exp(insn),
        }
    }
}

/// Translate a program for `stage` using the report of a prior analysis of
/// the same bytes
pub fn translate(
    bytes: &[u8],
    report: &UsageReport,
    stage: ShaderStage,
    config: &ShaderConfig,
) -> Result<TranslationModule> {
    let mut translator = Translator::new(report, stage, config);
    let outcome = decode(bytes, config.max_scan_bytes, &mut translator)?;

    for skip in &outcome.skipped {
        debug!(offset = skip.offset, "translation skipped instruction: {}", skip.error);
    }

    let module = translator.finish(outcome.skipped);
    info!(
        stage = stage.name(),
        words = module.words.len(),
        bindings = module.bindings.len(),
        skipped = module.skipped.len(),
        "translation complete"
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::analyze::analyze;
    use crate::shader::decode::END_MARKER;

    fn program(words: &[u32]) -> Vec<u8> {
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.extend_from_slice(END_MARKER);
        bytes.push(0);
        bytes
    }

    fn compile(words: &[u32], stage: ShaderStage) -> TranslationModule {
        let bytes = program(words);
        let config = ShaderConfig::default();
        let report = analyze(&bytes, &config).unwrap();
        let module = translate(&bytes, &report, stage, &config).unwrap();
        validate_structure(&module.words).unwrap();
        module
    }

    fn count(module: &TranslationModule, opcode: u16) -> usize {
        instructions(&module.words)
            .filter_map(|i| i.ok())
            .filter(|i| i.opcode == opcode)
            .count()
    }

    fn decorations(module: &TranslationModule, decoration: u32) -> Vec<(u32, Vec<u32>)> {
        instructions(&module.words)
            .filter_map(|i| i.ok())
            .filter(|i| i.opcode == OP_DECORATE && i.operands[1] == decoration)
            .map(|i| (i.operands[0], i.operands[2..].to_vec()))
            .collect()
    }

    const S_ENDPGM: u32 = 0xBF81_0000;

    #[test]
    fn test_scalar_add_emits_one_iadd() {
        let module = compile(&[0x8000_1234], ShaderStage::Compute);
        assert_eq!(count(&module, OP_IADD), 1);
        let uint_declared = instructions(&module.words)
            .filter_map(|i| i.ok())
            .any(|i| i.opcode == OP_TYPE_INT && i.operands[1..] == [32, 0]);
        assert!(uint_declared);
        assert!(module.skipped.is_empty());
    }

    #[test]
    fn test_unsupported_only_program_is_valid() {
        // s_branch is decoded but has no translation
        let branch = SoppFields { simm: 0, op: 0x02 }.encode();
        let module = compile(&[branch], ShaderStage::Pixel);
        assert_eq!(module.skipped.len(), 1);
        assert!(matches!(
            module.skipped[0].error,
            GcnError::Unsupported { mnemonic: "s_branch", .. }
        ));
        assert_eq!(count(&module, OP_LABEL), 1);
        assert_eq!(count(&module, OP_RETURN), 1);
    }

    #[test]
    fn test_buffer_load_binds_slot_zero() {
        let load = SmrdFields {
            offset: 2,
            imm: true,
            sbase: 2,
            sdst: 8,
            op: 0x08,
        };
        let module = compile(&[load.encode(), S_ENDPGM], ShaderStage::Pixel);

        assert_eq!(module.bindings.len(), 1);
        let binding = &module.bindings[0];
        assert_eq!(binding.kind, ResourceKind::Buffer);
        assert_eq!((binding.set, binding.binding), (2, 0));
        assert_eq!(decorations(&module, DECORATION_BINDING)[0].1, vec![0]);
        assert_eq!(decorations(&module, DECORATION_DESCRIPTOR_SET)[0].1, vec![2]);
        assert_eq!(count(&module, OP_ACCESS_CHAIN), 1);
    }

    #[test]
    fn test_sample_writes_masked_channels() {
        let sample = MimgFields {
            dmask: 0b0101,
            unrm: false,
            glc: false,
            da: false,
            r128: false,
            tfe: false,
            lwe: false,
            op: 0x20,
            slc: false,
            vaddr: 0,
            vdata: 4,
            srsrc: 2,
            ssamp: 4,
        };
        let [w0, w1] = sample.encode();
        let module = compile(&[w0, w1, S_ENDPGM], ShaderStage::Pixel);

        assert_eq!(count(&module, OP_SAMPLED_IMAGE), 1);
        assert_eq!(count(&module, OP_IMAGE_SAMPLE_IMPLICIT_LOD), 1);
        let kinds: Vec<_> = module.bindings.iter().map(|b| (b.kind, b.binding)).collect();
        assert_eq!(
            kinds,
            vec![(ResourceKind::Texture, 0), (ResourceKind::Sampler, 1)]
        );
        // two channels land in v4 and v5
        let extracts = instructions(&module.words)
            .filter_map(|i| i.ok())
            .filter(|i| i.opcode == OP_COMPOSITE_EXTRACT)
            .map(|i| i.operands[3])
            .collect::<Vec<_>>();
        assert_eq!(extracts, vec![0, 2]);
    }

    #[test]
    fn test_sample_outside_pixel_stage_uses_explicit_lod() {
        let sample = MimgFields {
            dmask: 0xF,
            unrm: false,
            glc: false,
            da: false,
            r128: true,
            tfe: false,
            lwe: false,
            op: 0x20,
            slc: false,
            vaddr: 0,
            vdata: 4,
            srsrc: 2,
            ssamp: 4,
        };
        let [w0, w1] = sample.encode();
        let module = compile(&[w0, w1], ShaderStage::Compute);
        assert_eq!(count(&module, OP_IMAGE_SAMPLE_IMPLICIT_LOD), 0);
        assert_eq!(count(&module, OP_IMAGE_SAMPLE_EXPLICIT_LOD), 1);
    }

    #[test]
    fn test_vop3_modifiers() {
        let add = Vop3Fields {
            vdst: 1,
            abs: 0b001,
            clamp: true,
            sdst: 0,
            op: 0x103,
            src0: 258,
            src1: 259,
            src2: 0,
            omod: 1,
            neg: 0b010,
        };
        let [w0, w1] = add.encode();
        let module = compile(&[w0, w1], ShaderStage::Compute);
        assert_eq!(count(&module, OP_FNEGATE), 1);
        assert_eq!(count(&module, OP_FADD), 1);
        assert_eq!(count(&module, OP_FMUL), 1);
        // FAbs and FClamp
        assert_eq!(count(&module, OP_EXT_INST), 2);
    }

    fn glsl_insts(module: &TranslationModule) -> Vec<u32> {
        instructions(&module.words)
            .filter_map(|i| i.ok())
            .filter(|i| i.opcode == OP_EXT_INST)
            .map(|i| i.operands[3])
            .collect()
    }

    fn has_uint_constant(module: &TranslationModule, value: u32) -> bool {
        instructions(&module.words)
            .filter_map(|i| i.ok())
            .any(|i| i.opcode == OP_CONSTANT && i.operands[2] == value)
    }

    #[test]
    fn test_pack_u16_saturates_each_half() {
        let pack = Vop2Fields {
            src0: 256,
            vsrc1: 1,
            vdst: 2,
            op: Vop2Op::VCvtPkU16U32.raw() as u8,
        };
        let module = compile(&[pack.encode()], ShaderStage::Pixel);
        assert_eq!(glsl_insts(&module), vec![GLSL_UMIN, GLSL_UMIN]);
        assert!(has_uint_constant(&module, 0xFFFF));
        assert_eq!(count(&module, OP_BIT_FIELD_INSERT), 1);
    }

    #[test]
    fn test_pack_i16_saturates_each_half() {
        let pack = Vop2Fields {
            src0: 256,
            vsrc1: 1,
            vdst: 2,
            op: Vop2Op::VCvtPkI16I32.raw() as u8,
        };
        let module = compile(&[pack.encode()], ShaderStage::Pixel);
        assert_eq!(glsl_insts(&module), vec![GLSL_SCLAMP, GLSL_SCLAMP]);
        assert!(has_uint_constant(&module, 0xFFFF_8000));
        assert!(has_uint_constant(&module, 0x7FFF));
        assert_eq!(count(&module, OP_BIT_FIELD_INSERT), 1);
    }

    #[test]
    fn test_pack_half_truncates_toward_zero() {
        let pkrtz = Vop2Fields {
            src0: 256,
            vsrc1: 1,
            vdst: 2,
            op: Vop2Op::VCvtPkrtzF16F32.raw() as u8,
        };
        let module = compile(&[pkrtz.encode()], ShaderStage::Pixel);
        assert_eq!(
            glsl_insts(&module),
            vec![GLSL_FCLAMP, GLSL_FCLAMP, GLSL_PACK_HALF_2X16]
        );
        assert!(has_uint_constant(&module, 0xFFFF_E000));
        assert!(has_uint_constant(&module, 65504.0f32.to_bits()));
        assert_eq!(count(&module, OP_IS_NAN), 2);
        assert_eq!(count(&module, OP_IS_INF), 2);

        // the normalized packs round as the packing rule says
        let norm = Vop2Fields {
            op: Vop2Op::VCvtPknormU16F32.raw() as u8,
            ..pkrtz
        };
        let module = compile(&[norm.encode()], ShaderStage::Pixel);
        assert_eq!(glsl_insts(&module), vec![GLSL_PACK_UNORM_2X16]);
    }

    #[test]
    fn test_float_compare_writes_vcc() {
        let cmp = VopcFields {
            src0: 256,
            vsrc1: 1,
            op: 0x01,
        };
        let module = compile(&[cmp.encode()], ShaderStage::Compute);
        assert_eq!(count(&module, OP_FORD_LESS_THAN), 1);
        assert_eq!(count(&module, OP_BITCAST), 2);
    }

    #[test]
    fn test_export_targets_per_stage() {
        let mrt = ExpFields {
            en: 0xF,
            target: 0,
            compr: false,
            done: true,
            vm: true,
            vsrc: [4, 5, 6, 7],
        };
        let [w0, w1] = mrt.encode();
        let module = compile(&[w0, w1, S_ENDPGM], ShaderStage::Pixel);
        let locations = decorations(&module, DECORATION_LOCATION);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].1, vec![0]);
        assert_eq!(count(&module, OP_COMPOSITE_CONSTRUCT), 1);

        let [w0, w1] = ExpFields { target: 12, ..mrt }.encode();
        let module = compile(&[w0, w1, S_ENDPGM], ShaderStage::Vertex);
        let builtins = decorations(&module, DECORATION_BUILTIN);
        assert_eq!(builtins.len(), 1);
        assert_eq!(builtins[0].1, vec![BUILTIN_POSITION]);
    }

    #[test]
    fn test_program_end_closes_function_body() {
        let mov = Vop1Fields {
            src0: 242,
            op: 0x01,
            vdst: 5,
        };
        let module = compile(&[mov.encode(), S_ENDPGM, mov.encode()], ShaderStage::Compute);
        assert_eq!(count(&module, OP_LABEL), 1);
        assert_eq!(count(&module, OP_RETURN), 1);
        assert!(module.skipped.is_empty());

        // the return is the last instruction of the body
        let body: Vec<u16> = instructions(&module.words)
            .filter_map(|i| i.ok())
            .map(|i| i.opcode)
            .skip_while(|&op| op != OP_LABEL)
            .collect();
        assert_eq!(body[body.len() - 2..], [OP_RETURN, OP_FUNCTION_END]);
        // only the store before the end is emitted
        assert_eq!(count(&module, OP_STORE), 1);
    }

    #[test]
    fn test_program_end_as_last_instruction() {
        let module = compile(&[S_ENDPGM], ShaderStage::Pixel);
        assert_eq!(count(&module, OP_LABEL), 1);
        assert_eq!(count(&module, OP_RETURN), 1);
    }

    #[test]
    fn test_compute_seeds_local_invocation_id() {
        let mov = Vop1Fields {
            src0: 257,
            op: 0x01,
            vdst: 4,
        };
        let module = compile(&[mov.encode()], ShaderStage::Compute);
        let builtins = decorations(&module, DECORATION_BUILTIN);
        assert_eq!(builtins[0].1, vec![BUILTIN_LOCAL_INVOCATION_ID]);
        let local_size = instructions(&module.words)
            .filter_map(|i| i.ok())
            .find(|i| i.opcode == OP_EXECUTION_MODE)
            .map(|i| i.operands.to_vec());
        assert_eq!(
            local_size.map(|o| o[1..].to_vec()),
            Some(vec![EXEC_MODE_LOCAL_SIZE, 64, 1, 1])
        );
    }

    #[test]
    fn test_module_bytes() {
        let module = compile(&[S_ENDPGM], ShaderStage::Vertex);
        assert_eq!(module.len(), module.words.len() * 4);
        assert_eq!(&module.as_bytes()[..4], &SPIRV_MAGIC.to_ne_bytes());
        assert_eq!(module.entry_point, ENTRY_POINT);
        let len = module.len();
        assert_eq!(module.into_bytes().len(), len);
    }
}
