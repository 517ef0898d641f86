//! GCN bytecode decoder
//!
//! Splits a program into 32-bit words, classifies each instruction's
//! encoding family and materializes its operands. The same traversal feeds
//! both the analyzer and the translator through [`InstructionConsumer`].

use super::opcodes::*;
use super::types::*;
use og_core::error::{GcnError, Result};
use tracing::trace;

/// End-of-program marker placed after the last instruction
pub const END_MARKER: &[u8; 7] = b"OrbShdr";

/// Receives every decoded instruction in program order
pub trait InstructionConsumer {
    /// Handle one instruction. Non-fatal errors skip only this instruction.
    fn consume(&mut self, insn: &Instruction) -> Result<()>;
}

/// An instruction dropped by the decoder or by a consumer
#[derive(Debug)]
pub struct SkippedInstruction {
    pub offset: usize,
    pub words: usize,
    pub error: GcnError,
}

// errors compare by message; `io::Error` has no equality
impl PartialEq for SkippedInstruction {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
            && self.words == other.words
            && self.error.to_string() == other.error.to_string()
    }
}

/// Pass-level outcome of one decode traversal
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Program length in bytes (offset of the end marker)
    pub program_length: usize,
    /// Instructions accepted by the consumer
    pub consumed: usize,
    pub skipped: Vec<SkippedInstruction>,
}

/// Locate the end marker and return the program length in bytes.
///
/// Only word-aligned offsets below `max_scan_bytes` are tested, and the
/// search never reads past the end of `bytes`.
pub fn scan(bytes: &[u8], max_scan_bytes: usize) -> Result<usize> {
    let limit = bytes.len().min(max_scan_bytes);
    let mut offset = 0;

    while offset < limit && offset + END_MARKER.len() <= bytes.len() {
        if &bytes[offset..offset + END_MARKER.len()] == END_MARKER {
            return Ok(offset);
        }
        offset += 4;
    }

    Err(GcnError::UnboundedScan { scanned: limit })
}

/// Decode `bytes` and hand every instruction to `consumer`.
///
/// Per-instruction failures are collected in the outcome; only fatal errors
/// end the traversal early.
pub fn decode<C: InstructionConsumer + ?Sized>(
    bytes: &[u8],
    max_scan_bytes: usize,
    consumer: &mut C,
) -> Result<DecodeOutcome> {
    let decoder = Decoder::new(bytes, max_scan_bytes)?;
    let mut outcome = DecodeOutcome {
        program_length: decoder.program_length(),
        ..Default::default()
    };

    for item in decoder {
        match item {
            Ok(insn) => match consumer.consume(&insn) {
                Ok(()) => outcome.consumed += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(error) => outcome.skipped.push(SkippedInstruction {
                    offset: insn.offset,
                    words: insn.length,
                    error,
                }),
            },
            Err(skip) => outcome.skipped.push(skip),
        }
    }

    Ok(outcome)
}

/// Iterator over the instructions of one program
pub struct Decoder {
    words: Vec<u32>,
    pc: usize,
}

impl Decoder {
    pub fn new(bytes: &[u8], max_scan_bytes: usize) -> Result<Self> {
        let length = scan(bytes, max_scan_bytes)?;
        let words = bytes[..length]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { words, pc: 0 })
    }

    pub fn program_length(&self) -> usize {
        self.words.len() * 4
    }

    fn decode_next(&self) -> std::result::Result<Instruction, (GcnError, usize)> {
        let rest = &self.words[self.pc..];
        let offset = self.pc * 4;
        let encoding = classify(rest[0], offset)?;

        let length = instruction_length(encoding, rest);
        if length > rest.len() {
            return Err((
                GcnError::TruncatedInstruction {
                    offset,
                    needed: length - rest.len(),
                },
                rest.len(),
            ));
        }

        let fetch = Fetch {
            words: &rest[..length],
            offset,
            encoding,
        };
        fetch.decode().map_err(|e| (e, length))
    }
}

impl Iterator for Decoder {
    type Item = std::result::Result<Instruction, SkippedInstruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pc >= self.words.len() {
            return None;
        }

        let offset = self.pc * 4;
        match self.decode_next() {
            Ok(insn) => {
                trace!(offset = insn.offset, encoding = insn.encoding.name(), "{}", insn.mnemonic());
                self.pc += insn.length;
                Some(Ok(insn))
            }
            Err((error, words)) => {
                let words = words.max(1);
                self.pc += words;
                Some(Err(SkippedInstruction {
                    offset,
                    words,
                    error,
                }))
            }
        }
    }
}

/// Classify the encoding family from the fixed top-level bits
fn classify(word: u32, offset: usize) -> std::result::Result<Encoding, (GcnError, usize)> {
    if word >> 30 == 0b10 {
        return Ok(match (word >> 23) & 0x7F {
            0x7D => Encoding::Sop1,
            0x7E => Encoding::Sopc,
            0x7F => Encoding::Sopp,
            op if op >> 5 == 0b11 => Encoding::Sopk,
            _ => Encoding::Sop2,
        });
    }

    if word >> 31 == 0 {
        return Ok(match (word >> 25) & 0x7F {
            0x3F => Encoding::Vop1,
            0x3E => Encoding::Vopc,
            _ => Encoding::Vop2,
        });
    }

    if word >> 27 == 0b11000 {
        return Ok(Encoding::Smrd);
    }

    match word >> 26 {
        0x32 => Ok(Encoding::Vintrp),
        0x34 => Ok(Encoding::Vop3),
        0x3C => Ok(Encoding::Mimg),
        0x3E => Ok(Encoding::Exp),
        family => {
            // DS, MUBUF and MTBUF are two words wide
            let words = if matches!(family, 0x36 | 0x38 | 0x3A) { 2 } else { 1 };
            Err((GcnError::UnknownEncoding { offset, word }, words))
        }
    }
}

/// Words occupied by the instruction starting at `words[0]`
fn instruction_length(encoding: Encoding, words: &[u32]) -> usize {
    let w = words[0];
    let literal = match encoding {
        Encoding::Sop2 | Encoding::Sopc => (w & 0xFF) == 255 || ((w >> 8) & 0xFF) == 255,
        Encoding::Sop1 => (w & 0xFF) == 255,
        Encoding::Sopk => SopkFields::decode(w).op as u32 == SopkOp::SSetregImm32B32.raw(),
        Encoding::Smrd => {
            let f = SmrdFields::decode(w);
            !f.imm && f.offset == 255
        }
        Encoding::Vop2 => {
            let f = Vop2Fields::decode(w);
            f.src0 == 255
                || f.op as u32 == Vop2Op::VMadmkF32.raw()
                || f.op as u32 == Vop2Op::VMadakF32.raw()
        }
        Encoding::Vop1 | Encoding::Vopc => (w & 0x1FF) == 255,
        _ => false,
    };
    encoding.base_words() + literal as usize
}

/// Decoding context for one instruction's words
struct Fetch<'a> {
    words: &'a [u32],
    offset: usize,
    encoding: Encoding,
}

impl Fetch<'_> {
    fn decode(&self) -> Result<Instruction> {
        match self.encoding {
            Encoding::Sop2 => self.sop2(),
            Encoding::Sopk => self.sopk(),
            Encoding::Sop1 => self.sop1(),
            Encoding::Sopc => self.sopc(),
            Encoding::Sopp => self.sopp(),
            Encoding::Smrd => self.smrd(),
            Encoding::Vop2 => self.vop2(),
            Encoding::Vop1 => self.vop1(),
            Encoding::Vopc => self.vopc(),
            Encoding::Vop3 => self.vop3(),
            Encoding::Vintrp => self.vintrp(),
            Encoding::Mimg => self.mimg(),
            Encoding::Exp => self.exp(),
        }
    }

    fn literal(&self) -> Option<u32> {
        self.words.get(self.encoding.base_words()).copied()
    }

    fn unknown_opcode(&self, family: &'static str, opcode: u32) -> GcnError {
        GcnError::UnknownOpcode {
            offset: self.offset,
            family,
            opcode,
        }
    }

    fn unknown_operand(&self, code: u32) -> GcnError {
        GcnError::UnknownOperand {
            offset: self.offset,
            code,
        }
    }

    /// Start an instruction with type and encoding fixed by the opcode
    fn instruction(&self, opcode: Opcode, fields: Fields) -> Instruction {
        let (type_src, type_dst) = opcode.types();
        Instruction {
            offset: self.offset,
            length: self.words.len(),
            encoding: self.encoding,
            opcode,
            type_src,
            type_dst,
            cond: opcode.condition(),
            dst: Operand::NONE,
            src: [Operand::NONE; 4],
            fields,
        }
    }

    /// Decode an 8/9-bit source operand code
    fn source(&self, code: u32) -> Result<Operand> {
        Ok(match code {
            0..=103 | 106 | 107 | 124 | 126 | 127 => Operand::sgpr(code, 1),
            128 => Operand::int(0),
            129..=192 => Operand::int((code - 128) as i64),
            193..=208 => Operand::int(-((code - 192) as i64)),
            240 => Operand::float(0.5),
            241 => Operand::float(-0.5),
            242 => Operand::float(1.0),
            243 => Operand::float(-1.0),
            244 => Operand::float(2.0),
            245 => Operand::float(-2.0),
            246 => Operand::float(4.0),
            247 => Operand::float(-4.0),
            251 => Operand::tmp(TMP_VCCZ),
            252 => Operand::tmp(TMP_EXECZ),
            253 => Operand::tmp(TMP_SCC),
            255 => match (self.literal(), self.encoding) {
                (Some(lit), enc) if enc != Encoding::Vop3 => Operand::int(lit as i64),
                _ => return Err(self.unknown_operand(code)),
            },
            256..=511 => Operand::vgpr(code - 256, 1),
            _ => return Err(self.unknown_operand(code)),
        })
    }

    /// Source operand covering enough registers for `ty`
    fn typed_source(&self, code: u32, ty: DataType) -> Result<Operand> {
        Ok(widen(self.source(code)?, ty))
    }

    /// 7-bit scalar destination
    fn scalar_dest(&self, code: u32, count: u8) -> Result<Operand> {
        match code {
            0..=103 | 106 | 107 | 124 | 126 | 127 => {
                Ok(Operand::sgpr(code, 1).with_count(count).into_dest())
            }
            _ => Err(self.unknown_operand(code)),
        }
    }

    fn sop2(&self) -> Result<Instruction> {
        use Sop2Op::*;
        let f = Sop2Fields::decode(self.words[0]);
        let op = Sop2Op::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(Sop2Op::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Sop2(op), Fields::Sop2(f));

        // Shift amounts, field selectors and bit-mask sizes stay 32-bit
        let (ty0, ty1) = match op {
            SLshlB64 | SLshrB64 | SAshrI64 | SBfeU64 | SBfeI64 => (insn.type_src, DataType::B32),
            SBfmB64 => (DataType::B32, DataType::B32),
            _ => (insn.type_src, insn.type_src),
        };
        insn.dst = self.scalar_dest(f.sdst as u32, insn.type_dst.registers())?;
        insn.src[0] = self.typed_source(f.ssrc0 as u32, ty0)?;
        insn.src[1] = self.typed_source(f.ssrc1 as u32, ty1)?;
        if matches!(op, SCselectB32 | SCselectB64 | SAddcU32 | SSubbU32) {
            insn.src[2] = Operand::tmp(TMP_SCC);
        }
        if op.writes_scc() {
            insn.src[3] = Operand::tmp(TMP_SCC).into_dest();
        }
        Ok(insn)
    }

    fn sopk(&self) -> Result<Instruction> {
        use SopkOp::*;
        let f = SopkFields::decode(self.words[0]);
        let op = SopkOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(SopkOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Sopk(op), Fields::Sopk(f));

        let simm = if insn.type_src == DataType::U32 {
            Operand::int(f.simm as i64)
        } else {
            Operand::int(f.simm as i16 as i64)
        };
        let sdst = f.sdst as u32;

        match op {
            SMovkI32 | SGetregB32 => {
                insn.dst = self.scalar_dest(sdst, 1)?;
                insn.src[0] = simm;
            }
            SCmovkI32 => {
                insn.dst = self.scalar_dest(sdst, 1)?;
                insn.src[0] = simm;
                insn.src[1] = Operand::tmp(TMP_SCC);
            }
            SAddkI32 | SMulkI32 => {
                insn.dst = self.scalar_dest(sdst, 1)?;
                insn.src[0] = self.source(sdst)?;
                insn.src[1] = simm;
                if op == SAddkI32 {
                    insn.src[3] = Operand::tmp(TMP_SCC).into_dest();
                }
            }
            SSetregB32 => {
                insn.src[0] = self.source(sdst)?;
                insn.src[1] = Operand::int(f.simm as i64);
            }
            SSetregImm32B32 => {
                let lit = self.literal().ok_or_else(|| self.unknown_operand(255))?;
                insn.src[0] = Operand::int(lit as i64);
                insn.src[1] = Operand::int(f.simm as i64);
            }
            _ => {
                // s_cmpk_*: compare the register against the constant
                insn.dst = Operand::tmp(TMP_SCC).into_dest();
                insn.src[0] = self.source(sdst)?;
                insn.src[1] = simm;
            }
        }
        Ok(insn)
    }

    fn sop1(&self) -> Result<Instruction> {
        use Sop1Op::*;
        let f = Sop1Fields::decode(self.words[0]);
        let op = Sop1Op::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(Sop1Op::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Sop1(op), Fields::Sop1(f));

        if op != SSetpcB64 {
            insn.dst = self.scalar_dest(f.sdst as u32, insn.type_dst.registers())?;
        }
        if op != SGetpcB64 {
            insn.src[0] = self.typed_source(f.ssrc0 as u32, insn.type_src)?;
        }
        match op {
            SCmovB32 | SCmovB64 => insn.src[1] = Operand::tmp(TMP_SCC),
            SAndSaveexecB64 | SOrSaveexecB64 | SXorSaveexecB64 | SAndn2SaveexecB64 => {
                insn.src[1] = Operand::sgpr(SGPR_EXEC_LO, 2);
            }
            _ => {}
        }
        if op.writes_scc() {
            insn.src[3] = Operand::tmp(TMP_SCC).into_dest();
        }
        Ok(insn)
    }

    fn sopc(&self) -> Result<Instruction> {
        let f = SopcFields::decode(self.words[0]);
        let op = SopcOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(SopcOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Sopc(op), Fields::Sopc(f));

        insn.dst = Operand::tmp(TMP_SCC).into_dest();
        insn.src[0] = self.typed_source(f.ssrc0 as u32, insn.type_src)?;
        // bit index operand of the 64-bit bitcmp forms is still 32-bit
        insn.src[1] = self.source(f.ssrc1 as u32)?;
        Ok(insn)
    }

    fn sopp(&self) -> Result<Instruction> {
        use SoppOp::*;
        let f = SoppFields::decode(self.words[0]);
        let op = SoppOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(SoppOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Sopp(op), Fields::Sopp(f));

        insn.src[0] = match op {
            SBranch | SCbranchScc0 | SCbranchScc1 | SCbranchVccz | SCbranchVccnz
            | SCbranchExecz | SCbranchExecnz => Operand::int(f.simm as i16 as i64),
            _ => Operand::int(f.simm as i64),
        };
        insn.src[1] = match op {
            SCbranchScc0 | SCbranchScc1 => Operand::tmp(TMP_SCC),
            SCbranchVccz | SCbranchVccnz => Operand::tmp(TMP_VCCZ),
            SCbranchExecz | SCbranchExecnz => Operand::tmp(TMP_EXECZ),
            _ => Operand::NONE,
        };
        Ok(insn)
    }

    fn smrd(&self) -> Result<Instruction> {
        use SmrdOp::*;
        let f = SmrdFields::decode(self.words[0]);
        let op = SmrdOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(SmrdOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Smrd(op), Fields::Smrd(f));

        let (dwords, base_regs) = match op {
            SLoadDword => (1, 2),
            SLoadDwordx2 => (2, 2),
            SLoadDwordx4 => (4, 2),
            SLoadDwordx8 => (8, 2),
            SLoadDwordx16 => (16, 2),
            SBufferLoadDword => (1, 4),
            SBufferLoadDwordx2 => (2, 4),
            SBufferLoadDwordx4 => (4, 4),
            SBufferLoadDwordx8 => (8, 4),
            SBufferLoadDwordx16 => (16, 4),
            SMemtime => {
                insn.dst = self.scalar_dest(f.sdst as u32, 2)?;
                return Ok(insn);
            }
            SDcacheInv => return Ok(insn),
        };

        insn.dst = self.scalar_dest(f.sdst as u32, dwords)?;
        insn.src[0] = Operand::sgpr(f.sbase as u32 * 2, base_regs);
        // Immediate offsets count dwords; register and literal forms count bytes
        insn.src[1] = if f.imm {
            Operand::int(f.offset as i64 * 4)
        } else if f.offset == 255 {
            let lit = self.literal().ok_or_else(|| self.unknown_operand(255))?;
            Operand::int(lit as i64 * 4)
        } else {
            self.source(f.offset as u32)?
        };
        Ok(insn)
    }

    fn vop2(&self) -> Result<Instruction> {
        let f = Vop2Fields::decode(self.words[0]);
        let op = Vop2Op::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(Vop2Op::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Vop2(op), Fields::Vop2(f));

        let src0 = self.source(f.src0 as u32)?;
        let vsrc1 = Operand::vgpr(f.vsrc1 as u32, 1);
        self.vop2_operands(&mut insn, op, f.vdst as u32, src0, vsrc1, None, None)?;
        Ok(insn)
    }

    /// Operand layout shared by the VOP2 and VOP3 forms of a VOP2 opcode
    #[allow(clippy::too_many_arguments)]
    fn vop2_operands(
        &self,
        insn: &mut Instruction,
        op: Vop2Op,
        vdst: u32,
        src0: Operand,
        src1: Operand,
        src2: Option<Operand>,
        sdst: Option<Operand>,
    ) -> Result<()> {
        use Vop2Op::*;
        let vcc = Operand::sgpr(SGPR_VCC_LO, 2);

        insn.dst = Operand::vgpr(vdst, 1).into_dest();
        insn.src[0] = src0;
        insn.src[1] = src1;

        match op {
            VReadlaneB32 => {
                insn.dst = self.scalar_dest(vdst, 1)?;
                if insn.encoding == Encoding::Vop2 {
                    insn.src[1] = Operand::sgpr(src1.id, 1);
                }
            }
            VWritelaneB32 => {
                if insn.encoding == Encoding::Vop2 {
                    insn.src[1] = Operand::sgpr(src1.id, 1);
                }
            }
            VCndmaskB32 | VAddcU32 | VSubbU32 | VSubbrevU32 => {
                insn.src[2] = src2.map(|s| widen(s, DataType::B64)).unwrap_or(vcc);
            }
            VMacF32 | VMacLegacyF32 => {
                insn.src[2] = Operand::vgpr(vdst, 1);
            }
            VMadmkF32 => {
                // D = S0 * K + S1
                let k = self.literal().ok_or_else(|| self.unknown_operand(255))?;
                insn.src[1] = Operand::int(k as i64);
                insn.src[2] = src1;
            }
            VMadakF32 => {
                // D = S0 * S1 + K
                let k = self.literal().ok_or_else(|| self.unknown_operand(255))?;
                insn.src[2] = Operand::int(k as i64);
            }
            _ => {}
        }

        if op.has_carry_out() {
            insn.src[3] = sdst.unwrap_or(vcc).into_dest();
        }
        Ok(())
    }

    fn vop1(&self) -> Result<Instruction> {
        let f = Vop1Fields::decode(self.words[0]);
        let op = Vop1Op::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(Vop1Op::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Vop1(op), Fields::Vop1(f));

        let src0 = self.source(f.src0 as u32)?;
        self.vop1_operands(&mut insn, op, f.vdst as u32, src0)?;
        Ok(insn)
    }

    fn vop1_operands(
        &self,
        insn: &mut Instruction,
        op: Vop1Op,
        vdst: u32,
        src0: Operand,
    ) -> Result<()> {
        match op {
            Vop1Op::VNop => {}
            Vop1Op::VReadfirstlaneB32 => {
                insn.dst = self.scalar_dest(vdst, 1)?;
                insn.src[0] = src0;
            }
            _ => {
                insn.dst = Operand::vgpr(vdst, insn.type_dst.registers()).into_dest();
                insn.src[0] = widen(src0, insn.type_src);
            }
        }
        Ok(())
    }

    fn vopc(&self) -> Result<Instruction> {
        let f = VopcFields::decode(self.words[0]);
        let op = VopcOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(VopcOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Vopc(op), Fields::Vopc(f));

        let src0 = self.source(f.src0 as u32)?;
        let src1 = Operand::vgpr(f.vsrc1 as u32, 1);
        self.vopc_operands(&mut insn, op, Operand::sgpr(SGPR_VCC_LO, 2), src0, src1);
        Ok(insn)
    }

    fn vopc_operands(
        &self,
        insn: &mut Instruction,
        op: VopcOp,
        sdst: Operand,
        src0: Operand,
        src1: Operand,
    ) {
        insn.dst = sdst.with_count(2).into_dest();
        insn.src[0] = widen(src0, insn.type_src);
        insn.src[1] = widen(src1, insn.type_src);
        if op.writes_exec() {
            insn.src[3] = Operand::sgpr(SGPR_EXEC_LO, 2).into_dest();
        }
    }

    fn vop3(&self) -> Result<Instruction> {
        let f = Vop3Fields::decode(self.words[0], self.words[1]);
        let opcode = vop3_opcode(f.op as u32)
            .ok_or_else(|| self.unknown_opcode("VOP3", f.op as u32))?;
        let mut insn = self.instruction(opcode, Fields::Vop3(f));

        let src0 = self.source(f.src0 as u32)?;
        let src1 = self.source(f.src1 as u32)?;

        match opcode {
            Opcode::Vopc(op) => {
                let sdst = self.scalar_dest(f.vdst as u32, 2)?;
                self.vopc_operands(&mut insn, op, sdst, src0, src1);
            }
            Opcode::Vop2(op) => {
                let src2 = if op.reads_vcc() {
                    Some(self.source(f.src2 as u32)?)
                } else {
                    None
                };
                let sdst = if op.has_carry_out() {
                    Some(self.scalar_dest(f.sdst as u32, 2)?)
                } else {
                    None
                };
                self.vop2_operands(&mut insn, op, f.vdst as u32, src0, src1, src2, sdst)?;
            }
            Opcode::Vop1(op) => self.vop1_operands(&mut insn, op, f.vdst as u32, src0)?,
            Opcode::Vop3(op) => {
                use Vop3Op::*;
                let ty = insn.type_src;
                insn.dst = Operand::vgpr(f.vdst as u32, insn.type_dst.registers()).into_dest();
                insn.src[0] = widen(src0, ty);
                insn.src[1] = match op {
                    VLshlB64 | VLshrB64 | VAshrI64 => src1,
                    _ => widen(src1, ty),
                };
                if op.sources() == 3 {
                    insn.src[2] = widen(self.source(f.src2 as u32)?, ty);
                }
                if op.has_sdst() {
                    insn.src[3] = self.scalar_dest(f.sdst as u32, 2)?;
                }
            }
            _ => return Err(self.unknown_opcode("VOP3", f.op as u32)),
        }
        Ok(insn)
    }

    fn vintrp(&self) -> Result<Instruction> {
        let f = VintrpFields::decode(self.words[0]);
        let op = VintrpOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(VintrpOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Vintrp(op), Fields::Vintrp(f));

        if f.attr as usize >= ATTR_COUNT {
            return Err(self.unknown_operand(f.attr as u32));
        }

        insn.dst = Operand::vgpr(f.vdst as u32, 1).into_dest();
        insn.src[0] = match op {
            // vsrc selects P10/P20/P0 instead of naming a register
            VintrpOp::VInterpMovF32 => Operand::int(f.vsrc as i64),
            _ => Operand::vgpr(f.vsrc as u32, 1),
        };
        insn.src[1] = Operand::attr(f.attr as u32);
        insn.src[2] = Operand::sgpr(SGPR_M0, 1);
        if op == VintrpOp::VInterpP2F32 {
            insn.src[3] = Operand::vgpr(f.vdst as u32, 1);
        }
        Ok(insn)
    }

    fn mimg(&self) -> Result<Instruction> {
        let f = MimgFields::decode(self.words[0], self.words[1]);
        let op = MimgOp::from_raw(f.op as u32)
            .ok_or_else(|| self.unknown_opcode(MimgOp::FAMILY, f.op as u32))?;
        let mut insn = self.instruction(Opcode::Mimg(op), Fields::Mimg(f));

        let channels = match op {
            MimgOp::ImageGather4 | MimgOp::ImageGather4Lz => 4,
            _ => f.dmask.count_ones() as u8,
        };
        let data = Operand::vgpr(f.vdata as u32, 1).with_count(channels);

        if op.is_store() {
            insn.src[3] = data;
        } else {
            insn.dst = data.into_dest();
        }
        insn.src[0] = Operand::vgpr(f.vaddr as u32, 1).with_count(op.address_count(f.da));
        insn.src[1] = Operand::sgpr(f.srsrc as u32 * 4, if f.r128 { 4 } else { 8 });
        if op.uses_sampler() {
            insn.src[2] = Operand::sgpr(f.ssamp as u32 * 4, 4);
        }
        Ok(insn)
    }

    fn exp(&self) -> Result<Instruction> {
        let f = ExpFields::decode(self.words[0], self.words[1]);
        let mut insn = self.instruction(Opcode::Exp, Fields::Exp(f));

        let target = f.target as u32;
        insn.dst = match target {
            0..=7 => Operand::export(OperandKind::ExpMrt, target),
            8 => Operand::export(OperandKind::ExpMrtz, 0),
            9 => return Ok(insn),
            12..=15 => Operand::export(OperandKind::ExpPos, target - 12),
            32..=63 => Operand::export(OperandKind::ExpParam, target - 32),
            _ => return Err(self.unknown_operand(target)),
        };

        for (i, reg) in f.vsrc.iter().enumerate() {
            let enabled = if f.compr {
                // each source packs two half-float channels
                i < 2 && f.en & (0x3 << (i * 2)) != 0
            } else {
                f.en & (1 << i) != 0
            };
            if enabled {
                insn.src[i] = Operand::vgpr(*reg as u32, 1);
            }
        }
        Ok(insn)
    }
}

/// Register operands of 64-bit types cover a register pair
fn widen(op: Operand, ty: DataType) -> Operand {
    match op.kind {
        OperandKind::Sgpr | OperandKind::Vgpr => op.with_count(ty.registers()),
        _ => op,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(words: &[u32]) -> Vec<u8> {
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.extend_from_slice(END_MARKER);
        bytes.push(0);
        bytes
    }

    fn decode_all(words: &[u32]) -> Vec<std::result::Result<Instruction, SkippedInstruction>> {
        Decoder::new(&program(words), 1 << 20).unwrap().collect()
    }

    fn decode_one(words: &[u32]) -> Instruction {
        decode_all(words).remove(0).unwrap()
    }

    #[test]
    fn test_scan_finds_marker() {
        let bytes = program(&[0xBF81_0000, 0xBF81_0000, 0xBF81_0000]);
        assert_eq!(scan(&bytes, 1 << 20).unwrap(), 12);
    }

    #[test]
    fn test_scan_without_marker_is_bounded() {
        let bytes = vec![0u8; 64];
        match scan(&bytes, 1 << 20) {
            Err(GcnError::UnboundedScan { scanned }) => assert_eq!(scanned, 64),
            other => panic!("unexpected: {:?}", other),
        }
        // marker beyond the configured bound
        let bytes = program(&[0; 8]);
        assert!(matches!(
            scan(&bytes, 16),
            Err(GcnError::UnboundedScan { scanned: 16 })
        ));
    }

    #[test]
    fn test_scan_ignores_unaligned_marker() {
        let mut bytes = vec![0u8; 2];
        bytes.extend_from_slice(END_MARKER);
        bytes.extend_from_slice(&[0u8; 3]);
        assert!(scan(&bytes, 1 << 20).is_err());
    }

    #[test]
    fn test_decode_sop2_add() {
        let insn = decode_one(&[0x8000_1234]);
        assert_eq!(insn.encoding, Encoding::Sop2);
        assert_eq!(insn.opcode, Opcode::Sop2(Sop2Op::SAddU32));
        assert_eq!(insn.type_src, DataType::U32);
        assert_eq!(insn.dst, Operand::sgpr(0, 1).into_dest());
        assert_eq!(insn.src[0], Operand::sgpr(52, 1));
        assert_eq!(insn.src[1], Operand::sgpr(18, 1));
        assert_eq!(insn.implicit_dst().map(|o| o.kind), Some(OperandKind::Tmp));
    }

    #[test]
    fn test_decode_literal_and_inline_constants() {
        // s_mov_b32 s4, 0x12345678
        let insn = decode_one(&[
            Sop1Fields { ssrc0: 255, op: 0x03, sdst: 4 }.encode(),
            0x1234_5678,
        ]);
        assert_eq!(insn.length, 2);
        assert_eq!(insn.src[0].constant, Constant::Int(0x1234_5678));

        // s_mov_b32 s4, -16 / 4.0
        let insn = decode_one(&[Sop1Fields { ssrc0: 208, op: 0x03, sdst: 4 }.encode()]);
        assert_eq!(insn.src[0].constant, Constant::Int(-16));
        let insn = decode_one(&[Sop1Fields { ssrc0: 246, op: 0x03, sdst: 4 }.encode()]);
        assert_eq!(insn.src[0].constant, Constant::Float(4.0));
    }

    #[test]
    fn test_decode_classifies_sopk_and_sopp() {
        let insn = decode_one(&[SopkFields { simm: 0xFFFF, sdst: 3, op: 0 }.encode()]);
        assert_eq!(insn.encoding, Encoding::Sopk);
        assert_eq!(insn.src[0].constant, Constant::Int(-1));

        let insn = decode_one(&[SoppFields { simm: 0, op: 1 }.encode()]);
        assert!(insn.opcode.is_program_end());
    }

    #[test]
    fn test_decode_vop3_reencoding() {
        // v_add_f32 v1, v2, v3 via VOP3 with neg on src1
        let f = Vop3Fields {
            vdst: 1,
            abs: 0,
            clamp: false,
            sdst: 0,
            op: 0x103,
            src0: 258,
            src1: 259,
            src2: 0,
            omod: 0,
            neg: 0b010,
        };
        let [w0, w1] = f.encode();
        let insn = decode_one(&[w0, w1]);
        assert_eq!(insn.encoding, Encoding::Vop3);
        assert_eq!(insn.opcode, Opcode::Vop2(Vop2Op::VAddF32));
        assert_eq!(insn.length, 2);
        assert_eq!(insn.src[1], Operand::vgpr(3, 1));
        assert_eq!(insn.vop3().map(|v| v.neg), Some(0b010));
    }

    #[test]
    fn test_decode_madak_literal() {
        let insn = decode_one(&[
            Vop2Fields { src0: 257, vsrc1: 2, vdst: 3, op: 0x21 }.encode(),
            0x3F80_0000,
        ]);
        assert_eq!(insn.length, 2);
        assert_eq!(insn.src[2].constant, Constant::Int(0x3F80_0000));
    }

    #[test]
    fn test_decode_mimg_operands() {
        let f = MimgFields {
            dmask: 0xF,
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
        let [w0, w1] = f.encode();
        let insn = decode_one(&[w0, w1]);
        assert_eq!(insn.dst, Operand::vgpr(4, 4).into_dest());
        assert_eq!(insn.src[0], Operand::vgpr(0, 2));
        assert_eq!(insn.src[1], Operand::sgpr(8, 8));
        assert_eq!(insn.src[2], Operand::sgpr(16, 4));
    }

    #[test]
    fn test_decode_exp_targets() {
        let f = ExpFields {
            en: 0xF,
            target: 0,
            compr: false,
            done: true,
            vm: true,
            vsrc: [0, 1, 2, 3],
        };
        let [w0, w1] = f.encode();
        let insn = decode_one(&[w0, w1]);
        assert_eq!(insn.dst.kind, OperandKind::ExpMrt);
        assert!(insn.src.iter().all(|s| s.is_used()));

        let [w0, w1] = ExpFields { target: 33, compr: true, en: 0x3, ..f }.encode();
        let insn = decode_one(&[w0, w1]);
        assert_eq!(insn.dst.kind, OperandKind::ExpParam);
        assert_eq!(insn.dst.id, 1);
        assert!(insn.src[0].is_used());
        assert!(!insn.src[1].is_used());
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        // SOP2 op 0x0C is unassigned, followed by s_endpgm
        let items = decode_all(&[
            Sop2Fields { ssrc0: 0, ssrc1: 0, sdst: 0, op: 0x0C }.encode(),
            0xBF81_0000,
        ]);
        assert_eq!(items.len(), 2);
        match &items[0] {
            Err(skip) => {
                assert_eq!(skip.words, 1);
                assert!(matches!(skip.error, GcnError::UnknownOpcode { family: "SOP2", .. }));
            }
            Ok(_) => panic!("expected skip"),
        }
        assert!(items[1].is_ok());
    }

    #[test]
    fn test_truncated_instruction() {
        // VOP3 first word with nothing after it
        let items = decode_all(&[0xD282_0003]);
        assert!(matches!(
            items[0],
            Err(SkippedInstruction {
                error: GcnError::TruncatedInstruction { needed: 1, .. },
                ..
            })
        ));
    }

    struct Counter(usize);

    impl InstructionConsumer for Counter {
        fn consume(&mut self, insn: &Instruction) -> Result<()> {
            if insn.opcode.is_program_end() {
                return Err(GcnError::Unsupported {
                    offset: insn.offset,
                    mnemonic: insn.mnemonic(),
                });
            }
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_decode_drives_consumer() {
        let bytes = program(&[0x8000_1234, 0x8000_1234, 0xBF81_0000]);
        let mut counter = Counter(0);
        let outcome = decode(&bytes, 1 << 20, &mut counter).unwrap();
        assert_eq!(counter.0, 2);
        assert_eq!(outcome.consumed, 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].offset, 8);
        assert_eq!(outcome.program_length, 12);
    }
}
