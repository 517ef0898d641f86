//! GCN shader type definitions
//!
//! Defines the encoding field views, operands and the decoded instruction
//! shared by the analyzer and the translator.

use super::opcodes::Opcode;
use bitflags::bitflags;

/// Scalar register file size (s0-s103 plus VCC, M0 and EXEC aliases)
pub const SGPR_COUNT: usize = 128;
/// Vector register file size
pub const VGPR_COUNT: usize = 256;
/// Status bits kept as temporaries (SCC, VCCZ, EXECZ)
pub const TMP_COUNT: usize = 3;

pub const SGPR_VCC_LO: u32 = 106;
pub const SGPR_VCC_HI: u32 = 107;
pub const SGPR_M0: u32 = 124;
pub const SGPR_EXEC_LO: u32 = 126;
pub const SGPR_EXEC_HI: u32 = 127;

pub const TMP_SCC: u32 = 0;
pub const TMP_VCCZ: u32 = 1;
pub const TMP_EXECZ: u32 = 2;

/// Export slots per target class
pub const MRT_COUNT: usize = 8;
pub const POS_COUNT: usize = 4;
pub const PARAM_COUNT: usize = 32;
/// Interpolated pixel-stage attributes
pub const ATTR_COUNT: usize = 32;

/// Descriptor set reserved for host-side bindings
pub const HOST_DESCRIPTOR_SET: u32 = 0;

/// Pipeline stage a program is translated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// Descriptor set owned by this stage
    pub fn descriptor_set(self) -> u32 {
        match self {
            Self::Vertex => 1,
            Self::Pixel => 2,
            Self::Compute => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
        }
    }
}

impl std::str::FromStr for ShaderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vs" | "vertex" => Ok(Self::Vertex),
            "ps" | "pixel" | "fragment" => Ok(Self::Pixel),
            "cs" | "compute" => Ok(Self::Compute),
            _ => Err(format!("unknown shader stage '{}'", s)),
        }
    }
}

/// Instruction encoding family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Sop2,
    Sopk,
    Sop1,
    Sopc,
    Sopp,
    Smrd,
    Vop2,
    Vop1,
    Vopc,
    Vop3,
    Vintrp,
    Mimg,
    Exp,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sop2 => "SOP2",
            Self::Sopk => "SOPK",
            Self::Sop1 => "SOP1",
            Self::Sopc => "SOPC",
            Self::Sopp => "SOPP",
            Self::Smrd => "SMRD",
            Self::Vop2 => "VOP2",
            Self::Vop1 => "VOP1",
            Self::Vopc => "VOPC",
            Self::Vop3 => "VOP3",
            Self::Vintrp => "VINTRP",
            Self::Mimg => "MIMG",
            Self::Exp => "EXP",
        }
    }

    /// Encoding words, not counting a trailing literal
    pub fn base_words(self) -> usize {
        match self {
            Self::Vop3 | Self::Mimg | Self::Exp => 2,
            _ => 1,
        }
    }
}

/// Semantic type of an instruction's sources or destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Any,
    B32,
    B64,
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

bitflags! {
    /// Set of data types used by a program
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeMask: u16 {
        const B32 = 1 << 0;
        const B64 = 1 << 1;
        const F32 = 1 << 2;
        const F64 = 1 << 3;
        const I32 = 1 << 4;
        const I64 = 1 << 5;
        const U32 = 1 << 6;
        const U64 = 1 << 7;
    }
}

impl DataType {
    pub fn mask(self) -> TypeMask {
        match self {
            Self::Any => TypeMask::empty(),
            Self::B32 => TypeMask::B32,
            Self::B64 => TypeMask::B64,
            Self::F32 => TypeMask::F32,
            Self::F64 => TypeMask::F64,
            Self::I32 => TypeMask::I32,
            Self::I64 => TypeMask::I64,
            Self::U32 => TypeMask::U32,
            Self::U64 => TypeMask::U64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, Self::B64 | Self::F64 | Self::I64 | Self::U64)
    }

    /// 32-bit registers occupied by one value of this type
    pub fn registers(self) -> u8 {
        if self.is_64bit() {
            2
        } else {
            1
        }
    }
}

/// Comparison condition carried by compare instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Condition {
    #[default]
    None,
    False,
    Lt,
    Eq,
    Le,
    Gt,
    Lg,
    Ge,
    /// Ordered (neither operand NaN)
    O,
    /// Unordered (either operand NaN)
    U,
    Nge,
    Nlg,
    Ngt,
    Nle,
    Neq,
    Nlt,
    True,
}

impl Condition {
    /// Map the 4-bit float compare selector used by VOPC
    pub fn from_float_index(index: u32) -> Self {
        const TABLE: [Condition; 16] = [
            Condition::False,
            Condition::Lt,
            Condition::Eq,
            Condition::Le,
            Condition::Gt,
            Condition::Lg,
            Condition::Ge,
            Condition::O,
            Condition::U,
            Condition::Nge,
            Condition::Nlg,
            Condition::Ngt,
            Condition::Nle,
            Condition::Neq,
            Condition::Nlt,
            Condition::True,
        ];
        TABLE[(index & 0xF) as usize]
    }

    /// Map the 3-bit integer compare selector used by VOPC
    pub fn from_int_index(index: u32) -> Self {
        const TABLE: [Condition; 8] = [
            Condition::False,
            Condition::Lt,
            Condition::Eq,
            Condition::Le,
            Condition::Gt,
            Condition::Lg,
            Condition::Ge,
            Condition::True,
        ];
        TABLE[(index & 0x7) as usize]
    }
}

//=============================================================================
// OPERANDS
//=============================================================================

/// Operand kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandKind {
    #[default]
    None,
    Sgpr,
    Vgpr,
    /// Status bit (SCC, VCCZ, EXECZ)
    Tmp,
    /// Inline constant or literal
    Imm,
    /// Interpolated pixel-stage attribute
    Attr,
    ExpMrt,
    ExpMrtz,
    ExpPos,
    ExpParam,
}

impl OperandKind {
    pub fn is_export(self) -> bool {
        matches!(
            self,
            Self::ExpMrt | Self::ExpMrtz | Self::ExpPos | Self::ExpParam
        )
    }
}

bitflags! {
    /// Operand capability flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OperandFlags: u8 {
        const USED = 0x01;
        const CONST = 0x02;
        const DEST = 0x04;
        const MULTI = 0x08;
    }
}

/// Inline constant payload
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Constant {
    #[default]
    None,
    Int(i64),
    Float(f64),
}

impl Constant {
    /// Bit pattern seen by a 32-bit consumer. Float constants keep their
    /// f32 encoding even for integer ops.
    pub fn bits(self) -> u32 {
        match self {
            Constant::None => 0,
            Constant::Int(v) => v as u32,
            Constant::Float(f) => (f as f32).to_bits(),
        }
    }

    /// Register `lane` of the constant when consumed as a value of type `ty`
    pub fn lane_bits(self, lane: u8, ty: DataType) -> u32 {
        match (self, lane) {
            (Constant::Float(f), 0) if ty == DataType::F64 => f.to_bits() as u32,
            (Constant::Float(f), 1) if ty == DataType::F64 => (f.to_bits() >> 32) as u32,
            (Constant::Float(_), 1) | (Constant::None, _) => 0,
            (Constant::Int(v), 1) => (v >> 32) as u32,
            (c, _) => c.bits(),
        }
    }
}

/// Decoded operand
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Operand {
    pub kind: OperandKind,
    pub flags: OperandFlags,
    /// Register index or export slot
    pub id: u32,
    /// Consecutive registers covered (1 unless MULTI)
    pub count: u8,
    pub constant: Constant,
}

impl Operand {
    pub const NONE: Operand = Operand {
        kind: OperandKind::None,
        flags: OperandFlags::empty(),
        id: 0,
        count: 0,
        constant: Constant::None,
    };

    fn register(kind: OperandKind, id: u32, count: u8) -> Self {
        let mut flags = OperandFlags::USED;
        if count > 1 {
            flags |= OperandFlags::MULTI;
        }
        Self {
            kind,
            flags,
            id,
            count,
            constant: Constant::None,
        }
    }

    pub fn sgpr(id: u32, count: u8) -> Self {
        Self::register(OperandKind::Sgpr, id, count)
    }

    pub fn vgpr(id: u32, count: u8) -> Self {
        Self::register(OperandKind::Vgpr, id, count)
    }

    pub fn tmp(id: u32) -> Self {
        Self::register(OperandKind::Tmp, id, 1)
    }

    pub fn attr(id: u32) -> Self {
        Self::register(OperandKind::Attr, id, 1)
    }

    pub fn export(kind: OperandKind, slot: u32) -> Self {
        Self::register(kind, slot, 1).into_dest()
    }

    pub fn int(value: i64) -> Self {
        Self {
            kind: OperandKind::Imm,
            flags: OperandFlags::USED | OperandFlags::CONST,
            id: 0,
            count: 1,
            constant: Constant::Int(value),
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            kind: OperandKind::Imm,
            flags: OperandFlags::USED | OperandFlags::CONST,
            id: 0,
            count: 1,
            constant: Constant::Float(value),
        }
    }

    /// Mark as written by the instruction
    pub fn into_dest(mut self) -> Self {
        self.flags |= OperandFlags::DEST;
        self
    }

    /// Widen a register operand to cover `count` consecutive registers
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self.flags.set(OperandFlags::MULTI, count > 1);
        if count == 0 {
            self.flags.remove(OperandFlags::USED);
        }
        self
    }

    pub fn is_used(&self) -> bool {
        self.flags.contains(OperandFlags::USED)
    }

    pub fn is_dest(&self) -> bool {
        self.flags.contains(OperandFlags::DEST)
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(OperandFlags::CONST)
    }

    /// Register `lane` of a multi-register operand
    pub fn lane(&self, lane: u8) -> Self {
        let mut op = *self;
        op.id += lane as u32;
        op.count = 1;
        op.flags.remove(OperandFlags::MULTI);
        op
    }
}

//=============================================================================
// ENCODING FIELD VIEWS
//=============================================================================

/// Scalar binary (SOP2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sop2Fields {
    pub ssrc0: u8, // bits 0-7
    pub ssrc1: u8, // bits 8-15
    pub sdst: u8,  // bits 16-22
    pub op: u8,    // bits 23-29
}

impl Sop2Fields {
    pub fn decode(val: u32) -> Self {
        Self {
            ssrc0: (val & 0xFF) as u8,
            ssrc1: ((val >> 8) & 0xFF) as u8,
            sdst: ((val >> 16) & 0x7F) as u8,
            op: ((val >> 23) & 0x7F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        0x8000_0000
            | (self.ssrc0 as u32)
            | ((self.ssrc1 as u32) << 8)
            | (((self.sdst & 0x7F) as u32) << 16)
            | (((self.op & 0x7F) as u32) << 23)
    }
}

/// Scalar immediate (SOPK)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SopkFields {
    pub simm: u16, // bits 0-15
    pub sdst: u8,  // bits 16-22
    pub op: u8,    // bits 23-27
}

impl SopkFields {
    pub fn decode(val: u32) -> Self {
        Self {
            simm: (val & 0xFFFF) as u16,
            sdst: ((val >> 16) & 0x7F) as u8,
            op: ((val >> 23) & 0x1F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        0xB000_0000
            | (self.simm as u32)
            | (((self.sdst & 0x7F) as u32) << 16)
            | (((self.op & 0x1F) as u32) << 23)
    }
}

/// Scalar unary (SOP1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sop1Fields {
    pub ssrc0: u8, // bits 0-7
    pub op: u8,    // bits 8-15
    pub sdst: u8,  // bits 16-22
}

impl Sop1Fields {
    pub fn decode(val: u32) -> Self {
        Self {
            ssrc0: (val & 0xFF) as u8,
            op: ((val >> 8) & 0xFF) as u8,
            sdst: ((val >> 16) & 0x7F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x17D << 23)
            | (self.ssrc0 as u32)
            | ((self.op as u32) << 8)
            | (((self.sdst & 0x7F) as u32) << 16)
    }
}

/// Scalar compare (SOPC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SopcFields {
    pub ssrc0: u8, // bits 0-7
    pub ssrc1: u8, // bits 8-15
    pub op: u8,    // bits 16-22
}

impl SopcFields {
    pub fn decode(val: u32) -> Self {
        Self {
            ssrc0: (val & 0xFF) as u8,
            ssrc1: ((val >> 8) & 0xFF) as u8,
            op: ((val >> 16) & 0x7F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x17E << 23)
            | (self.ssrc0 as u32)
            | ((self.ssrc1 as u32) << 8)
            | (((self.op & 0x7F) as u32) << 16)
    }
}

/// Scalar program control (SOPP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoppFields {
    pub simm: u16, // bits 0-15
    pub op: u8,    // bits 16-22
}

impl SoppFields {
    pub fn decode(val: u32) -> Self {
        Self {
            simm: (val & 0xFFFF) as u16,
            op: ((val >> 16) & 0x7F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x17F << 23) | (self.simm as u32) | (((self.op & 0x7F) as u32) << 16)
    }
}

/// Scalar memory read (SMRD)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmrdFields {
    pub offset: u8, // bits 0-7
    pub imm: bool,  // bit 8
    pub sbase: u8,  // bits 9-14, in units of two registers
    pub sdst: u8,   // bits 15-21
    pub op: u8,     // bits 22-26
}

impl SmrdFields {
    pub fn decode(val: u32) -> Self {
        Self {
            offset: (val & 0xFF) as u8,
            imm: (val >> 8) & 1 != 0,
            sbase: ((val >> 9) & 0x3F) as u8,
            sdst: ((val >> 15) & 0x7F) as u8,
            op: ((val >> 22) & 0x1F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x18 << 27)
            | (self.offset as u32)
            | ((self.imm as u32) << 8)
            | (((self.sbase & 0x3F) as u32) << 9)
            | (((self.sdst & 0x7F) as u32) << 15)
            | (((self.op & 0x1F) as u32) << 22)
    }
}

/// Vector binary (VOP2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vop2Fields {
    pub src0: u16, // bits 0-8
    pub vsrc1: u8, // bits 9-16
    pub vdst: u8,  // bits 17-24
    pub op: u8,    // bits 25-30
}

impl Vop2Fields {
    pub fn decode(val: u32) -> Self {
        Self {
            src0: (val & 0x1FF) as u16,
            vsrc1: ((val >> 9) & 0xFF) as u8,
            vdst: ((val >> 17) & 0xFF) as u8,
            op: ((val >> 25) & 0x3F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        ((self.src0 & 0x1FF) as u32)
            | ((self.vsrc1 as u32) << 9)
            | ((self.vdst as u32) << 17)
            | (((self.op & 0x3F) as u32) << 25)
    }
}

/// Vector unary (VOP1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vop1Fields {
    pub src0: u16, // bits 0-8
    pub op: u8,    // bits 9-16
    pub vdst: u8,  // bits 17-24
}

impl Vop1Fields {
    pub fn decode(val: u32) -> Self {
        Self {
            src0: (val & 0x1FF) as u16,
            op: ((val >> 9) & 0xFF) as u8,
            vdst: ((val >> 17) & 0xFF) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x3F << 25)
            | ((self.src0 & 0x1FF) as u32)
            | ((self.op as u32) << 9)
            | ((self.vdst as u32) << 17)
    }
}

/// Vector compare (VOPC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VopcFields {
    pub src0: u16, // bits 0-8
    pub vsrc1: u8, // bits 9-16
    pub op: u8,    // bits 17-24
}

impl VopcFields {
    pub fn decode(val: u32) -> Self {
        Self {
            src0: (val & 0x1FF) as u16,
            vsrc1: ((val >> 9) & 0xFF) as u8,
            op: ((val >> 17) & 0xFF) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x3E << 25)
            | ((self.src0 & 0x1FF) as u32)
            | ((self.vsrc1 as u32) << 9)
            | ((self.op as u32) << 17)
    }
}

/// Vector extended (VOP3a/VOP3b), two words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vop3Fields {
    pub vdst: u8,   // word0 bits 0-7
    pub abs: u8,    // word0 bits 8-10 (VOP3a)
    pub clamp: bool, // word0 bit 11 (VOP3a)
    pub sdst: u8,   // word0 bits 8-14 (VOP3b, overlaps abs/clamp)
    pub op: u16,    // word0 bits 17-25
    pub src0: u16,  // word1 bits 0-8
    pub src1: u16,  // word1 bits 9-17
    pub src2: u16,  // word1 bits 18-26
    pub omod: u8,   // word1 bits 27-28
    pub neg: u8,    // word1 bits 29-31
}

impl Vop3Fields {
    pub fn decode(word0: u32, word1: u32) -> Self {
        Self {
            vdst: (word0 & 0xFF) as u8,
            abs: ((word0 >> 8) & 0x7) as u8,
            clamp: (word0 >> 11) & 1 != 0,
            sdst: ((word0 >> 8) & 0x7F) as u8,
            op: ((word0 >> 17) & 0x1FF) as u16,
            src0: (word1 & 0x1FF) as u16,
            src1: ((word1 >> 9) & 0x1FF) as u16,
            src2: ((word1 >> 18) & 0x1FF) as u16,
            omod: ((word1 >> 27) & 0x3) as u8,
            neg: ((word1 >> 29) & 0x7) as u8,
        }
    }

    /// Encode as VOP3a (abs/clamp form)
    pub fn encode(&self) -> [u32; 2] {
        let word0 = (0x34 << 26)
            | (self.vdst as u32)
            | (((self.abs & 0x7) as u32) << 8)
            | ((self.clamp as u32) << 11)
            | (((self.op & 0x1FF) as u32) << 17);
        [word0, self.encode_word1()]
    }

    /// Encode as VOP3b (scalar destination form)
    pub fn encode_b(&self) -> [u32; 2] {
        let word0 = (0x34 << 26)
            | (self.vdst as u32)
            | (((self.sdst & 0x7F) as u32) << 8)
            | (((self.op & 0x1FF) as u32) << 17);
        [word0, self.encode_word1()]
    }

    fn encode_word1(&self) -> u32 {
        ((self.src0 & 0x1FF) as u32)
            | (((self.src1 & 0x1FF) as u32) << 9)
            | (((self.src2 & 0x1FF) as u32) << 18)
            | (((self.omod & 0x3) as u32) << 27)
            | (((self.neg & 0x7) as u32) << 29)
    }
}

/// Interpolation (VINTRP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VintrpFields {
    pub vsrc: u8, // bits 0-7
    pub chan: u8, // bits 8-9
    pub attr: u8, // bits 10-15
    pub op: u8,   // bits 16-17
    pub vdst: u8, // bits 18-25
}

impl VintrpFields {
    pub fn decode(val: u32) -> Self {
        Self {
            vsrc: (val & 0xFF) as u8,
            chan: ((val >> 8) & 0x3) as u8,
            attr: ((val >> 10) & 0x3F) as u8,
            op: ((val >> 16) & 0x3) as u8,
            vdst: ((val >> 18) & 0xFF) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        (0x32 << 26)
            | (self.vsrc as u32)
            | (((self.chan & 0x3) as u32) << 8)
            | (((self.attr & 0x3F) as u32) << 10)
            | (((self.op & 0x3) as u32) << 16)
            | ((self.vdst as u32) << 18)
    }
}

/// Image memory (MIMG), two words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimgFields {
    pub dmask: u8,  // word0 bits 8-11
    pub unrm: bool, // word0 bit 12
    pub glc: bool,  // word0 bit 13
    pub da: bool,   // word0 bit 14
    pub r128: bool, // word0 bit 15
    pub tfe: bool,  // word0 bit 16
    pub lwe: bool,  // word0 bit 17
    pub op: u8,     // word0 bits 18-24
    pub slc: bool,  // word0 bit 25
    pub vaddr: u8,  // word1 bits 0-7
    pub vdata: u8,  // word1 bits 8-15
    pub srsrc: u8,  // word1 bits 16-20, in units of four registers
    pub ssamp: u8,  // word1 bits 21-25, in units of four registers
}

impl MimgFields {
    pub fn decode(word0: u32, word1: u32) -> Self {
        Self {
            dmask: ((word0 >> 8) & 0xF) as u8,
            unrm: (word0 >> 12) & 1 != 0,
            glc: (word0 >> 13) & 1 != 0,
            da: (word0 >> 14) & 1 != 0,
            r128: (word0 >> 15) & 1 != 0,
            tfe: (word0 >> 16) & 1 != 0,
            lwe: (word0 >> 17) & 1 != 0,
            op: ((word0 >> 18) & 0x7F) as u8,
            slc: (word0 >> 25) & 1 != 0,
            vaddr: (word1 & 0xFF) as u8,
            vdata: ((word1 >> 8) & 0xFF) as u8,
            srsrc: ((word1 >> 16) & 0x1F) as u8,
            ssamp: ((word1 >> 21) & 0x1F) as u8,
        }
    }

    pub fn encode(&self) -> [u32; 2] {
        let word0 = (0x3C << 26)
            | (((self.dmask & 0xF) as u32) << 8)
            | ((self.unrm as u32) << 12)
            | ((self.glc as u32) << 13)
            | ((self.da as u32) << 14)
            | ((self.r128 as u32) << 15)
            | ((self.tfe as u32) << 16)
            | ((self.lwe as u32) << 17)
            | (((self.op & 0x7F) as u32) << 18)
            | ((self.slc as u32) << 25);
        let word1 = (self.vaddr as u32)
            | ((self.vdata as u32) << 8)
            | (((self.srsrc & 0x1F) as u32) << 16)
            | (((self.ssamp & 0x1F) as u32) << 21);
        [word0, word1]
    }
}

/// Export (EXP), two words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpFields {
    pub en: u8,      // word0 bits 0-3
    pub target: u8,  // word0 bits 4-9
    pub compr: bool, // word0 bit 10
    pub done: bool,  // word0 bit 11
    pub vm: bool,    // word0 bit 12
    pub vsrc: [u8; 4], // word1, one byte per source
}

impl ExpFields {
    pub fn decode(word0: u32, word1: u32) -> Self {
        Self {
            en: (word0 & 0xF) as u8,
            target: ((word0 >> 4) & 0x3F) as u8,
            compr: (word0 >> 10) & 1 != 0,
            done: (word0 >> 11) & 1 != 0,
            vm: (word0 >> 12) & 1 != 0,
            vsrc: word1.to_le_bytes(),
        }
    }

    pub fn encode(&self) -> [u32; 2] {
        let word0 = (0x3E << 26)
            | ((self.en & 0xF) as u32)
            | (((self.target & 0x3F) as u32) << 4)
            | ((self.compr as u32) << 10)
            | ((self.done as u32) << 11)
            | ((self.vm as u32) << 12);
        [word0, u32::from_le_bytes(self.vsrc)]
    }
}

/// Family-specific view of the raw encoding bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fields {
    Sop2(Sop2Fields),
    Sopk(SopkFields),
    Sop1(Sop1Fields),
    Sopc(SopcFields),
    Sopp(SoppFields),
    Smrd(SmrdFields),
    Vop2(Vop2Fields),
    Vop1(Vop1Fields),
    Vopc(VopcFields),
    Vop3(Vop3Fields),
    Vintrp(VintrpFields),
    Mimg(MimgFields),
    Exp(ExpFields),
}

//=============================================================================
// DECODED INSTRUCTION
//=============================================================================

/// One decoded GCN instruction
///
/// `src[3]` doubles as an implicit second destination (SCC, carry-out or
/// EXEC) when it carries the DEST flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset from the start of the program
    pub offset: usize,
    /// Words consumed, including a trailing literal
    pub length: usize,
    pub encoding: Encoding,
    pub opcode: Opcode,
    pub type_src: DataType,
    pub type_dst: DataType,
    pub cond: Condition,
    pub dst: Operand,
    pub src: [Operand; 4],
    pub fields: Fields,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    /// Destination followed by the sources
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.dst).chain(self.src.iter())
    }

    /// Implicit second destination, if any
    pub fn implicit_dst(&self) -> Option<&Operand> {
        let op = &self.src[3];
        (op.is_used() && op.is_dest()).then_some(op)
    }

    pub fn vop3(&self) -> Option<&Vop3Fields> {
        match &self.fields {
            Fields::Vop3(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sop2_fields() {
        let f = Sop2Fields::decode(0x8000_1234);
        assert_eq!(f.ssrc0, 0x34);
        assert_eq!(f.ssrc1, 0x12);
        assert_eq!(f.sdst, 0);
        assert_eq!(f.op, 0);
        assert_eq!(f.encode(), 0x8000_1234);
    }

    #[test]
    fn test_smrd_fields() {
        let f = SmrdFields {
            offset: 0x10,
            imm: true,
            sbase: 2,
            sdst: 8,
            op: 2,
        };
        let decoded = SmrdFields::decode(f.encode());
        assert_eq!(decoded, f);
        assert_eq!(f.encode() >> 27, 0x18);
    }

    #[test]
    fn test_vop3_fields_a_and_b() {
        let f = Vop3Fields::decode(0xD282_0003, 0x0402_0501);
        assert_eq!(f.vdst, 3);
        assert_eq!(f.op, 0x141);
        assert_eq!(f.src0, 0x101);
        assert_eq!(f.src1, 0x102);
        assert_eq!(f.src2, 0x100);
        let [w0, w1] = f.encode();
        assert_eq!((w0, w1), (0xD282_0003, 0x0402_0501));

        let b = Vop3Fields::decode(Vop3Fields { sdst: 106, ..f }.encode_b()[0], w1);
        assert_eq!(b.sdst, 106);
    }

    #[test]
    fn test_exp_fields() {
        let f = ExpFields {
            en: 0xF,
            target: 12,
            compr: false,
            done: true,
            vm: false,
            vsrc: [4, 5, 6, 7],
        };
        let [w0, w1] = f.encode();
        assert_eq!(ExpFields::decode(w0, w1), f);
        assert_eq!(w1, 0x0706_0504);
    }

    #[test]
    fn test_condition_tables() {
        assert_eq!(Condition::from_float_index(0x1), Condition::Lt);
        assert_eq!(Condition::from_float_index(0xD), Condition::Neq);
        assert_eq!(Condition::from_int_index(0x5), Condition::Lg);
        assert_eq!(Condition::from_int_index(0x7), Condition::True);
    }

    #[test]
    fn test_operand_lanes() {
        let op = Operand::sgpr(8, 4).into_dest();
        assert!(op.flags.contains(OperandFlags::MULTI));
        assert!(op.is_dest());
        let lane = op.lane(2);
        assert_eq!(lane.id, 10);
        assert_eq!(lane.count, 1);
        assert!(!lane.flags.contains(OperandFlags::MULTI));
        assert!(!Operand::vgpr(0, 1).with_count(0).is_used());
    }

    #[test]
    fn test_stage_descriptor_sets() {
        assert!(ShaderStage::Vertex.descriptor_set() > HOST_DESCRIPTOR_SET);
        assert!(ShaderStage::Pixel.descriptor_set() > ShaderStage::Vertex.descriptor_set());
        assert_eq!("ps".parse::<ShaderStage>().unwrap(), ShaderStage::Pixel);
    }
}
