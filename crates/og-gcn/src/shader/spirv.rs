//! SPIR-V module builder
//!
//! Section-ordered word buffers with cached type and constant
//! declarations, plus a structural checker for finished modules.

use og_core::error::{GcnError, Result};
use std::collections::{HashMap, HashSet};

/// SPIR-V magic number
pub const SPIRV_MAGIC: u32 = 0x07230203;

/// SPIR-V version (1.0)
pub const SPIRV_VERSION: u32 = 0x00010000;

/// SPIR-V generator ID (our tool)
pub const SPIRV_GENERATOR: u32 = 0x00080002;

// SPIR-V opcodes
pub const OP_NAME: u16 = 5;
pub const OP_EXT_INST_IMPORT: u16 = 11;
pub const OP_EXT_INST: u16 = 12;
pub const OP_MEMORY_MODEL: u16 = 14;
pub const OP_ENTRY_POINT: u16 = 15;
pub const OP_EXECUTION_MODE: u16 = 16;
pub const OP_CAPABILITY: u16 = 17;
pub const OP_TYPE_VOID: u16 = 19;
pub const OP_TYPE_BOOL: u16 = 20;
pub const OP_TYPE_INT: u16 = 21;
pub const OP_TYPE_FLOAT: u16 = 22;
pub const OP_TYPE_VECTOR: u16 = 23;
pub const OP_TYPE_IMAGE: u16 = 25;
pub const OP_TYPE_SAMPLER: u16 = 26;
pub const OP_TYPE_SAMPLED_IMAGE: u16 = 27;
pub const OP_TYPE_RUNTIME_ARRAY: u16 = 29;
pub const OP_TYPE_STRUCT: u16 = 30;
pub const OP_TYPE_POINTER: u16 = 32;
pub const OP_TYPE_FUNCTION: u16 = 33;
pub const OP_CONSTANT_TRUE: u16 = 41;
pub const OP_CONSTANT_FALSE: u16 = 42;
pub const OP_CONSTANT: u16 = 43;
pub const OP_CONSTANT_COMPOSITE: u16 = 44;
pub const OP_FUNCTION: u16 = 54;
pub const OP_FUNCTION_END: u16 = 56;
pub const OP_VARIABLE: u16 = 59;
pub const OP_LOAD: u16 = 61;
pub const OP_STORE: u16 = 62;
pub const OP_ACCESS_CHAIN: u16 = 65;
pub const OP_DECORATE: u16 = 71;
pub const OP_MEMBER_DECORATE: u16 = 72;
pub const OP_COMPOSITE_CONSTRUCT: u16 = 80;
pub const OP_COMPOSITE_EXTRACT: u16 = 81;
pub const OP_SAMPLED_IMAGE: u16 = 86;
pub const OP_IMAGE_SAMPLE_IMPLICIT_LOD: u16 = 87;
pub const OP_IMAGE_SAMPLE_EXPLICIT_LOD: u16 = 88;
pub const OP_CONVERT_F_TO_U: u16 = 109;
pub const OP_CONVERT_F_TO_S: u16 = 110;
pub const OP_CONVERT_S_TO_F: u16 = 111;
pub const OP_CONVERT_U_TO_F: u16 = 112;
pub const OP_BITCAST: u16 = 124;
pub const OP_SNEGATE: u16 = 126;
pub const OP_FNEGATE: u16 = 127;
pub const OP_IADD: u16 = 128;
pub const OP_FADD: u16 = 129;
pub const OP_ISUB: u16 = 130;
pub const OP_FSUB: u16 = 131;
pub const OP_IMUL: u16 = 132;
pub const OP_FMUL: u16 = 133;
pub const OP_FDIV: u16 = 136;
pub const OP_IS_NAN: u16 = 156;
pub const OP_IS_INF: u16 = 157;
pub const OP_ORDERED: u16 = 162;
pub const OP_UNORDERED: u16 = 163;
pub const OP_LOGICAL_OR: u16 = 166;
pub const OP_LOGICAL_NOT: u16 = 168;
pub const OP_SELECT: u16 = 169;
pub const OP_IEQUAL: u16 = 170;
pub const OP_INOT_EQUAL: u16 = 171;
pub const OP_UGREATER_THAN: u16 = 172;
pub const OP_SGREATER_THAN: u16 = 173;
pub const OP_UGREATER_THAN_EQUAL: u16 = 174;
pub const OP_SGREATER_THAN_EQUAL: u16 = 175;
pub const OP_ULESS_THAN: u16 = 176;
pub const OP_SLESS_THAN: u16 = 177;
pub const OP_ULESS_THAN_EQUAL: u16 = 178;
pub const OP_SLESS_THAN_EQUAL: u16 = 179;
pub const OP_FORD_EQUAL: u16 = 180;
pub const OP_FUNORD_EQUAL: u16 = 181;
pub const OP_FORD_NOT_EQUAL: u16 = 182;
pub const OP_FUNORD_NOT_EQUAL: u16 = 183;
pub const OP_FORD_LESS_THAN: u16 = 184;
pub const OP_FUNORD_LESS_THAN: u16 = 185;
pub const OP_FORD_GREATER_THAN: u16 = 186;
pub const OP_FUNORD_GREATER_THAN: u16 = 187;
pub const OP_FORD_LESS_THAN_EQUAL: u16 = 188;
pub const OP_FUNORD_LESS_THAN_EQUAL: u16 = 189;
pub const OP_FORD_GREATER_THAN_EQUAL: u16 = 190;
pub const OP_FUNORD_GREATER_THAN_EQUAL: u16 = 191;
pub const OP_SHIFT_RIGHT_LOGICAL: u16 = 194;
pub const OP_SHIFT_RIGHT_ARITHMETIC: u16 = 195;
pub const OP_SHIFT_LEFT_LOGICAL: u16 = 196;
pub const OP_BITWISE_OR: u16 = 197;
pub const OP_BITWISE_XOR: u16 = 198;
pub const OP_BITWISE_AND: u16 = 199;
pub const OP_NOT: u16 = 200;
pub const OP_BIT_FIELD_INSERT: u16 = 201;
pub const OP_BIT_FIELD_S_EXTRACT: u16 = 202;
pub const OP_BIT_FIELD_U_EXTRACT: u16 = 203;
pub const OP_BIT_REVERSE: u16 = 204;
pub const OP_BIT_COUNT: u16 = 205;
pub const OP_LABEL: u16 = 248;
pub const OP_RETURN: u16 = 253;

// GLSL.std.450 extended instructions
pub const GLSL_ROUND_EVEN: u32 = 2;
pub const GLSL_TRUNC: u32 = 3;
pub const GLSL_FABS: u32 = 4;
pub const GLSL_SABS: u32 = 5;
pub const GLSL_FLOOR: u32 = 8;
pub const GLSL_CEIL: u32 = 9;
pub const GLSL_FRACT: u32 = 10;
pub const GLSL_SIN: u32 = 13;
pub const GLSL_COS: u32 = 14;
pub const GLSL_EXP2: u32 = 29;
pub const GLSL_LOG2: u32 = 30;
pub const GLSL_SQRT: u32 = 31;
pub const GLSL_INVERSE_SQRT: u32 = 32;
pub const GLSL_FMIN: u32 = 37;
pub const GLSL_UMIN: u32 = 38;
pub const GLSL_SMIN: u32 = 39;
pub const GLSL_FMAX: u32 = 40;
pub const GLSL_UMAX: u32 = 41;
pub const GLSL_SMAX: u32 = 42;
pub const GLSL_FCLAMP: u32 = 43;
pub const GLSL_UCLAMP: u32 = 44;
pub const GLSL_SCLAMP: u32 = 45;
pub const GLSL_FMA: u32 = 50;
pub const GLSL_LDEXP: u32 = 53;
pub const GLSL_PACK_SNORM_2X16: u32 = 56;
pub const GLSL_PACK_UNORM_2X16: u32 = 57;
pub const GLSL_PACK_HALF_2X16: u32 = 58;
pub const GLSL_UNPACK_HALF_2X16: u32 = 62;
pub const GLSL_FIND_I_LSB: u32 = 73;
pub const GLSL_FIND_S_MSB: u32 = 74;
pub const GLSL_FIND_U_MSB: u32 = 75;

// Capability values
pub const CAP_SHADER: u32 = 1;
pub const CAP_FLOAT64: u32 = 10;
pub const CAP_INT64: u32 = 11;

// Execution model values
pub const EXEC_MODEL_VERTEX: u32 = 0;
pub const EXEC_MODEL_FRAGMENT: u32 = 4;
pub const EXEC_MODEL_GL_COMPUTE: u32 = 5;

// Execution mode values
pub const EXEC_MODE_ORIGIN_UPPER_LEFT: u32 = 7;
pub const EXEC_MODE_DEPTH_REPLACING: u32 = 12;
pub const EXEC_MODE_LOCAL_SIZE: u32 = 17;

// Storage class values
pub const STORAGE_UNIFORM_CONSTANT: u32 = 0;
pub const STORAGE_INPUT: u32 = 1;
pub const STORAGE_UNIFORM: u32 = 2;
pub const STORAGE_OUTPUT: u32 = 3;
pub const STORAGE_PRIVATE: u32 = 6;
pub const STORAGE_FUNCTION: u32 = 7;

// Decoration values
pub const DECORATION_BUFFER_BLOCK: u32 = 3;
pub const DECORATION_ARRAY_STRIDE: u32 = 6;
pub const DECORATION_BUILTIN: u32 = 11;
pub const DECORATION_NON_WRITABLE: u32 = 24;
pub const DECORATION_LOCATION: u32 = 30;
pub const DECORATION_BINDING: u32 = 33;
pub const DECORATION_DESCRIPTOR_SET: u32 = 34;
pub const DECORATION_OFFSET: u32 = 35;

// Built-in values
pub const BUILTIN_POSITION: u32 = 0;
pub const BUILTIN_FRAG_DEPTH: u32 = 22;
pub const BUILTIN_LOCAL_INVOCATION_ID: u32 = 27;
pub const BUILTIN_VERTEX_INDEX: u32 = 42;

// Image operand masks
pub const IMAGE_OPERANDS_BIAS: u32 = 0x1;
pub const IMAGE_OPERANDS_LOD: u32 = 0x2;

/// Cache key for deduplicated type declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TypeKey {
    Void,
    Bool,
    Int(u32, bool),
    Float(u32),
    Vector(u32, u32),
    Pointer(u32, u32),
    Function(u32),
    Image2d(u32),
    Sampler,
    SampledImage(u32),
    RuntimeArray(u32),
}

/// SPIR-V code builder
#[derive(Debug, Default)]
pub struct SpirVBuilder {
    /// Current ID bound
    id_bound: u32,
    /// Capabilities section
    capabilities: Vec<u32>,
    /// Extensions section
    extensions: Vec<u32>,
    /// Ext inst import section
    ext_inst_imports: Vec<u32>,
    /// Memory model
    memory_model: Vec<u32>,
    /// Entry points
    entry_points: Vec<u32>,
    /// Execution modes
    execution_modes: Vec<u32>,
    /// Debug names
    debug_names: Vec<u32>,
    /// Annotations (decorations)
    annotations: Vec<u32>,
    /// Types, constants, global variables
    types_constants: Vec<u32>,
    /// Function definitions
    functions: Vec<u32>,
    /// GLSL.std.450 import ID
    glsl_ext_id: u32,
    declared_capabilities: HashSet<u32>,
    types: HashMap<TypeKey, u32>,
    constants: HashMap<(u32, u32), u32>,
}

impl SpirVBuilder {
    pub fn new() -> Self {
        Self {
            id_bound: 1,
            ..Default::default()
        }
    }

    /// Allocate a new ID
    pub fn alloc_id(&mut self) -> u32 {
        let id = self.id_bound;
        self.id_bound += 1;
        id
    }

    pub fn id_bound(&self) -> u32 {
        self.id_bound
    }

    /// Encode an instruction word
    pub fn encode_word(opcode: u16, word_count: u16) -> u32 {
        ((word_count as u32) << 16) | (opcode as u32)
    }

    fn push(section: &mut Vec<u32>, opcode: u16, operands: &[u32]) {
        section.push(Self::encode_word(opcode, 1 + operands.len() as u16));
        section.extend_from_slice(operands);
    }

    /// Null-terminated UTF-8 string packed into little-endian words
    fn encode_string(s: &str) -> Vec<u32> {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Add capability
    pub fn add_capability(&mut self, cap: u32) {
        if self.declared_capabilities.insert(cap) {
            Self::push(&mut self.capabilities, OP_CAPABILITY, &[cap]);
        }
    }

    /// Add GLSL.std.450 import
    pub fn add_glsl_import(&mut self) -> u32 {
        if self.glsl_ext_id != 0 {
            return self.glsl_ext_id;
        }
        let id = self.alloc_id();
        self.glsl_ext_id = id;

        let mut operands = vec![id];
        operands.extend(Self::encode_string("GLSL.std.450"));
        Self::push(&mut self.ext_inst_imports, OP_EXT_INST_IMPORT, &operands);
        id
    }

    /// Add memory model (Logical, GLSL450)
    pub fn add_memory_model(&mut self) {
        Self::push(&mut self.memory_model, OP_MEMORY_MODEL, &[1, 1]);
    }

    pub fn add_entry_point(&mut self, model: u32, function: u32, name: &str, interface: &[u32]) {
        let mut operands = vec![model, function];
        operands.extend(Self::encode_string(name));
        operands.extend_from_slice(interface);
        Self::push(&mut self.entry_points, OP_ENTRY_POINT, &operands);
    }

    pub fn add_execution_mode(&mut self, function: u32, mode: u32, literals: &[u32]) {
        let mut operands = vec![function, mode];
        operands.extend_from_slice(literals);
        Self::push(&mut self.execution_modes, OP_EXECUTION_MODE, &operands);
    }

    pub fn add_name(&mut self, target: u32, name: &str) {
        let mut operands = vec![target];
        operands.extend(Self::encode_string(name));
        Self::push(&mut self.debug_names, OP_NAME, &operands);
    }

    pub fn decorate(&mut self, target: u32, decoration: u32, literals: &[u32]) {
        let mut operands = vec![target, decoration];
        operands.extend_from_slice(literals);
        Self::push(&mut self.annotations, OP_DECORATE, &operands);
    }

    pub fn member_decorate(&mut self, structure: u32, member: u32, decoration: u32, literals: &[u32]) {
        let mut operands = vec![structure, member, decoration];
        operands.extend_from_slice(literals);
        Self::push(&mut self.annotations, OP_MEMBER_DECORATE, &operands);
    }

    /// Add location decoration
    pub fn add_location(&mut self, target: u32, location: u32) {
        self.decorate(target, DECORATION_LOCATION, &[location]);
    }

    /// Add builtin decoration
    pub fn add_builtin(&mut self, target: u32, builtin: u32) {
        self.decorate(target, DECORATION_BUILTIN, &[builtin]);
    }

    //=========================================================================
    // TYPES
    //=========================================================================

    fn cached_type(&mut self, key: TypeKey, opcode: u16, operands: &[u32]) -> u32 {
        if let Some(&id) = self.types.get(&key) {
            return id;
        }
        let id = self.alloc_id();
        let mut words = vec![id];
        words.extend_from_slice(operands);
        Self::push(&mut self.types_constants, opcode, &words);
        self.types.insert(key, id);
        id
    }

    pub fn type_void(&mut self) -> u32 {
        self.cached_type(TypeKey::Void, OP_TYPE_VOID, &[])
    }

    pub fn type_bool(&mut self) -> u32 {
        self.cached_type(TypeKey::Bool, OP_TYPE_BOOL, &[])
    }

    pub fn type_int(&mut self, width: u32, signed: bool) -> u32 {
        if width == 64 {
            self.add_capability(CAP_INT64);
        }
        self.cached_type(TypeKey::Int(width, signed), OP_TYPE_INT, &[width, signed as u32])
    }

    pub fn type_float(&mut self, width: u32) -> u32 {
        if width == 64 {
            self.add_capability(CAP_FLOAT64);
        }
        self.cached_type(TypeKey::Float(width), OP_TYPE_FLOAT, &[width])
    }

    pub fn type_vector(&mut self, component: u32, count: u32) -> u32 {
        self.cached_type(
            TypeKey::Vector(component, count),
            OP_TYPE_VECTOR,
            &[component, count],
        )
    }

    /// Add pointer type
    pub fn add_pointer_type(&mut self, storage: u32, base_type: u32) -> u32 {
        self.cached_type(
            TypeKey::Pointer(storage, base_type),
            OP_TYPE_POINTER,
            &[storage, base_type],
        )
    }

    /// Function type without parameters
    pub fn type_function(&mut self, return_type: u32) -> u32 {
        self.cached_type(TypeKey::Function(return_type), OP_TYPE_FUNCTION, &[return_type])
    }

    /// Sampled 2D image, format unknown
    pub fn type_image_2d(&mut self, sampled_type: u32) -> u32 {
        // Dim 2D, depth 0, arrayed 0, MS 0, sampled 1, format Unknown
        self.cached_type(
            TypeKey::Image2d(sampled_type),
            OP_TYPE_IMAGE,
            &[sampled_type, 1, 0, 0, 0, 1, 0],
        )
    }

    pub fn type_sampler(&mut self) -> u32 {
        self.cached_type(TypeKey::Sampler, OP_TYPE_SAMPLER, &[])
    }

    pub fn type_sampled_image(&mut self, image_type: u32) -> u32 {
        self.cached_type(
            TypeKey::SampledImage(image_type),
            OP_TYPE_SAMPLED_IMAGE,
            &[image_type],
        )
    }

    pub fn type_runtime_array(&mut self, element: u32) -> u32 {
        self.cached_type(TypeKey::RuntimeArray(element), OP_TYPE_RUNTIME_ARRAY, &[element])
    }

    /// Struct types are never shared, each carries its own decorations
    pub fn type_struct(&mut self, members: &[u32]) -> u32 {
        let id = self.alloc_id();
        let mut words = vec![id];
        words.extend_from_slice(members);
        Self::push(&mut self.types_constants, OP_TYPE_STRUCT, &words);
        id
    }

    //=========================================================================
    // CONSTANTS AND GLOBALS
    //=========================================================================

    /// 32-bit scalar constant of `ty`
    pub fn constant(&mut self, ty: u32, bits: u32) -> u32 {
        if let Some(&id) = self.constants.get(&(ty, bits)) {
            return id;
        }
        let id = self.alloc_id();
        Self::push(&mut self.types_constants, OP_CONSTANT, &[ty, id, bits]);
        self.constants.insert((ty, bits), id);
        id
    }

    pub fn constant_u32(&mut self, value: u32) -> u32 {
        let ty = self.type_int(32, false);
        self.constant(ty, value)
    }

    pub fn constant_i32(&mut self, value: i32) -> u32 {
        let ty = self.type_int(32, true);
        self.constant(ty, value as u32)
    }

    pub fn constant_f32(&mut self, value: f32) -> u32 {
        let ty = self.type_float(32);
        self.constant(ty, value.to_bits())
    }

    pub fn constant_bool(&mut self, value: bool) -> u32 {
        let ty = self.type_bool();
        if let Some(&id) = self.constants.get(&(ty, value as u32)) {
            return id;
        }
        let id = self.alloc_id();
        let opcode = if value { OP_CONSTANT_TRUE } else { OP_CONSTANT_FALSE };
        Self::push(&mut self.types_constants, opcode, &[ty, id]);
        self.constants.insert((ty, value as u32), id);
        id
    }

    /// Add module-scope variable
    pub fn add_variable(&mut self, ptr_type: u32, storage: u32) -> u32 {
        let id = self.alloc_id();
        Self::push(&mut self.types_constants, OP_VARIABLE, &[ptr_type, id, storage]);
        id
    }

    pub fn add_variable_with_init(&mut self, ptr_type: u32, storage: u32, init: u32) -> u32 {
        let id = self.alloc_id();
        Self::push(
            &mut self.types_constants,
            OP_VARIABLE,
            &[ptr_type, id, storage, init],
        );
        id
    }

    //=========================================================================
    // FUNCTION BODIES
    //=========================================================================

    /// Open a parameterless function and its first block
    pub fn begin_function(&mut self, return_type: u32, function_type: u32) -> u32 {
        let id = self.alloc_id();
        Self::push(
            &mut self.functions,
            OP_FUNCTION,
            &[return_type, id, 0, function_type],
        );
        self.label();
        id
    }

    pub fn end_function(&mut self) {
        Self::push(&mut self.functions, OP_FUNCTION_END, &[]);
    }

    pub fn label(&mut self) -> u32 {
        let id = self.alloc_id();
        Self::push(&mut self.functions, OP_LABEL, &[id]);
        id
    }

    /// Emit an instruction with a result id
    pub fn emit(&mut self, opcode: u16, result_type: u32, operands: &[u32]) -> u32 {
        let id = self.alloc_id();
        let mut words = vec![result_type, id];
        words.extend_from_slice(operands);
        Self::push(&mut self.functions, opcode, &words);
        id
    }

    /// Emit an instruction without a result
    pub fn emit_void(&mut self, opcode: u16, operands: &[u32]) {
        Self::push(&mut self.functions, opcode, operands);
    }

    /// GLSL.std.450 extended instruction
    pub fn ext_inst(&mut self, result_type: u32, instruction: u32, operands: &[u32]) -> u32 {
        let set = self.add_glsl_import();
        let mut words = vec![set, instruction];
        words.extend_from_slice(operands);
        self.emit(OP_EXT_INST, result_type, &words)
    }

    /// Build final SPIR-V bytecode
    pub fn build(self) -> Vec<u32> {
        let mut spirv = Vec::new();

        // Header
        spirv.push(SPIRV_MAGIC);
        spirv.push(SPIRV_VERSION);
        spirv.push(SPIRV_GENERATOR);
        spirv.push(self.id_bound);
        spirv.push(0); // Reserved

        // Sections in order
        spirv.extend(&self.capabilities);
        spirv.extend(&self.extensions);
        spirv.extend(&self.ext_inst_imports);
        spirv.extend(&self.memory_model);
        spirv.extend(&self.entry_points);
        spirv.extend(&self.execution_modes);
        spirv.extend(&self.debug_names);
        spirv.extend(&self.annotations);
        spirv.extend(&self.types_constants);
        spirv.extend(&self.functions);

        spirv
    }
}

//=============================================================================
// INSPECTION
//=============================================================================

/// One instruction of a finished module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpirvInstruction<'a> {
    pub opcode: u16,
    pub operands: &'a [u32],
}

/// Iterator over the instructions following the header.
///
/// Stops at the first malformed word count.
pub struct Instructions<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = std::result::Result<SpirvInstruction<'a>, usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.words.len() {
            return None;
        }
        let head = self.words[self.pos];
        let count = (head >> 16) as usize;
        if count == 0 || self.pos + count > self.words.len() {
            let at = self.pos;
            self.pos = self.words.len();
            return Some(Err(at));
        }
        let insn = SpirvInstruction {
            opcode: (head & 0xFFFF) as u16,
            operands: &self.words[self.pos + 1..self.pos + count],
        };
        self.pos += count;
        Some(Ok(insn))
    }
}

pub fn instructions(words: &[u32]) -> Instructions<'_> {
    Instructions {
        words,
        pos: words.len().min(5),
    }
}

/// Operand index of the result id, for the opcodes this crate emits
fn result_id_index(opcode: u16) -> Option<usize> {
    match opcode {
        OP_EXT_INST_IMPORT | OP_LABEL => Some(0),
        OP_TYPE_VOID..=OP_TYPE_FUNCTION => Some(0),
        OP_CONSTANT_TRUE..=OP_CONSTANT_COMPOSITE => Some(1),
        OP_FUNCTION | OP_VARIABLE | OP_LOAD | OP_ACCESS_CHAIN | OP_EXT_INST => Some(1),
        OP_COMPOSITE_CONSTRUCT | OP_COMPOSITE_EXTRACT => Some(1),
        OP_SAMPLED_IMAGE..=OP_IMAGE_SAMPLE_EXPLICIT_LOD => Some(1),
        OP_CONVERT_F_TO_U..=OP_BIT_COUNT => Some(1),
        _ => None,
    }
}

fn invalid(msg: impl Into<String>) -> GcnError {
    GcnError::InvalidModule(msg.into())
}

/// Structural check of a finished module.
///
/// Verifies the header, instruction word counts, result ids (non-zero,
/// unique, below the bound), a single entry point and block structure
/// inside balanced function definitions.
pub fn validate_structure(words: &[u32]) -> Result<()> {
    if words.len() < 5 {
        return Err(invalid("module shorter than its header"));
    }
    if words[0] != SPIRV_MAGIC {
        return Err(invalid(format!("bad magic 0x{:08x}", words[0])));
    }
    if words[1] != SPIRV_VERSION {
        return Err(invalid(format!("unsupported version 0x{:08x}", words[1])));
    }
    let bound = words[3];

    let mut results = HashSet::new();
    let mut entry_points = 0;
    let mut in_function = false;
    let mut in_block = false;

    for item in instructions(words) {
        let insn = item.map_err(|at| invalid(format!("bad word count at word {}", at)))?;

        if let Some(index) = result_id_index(insn.opcode) {
            let id = *insn
                .operands
                .get(index)
                .ok_or_else(|| invalid(format!("opcode {} missing its result id", insn.opcode)))?;
            if id == 0 || id >= bound {
                return Err(invalid(format!("id {} outside bound {}", id, bound)));
            }
            if !results.insert(id) {
                return Err(invalid(format!("id {} defined twice", id)));
            }
        }

        match insn.opcode {
            OP_ENTRY_POINT => entry_points += 1,
            OP_FUNCTION => {
                if in_function {
                    return Err(invalid("nested OpFunction"));
                }
                in_function = true;
            }
            OP_LABEL => {
                if !in_function || in_block {
                    return Err(invalid("OpLabel outside a function or inside an open block"));
                }
                in_block = true;
            }
            OP_RETURN => {
                if !in_block {
                    return Err(invalid("OpReturn outside a block"));
                }
                in_block = false;
            }
            OP_FUNCTION_END => {
                if !in_function || in_block {
                    return Err(invalid("OpFunctionEnd with an unterminated block"));
                }
                in_function = false;
            }
            _ => {
                if in_function && !in_block {
                    return Err(invalid(format!(
                        "opcode {} outside a block",
                        insn.opcode
                    )));
                }
            }
        }
    }

    if in_function {
        return Err(invalid("unterminated function"));
    }
    if entry_points != 1 {
        return Err(invalid(format!("expected one entry point, found {}", entry_points)));
    }
    Ok(())
}
