//! GCN shader bytecode pipeline for oxidized-gcn
//!
//! Decodes GCN shader programs, analyzes their register and resource usage
//! and translates them to SPIR-V.

pub mod shader;

pub use shader::{
    analyze, decode, scan, translate, CompiledShader, ShaderCompiler, ShaderStage,
    TranslationModule, UsageReport,
};
