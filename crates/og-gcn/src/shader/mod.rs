//! GCN shader translation (GCN → SPIR-V)
//!
//! Programs are decoded twice over the same bytes:
//! - the analyzer collects register, type, export and resource usage
//! - the translator emits a SPIR-V module sized by that report

pub mod types;
pub mod opcodes;
pub mod decode;
pub mod deps;
pub mod resource;
pub mod analyze;
pub mod spirv;
pub mod translate;
pub mod pipeline;

pub use types::*;
pub use opcodes::*;
pub use decode::*;
pub use deps::*;
pub use resource::*;
pub use analyze::*;
pub use translate::*;
pub use pipeline::*;
