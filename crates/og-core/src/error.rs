//! Error types for the oxidized-gcn shader pipeline

use std::borrow::Borrow;
use thiserror::Error;

/// Register file addressed by an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFile {
    Scalar,
    Vector,
    Temp,
}

impl std::fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Vector => write!(f, "vector"),
            Self::Temp => write!(f, "temp"),
        }
    }
}

/// One past the last register of a run, without wrapping
fn run_end(start: impl Borrow<u32>, count: impl Borrow<u32>) -> u64 {
    u64::from(*start.borrow()) + u64::from(*count.borrow())
}

/// Main error type for decode, analysis and translation
#[derive(Error, Debug)]
pub enum GcnError {
    #[error("Unknown encoding at 0x{offset:x}: 0x{word:08x}")]
    UnknownEncoding { offset: usize, word: u32 },

    #[error("Unknown {family} opcode 0x{opcode:x} at 0x{offset:x}")]
    UnknownOpcode {
        offset: usize,
        family: &'static str,
        opcode: u32,
    },

    #[error("Unknown operand code {code} at 0x{offset:x}")]
    UnknownOperand { offset: usize, code: u32 },

    #[error(
        "Operand out of range: {file} registers {start}..{end} exceed limit {limit}",
        end = run_end(.start, .count)
    )]
    OperandOutOfRange {
        file: RegisterFile,
        start: u32,
        count: u32,
        limit: u32,
    },

    #[error("Program end marker not found within {scanned} bytes")]
    UnboundedScan { scanned: usize },

    #[error("Truncated instruction at 0x{offset:x}: {needed} more words required")]
    TruncatedInstruction { offset: usize, needed: usize },

    #[error("No translation for {mnemonic} at 0x{offset:x}")]
    Unsupported {
        offset: usize,
        mnemonic: &'static str,
    },

    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(String),

    #[error("Invalid SPIR-V module: {0}")]
    InvalidModule(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GcnError {
    /// Whether the error aborts the whole pipeline call.
    ///
    /// Everything else only drops the instruction that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OperandOutOfRange { .. }
                | Self::UnboundedScan { .. }
                | Self::InvalidModule(_)
                | Self::Config(_)
                | Self::Io(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, GcnError>;
