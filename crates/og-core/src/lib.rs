//! Core support for the oxidized-gcn shader pipeline
//!
//! This crate provides the error taxonomy, configuration, and logging
//! infrastructure shared by the decoder, analyzer and translator.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, DebugConfig, LogLevel, ShaderConfig};
pub use error::{GcnError, RegisterFile, Result};
