//! Configuration system for the oxidized-gcn shader pipeline

use crate::error::{GcnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default upper bound for the end-of-program marker scan (1 MiB).
pub const DEFAULT_MAX_SCAN_BYTES: usize = 1 << 20;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub shader: ShaderConfig,
    pub debug: DebugConfig,
}

/// Shader decode/translate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Bytes scanned for the `OrbShdr` marker before giving up
    pub max_scan_bytes: usize,
    /// Emit OpName for registers and interface variables
    pub emit_debug_names: bool,
    /// Workgroup size used for compute-stage entry points
    pub compute_local_size: [u32; 3],
    /// Log every skipped instruction at debug level
    pub log_skipped: bool,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    /// Write each translated module to `dump_path`
    pub dump_spirv: bool,
    pub dump_path: PathBuf,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            max_scan_bytes: DEFAULT_MAX_SCAN_BYTES,
            emit_debug_names: true,
            compute_local_size: [64, 1, 1],
            log_skipped: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            dump_spirv: false,
            dump_path: PathBuf::from("shader_dumps"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GcnError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| GcnError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-gcn")
            .join("config.toml")
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.shader.max_scan_bytes < 8 {
            return Err(GcnError::Config(format!(
                "max_scan_bytes must be at least 8, got {}",
                self.shader.max_scan_bytes
            )));
        }
        if self.shader.compute_local_size.iter().any(|&n| n == 0) {
            return Err(GcnError::Config(
                "compute_local_size dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.shader.max_scan_bytes, DEFAULT_MAX_SCAN_BYTES);
        assert!(config.shader.emit_debug_names);
        assert_eq!(config.shader.compute_local_size, [64, 1, 1]);
        assert_eq!(config.debug.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.shader.max_scan_bytes, config.shader.max_scan_bytes);
        assert_eq!(parsed.debug.log_level, config.debug.log_level);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[shader]\nmax_scan_bytes = 4096\n").unwrap();
        assert_eq!(parsed.shader.max_scan_bytes, 4096);
        assert!(parsed.shader.log_skipped);
        assert!(!parsed.debug.dump_spirv);
    }

    #[test]
    fn test_validate_rejects_tiny_scan_bound() {
        let mut config = Config::default();
        config.shader.max_scan_bytes = 4;
        assert!(matches!(config.validate(), Err(GcnError::Config(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("og_core_config_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.shader.emit_debug_names = false;
        config.debug.log_level = LogLevel::Trace;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.shader.emit_debug_names);
        assert_eq!(loaded.debug.log_level, LogLevel::Trace);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
