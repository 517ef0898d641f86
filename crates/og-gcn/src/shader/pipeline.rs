//! Shader compiler façade
//!
//! Pairs one analysis and one translation over the same program bytes.

use super::analyze::{analyze, UsageReport};
use super::decode::SkippedInstruction;
use super::spirv::validate_structure;
use super::translate::{translate, TranslationModule};
use super::types::ShaderStage;
use og_core::config::ShaderConfig;
use og_core::error::Result;
use tracing::{info, warn};

/// Pass that dropped an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Analyze,
    Translate,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::Analyze => "analyze",
            Pass::Translate => "translate",
        }
    }
}

/// Output of one compilation
#[derive(Debug)]
pub struct CompiledShader {
    pub report: UsageReport,
    pub module: TranslationModule,
    /// Instructions dropped by either pass, in program order
    pub skipped: Vec<(Pass, SkippedInstruction)>,
}

impl CompiledShader {
    /// Whether every instruction made it into the module
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// GCN to SPIR-V compiler
pub struct ShaderCompiler {
    config: ShaderConfig,
}

impl ShaderCompiler {
    pub fn new(config: ShaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShaderConfig {
        &self.config
    }

    /// Analyze and translate `bytes` for `stage`
    pub fn compile(&self, bytes: &[u8], stage: ShaderStage) -> Result<CompiledShader> {
        let mut report = analyze(bytes, &self.config)?;
        let mut module = translate(bytes, &report, stage, &self.config)?;
        validate_structure(&module.words)?;

        let mut skipped: Vec<(Pass, SkippedInstruction)> = report
            .skipped
            .drain(..)
            .map(|s| (Pass::Analyze, s))
            .chain(module.skipped.drain(..).map(|s| (Pass::Translate, s)))
            .collect();
        skipped.sort_by_key(|(pass, s)| (s.offset, *pass == Pass::Translate));

        if self.config.log_skipped {
            for (pass, skip) in &skipped {
                warn!(
                    pass = pass.name(),
                    offset = format_args!("0x{:x}", skip.offset),
                    "skipped instruction: {}",
                    skip.error
                );
            }
        }

        info!(
            stage = stage.name(),
            bytes = module.len(),
            instructions = report.instructions,
            skipped = skipped.len(),
            "compiled shader"
        );

        Ok(CompiledShader {
            report,
            module,
            skipped,
        })
    }
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        Self::new(ShaderConfig::default())
    }
}
