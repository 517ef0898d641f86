//! Oxidized-GCN - GCN shader to SPIR-V compiler
//!
//! Command-line front end over `og_gcn::ShaderCompiler`.

use anyhow::{Context, Result};
use clap::Parser;
use og_core::Config;
use og_gcn::{CompiledShader, ShaderCompiler, ShaderStage};
use std::path::{Path, PathBuf};

/// Translate a dumped GCN shader binary to SPIR-V
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Shader binary terminated by the `OrbShdr` marker
    input: PathBuf,

    /// Pipeline stage: vertex, pixel or compute
    #[arg(short, long)]
    stage: ShaderStage,

    /// Output path (default: input with a `.spv` extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the usage report
    #[arg(long)]
    report: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    og_core::logging::init(&config.debug);

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let compiler = ShaderCompiler::new(config.shader.clone());
    let compiled = compiler
        .compile(&bytes, cli.stage)
        .with_context(|| format!("failed to compile {}", cli.input.display()))?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("spv"));
    std::fs::write(&output, compiled.module.as_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!("wrote {} ({} bytes)", output.display(), compiled.module.len());

    if config.debug.dump_spirv {
        let path = dump_file(&config.debug.dump_path, &cli.input, cli.stage);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, compiled.module.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("dumped module to {}", path.display());
    }

    if cli.report {
        print_report(&compiled);
    }

    Ok(())
}

fn dump_file(dir: &Path, input: &Path, stage: ShaderStage) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shader".to_string());
    dir.join(format!("{}.{}.spv", stem, stage.name()))
}

fn print_report(compiled: &CompiledShader) {
    let report = &compiled.report;
    let list = |regs: Vec<u32>| {
        regs.iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };

    println!("program length: {} bytes", report.program_length);
    println!("instructions:   {}", report.instructions);
    println!("sgprs ({}): {}", report.sgprs.count(), list(report.sgprs.iter().collect()));
    println!("vgprs ({}): {}", report.vgprs.count(), list(report.vgprs.iter().collect()));
    println!("temps ({}): {}", report.tmps.count(), list(report.tmps.iter().collect()));
    println!("types: {:?}", report.types);
    println!(
        "exports: mrt={:#04x} mrtz={} pos={:#03x} param={:#010x}",
        report.exports.mrt, report.exports.mrtz, report.exports.pos, report.exports.param
    );
    println!("attributes: {:#010x}", report.attrs);
    if !report.vgprs_independent {
        println!("vector registers are paired into 64-bit values");
    }

    for binding in &compiled.module.bindings {
        let desc = binding.resource.read();
        println!(
            "binding set={} slot={} {} #{} from {:?}",
            binding.set,
            binding.binding,
            binding.kind.name(),
            binding.index,
            desc.dependency.kind
        );
    }

    for (pass, skip) in &compiled.skipped {
        println!(
            "skipped [{}] 0x{:04x} ({} words): {}",
            pass.name(),
            skip.offset,
            skip.words,
            skip.error
        );
    }
}
