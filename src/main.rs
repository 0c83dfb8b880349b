use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use umip_testgen::config::{DEFAULT_CODE_CAPACITY, DEFAULT_SEGMENT_CAPACITY};
use umip_testgen::{generate, Artifacts, GeneratorConfig, InstructionScope};

#[derive(Parser, Debug)]
#[command(
    name = "umip-testgen",
    about = "Generate UMIP addressing-mode test code and checks for the 32-bit ldt harness."
)]
struct Args {
    /// Also generate tests for SLDT and STR (only emulated when the harness runs in vm86 or with emulation enabled)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    emulate_all: bool,

    /// Directory the generated files are written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Size in bytes of each data/stack array (SEGMENT_SIZE)
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_SEGMENT_CAPACITY)]
    segment_size: u32,

    /// Size in bytes of the executable code buffer (CODE_MEM_SIZE)
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CODE_CAPACITY)]
    code_size: u32,

    /// Only log warnings and errors
    #[arg(long, action = clap::ArgAction::SetTrue)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(args).map_err(|err| {
        tracing::error!(error = %err, "generation failed");
        err
    })
}

fn run(args: Args) -> anyhow::Result<()> {
    let scope = if args.emulate_all {
        InstructionScope::All
    } else {
        InstructionScope::Default
    };
    let config = GeneratorConfig::default()
        .with_scope(scope)
        .with_segment_capacity(args.segment_size)
        .with_code_capacity(args.code_size);
    config.validate()?;

    let generation = generate(&config).context("generate test cases")?;
    let artifacts = Artifacts::assemble(&generation, &config);
    let written = artifacts
        .write_to(&args.out_dir)
        .with_context(|| format!("write output files to {}", args.out_dir.display()))?;

    for path in &written {
        tracing::info!(path = %path.display(), "wrote");
    }
    tracing::info!(
        cases = generation.case_count(),
        code_bytes = generation.code_len(),
        "done"
    );
    Ok(())
}
