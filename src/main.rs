//! Command-line entry point for quickwit-ingest-bench.
//!
//! ```bash
//! # Run against a locally built binary, keeping its data in ./qwdata
//! quickwit-ingest-bench --binary ./target/release/quickwit \
//!   --service-config quickwit.yaml --data-dir qwdata
//!
//! # Verbose pacing and readiness diagnostics
//! RUST_LOG=debug quickwit-ingest-bench --total-mib 100
//! ```

use clap::Parser;
use quickwit_ingest_bench::{
    setup_interrupt_handler, BenchArgs, BenchConfig, Orchestrator, OutputFormat, RunReport,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run().await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run() -> anyhow::Result<i32> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = BenchArgs::parse();
    let config = BenchConfig::try_from(args)?;
    let output_format = config.output_format;
    let report_json = config.report_json.clone();

    let orchestrator = Orchestrator::new(config)?;
    let interrupt = CancellationToken::new();
    setup_interrupt_handler(interrupt.clone());

    let outcome = orchestrator.run(interrupt).await?;
    print_report(&outcome.report, output_format)?;
    if let Some(path) = report_json {
        outcome.report.write_json(&path)?;
    }

    let exit_code = outcome.exit_code();
    match outcome.error {
        Some(e) if !outcome.interrupted => Err(e),
        _ => Ok(exit_code),
    }
}

fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", report.format_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}
