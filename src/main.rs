use anyhow::Result;
use clap::Parser;
use gpsfix::pipeline::{self, RunSummary};
use gpsfix::settings::Settings;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert text GPS coordinates of scan sessions to validated decimal degrees", long_about = None)]
struct Args {
    /// Exported GPS points (.json, .jsonl, .csv or .tsv)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Input format, when the extension does not say
    #[arg(short, long)]
    format: Option<String>,

    /// Where normalized records go: 'stdout' or a file path
    #[arg(short, long)]
    output: Option<String>,

    /// Where failed records go, with the reason they failed
    #[arg(long)]
    failed: Option<String>,

    /// Lines per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Settings file (defaults to ./gpsfix.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exit with status 2 if any record failed
    #[arg(long)]
    strict: bool,

    /// Print run statistics to stderr
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref())?.with_overrides(
        args.batch_size,
        args.output,
        args.failed,
        args.strict,
    )?;
    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let summary = pipeline::run(&args.file, args.format.as_deref(), &settings)?;

    if args.summary {
        print_summary(&summary);
    }

    if summary.failed > 0 && settings.failed_output().is_none() {
        warn!("⚠️ {} records failed and were not saved; pass --failed to keep them", summary.failed);
    }

    if settings.strict() && summary.failed > 0 {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary) {
    let duration_secs = summary.elapsed.as_secs_f64();
    let file_size_mb = summary.bytes as f64 / (1024.0 * 1024.0);

    eprintln!("\n=== RUN SUMMARY ===");
    eprintln!("Started at: {}", summary.started_at.to_rfc3339());
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Records: {}", summary.total);
    eprintln!("Normalized: {}", summary.normalized);
    eprintln!("Failed: {}", summary.failed);
    eprintln!("  UNPARSEABLE: {}", summary.unparseable);
    eprintln!("  OUT_OF_RANGE: {}", summary.out_of_range);
    eprintln!("Rejected lines: {}", summary.rejected_lines);
    eprintln!("Processing time: {:.3}s", duration_secs);
    if duration_secs > 0.0 {
        eprintln!("Throughput: {:.0} records/s", summary.total as f64 / duration_secs);
    }
    if summary.total > 0 {
        eprintln!(
            "Success rate: {:.1}%",
            (summary.normalized as f64 / summary.total as f64) * 100.0
        );
    }
}
