//! s3-mirror CLI
//!
//! Bucket-to-bucket S3 mirroring with server-side copies.

use clap::Parser;
use sm_cli_common::{format_bytes, format_duration, format_number, init_logging};

mod args;
mod progress;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Initialize logging (to stderr, so stdout is clean for output)
    init_logging(args.effective_log_level())?;

    let report = run::execute(args).await?;
    let stats = &report.stats;

    // Report results to stderr
    eprintln!();
    if report.interrupted {
        eprintln!("Mirror interrupted:");
    } else {
        eprintln!("Mirror completed:");
    }
    eprintln!("  Keys listed:     {}", format_number(stats.keys_listed));
    eprintln!("  Objects copied:  {}", format_number(stats.objects_copied));
    eprintln!("  Objects deleted: {}", format_number(stats.objects_deleted));
    eprintln!("  Bytes copied:    {}", format_bytes(stats.bytes_copied));
    eprintln!(
        "  API calls:       {} copy, {} delete, {} move",
        format_number(stats.copy_calls),
        format_number(stats.delete_calls),
        format_number(stats.move_calls)
    );
    eprintln!(
        "  Errors:          {} copy, {} delete",
        stats.copy_errors, stats.delete_errors
    );
    if stats.jobs_rejected > 0 {
        eprintln!("  Dropped (queue full): {}", format_number(stats.jobs_rejected));
    }

    if let Some(duration) = stats.duration().and_then(|d| d.to_std().ok()) {
        eprintln!("  Duration:        {}", format_duration(duration));

        if let Some(ops) = stats.objects_per_second().filter(|ops| *ops > 0.0) {
            eprintln!("  Throughput:      {:.1} objects/sec", ops);
        }
        if let Some(mbps) = stats.copy_throughput_mbps().filter(|m| *m > 0.0) {
            eprintln!("                   {:.1} MB/s copied", mbps);
        }
    }

    if report.interrupted {
        std::process::exit(130);
    }

    if stats.has_errors() {
        std::process::exit(4); // Partial failure
    }

    Ok(())
}
