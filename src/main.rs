//! newsbot: binary entrypoint.
//! Parses flags, initializes tracing, and dispatches to one run, the daily
//! scheduler, or the store statistics.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsbot::cli::Cli;
use newsbot::error::Result;
use newsbot::pipeline;

/// Compact stderr logging. `RUST_LOG` wins; otherwise `info`, or `debug`
/// with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,sqlx=warn,hyper=info,reqwest=info"
    } else {
        "info,sqlx=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings = cli.settings();

    if cli.stats {
        let s = pipeline::store_stats(&settings).await?;
        let fmt_ts = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
        };
        println!("Dedup store: {}", settings.db_path.display());
        println!("  total records:    {}", s.total_records);
        println!("  recorded (24h):   {}", s.recorded_last_24h);
        println!("  oldest:           {}", fmt_ts(s.oldest));
        println!("  newest:           {}", fmt_ts(s.newest));
        return Ok(());
    }

    if let Some(at) = cli.schedule.as_deref() {
        let at = pipeline::parse_schedule_time(at)?;
        return pipeline::run_scheduled(&settings, at, cli.dry_run).await;
    }

    pipeline::run_once(&settings, cli.dry_run).await.map(|_| ())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, fatal = e.is_fatal(), "newsbot failed");
            ExitCode::FAILURE
        }
    }
}
