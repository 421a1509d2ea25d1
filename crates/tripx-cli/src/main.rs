//! 🚀 tripx-cli -- the front door. Takes a run time, loads the config, and lets the library
//! ride the bus until the clock (or the disk) says stop.
//!
//! 🎬 *[narrator voice]* "He only wanted to know when the 83 actually got to Main Street..."
//!
//! Exit codes: `0` the run completed, `2` the save directory hit its quota and the run was cut
//! short, `1` anything else went wrong.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tripx::app_config::{CollectionOverrides, load_config_with};
use tripx::collector::{CollectionOutcome, CollectionSummary};
use tripx::progress::{format_duration, format_number};

/// ⏳ The unit `RUN_TIME` is counted in.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeUnit {
    #[value(name = "s")]
    Seconds,
    #[value(name = "m")]
    Minutes,
    #[value(name = "h")]
    Hours,
    #[value(name = "d")]
    Days,
}

impl TimeUnit {
    fn seconds(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }
}

/// 🚌 Collect live trip updates and save where every trip actually went.
#[derive(Debug, Parser)]
#[command(name = "tripx", version)]
struct Args {
    /// How long to collect for, in `--unit`s.
    run_time: u64,
    #[arg(short, long, value_enum, default_value = "s")]
    unit: TimeUnit,
    /// Config file. Defaults to ./tripx.toml when it exists.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory batch files are written to.
    #[arg(short, long)]
    save_path: Option<PathBuf>,
    /// Seconds between the starts of two requests.
    #[arg(short = 'd', long)]
    request_delay: Option<u64>,
    /// Quota for the save directory, in bytes.
    #[arg(short, long)]
    max_storage: Option<u64>,
    /// Finished trips per batch file.
    #[arg(short = 'b', long)]
    max_batch_size: Option<usize>,
}

impl Args {
    fn overrides(&self) -> CollectionOverrides {
        CollectionOverrides {
            run_time_secs: Some(self.run_time.saturating_mul(self.unit.seconds())),
            request_delay_secs: self.request_delay,
            save_path: self.save_path.clone(),
            max_batch_size: self.max_batch_size,
            max_storage_bytes: self.max_storage,
        }
    }

    // -- 🔧 an explicit path must exist; the default is optional
    fn config_file(&self) -> Result<Option<PathBuf>> {
        match &self.config {
            Some(path) => {
                let exists = path.try_exists().context(format!(
                    "💀 Couldn't check whether the config file exists. Was checking here: '{}'",
                    path.display()
                ))?;
                anyhow::ensure!(
                    exists,
                    "💀 Config file '{}' does not exist. If it's a relative path, remember it's \
                     relative to wherever you ran this from.",
                    path.display()
                );
                Ok(Some(path.clone()))
            }
            None => {
                let default = Path::new("tripx.toml");
                Ok(default.is_file().then(|| default.to_path_buf()))
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 📡 RUST_LOG wins; otherwise info, so the per-cycle lines show up
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(summary) => {
            println!("{}", render_summary(&summary));
            match summary.outcome {
                CollectionOutcome::Completed => ExitCode::SUCCESS,
                CollectionOutcome::Aborted { .. } => ExitCode::from(2),
            }
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<CollectionSummary> {
    let config_file = args.config_file()?;
    let app_config = load_config_with(config_file.as_deref(), &args.overrides())
        .context(
            "💀 Couldn't load the configuration. Check the file, the TRIPX_* env vars, and the flags.",
        )?;
    info!(
        "🚌 Collecting for {} into {}",
        format_duration(app_config.collection.run_time()),
        app_config.collection.save_path.display()
    );

    let summary = tripx::run(app_config).await?;
    if let CollectionOutcome::Aborted { .. } = summary.outcome {
        warn!("🚧 Run cut short by the storage quota. Make room, or raise --max-storage.");
    }
    Ok(summary)
}

fn render_summary(summary: &CollectionSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["🏁 Result", ""]);

    let outcome = match summary.outcome {
        CollectionOutcome::Completed => "completed".to_string(),
        CollectionOutcome::Aborted {
            used_bytes,
            max_bytes,
        } => format!(
            "aborted: storage full ({} / {} bytes)",
            format_number(used_bytes),
            format_number(max_bytes)
        ),
    };
    let rows = [
        ("outcome", outcome),
        ("trips finalized", format_number(summary.trips_finalized as u64)),
        ("trips written", format_number(summary.trips_written as u64)),
        ("batch files", format_number(summary.batches_written as u64)),
        ("requests", format_number(summary.requests as u64)),
        ("elapsed", format_duration(summary.elapsed)),
        ("trips discarded", format_number(summary.discarded_trips as u64)),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table
}
