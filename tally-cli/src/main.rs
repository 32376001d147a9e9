use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tally_core::TracingSink;
use tally_ingest::{Detector, Registry, parse_paths_concurrent};

mod config;
mod output;
mod scan;
mod state;

use output::Format;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Normalize bank transaction exports")]
struct Cli {
    /// Config file (default: ~/.tally/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity: none = warn, -v = info, -vv = debug
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    Init,

    /// List registered handlers and the columns they read
    Handlers,

    /// Detect and parse every export under a directory
    Parse {
        /// Directory of exported debit / credit history
        #[arg(long)]
        dir: PathBuf,

        /// Only sub-directories whose name starts with one of these
        #[arg(long, num_args = 1..)]
        filter: Vec<String>,

        /// Descend into nested sub-directories
        #[arg(long)]
        recursive: bool,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Parallel file workers (default from config)
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_detector(cfg: &config::Config) -> Result<Detector> {
    let registry = Registry::with_builtin(&cfg.handlers(), Arc::new(TracingSink))
        .context("build handler registry")?;
    Ok(Detector::new(
        Arc::new(registry),
        Arc::new(cfg.classifier()?),
        cfg.probe_limits(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!("arguments: {cli:?}");

    match cli.command {
        Command::Init => {
            config::init_config(cli.config.as_deref())?;
        }

        Command::Handlers => {
            let cfg = config::load_config(cli.config.as_deref())?;
            let detector = build_detector(&cfg)?;
            for (institution, columns) in detector.registry().describe() {
                println!("{institution}: {}", columns.join(", "));
            }
        }

        Command::Parse {
            dir,
            filter,
            recursive,
            format,
            workers,
        } => {
            if !dir.is_dir() {
                bail!("not a directory: {} (pass --dir <path>)", dir.display());
            }
            let cfg = config::load_config(cli.config.as_deref())?;
            let detector = build_detector(&cfg)?;
            for (institution, columns) in detector.registry().describe() {
                tracing::info!("{institution} reads columns: {columns:?}");
            }

            let paths = scan::collect_paths(&dir, &filter, recursive)?;
            tracing::info!("{} files under {}", paths.len(), dir.display());

            let workers = workers.unwrap_or(cfg.batch.workers);
            let report = parse_paths_concurrent(paths, &detector, workers).await?;

            output::write_report(&report, format, io::stdout().lock())?;

            let faults = report.configuration_faults();
            if !faults.is_empty() {
                for (path, err) in &faults {
                    tracing::error!("{}: {err}", path.display());
                }
                bail!("{} file(s) matched more than one handler", faults.len());
            }
        }
    }

    Ok(())
}
