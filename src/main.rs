use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use linkcopy::{engine::sqlite::SqliteConnector, Copier};
use shadow_rs::shadow;
use std::{path::PathBuf, process::ExitCode, time::Duration};
use tracing_subscriber::EnvFilter;

shadow!(build);

#[derive(Parser, Debug)]
#[command(version, long_version = build::CLAP_LONG_VERSION, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy links between SQLite databases, skipping URLs already present
    Copy(CopyArgs),
    /// Print build information
    Version,
}

#[derive(Args, Debug)]
struct CopyArgs {
    /// Absolute path of the source SQLite database
    #[arg(long)]
    copy_from: PathBuf,

    /// Absolute path of the destination SQLite database
    #[arg(long)]
    copy_to: PathBuf,

    /// How long to wait for a locked database, e.g. "5s" or "1m"
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    busy_timeout: Duration,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = format!("{},{}", level, std::env::var("RUST_LOG").unwrap_or_default());
    let enable_color = std::env::var("NO_COLOR").is_err();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_ansi(enable_color)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Copy(args) => {
            tracing::debug!("{:?}", args);
            let copier = Copier::sqlite(SqliteConnector::new(args.busy_timeout));
            let report = copier
                .copy(&args.copy_from, &args.copy_to)
                .context("Failed to copy links")?;
            print!("{}", report);
        }
        Commands::Version => {
            println!("{} {}", build::PROJECT_NAME, build::CLAP_LONG_VERSION);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.verbose);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
