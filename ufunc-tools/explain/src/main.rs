//! Ufunc Explain Binary
//!
//! Run with: `ufunc-explain [OPTIONS] <SCENARIO>...`

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use ufunc_dispatch::DispatchConfig;
use ufunc_explain::{explain_file, Outcome, Report};

#[derive(Parser)]
#[command(name = "ufunc-explain")]
#[command(about = "Explain how calls to a ufunc are dispatched")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Scenario files to explain
    #[arg(value_name = "SCENARIO")]
    files: Vec<PathBuf>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Exit with status 1 if any call fails to dispatch
    #[arg(long)]
    check: bool,

    /// Verbose output (promotion decisions are logged at debug level)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default dispatch configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "ufunc_dispatch=debug,ufunc_explain=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    if let Some(Commands::Config) = &cli.command {
        print!("{}", toml::to_string_pretty(&DispatchConfig::default())?);
        return Ok(());
    }

    if cli.files.is_empty() {
        anyhow::bail!("no scenario files given");
    }

    let mut had_errors = false;
    let mut had_failures = false;

    for path in &cli.files {
        debug!("Explaining: {}", path.display());
        match explain_file(path).with_context(|| format!("Failed to explain {}", path.display())) {
            Ok(report) => {
                had_failures |= has_failures(&report);
                print_report(&cli, &report)?;
            }
            Err(e) => {
                error!("{:#}", e);
                had_errors = true;
            }
        }
    }

    if had_errors || (cli.check && had_failures) {
        std::process::exit(1);
    }

    Ok(())
}

fn has_failures(report: &Report) -> bool {
    report
        .calls
        .iter()
        .any(|call| matches!(call.outcome, Outcome::Failed { .. }))
}

fn print_report(cli: &Cli, report: &Report) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
