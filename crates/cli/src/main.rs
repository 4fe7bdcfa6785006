//! pgtune CLI
//!
//! A command-line tool for detecting host and container resources and
//! deriving PostgreSQL server parameters from them.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{detect, schema, tune};
use config::{parse_assignments, Settings};
use std::path::PathBuf;
use tuner_lib::observability::init_logging;
use tuner_lib::TunerMetrics;

/// pgtune CLI
#[derive(Parser)]
#[command(name = "pgtune")]
#[command(author, version, about = "Resource-aware PostgreSQL configuration tuner", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/pgtune/config.toml)
    #[arg(long, global = true, env = "PGTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Write Prometheus metrics in text format to this file on exit
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect host and container resources
    Detect,

    /// Calculate tuned parameters
    Tune(TuneArgs),

    /// Print the JSON schema of the tuned parameters
    Schema,
}

#[derive(Args, Debug, Default)]
pub struct TuneArgs {
    /// Memory to tune for, e.g. 16GB (detected if omitted)
    #[arg(long)]
    pub memory: Option<String>,

    /// CPU count to tune for (detected if omitted)
    #[arg(long)]
    pub cpus: Option<u32>,

    /// Operating system family (linux, windows, mac)
    #[arg(long)]
    pub os: Option<String>,

    /// Storage type (ssd, hdd, san)
    #[arg(long)]
    pub disk_type: Option<String>,

    /// PostgreSQL major version
    #[arg(long)]
    pub pg_version: Option<String>,

    /// Workload type (web, oltp, dw, desktop, mixed)
    #[arg(long, short)]
    pub workload: Option<String>,

    /// Connection count, overriding the workload default
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Pin a parameter, e.g. --set work_mem=8MB (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Upper bound for max_connections
    #[arg(long)]
    pub cap_connections: Option<u32>,
}

impl TuneArgs {
    fn into_settings(self) -> Result<Settings> {
        Ok(Settings {
            memory: self.memory,
            cpus: self.cpus,
            os: self.os,
            disk_type: self.disk_type,
            pg_version: self.pg_version,
            workload: self.workload,
            max_connections: self.max_connections,
            cap_connections: self.cap_connections,
            overrides: parse_assignments(&self.set)?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(if cli.verbose { "debug" } else { "warn" }, cli.log_json);

    // Execute command
    match cli.command {
        Commands::Detect => {
            detect::show_resources(cli.format).await?;
        }
        Commands::Tune(args) => {
            let settings = Settings::load(cli.config.as_deref())?.merge(args.into_settings()?);
            tune::run(settings, cli.format).await?;
        }
        Commands::Schema => {
            schema::show_schema(cli.format)?;
        }
    }

    if let Some(path) = &cli.metrics_file {
        std::fs::write(path, TunerMetrics::new().render())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    Ok(())
}
