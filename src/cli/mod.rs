//! # Command Line Interface
//!
//! Runs the service (`serve`), drives single lifecycle operations against
//! the local store, triggers sweeps by hand and manages the database schema.

pub mod database;
pub mod output;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{load_config, AppConfig};
use crate::lifecycle::SweepReport;
use crate::observability::{init_logging, log_config_info};
use crate::scheduler::{run_sweep, SweepKind};
use crate::startup::{build_runtime, serve};
use database::{handle_database_command, DatabaseCommands};
use output::{print_certificate_pair, print_report, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "certkeeper")]
#[command(about = "Lifecycle manager for ACME-issued domain certificates")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "CERTKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the sweep scheduler
    Serve,

    /// Issue and store a certificate for a new domain
    Request {
        domain: String,
        email: String,
    },

    /// Print the stored certificate chain for a domain
    Get {
        domain: String,
    },

    /// Remove the stored certificate for a domain
    Delete {
        domain: String,
    },

    /// Run maintenance sweeps once
    Sweep {
        #[arg(value_enum)]
        which: SweepTarget,
    },

    /// Database management commands
    Database {
        #[command(subcommand)]
        command: DatabaseCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepTarget {
    Renew,
    PurgeExpired,
    PurgeRevoked,
    All,
}

impl SweepTarget {
    fn kinds(self) -> &'static [SweepKind] {
        match self {
            SweepTarget::Renew => &[SweepKind::Renew],
            SweepTarget::PurgeExpired => &[SweepKind::PurgeExpired],
            SweepTarget::PurgeRevoked => &[SweepKind::PurgeRevoked],
            SweepTarget::All => &[SweepKind::Renew, SweepKind::PurgeExpired, SweepKind::PurgeRevoked],
        }
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
        config.validate()?;
    }
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    Ok(config)
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Warning: {}", e);
    }

    match cli.command {
        Commands::Serve => {
            log_config_info(&config);
            serve(config).await?;
        }

        Commands::Request { domain, email } => {
            let runtime = build_runtime(&config).await?;
            runtime.manager.request_certificate(&domain, &email).await?;
            println!("Certificates for domain {} successfully generated", domain);
        }

        Commands::Get { domain } => {
            let runtime = build_runtime(&config).await?;
            let pair = runtime.manager.get_certificate(&domain).await?;
            print_certificate_pair(&domain, &pair, cli.output)?;
        }

        Commands::Delete { domain } => {
            let runtime = build_runtime(&config).await?;
            runtime.manager.delete_certificate(&domain).await?;
            println!("Certificate for domain {} deleted", domain);
        }

        Commands::Sweep { which } => {
            let runtime = build_runtime(&config).await?;
            let mut total = SweepReport::default();
            for kind in which.kinds() {
                let report = run_sweep(&runtime.manager, &config.lifecycle, *kind).await?;
                print_report(kind.as_str(), &report, cli.output)?;
                total.merge(report);
            }
            if which.kinds().len() > 1 {
                print_report("all", &total, cli.output)?;
            }
            if !total.is_clean() {
                bail!("{} domain(s) failed during the sweep", total.failed.len());
            }
        }

        Commands::Database { command } => {
            handle_database_command(command, &config.database).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sweep_target() {
        let cli = Cli::try_parse_from(["certkeeper", "sweep", "purge-expired"]).unwrap();
        match cli.command {
            Commands::Sweep { which } => assert_eq!(which, SweepTarget::PurgeExpired),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_with_global_flags() {
        let cli = Cli::try_parse_from([
            "certkeeper",
            "request",
            "example.com",
            "ops@example.com",
            "--output",
            "json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Request { ref domain, .. } if domain == "example.com"));
    }

    #[test]
    fn test_sweep_all_runs_every_kind() {
        assert_eq!(SweepTarget::All.kinds().len(), 3);
        assert_eq!(SweepTarget::Renew.kinds(), &[SweepKind::Renew]);
    }
}
