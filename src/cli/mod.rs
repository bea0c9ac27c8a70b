//! CLI interface for the provisioner.

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::Stage;

pub use commands::*;
pub use utils::*;

#[derive(Parser)]
#[command(name = "chroma-provisioner")]
#[command(about = "Provision a single-node Chroma vector database with Docker, OpenTelemetry and systemd")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path (TOML format)
    #[arg(long, global = true, env = "CHROMA_PROVISION_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the provisioning pipeline on this host
    Provision {
        /// Print every command and file write instead of executing it
        #[arg(long)]
        dry_run: bool,

        /// Run only these stages (repeatable); stages always run in pipeline order
        #[arg(long = "stage", value_enum)]
        stages: Vec<Stage>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write the compose file, collector config and unit file to a local directory
    Render {
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
    },

    /// Initialize default configuration at default location
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Inspect configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long)]
        validate: bool,

        /// Treat validation warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        match self.command {
            Commands::Provision {
                dry_run,
                stages,
                report,
            } => provision(config, dry_run, stages, report).await,

            Commands::Render { output } => render(config, output).await,
            Commands::Init { force } => init(force).await,
            Commands::Config {
                show,
                validate,
                strict,
            } => config_command(config, show, validate, strict).await,

            Commands::Version => version().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision_stages() {
        let cli = Cli::try_parse_from([
            "chroma-provisioner",
            "provision",
            "--dry-run",
            "--stage",
            "artifacts",
            "--stage",
            "service",
        ])
        .unwrap();

        match cli.command {
            Commands::Provision { dry_run, stages, report } => {
                assert!(dry_run);
                assert_eq!(stages, vec![Stage::Artifacts, Stage::Service]);
                assert!(report.is_none());
            }
            _ => panic!("Expected provision command"),
        }
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!(Cli::try_parse_from(["chroma-provisioner", "provision", "--stage", "backup"]).is_err());
    }
}
