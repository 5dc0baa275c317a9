//! hardway CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hardway_pki::PkiConfig;
use tracing::debug;

/// hardway - cluster PKI bootstrap
#[derive(Parser, Debug)]
#[command(name = "hardway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (YAML)
    #[arg(long, global = true, env = "HARDWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Certificate directory, overriding the configuration file
    #[arg(long, global = true, env = "HARDWAY_WORKDIR")]
    pub workdir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Load the configuration file (or defaults) and apply overrides
    pub fn load_config(&self) -> Result<PkiConfig> {
        let mut config = match &self.config {
            Some(path) => PkiConfig::from_file(path)?,
            None => PkiConfig::default(),
        };
        if let Some(workdir) = &self.workdir {
            config.workdir = workdir.clone();
        }
        config.validate()?;
        debug!(workdir = %config.workdir.display(), "using configuration");
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issue the certificate authority and every role certificate
    Certs(commands::certs::CertsArgs),
    /// Write kubeconfigs for the control plane components, admin and nodes
    Kubeconfig(commands::kubeconfig::KubeconfigArgs),
    /// Issue certificates, then write kubeconfigs
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Show certificates, partial key pairs and kubeconfigs in the store
    List(commands::list::ListArgs),
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        let config = self.global.load_config()?;
        match self.command {
            Commands::Certs(args) => commands::certs::run(args, &config),
            Commands::Kubeconfig(args) => commands::kubeconfig::run(args, &config),
            Commands::Bootstrap(args) => commands::bootstrap::run(args, &config),
            Commands::List(args) => commands::list::run(args, &config),
        }
    }
}
