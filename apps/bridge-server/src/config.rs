//! CLI argument parsing layered on top of `bridge_core::config::Config`.
//!
//! Precedence is CLI > env > file > built-in default: `Config::load` already
//! applies file-then-env; CLI flags parsed here are applied last.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bridge_core::config::Config;
use clap::Parser;

/// Headless telephony bridge server.
#[derive(Parser, Debug)]
#[command(name = "bridge-server")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "BRIDGE_LOG_LEVEL")]
    pub log_level: log::LevelFilter,

    /// ARI host:port (overrides config file and `ARI_HOST`).
    #[arg(long)]
    pub ari_host: Option<String>,

    /// AudioSocket bind host (overrides config file and `AUDIOSOCKET_HOST`).
    #[arg(long)]
    pub audiosocket_host: Option<String>,

    /// AudioSocket bind port (overrides config file and `AUDIOSOCKET_PORT`).
    #[arg(long)]
    pub audiosocket_port: Option<u16>,

    /// Ambient health endpoint bind address.
    #[arg(long)]
    pub health_bind_addr: Option<String>,
}

impl Args {
    /// Loads `Config` (file > env > default) then applies these CLI flags
    /// on top, so CLI wins over every other source.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config =
            Config::load(self.config.as_deref()).context("failed to load configuration")?;

        if let Some(ref ari_host) = self.ari_host {
            config.ari_host = ari_host.clone();
        }
        if let Some(ref host) = self.audiosocket_host {
            config.audiosocket_host = host.clone();
        }
        if let Some(port) = self.audiosocket_port {
            config.audiosocket_port = port;
        }
        if let Some(ref addr) = self.health_bind_addr {
            config.health_bind_addr = addr.clone();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
