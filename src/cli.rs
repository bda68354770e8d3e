//! Command-line interface parsing for cachedfetch
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a validated `StartupConfig` for the binary.

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Url;
use thiserror::Error;

use crate::store::StoreOptions;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The base URL could not be parsed
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The default TTL was zero
    #[error("TTL must be greater than zero")]
    ZeroTtl,

    /// At least one fetch is required
    #[error("Repeat count must be at least 1")]
    ZeroRepeat,
}

/// cachedfetch - Fetch backend resources through an in-memory TTL cache
#[derive(Parser, Debug)]
#[command(name = "cachedfetch")]
#[command(about = "Fetch backend resources through an in-memory TTL cache")]
#[command(version)]
pub struct Cli {
    /// Base URL of the backend API
    #[arg(long, env = "CACHEDFETCH_BASE_URL", default_value = "http://localhost:8080/api")]
    pub base_url: String,

    /// Default cache TTL in seconds
    #[arg(long, env = "CACHEDFETCH_TTL_SECS", default_value_t = 300)]
    pub ttl_secs: u64,

    /// Number of times to fetch through the same cache
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Force every fetch to call the backend (still writes the cache)
    #[arg(long)]
    pub refresh: bool,

    /// Bypass the cache entirely
    #[arg(long)]
    pub skip_cache: bool,

    /// Print cache stats after the command completes
    #[arg(long)]
    pub stats: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Resource to operate on
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every tercero
    Terceros,
    /// Show one tercero
    Tercero {
        /// Tercero id
        id: u64,
    },
    /// List the entries of a catalog
    Catalog {
        /// Catalog name (e.g. "paises")
        name: String,
    },
    /// Delete a tercero and invalidate cached terceros
    DeleteTercero {
        /// Tercero id
        id: u64,
    },
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Base URL of the backend API
    pub base_url: Url,
    /// Default cache TTL
    pub default_ttl: Duration,
    /// Whether every fetch is a forced refresh
    pub force_refresh: bool,
    /// Options applied to every fetch
    pub store: StoreOptions,
    /// Number of fetch rounds
    pub repeat: u32,
    /// Default `tracing` filter when RUST_LOG is unset
    pub log_filter: String,
    /// Whether to print cache stats at the end
    pub print_stats: bool,
    /// Command to execute
    pub command: Command,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if the URL is malformed or a count is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let base_url = Url::parse(&cli.base_url).map_err(|e| CliError::InvalidBaseUrl {
            url: cli.base_url.clone(),
            reason: e.to_string(),
        })?;

        if cli.ttl_secs == 0 {
            return Err(CliError::ZeroTtl);
        }
        if cli.repeat == 0 {
            return Err(CliError::ZeroRepeat);
        }

        let log_filter = if cli.verbose {
            "cachedfetch=debug,warn"
        } else {
            "cachedfetch=info,warn"
        };

        Ok(StartupConfig {
            base_url,
            default_ttl: Duration::from_secs(cli.ttl_secs),
            force_refresh: cli.refresh,
            store: StoreOptions {
                skip_cache: cli.skip_cache,
            },
            repeat: cli.repeat,
            log_filter: log_filter.to_string(),
            print_stats: cli.stats,
            command: cli.command.clone(),
        })
    }
}
