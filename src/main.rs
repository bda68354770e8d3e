//! cachedfetch - Fetch backend resources through an in-memory TTL cache
//!
//! Each fetch prints its JSON result to stdout; logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cachedfetch::api::ApiClient;
use cachedfetch::cli::{Cli, Command, StartupConfig};
use cachedfetch::{CacheConfig, CachedFetch, DataStore, FetchState, TtlCache};

/// Installs the stderr log subscriber; RUST_LOG overrides the CLI default
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the configured number of fetch rounds and prints each result
///
/// Returns whether every round ended in `Ready`.
async fn run_fetch<T>(
    fetch: CachedFetch<T>,
    config: &StartupConfig,
) -> Result<bool, serde_json::Error>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let mut all_ready = true;

    for round in 1..=config.repeat {
        if config.force_refresh {
            fetch.refresh().await;
        } else {
            fetch.load().await;
        }

        match fetch.state() {
            FetchState::Ready(data) => println!("{}", serde_json::to_string_pretty(&data)?),
            FetchState::Failed(e) => {
                error!(round, key = %fetch.key(), error = %e, "fetch failed");
                all_ready = false;
            }
            FetchState::Loading => {}
        }
    }

    Ok(all_ready)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    init_tracing(&config.log_filter);

    let cache = Arc::new(TtlCache::new(CacheConfig {
        default_ttl: config.default_ttl,
        ..CacheConfig::default()
    }));
    let client = ApiClient::new(config.base_url.clone());
    let store = DataStore::with_options(client, Arc::clone(&cache), config.store);

    let succeeded = match &config.command {
        Command::Terceros => run_fetch(store.terceros(), &config).await?,
        Command::Tercero { id } => run_fetch(store.tercero(*id), &config).await?,
        Command::Catalog { name } => run_fetch(store.catalog(name), &config).await?,
        Command::DeleteTercero { id } => match store.delete_tercero(*id).await {
            Ok(()) => {
                info!(id, "deleted tercero");
                true
            }
            Err(e) => {
                error!(id, error = %e, "delete failed");
                false
            }
        },
    };

    if config.print_stats {
        println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    }

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
