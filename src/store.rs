//! Cached access to backend resources
//!
//! `DataStore` hands out [`CachedFetch`] handles under namespaced cache keys
//! and invalidates the affected key families after every successful mutation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::api::{ApiClient, ApiError, CatalogItem, NewTercero, Tercero};
use crate::cache::TtlCache;
use crate::fetch::{producer, CachedFetch, FetchOptions};

/// Prefix shared by every tercero cache key
pub const TERCEROS_PREFIX: &str = "terceros:";

/// Prefix shared by every catalog cache key
pub const CATALOGOS_PREFIX: &str = "catalogos:";

const TERCEROS_TTL: Duration = Duration::from_secs(10 * 60);

const CATALOGOS_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache key for the full terceros list
pub fn terceros_list_key() -> String {
    format!("{}list", TERCEROS_PREFIX)
}

/// Cache key for a single tercero
pub fn tercero_key(id: u64) -> String {
    format!("{}{}", TERCEROS_PREFIX, id)
}

/// Cache key for a catalog
pub fn catalog_key(name: &str) -> String {
    format!("{}{}", CATALOGOS_PREFIX, name)
}

/// Behaviour applied to every fetch handed out by a store
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Bypass the cache entirely
    pub skip_cache: bool,
}

/// Entry point for views: cached reads and invalidating writes
#[derive(Debug, Clone)]
pub struct DataStore {
    client: ApiClient,
    cache: Arc<TtlCache>,
    options: StoreOptions,
}

impl DataStore {
    pub fn new(client: ApiClient, cache: Arc<TtlCache>) -> Self {
        Self::with_options(client, cache, StoreOptions::default())
    }

    pub fn with_options(client: ApiClient, cache: Arc<TtlCache>, options: StoreOptions) -> Self {
        Self {
            client,
            cache,
            options,
        }
    }

    /// Returns the shared cache
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    fn fetch_options(&self, ttl: Duration) -> FetchOptions {
        FetchOptions {
            ttl: Some(ttl),
            skip_cache: self.options.skip_cache,
        }
    }

    /// Cached list of every tercero
    pub fn terceros(&self) -> CachedFetch<Vec<Tercero>> {
        let client = self.client.clone();
        CachedFetch::new(
            Arc::clone(&self.cache),
            terceros_list_key(),
            producer(move || {
                let client = client.clone();
                async move { client.list_terceros().await }
            }),
            self.fetch_options(TERCEROS_TTL),
        )
    }

    /// Cached single tercero
    pub fn tercero(&self, id: u64) -> CachedFetch<Tercero> {
        let client = self.client.clone();
        CachedFetch::new(
            Arc::clone(&self.cache),
            tercero_key(id),
            producer(move || {
                let client = client.clone();
                async move { client.get_tercero(id).await }
            }),
            self.fetch_options(TERCEROS_TTL),
        )
    }

    /// Cached catalog
    pub fn catalog(&self, name: &str) -> CachedFetch<Vec<CatalogItem>> {
        let client = self.client.clone();
        let catalog = name.to_string();
        CachedFetch::new(
            Arc::clone(&self.cache),
            catalog_key(name),
            producer(move || {
                let client = client.clone();
                let catalog = catalog.clone();
                async move { client.list_catalog(&catalog).await }
            }),
            self.fetch_options(CATALOGOS_TTL),
        )
    }

    pub async fn create_tercero(&self, tercero: &NewTercero) -> Result<Tercero, ApiError> {
        let created = self.client.create_tercero(tercero).await?;
        self.invalidate_terceros();
        Ok(created)
    }

    pub async fn update_tercero(&self, id: u64, tercero: &NewTercero) -> Result<Tercero, ApiError> {
        let updated = self.client.update_tercero(id, tercero).await?;
        self.invalidate_terceros();
        Ok(updated)
    }

    pub async fn delete_tercero(&self, id: u64) -> Result<(), ApiError> {
        self.client.delete_tercero(id).await?;
        self.invalidate_terceros();
        Ok(())
    }

    /// Drops every cached tercero so the next read refetches
    pub fn invalidate_terceros(&self) -> usize {
        let removed = self.cache.invalidate_prefix(TERCEROS_PREFIX);
        debug!(removed, "invalidated terceros");
        removed
    }

    /// Drops every cached catalog so the next read refetches
    pub fn invalidate_catalogs(&self) -> usize {
        let removed = self.cache.invalidate_prefix(CATALOGOS_PREFIX);
        debug!(removed, "invalidated catalogos");
        removed
    }
}
