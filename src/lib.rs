//! cachedfetch library
//!
//! Client-side data access: a shared TTL cache, cached fetch state for views,
//! and typed wrappers over the backend REST API.

pub mod api;
pub mod cache;
pub mod cli;
pub mod fetch;
pub mod store;

pub use cache::{CacheConfig, CacheError, CacheStats, TtlCache, TtlPolicy};
pub use fetch::{producer, CachedFetch, FetchOptions, FetchState, Producer};
pub use store::DataStore;
