//! In-memory cache for API responses
//!
//! This module provides a key-addressed cache with time-based expiry. Entries
//! expire after the TTL they were written with, or after the cache default
//! under `TtlPolicy::Global`, and are dropped the next time they are read.
//! Families of keys can be invalidated by regex, prefix, or arbitrary
//! predicate after a mutation.

mod ttl;

pub use ttl::{CacheConfig, CacheError, CacheStats, EntryInfo, TtlCache, TtlPolicy, DEFAULT_TTL};
