//! Expiring key-value storage and the location cache built on top of it.
//!
//! The host CMS normally supplies its own expiring store (Redis, the
//! framework cache, ...); the core only needs get/put/ttl semantics, captured
//! by [`ExpiringStore`]. [`MemoryStore`] is the in-process default used by
//! the CLI and the tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::{sync::Cache, Expiry};

use crate::config::{LOCATION_CACHE_KEY_PREFIX, LOCATION_CACHE_TTL};
use crate::models::LocationRecord;

/// An expiring string key-value store, supplied by the host.
///
/// Implementations must be safe to share across tasks. `put_if_absent` must
/// be atomic per key; it exists solely for the download-pending flag.
pub trait ExpiringStore: Send + Sync {
    /// Returns the live value under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`. Overwriting replaces the value
    /// and resets the expiry.
    fn put(&self, key: &str, value: String, ttl: Duration);

    /// Stores `value` only if `key` holds no live entry. Returns true when
    /// the value was freshly stored.
    fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> bool;

    /// Removes any entry under `key`.
    fn remove(&self, key: &str);
}

#[derive(Clone)]
struct StoreEntry {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, StoreEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &StoreEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    // Overwriting an entry resets its expiry.
    fn expire_after_update(
        &self,
        _key: &String,
        entry: &StoreEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process [`ExpiringStore`] backed by a moka cache with per-entry TTLs,
/// so 60-day location records and short-lived flags share one store.
pub struct MemoryStore {
    cache: Cache<String, StoreEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            cache: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        self.cache.insert(key.to_string(), StoreEntry { value, ttl });
    }

    fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> bool {
        self.cache
            .entry(key.to_string())
            .or_insert(StoreEntry { value, ttl })
            .is_fresh()
    }

    fn remove(&self, key: &str) {
        self.cache.invalidate(key);
    }
}

/// Maps IP addresses to previously resolved [`LocationRecord`]s.
///
/// Records are stored as JSON under `maps_ip_<ip>` with a fixed TTL. There is
/// no delete path; the store evicts entries on expiry.
pub struct LocationCache {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
}

impl LocationCache {
    /// Cache with the standard 60-day TTL.
    pub fn new(store: Arc<dyn ExpiringStore>) -> Self {
        Self::with_ttl(store, LOCATION_CACHE_TTL)
    }

    /// Cache with a custom TTL. Not part of the host-facing configuration
    /// surface; used by tests and embedders with unusual needs.
    pub fn with_ttl(store: Arc<dyn ExpiringStore>, ttl: Duration) -> Self {
        LocationCache { store, ttl }
    }

    fn key(ip: &str) -> String {
        format!("{}{}", LOCATION_CACHE_KEY_PREFIX, ip)
    }

    /// Returns the cached record for `ip`, if one is live. An undecodable
    /// cached value is treated as a miss.
    pub fn get(&self, ip: &str) -> Option<LocationRecord> {
        let raw = self.store.get(&Self::key(ip))?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("Discarding undecodable cached location for {}: {}", ip, err);
                None
            }
        }
    }

    /// Stores `record` under the key derived from its IP.
    pub fn put(&self, record: &LocationRecord) {
        match serde_json::to_string(record) {
            Ok(json) => self.store.put(&Self::key(&record.ip), json, self.ttl),
            Err(err) => log::warn!("Failed to encode location for {}: {}", record.ip, err),
        }
    }
}
