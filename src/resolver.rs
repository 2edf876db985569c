//! Lookup orchestration: validation, cache, provider dispatch, cache store.

use std::sync::Arc;

use crate::asset::{DatabaseAssetManager, DownloadSettings, TokioScheduler};
use crate::cache::{ExpiringStore, LocationCache};
use crate::config::{GeoConfig, ServiceConfig};
use crate::error_handling::{GeoError, ProviderError};
use crate::ip::validate_public_ip;
use crate::models::LocationRecord;
use crate::providers::{
    IpStackProvider, LocalDatabaseProvider, LocationProvider, MaxMindProvider,
};

/// Outcome of a lookup that did not hit a hard precondition failure.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A location was resolved (freshly or from cache).
    Found(LocationRecord),
    /// No location is available: invalid input, disabled service, or a
    /// recoverable provider failure. The caller renders nothing.
    Absent,
    /// The local database is missing and a download was just queued. The
    /// caller may surface a retry-later hint instead of an empty result.
    NotReady,
}

/// Resolves IP addresses to locations through the configured provider, with
/// caching in front.
///
/// Holds the single active provider adapter, chosen once at construction;
/// there is no per-call branching on configuration strings.
pub struct Resolver {
    cache: LocationCache,
    provider: Option<Box<dyn LocationProvider>>,
    licensed: bool,
}

impl Resolver {
    /// Resolver over an explicit provider. `provider` of `None` is the
    /// disabled mode: every lookup yields [`LookupOutcome::Absent`].
    pub fn new(
        cache: LocationCache,
        provider: Option<Box<dyn LocationProvider>>,
        licensed: bool,
    ) -> Self {
        Resolver {
            cache,
            provider,
            licensed,
        }
    }

    /// Builds the resolver for a host configuration.
    ///
    /// `client` is the shared HTTP client (constructed once at startup, with
    /// its request timeout); `store` is the host's expiring key-value store,
    /// used for both cached locations and the download-pending flag.
    pub fn from_config(
        config: &GeoConfig,
        client: reqwest::Client,
        store: Arc<dyn ExpiringStore>,
    ) -> Self {
        let cache = LocationCache::new(store.clone());
        let provider: Option<Box<dyn LocationProvider>> = match &config.service {
            ServiceConfig::None => None,
            ServiceConfig::IpStack { access_key } => Some(Box::new(IpStackProvider::new(
                client,
                access_key.clone(),
                config.locale.clone(),
            ))),
            ServiceConfig::MaxMind {
                account_id,
                license_key,
            } => Some(Box::new(MaxMindProvider::new(
                client,
                account_id.clone(),
                license_key.clone(),
                config.locale.clone(),
            ))),
            ServiceConfig::MaxMindLite { license_key } => {
                let assets = Arc::new(DatabaseAssetManager::new(
                    config.storage_dir.clone(),
                    store,
                    Arc::new(TokioScheduler),
                    DownloadSettings {
                        client,
                        license_key: license_key.clone(),
                    },
                ));
                Some(Box::new(LocalDatabaseProvider::new(
                    assets,
                    config.locale.clone(),
                )))
            }
        };

        Resolver::new(cache, provider, config.edition_has_geolocation)
    }

    /// Resolves `ip` to a location.
    ///
    /// Invalid input and recoverable provider failures degrade to
    /// [`LookupOutcome::Absent`]; only the licensing precondition is an
    /// error. Failures are never cached, so the next request retries.
    pub async fn lookup(&self, ip: &str) -> Result<LookupOutcome, GeoError> {
        if !self.licensed {
            return Err(GeoError::NotLicensed);
        }

        let addr = match validate_public_ip(ip) {
            Some(addr) => addr,
            None => {
                log::debug!("Rejecting non-public or malformed IP {:?}", ip);
                return Ok(LookupOutcome::Absent);
            }
        };

        // Cache under the canonical address text, matching the key the
        // providers store under, so non-canonical input still hits.
        let canonical = addr.to_string();
        if let Some(cached) = self.cache.get(&canonical) {
            return Ok(LookupOutcome::Found(cached));
        }

        let provider = match &self.provider {
            Some(provider) => provider,
            None => return Ok(LookupOutcome::Absent),
        };

        match provider.resolve(addr).await {
            Ok(record) => {
                self.cache.put(&record);
                Ok(LookupOutcome::Found(record))
            }
            Err(ProviderError::NotReady) => Ok(LookupOutcome::NotReady),
            Err(err) => {
                log::warn!("Location lookup for {} failed: {}", ip, err);
                Ok(LookupOutcome::Absent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::LocationParts;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sample_record(ip: &str) -> LocationRecord {
        LocationRecord {
            ip: ip.to_string(),
            latitude: 51.45,
            longitude: -2.58,
            parts: LocationParts {
                city: Some("Bristol".to_string()),
                postcode: None,
                state: None,
                country: Some("UK".to_string()),
            },
        }
    }

    enum MockBehavior {
        Succeed,
        Fail,
        NotReady,
    }

    struct MockProvider {
        calls: Arc<AtomicUsize>,
        behavior: MockBehavior,
    }

    #[async_trait]
    impl LocationProvider for MockProvider {
        async fn resolve(&self, ip: IpAddr) -> Result<LocationRecord, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                MockBehavior::Succeed => Ok(sample_record(&ip.to_string())),
                MockBehavior::Fail => {
                    Err(ProviderError::Remote("temporary outage".to_string()))
                }
                MockBehavior::NotReady => Err(ProviderError::NotReady),
            }
        }
    }

    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
    }

    impl crate::cache::ExpiringStore for CountingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
        fn put(&self, key: &str, value: String, ttl: Duration) {
            self.inner.put(key, value, ttl)
        }
        fn put_if_absent(&self, key: &str, value: String, ttl: Duration) -> bool {
            self.inner.put_if_absent(key, value, ttl)
        }
        fn remove(&self, key: &str) {
            self.inner.remove(key)
        }
    }

    fn resolver_with(behavior: MockBehavior) -> (Resolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = MockProvider {
            calls: calls.clone(),
            behavior,
        };
        let cache = LocationCache::new(Arc::new(MemoryStore::new()));
        (Resolver::new(cache, Some(Box::new(provider)), true), calls)
    }

    #[tokio::test]
    async fn private_ip_is_absent_without_touching_cache_or_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            gets: AtomicUsize::new(0),
        });
        let cache = LocationCache::new(store.clone());
        let provider = MockProvider {
            calls: calls.clone(),
            behavior: MockBehavior::Succeed,
        };
        let resolver = Resolver::new(cache, Some(Box::new(provider)), true);

        let outcome = resolver.lookup("192.168.1.1").await.unwrap();
        assert_eq!(outcome, LookupOutcome::Absent);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let (resolver, calls) = resolver_with(MockBehavior::Succeed);

        let first = resolver.lookup("81.2.69.160").await.unwrap();
        let second = resolver.lookup("81.2.69.160").await.unwrap();

        assert_eq!(first, second);
        assert!(matches!(first, LookupOutcome::Found(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_canonical_ip_text_still_hits_the_cache() {
        let (resolver, calls) = resolver_with(MockBehavior::Succeed);

        // Zero-padded IPv6 spelling; the canonical form is 2606:4700:4700::1111.
        let first = resolver.lookup("2606:4700:4700:0000::1111").await.unwrap();
        let second = resolver.lookup("2606:4700:4700:0000::1111").await.unwrap();

        assert!(matches!(first, LookupOutcome::Found(_)));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The canonical spelling hits the same entry.
        let third = resolver.lookup("2606:4700:4700::1111").await.unwrap();
        assert_eq!(third, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_seeded_cache_short_circuits_the_provider() {
        let (resolver, calls) = resolver_with(MockBehavior::Succeed);
        resolver.cache.put(&sample_record("81.2.69.160"));

        let outcome = resolver.lookup("81.2.69.160").await.unwrap();
        assert_eq!(outcome, LookupOutcome::Found(sample_record("81.2.69.160")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_absent_and_not_cached() {
        let (resolver, calls) = resolver_with(MockBehavior::Fail);

        assert_eq!(
            resolver.lookup("81.2.69.160").await.unwrap(),
            LookupOutcome::Absent
        );
        assert_eq!(
            resolver.lookup("81.2.69.160").await.unwrap(),
            LookupOutcome::Absent
        );
        // Both requests reached the provider: the failure was not cached.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_ready_is_surfaced_distinctly() {
        let (resolver, _) = resolver_with(MockBehavior::NotReady);
        assert_eq!(
            resolver.lookup("81.2.69.160").await.unwrap(),
            LookupOutcome::NotReady
        );
    }

    #[tokio::test]
    async fn disabled_service_is_always_absent() {
        let cache = LocationCache::new(Arc::new(MemoryStore::new()));
        let resolver = Resolver::new(cache, None, true);
        assert_eq!(
            resolver.lookup("81.2.69.160").await.unwrap(),
            LookupOutcome::Absent
        );
    }

    #[tokio::test]
    async fn unlicensed_edition_is_a_hard_error() {
        let (resolver, calls) = {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = MockProvider {
                calls: calls.clone(),
                behavior: MockBehavior::Succeed,
            };
            let cache = LocationCache::new(Arc::new(MemoryStore::new()));
            (Resolver::new(cache, Some(Box::new(provider)), false), calls)
        };

        assert!(matches!(
            resolver.lookup("81.2.69.160").await,
            Err(GeoError::NotLicensed)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_input_is_absent_not_an_error() {
        let (resolver, calls) = resolver_with(MockBehavior::Succeed);
        assert_eq!(
            resolver.lookup("not.an.ip").await.unwrap(),
            LookupOutcome::Absent
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
