//! Local GeoLite2 database adapter.
//!
//! Reads city records straight from the on-disk `.mmdb` file managed by
//! [`DatabaseAssetManager`]. A missing file queues a download and reports
//! [`ProviderError::NotReady`]; a stale file queues a refresh opportunistically
//! and keeps serving the current data.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use tokio::sync::RwLock;

use crate::asset::DatabaseAssetManager;
use crate::config::DEFAULT_LOCALE;
use crate::error_handling::ProviderError;
use crate::models::{LocationParts, LocationRecord};
use crate::providers::{pick_name, LocationProvider};

struct CachedReader {
    reader: Arc<Reader<Vec<u8>>>,
    modified: Option<SystemTime>,
}

/// Adapter that resolves against the local GeoLite2 City database.
pub struct LocalDatabaseProvider {
    assets: Arc<DatabaseAssetManager>,
    locale: String,
    // Open reader, keyed by file modification time so an in-place refresh is
    // picked up on the next lookup.
    reader: RwLock<Option<CachedReader>>,
}

impl LocalDatabaseProvider {
    /// Adapter over `assets` with the configured locale preference.
    pub fn new(assets: Arc<DatabaseAssetManager>, locale: String) -> Self {
        LocalDatabaseProvider {
            assets,
            locale,
            reader: RwLock::new(None),
        }
    }

    fn locales(&self) -> [&str; 2] {
        [self.locale.as_str(), DEFAULT_LOCALE]
    }

    async fn current_reader(&self) -> Result<Arc<Reader<Vec<u8>>>, ProviderError> {
        let path = self.assets.database_path();
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

        {
            let guard = self.reader.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.modified == modified {
                    return Ok(cached.reader.clone());
                }
            }
        }

        let reader = Arc::new(Reader::open_readfile(&path)?);
        let mut guard = self.reader.write().await;
        *guard = Some(CachedReader {
            reader: reader.clone(),
            modified,
        });
        Ok(reader)
    }
}

fn record_from_city(
    ip: IpAddr,
    city: &geoip2::City<'_>,
    locales: &[&str],
) -> Result<LocationRecord, ProviderError> {
    let (latitude, longitude) = match city.location.as_ref() {
        Some(loc) if loc.latitude.is_some() && loc.longitude.is_some() => {
            (loc.latitude.unwrap_or(0.0), loc.longitude.unwrap_or(0.0))
        }
        _ => {
            return Err(ProviderError::Remote(
                "database record missing coordinates".to_string(),
            ))
        }
    };

    let state = city
        .subdivisions
        .as_ref()
        .and_then(|subs| subs.last())
        .and_then(|sub| pick_name(sub.names.as_ref(), locales));

    Ok(LocationRecord {
        ip: ip.to_string(),
        latitude,
        longitude,
        parts: LocationParts {
            city: city
                .city
                .as_ref()
                .and_then(|c| pick_name(c.names.as_ref(), locales)),
            postcode: city
                .postal
                .as_ref()
                .and_then(|p| p.code.map(|c| c.to_string())),
            state,
            country: city
                .country
                .as_ref()
                .and_then(|c| pick_name(c.names.as_ref(), locales)),
        },
    })
}

#[async_trait]
impl LocationProvider for LocalDatabaseProvider {
    async fn resolve(&self, ip: IpAddr) -> Result<LocationRecord, ProviderError> {
        if !self.assets.exists() {
            self.assets.queue_download();
            return Err(ProviderError::NotReady);
        }
        if self.assets.is_stale() {
            // Refresh in the background, keep serving the current file.
            self.assets.queue_download();
        }

        let reader = self.current_reader().await?;
        let city: geoip2::City = reader.lookup(ip).map_err(|err| {
            log::debug!("Local database lookup for {} failed: {}", ip, err);
            ProviderError::Database(err)
        })?;

        record_from_city(ip, &city, &self.locales())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{DownloadJob, DownloadScheduler, DownloadSettings};
    use crate::cache::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct RecordingScheduler {
        scheduled: AtomicUsize,
    }

    impl DownloadScheduler for RecordingScheduler {
        fn schedule(&self, _job: DownloadJob) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn provider_in(dir: &TempDir, scheduler: Arc<RecordingScheduler>) -> LocalDatabaseProvider {
        let assets = Arc::new(DatabaseAssetManager::new(
            dir.path().to_path_buf(),
            Arc::new(MemoryStore::new()),
            scheduler,
            DownloadSettings {
                client: reqwest::Client::new(),
                license_key: Some("key".to_string()),
            },
        ));
        LocalDatabaseProvider::new(assets, "en".to_string())
    }

    #[tokio::test]
    async fn missing_database_is_not_ready_and_queues_one_download() {
        let dir = TempDir::new().unwrap();
        let scheduler = Arc::new(RecordingScheduler {
            scheduled: AtomicUsize::new(0),
        });
        let provider = provider_in(&dir, scheduler.clone());

        let err = provider.resolve("81.2.69.160".parse().unwrap()).await;
        assert!(matches!(err, Err(ProviderError::NotReady)));
        assert_eq!(scheduler.scheduled.load(Ordering::SeqCst), 1);

        // A second attempt while the flag is still set does not enqueue again.
        let err = provider.resolve("81.2.69.160".parse().unwrap()).await;
        assert!(matches!(err, Err(ProviderError::NotReady)));
        assert_eq!(scheduler.scheduled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_database_is_a_database_failure() {
        let dir = TempDir::new().unwrap();
        let scheduler = Arc::new(RecordingScheduler {
            scheduled: AtomicUsize::new(0),
        });
        let provider = provider_in(&dir, scheduler.clone());
        std::fs::write(dir.path().join(crate::config::DB_FILENAME), b"not a database").unwrap();

        let err = provider.resolve("81.2.69.160".parse().unwrap()).await;
        assert!(matches!(err, Err(ProviderError::Database(_))));
        // The file exists and is fresh, so no download was queued.
        assert_eq!(scheduler.scheduled.load(Ordering::SeqCst), 0);
    }
}
