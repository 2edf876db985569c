//! The asynchronous database download/refresh job.
//!
//! Exactly one job runs at a time, guarded by the `maps_db_updating` flag set
//! in [`super::DatabaseAssetManager::queue_download`]. The job owns the only
//! write path to the database file; lookups only ever read it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use url::form_urlencoded;

use crate::asset::extract::extract_mmdb_from_tar_gz;
use crate::cache::ExpiringStore;
use crate::config::{
    DB_FILENAME, DB_UPDATE_FLAG_KEY, GEOLITE_EDITION, MAXMIND_DOWNLOAD_BASE, MAX_DOWNLOAD_RETRIES,
    MAX_DOWNLOAD_SIZE,
};

/// Shared parameters for download jobs.
#[derive(Clone)]
pub struct DownloadSettings {
    /// HTTP client, constructed once at service startup.
    pub client: reqwest::Client,
    /// GeoLite2 license key. Without one the job fails cleanly and the
    /// database must be provisioned out of band.
    pub license_key: Option<String>,
}

/// One download/refresh attempt for the local geo database.
pub struct DownloadJob {
    storage_dir: PathBuf,
    store: Arc<dyn ExpiringStore>,
    settings: DownloadSettings,
}

impl DownloadJob {
    pub(crate) fn new(
        storage_dir: PathBuf,
        store: Arc<dyn ExpiringStore>,
        settings: DownloadSettings,
    ) -> Self {
        DownloadJob {
            storage_dir,
            store,
            settings,
        }
    }

    /// Runs the job to completion.
    ///
    /// On success the database file has been replaced atomically. On failure
    /// the previous file (or its absence) is left untouched. The pending
    /// flag is cleared on every exit path so staleness checks can retry.
    pub async fn run(self) {
        if let Err(err) = self.refresh().await {
            log::warn!("Geo database download failed: {:#}", err);
        }
        self.store.remove(DB_UPDATE_FLAG_KEY);
    }

    async fn refresh(&self) -> Result<()> {
        let license_key = self
            .settings
            .license_key
            .as_deref()
            .context("no MaxMind license key configured; cannot download GeoLite2 database")?;

        let archive = self.fetch_archive(license_key).await?;
        let mmdb_bytes = extract_mmdb_from_tar_gz(&archive, GEOLITE_EDITION)?;

        // Refuse to install bytes that don't parse as a database.
        maxminddb::Reader::from_source(mmdb_bytes.clone())
            .context("downloaded database failed to parse")?;

        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .with_context(|| format!("failed to create storage dir {:?}", self.storage_dir))?;

        // Write to a sibling temp path and rename, so a concurrent lookup
        // never observes a partially written database.
        let final_path = self.storage_dir.join(DB_FILENAME);
        let staging_path = self.storage_dir.join(format!("{}.part", DB_FILENAME));
        tokio::fs::write(&staging_path, &mmdb_bytes)
            .await
            .with_context(|| format!("failed to write {:?}", staging_path))?;
        tokio::fs::rename(&staging_path, &final_path)
            .await
            .with_context(|| format!("failed to install {:?}", final_path))?;

        log::info!(
            "Installed geo database at {:?} ({} bytes)",
            final_path,
            mmdb_bytes.len()
        );
        Ok(())
    }

    async fn fetch_archive(&self, license_key: &str) -> Result<Vec<u8>> {
        let encoded_key =
            form_urlencoded::byte_serialize(license_key.as_bytes()).collect::<String>();
        let url = format!(
            "{}?edition_id={}&license_key={}&suffix=tar.gz",
            MAXMIND_DOWNLOAD_BASE, GEOLITE_EDITION, encoded_key
        );

        let mut last_error = None;
        for attempt in 1..=MAX_DOWNLOAD_RETRIES {
            match self.fetch_with_size_limit(&url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    last_error = Some(err);
                    if attempt < MAX_DOWNLOAD_RETRIES {
                        log::warn!(
                            "Geo database download attempt {}/{} failed, retrying",
                            attempt,
                            MAX_DOWNLOAD_RETRIES
                        );
                        tokio::time::sleep(Duration::from_secs(2 << (attempt - 1))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!(
                "geo database download failed after {} attempts",
                MAX_DOWNLOAD_RETRIES
            )
        }))
    }

    async fn fetch_with_size_limit(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.settings.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "no error details".to_string());
            return Err(anyhow::anyhow!(
                "download endpoint returned {}: {}",
                status,
                body
            ));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_DOWNLOAD_SIZE as u64 {
                return Err(anyhow::anyhow!(
                    "database archive too large: {} bytes (max {})",
                    content_length,
                    MAX_DOWNLOAD_SIZE
                ));
            }
        }

        let bytes = response.bytes().await?.to_vec();
        // content-length may have been missing or wrong
        if bytes.len() > MAX_DOWNLOAD_SIZE {
            return Err(anyhow::anyhow!(
                "database archive too large: {} bytes (max {})",
                bytes.len(),
                MAX_DOWNLOAD_SIZE
            ));
        }

        Ok(bytes)
    }
}
