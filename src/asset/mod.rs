//! Lifecycle management for the local geo database file.
//!
//! The [`DatabaseAssetManager`] answers "is the database present?" and "is it
//! stale?", and triggers the background download job without ever blocking a
//! lookup. The file itself is written only by [`DownloadJob`]; lookups treat
//! it as read-only.

mod download;
mod extract;

pub use download::{DownloadJob, DownloadSettings};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::cache::ExpiringStore;
use crate::config::{DB_FILENAME, DB_STALE_AFTER, DB_UPDATE_FLAG_KEY, DB_UPDATE_FLAG_TTL};

/// Hands download jobs to an asynchronous runner.
///
/// The production implementation spawns onto the tokio runtime; tests swap in
/// a recorder to observe enqueue counts.
pub trait DownloadScheduler: Send + Sync {
    /// Schedules `job` to run in the background and returns immediately.
    fn schedule(&self, job: DownloadJob);
}

/// Scheduler that spawns jobs as tokio tasks.
pub struct TokioScheduler;

impl DownloadScheduler for TokioScheduler {
    fn schedule(&self, job: DownloadJob) {
        tokio::spawn(job.run());
    }
}

/// Manages existence, staleness, and refresh of the local geo database.
pub struct DatabaseAssetManager {
    storage_dir: PathBuf,
    store: Arc<dyn ExpiringStore>,
    scheduler: Arc<dyn DownloadScheduler>,
    settings: DownloadSettings,
    stale_after: Duration,
}

impl DatabaseAssetManager {
    /// Manager with the standard 7-day staleness window.
    pub fn new(
        storage_dir: PathBuf,
        store: Arc<dyn ExpiringStore>,
        scheduler: Arc<dyn DownloadScheduler>,
        settings: DownloadSettings,
    ) -> Self {
        Self::with_stale_after(storage_dir, store, scheduler, settings, DB_STALE_AFTER)
    }

    /// Manager with a custom staleness window (tests).
    pub fn with_stale_after(
        storage_dir: PathBuf,
        store: Arc<dyn ExpiringStore>,
        scheduler: Arc<dyn DownloadScheduler>,
        settings: DownloadSettings,
        stale_after: Duration,
    ) -> Self {
        DatabaseAssetManager {
            storage_dir,
            store,
            scheduler,
            settings,
            stale_after,
        }
    }

    /// Path of the database file inside the storage directory.
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(DB_FILENAME)
    }

    /// Whether the database file is present.
    pub fn exists(&self) -> bool {
        self.database_path().is_file()
    }

    /// Whether the database file is older than the staleness window.
    ///
    /// Unreadable metadata (missing file, fs error) counts as not-stale; a
    /// metadata failure must never force a download.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(SystemTime::now())
    }

    fn is_stale_at(&self, now: SystemTime) -> bool {
        let modified = match Self::modified_time(&self.database_path()) {
            Some(t) => t,
            None => return false,
        };
        match now.duration_since(modified) {
            Ok(age) => age > self.stale_after,
            // modification time in the future; leave it alone
            Err(_) => false,
        }
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    /// Triggers a background download/refresh unless one is already pending.
    ///
    /// The `maps_db_updating` flag is checked-and-set atomically, so
    /// concurrent callers enqueue at most one job. The job clears the flag
    /// on completion or failure; the flag's own TTL guards against a killed
    /// process leaving it set forever.
    pub fn queue_download(&self) {
        if !self
            .store
            .put_if_absent(DB_UPDATE_FLAG_KEY, "1".to_string(), DB_UPDATE_FLAG_TTL)
        {
            log::debug!("Geo database refresh already pending, not enqueueing");
            return;
        }

        log::info!("Queueing geo database download to {:?}", self.database_path());
        let job = DownloadJob::new(
            self.storage_dir.clone(),
            self.store.clone(),
            self.settings.clone(),
        );
        self.scheduler.schedule(job);
    }
}
