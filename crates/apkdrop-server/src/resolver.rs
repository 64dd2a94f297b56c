//! Latest-APK resolution.
//!
//! The published config wins when it points at a file that still exists;
//! otherwise the newest `*.apk` in the storage directory is served. Nothing
//! is cached, so every call re-reads the config and re-stats the files.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Local, SecondsFormat};
use tracing::{debug, warn};

use apkdrop_shared::constants::DEFAULT_RELEASE_NOTES;
use apkdrop_shared::version::version_or_default;

use crate::store::{DataStore, StoredFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApkSource {
    /// Named by `apk_config.json`.
    Config,
    /// Newest file found by scanning the storage directory.
    Scan,
}

#[derive(Debug, Clone)]
pub struct ApkInfo {
    pub path: PathBuf,
    pub filename: String,
    pub version: String,
    /// Size on disk at resolution time.
    pub size: u64,
    pub modified: SystemTime,
    pub last_updated: String,
    pub release_notes: String,
    pub source: ApkSource,
}

/// RFC 3339 local timestamp, second precision.
pub fn iso8601(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Resolve the APK to serve, or `None` when there is nothing to serve.
pub async fn resolve_latest(store: &DataStore) -> Option<ApkInfo> {
    if let Some(info) = from_config(store).await {
        return Some(info);
    }
    from_scan(store).await
}

async fn from_config(store: &DataStore) -> Option<ApkInfo> {
    let config = match store.apk_config.load().await {
        Ok(Some(config)) => config,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "Unreadable APK config, falling back to directory scan");
            return None;
        }
    };

    let filename = config.file_path.as_deref()?;
    let path = match store.apk_path(filename) {
        Ok(path) => path,
        Err(e) => {
            warn!(file = %filename, error = %e, "APK config names an invalid file");
            return None;
        }
    };

    let Some(file) = store.stat(&path).await else {
        debug!(file = %filename, "APK config points at a missing file, scanning instead");
        return None;
    };

    Some(ApkInfo {
        version: config.version().to_string(),
        last_updated: config
            .last_updated
            .clone()
            .unwrap_or_else(|| iso8601(file.modified)),
        release_notes: config
            .release_notes
            .clone()
            .unwrap_or_else(|| DEFAULT_RELEASE_NOTES.to_string()),
        filename: filename.to_string(),
        path: file.path,
        size: file.size,
        modified: file.modified,
        source: ApkSource::Config,
    })
}

async fn from_scan(store: &DataStore) -> Option<ApkInfo> {
    let mut files = store.list_apks().await;
    sort_newest_first(&mut files);
    let newest = files.into_iter().next()?;

    Some(ApkInfo {
        version: version_or_default(&newest.filename),
        last_updated: iso8601(newest.modified),
        release_notes: DEFAULT_RELEASE_NOTES.to_string(),
        filename: newest.filename,
        path: newest.path,
        size: newest.size,
        modified: newest.modified,
        source: ApkSource::Scan,
    })
}

/// Newest modification time first; equal times fall back to name order,
/// highest first.
pub fn sort_newest_first(files: &mut [StoredFile]) {
    files.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.filename.cmp(&a.filename))
    });
}
