//! On-disk state: the JSON documents, the storage directories, and the two
//! append-only logs, all rooted at one data directory.
//!
//! JSON documents are replaced wholesale on every save with no locking, so
//! two concurrent writers race and the last one wins.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use apkdrop_shared::types::{ApkConfig, PasswordConfig, SiteSettings, VideoRecord};

use crate::config::is_plain_token;
use crate::error::PortalError;
use crate::logs::{AuditLog, DownloadLog};

/// Resolve `name` under `base`, rejecting anything that is not a single
/// plain filename.
fn ensure_within(base: &Path, name: &str) -> Result<PathBuf, PortalError> {
    if !is_plain_token(name) {
        return Err(PortalError::Validation(format!("Invalid filename: {name}")));
    }

    let mut resolved = base.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::CurDir => {}
            _ => {
                return Err(PortalError::Validation(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if resolved.parent() != Some(base) {
        return Err(PortalError::Validation(format!("Invalid filename: {name}")));
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// JSON documents
// ---------------------------------------------------------------------------

/// A single JSON document on disk, read and replaced as a whole.
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonDocument<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `Ok(None)` when the document does not exist yet.
    pub async fn load(&self) -> Result<Option<T>, PortalError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortalError::io(format!("Failed to read {}", self.name()), e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PortalError::Serialization(format!("{}: {}", self.name(), e)))
    }

    /// Missing and unreadable documents both yield `T::default()`.
    pub async fn load_or_default(&self) -> T
    where
        T: Default,
    {
        match self.load().await {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                warn!(document = %self.name(), error = %e, "Ignoring unreadable document");
                T::default()
            }
        }
    }

    pub async fn save(&self, value: &T) -> Result<(), PortalError> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| PortalError::Serialization(format!("{}: {}", self.name(), e)))?;

        fs::write(&self.path, json)
            .await
            .map_err(|e| PortalError::io(format!("Failed to write {}", self.name()), e))?;

        debug!(document = %self.name(), "Saved document");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Data store
// ---------------------------------------------------------------------------

/// A regular file found in one of the storage directories.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl StoredFile {
    pub fn modified_unix(&self) -> i64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct DataStore {
    root: PathBuf,
    apk_dir: PathBuf,
    video_dir: PathBuf,
    pub apk_config: JsonDocument<ApkConfig>,
    pub site_settings: JsonDocument<SiteSettings>,
    pub password: JsonDocument<PasswordConfig>,
    pub videos: JsonDocument<Vec<VideoRecord>>,
    pub downloads: DownloadLog,
    pub audit: AuditLog,
}

impl DataStore {
    /// Open (and create if missing) the data directory layout under `root`.
    pub async fn open(root: PathBuf) -> Result<Self, PortalError> {
        let apk_dir = root.join("apk_files");
        let video_dir = root.join("gifs");

        for dir in [&root, &apk_dir, &video_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                PortalError::io(format!("Failed to create directory '{}'", dir.display()), e)
            })?;
        }

        info!(path = %root.display(), "Data store initialized");

        Ok(Self {
            apk_config: JsonDocument::new(root.join("apk_config.json")),
            site_settings: JsonDocument::new(root.join("site_settings.json")),
            password: JsonDocument::new(root.join("admin_password.json")),
            videos: JsonDocument::new(root.join("gifs.json")),
            downloads: DownloadLog::new(root.join("download_logs.txt")),
            audit: AuditLog::new(root.join("admin_logs.txt")),
            root,
            apk_dir,
            video_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn apk_dir(&self) -> &Path {
        &self.apk_dir
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    /// Path of `filename` inside the APK directory.
    pub fn apk_path(&self, filename: &str) -> Result<PathBuf, PortalError> {
        ensure_within(&self.apk_dir, filename)
    }

    /// Path of `filename` inside the video directory.
    pub fn video_path(&self, filename: &str) -> Result<PathBuf, PortalError> {
        ensure_within(&self.video_dir, filename)
    }

    /// Stat a stored file; `None` when it is missing or not a regular file.
    pub async fn stat(&self, path: &Path) -> Option<StoredFile> {
        let meta = fs::metadata(path).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        Some(StoredFile {
            path: path.to_path_buf(),
            filename: path.file_name()?.to_string_lossy().into_owned(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
        })
    }

    /// Every `*.apk` regular file in the APK directory, unordered.
    ///
    /// A missing or unreadable directory is reported as empty.
    pub async fn list_apks(&self) -> Vec<StoredFile> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&self.apk_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(error = %e, "Failed to list APK directory");
                }
                return files;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                        continue;
                    };
                    if !name.ends_with(".apk") {
                        continue;
                    }
                    if let Some(file) = self.stat(&entry.path()).await {
                        files.push(file);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read APK directory entry");
                    break;
                }
            }
        }

        files
    }
}
