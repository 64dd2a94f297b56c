use serde::{Deserialize, Serialize};

use crate::constants::{CONFIG_DOWNLOAD_URL, UNKNOWN_VERSION};
use crate::version::version_code;

/// The published-APK pointer (`apk_config.json`).
///
/// Every field is optional on read so that partially written or hand-edited
/// documents still load; a missing `file_path` means "nothing published".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApkConfig {
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub latest_version_code: i64,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
}

impl ApkConfig {
    /// A fresh pointer at `filename`, as written by upload and set-latest.
    pub fn published(
        version: &str,
        filename: &str,
        file_size: u64,
        release_notes: &str,
        last_updated: String,
    ) -> Self {
        Self {
            latest_version: Some(version.to_string()),
            latest_version_code: version_code(version),
            file_path: Some(filename.to_string()),
            file_size,
            download_url: CONFIG_DOWNLOAD_URL.to_string(),
            last_updated: Some(last_updated),
            release_notes: Some(release_notes.to_string()),
        }
    }

    pub fn version(&self) -> &str {
        self.latest_version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }
}

/// One APK in the storage directory, as listed by the admin panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApkFileRecord {
    pub filename: String,
    pub size: u64,
    pub size_formatted: String,
    /// Modification time, unix seconds.
    pub modified: i64,
    pub modified_formatted: String,
    pub is_latest: bool,
}

/// One entry of the video list document (`gifs.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub category: String,
    pub description: String,
    /// Display string, e.g. `"1,500 views"`.
    pub views: String,
    /// Seconds.
    pub duration: u64,
    /// Path relative to the data directory, e.g. `gifs/<filename>`.
    pub video: String,
    pub last_updated: String,
    pub file_size: u64,
    pub original_name: String,
}

/// Admin-editable site settings (`site_settings.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteSettings {
    #[serde(default)]
    pub site_title: String,
    #[serde(default)]
    pub site_description: String,
    #[serde(default)]
    pub max_upload_size: String,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
    #[serde(default)]
    pub last_updated: String,
}

/// Stored admin password (`admin_password.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordConfig {
    #[serde(default)]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
    #[serde(default)]
    pub last_changed: String,
}
