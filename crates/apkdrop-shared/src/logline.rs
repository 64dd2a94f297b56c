//! Line formats of the two append-only text logs.
//!
//! Download log:
//! `YYYY-MM-DD HH:MM:SS | IP: <ip> | UA: <ua> | Version: <v> | Status: <s>`
//!
//! Audit log:
//! `YYYY-MM-DD HH:MM:SS | <action> | <label>: <value> | ...`

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::LOG_TIMESTAMP_FORMAT;
use crate::error::SharedError;

lazy_static! {
    static ref DOWNLOAD_LINE: Regex = Regex::new(
        r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \| IP: ([^|]+) \| UA: ([^|]+) \| Version: ([^|]+) \| Status: (.+)"
    )
    .expect("download log pattern is valid");
}

/// Make a value safe to embed in a `|`-separated single-line record.
///
/// Separators and line breaks become spaces; an empty value becomes
/// `Unknown` so every field still matches `[^|]+`.
pub fn sanitize_field(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c == '|' || c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Download log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    Started,
    Completed,
    Failed,
    NoApkAvailable,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Started => "Started",
            DownloadStatus::Completed => "Completed",
            DownloadStatus::Failed => "Failed",
            DownloadStatus::NoApkAvailable => "No APK available",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Started" => Ok(DownloadStatus::Started),
            "Completed" => Ok(DownloadStatus::Completed),
            "Failed" => Ok(DownloadStatus::Failed),
            "No APK available" => Ok(DownloadStatus::NoApkAvailable),
            other => Err(SharedError::UnknownStatus(other.to_string())),
        }
    }
}

/// One download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLogEntry {
    pub timestamp: NaiveDateTime,
    pub ip: String,
    pub user_agent: String,
    pub version: String,
    pub status: DownloadStatus,
}

impl DownloadLogEntry {
    pub fn new(
        timestamp: NaiveDateTime,
        ip: &str,
        user_agent: &str,
        version: &str,
        status: DownloadStatus,
    ) -> Self {
        Self {
            timestamp,
            ip: sanitize_field(ip),
            user_agent: sanitize_field(user_agent),
            version: sanitize_field(version),
            status,
        }
    }

    /// Parse one log line. Fields are trimmed.
    pub fn parse(line: &str) -> Result<Self, SharedError> {
        let caps = DOWNLOAD_LINE
            .captures(line)
            .ok_or(SharedError::MalformedLogLine)?;

        Ok(Self {
            timestamp: NaiveDateTime::parse_from_str(&caps[1], LOG_TIMESTAMP_FORMAT)?,
            ip: caps[2].trim().to_string(),
            user_agent: caps[3].trim().to_string(),
            version: caps[4].trim().to_string(),
            status: caps[5].parse()?,
        })
    }
}

impl fmt::Display for DownloadLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | IP: {} | UA: {} | Version: {} | Status: {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.ip,
            self.user_agent,
            self.version,
            self.status
        )
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    LoginSuccess,
    LoginFailed,
    Logout,
    ApkUploaded,
    ApkUploadFailed,
    ApkDeleted,
    ApkDeleteFailed,
    ApkSetLatest,
    ApkSetLatestFailed,
    VideoUploaded,
    VideoUploadFailed,
    PasswordChanged,
    PasswordChangeFailed,
    SiteSettingsUpdated,
    SiteSettingsUpdateFailed,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::LoginSuccess => "Admin Login Success",
            AdminAction::LoginFailed => "Admin Login Failed",
            AdminAction::Logout => "Admin Logout",
            AdminAction::ApkUploaded => "APK Uploaded",
            AdminAction::ApkUploadFailed => "APK Upload Failed",
            AdminAction::ApkDeleted => "APK Deleted",
            AdminAction::ApkDeleteFailed => "APK Delete Failed",
            AdminAction::ApkSetLatest => "APK Set as Latest",
            AdminAction::ApkSetLatestFailed => "APK Set Latest Failed",
            AdminAction::VideoUploaded => "Video Uploaded",
            AdminAction::VideoUploadFailed => "Video Upload Failed",
            AdminAction::PasswordChanged => "Password Changed",
            AdminAction::PasswordChangeFailed => "Password Change Failed",
            AdminAction::SiteSettingsUpdated => "Site Settings Updated",
            AdminAction::SiteSettingsUpdateFailed => "Site Settings Update Failed",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admin action, with labelled detail fields in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminLogEntry {
    pub timestamp: NaiveDateTime,
    pub action: AdminAction,
    pub fields: Vec<(&'static str, String)>,
}

impl AdminLogEntry {
    pub fn new(timestamp: NaiveDateTime, action: AdminAction) -> Self {
        Self {
            timestamp,
            action,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, label: &'static str, value: impl AsRef<str>) -> Self {
        self.fields.push((label, sanitize_field(value.as_ref())));
        self
    }
}

impl fmt::Display for AdminLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.action
        )?;
        for (label, value) in &self.fields {
            write!(f, " | {label}: {value}")?;
        }
        Ok(())
    }
}
