//! Append-only text logs: download attempts and admin actions.
//!
//! Each append opens the file in append mode and writes the whole line in a
//! single `write_all` while holding the log's mutex, so concurrent appends
//! never interleave or truncate one another. Failing to log is reported via
//! `tracing` and never fails the request that triggered it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use apkdrop_shared::logline::{AdminAction, AdminLogEntry, DownloadLogEntry, DownloadStatus};

use crate::error::PortalError;

#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AppendLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` plus a newline.
    pub async fn append(&self, line: &str) -> Result<(), PortalError> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PortalError::io(format!("Failed to open {}", self.path.display()), e))?;

        file.write_all(record.as_bytes())
            .await
            .map_err(|e| PortalError::io(format!("Failed to append to {}", self.path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| PortalError::io(format!("Failed to flush {}", self.path.display()), e))?;

        Ok(())
    }

    /// Whole log contents; empty when the log has never been written.
    pub async fn read_to_string(&self) -> Result<String, PortalError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(PortalError::io(
                format!("Failed to read {}", self.path.display()),
                e,
            )),
        }
    }

    /// Number of non-empty lines.
    pub async fn line_count(&self) -> Result<usize, PortalError> {
        let text = self.read_to_string().await?;
        Ok(text.lines().filter(|l| !l.trim().is_empty()).count())
    }
}

// ---------------------------------------------------------------------------
// Download log
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DownloadLog {
    log: AppendLog,
}

impl DownloadLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: AppendLog::new(path),
        }
    }

    pub async fn record(&self, ip: &str, user_agent: &str, version: &str, status: DownloadStatus) {
        let entry =
            DownloadLogEntry::new(Local::now().naive_local(), ip, user_agent, version, status);

        match self.log.append(&entry.to_string()).await {
            Ok(()) => debug!(ip = %entry.ip, version = %entry.version, status = %status, "Download logged"),
            Err(e) => error!(
                error = %e,
                path = %self.log.path().display(),
                "Failed to write to download log"
            ),
        }
    }

    pub async fn read_to_string(&self) -> Result<String, PortalError> {
        self.log.read_to_string().await
    }

    pub async fn line_count(&self) -> Result<usize, PortalError> {
        self.log.line_count().await
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AuditLog {
    log: AppendLog,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: AppendLog::new(path),
        }
    }

    /// Start an entry stamped with the current local time.
    pub fn entry(action: AdminAction) -> AdminLogEntry {
        AdminLogEntry::new(Local::now().naive_local(), action)
    }

    pub async fn record(&self, entry: AdminLogEntry) {
        match self.log.append(&entry.to_string()).await {
            Ok(()) => debug!(action = %entry.action, "Admin action logged"),
            Err(e) => error!(
                error = %e,
                action = %entry.action,
                "Failed to write to admin log"
            ),
        }
    }

    pub async fn read_to_string(&self) -> Result<String, PortalError> {
        self.log.read_to_string().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let log = AppendLog::new(dir.path().join("log.txt"));

        assert_eq!(log.read_to_string().await.unwrap(), "");
        log.append("first").await.unwrap();
        log.append("second").await.unwrap();

        assert_eq!(log.read_to_string().await.unwrap(), "first\nsecond\n");
        assert_eq!(log.line_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(AppendLog::new(dir.path().join("log.txt")));

        let mut handles = Vec::new();
        for i in 0..50 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let line = format!("line-{i:02}-{}", "x".repeat(512));
                log.append(&line).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let text = log.read_to_string().await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 50);
        for line in lines {
            assert!(line.starts_with("line-"));
            assert_eq!(line.len(), "line-00-".len() + 512);
        }
    }

    #[tokio::test]
    async fn test_download_record_is_parseable() {
        let dir = TempDir::new().unwrap();
        let log = DownloadLog::new(dir.path().join("download_logs.txt"));
        log.record("10.1.1.1", "Mozilla/5.0", "3.2.1", DownloadStatus::Completed)
            .await;

        let text = log.read_to_string().await.unwrap();
        let entry = DownloadLogEntry::parse(text.trim_end()).unwrap();
        assert_eq!(entry.ip, "10.1.1.1");
        assert_eq!(entry.version, "3.2.1");
        assert_eq!(entry.status, DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn test_audit_record() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("admin_logs.txt"));
        log.record(AuditLog::entry(AdminAction::ApkDeleted).field("File", "old.apk"))
            .await;

        let text = log.read_to_string().await.unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("| APK Deleted | File: old.apk"));
    }
}
