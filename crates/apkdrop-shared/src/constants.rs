/// MIME type sent with every APK download
pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// Version reported when a filename carries no `x.y.z` pattern
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Version reported when the published config has no version field
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Release notes reported when none were recorded
pub const DEFAULT_RELEASE_NOTES: &str = "Latest version";

/// Download stream chunk size in bytes (8 KiB)
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// Maximum APK upload size in bytes (100 MiB)
pub const MAX_APK_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum video upload size in bytes (100 MiB)
pub const MAX_VIDEO_SIZE: u64 = 100 * 1024 * 1024;

/// Extensions accepted by the video upload action
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "gif"];

/// Minimum admin password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Number of entries kept in the analytics "recent downloads" list
pub const RECENT_DOWNLOADS_LIMIT: usize = 10;

/// Download URL stored in the published config
pub const CONFIG_DOWNLOAD_URL: &str = "/apk/download";

/// Download URL advertised by the info API
pub const INFO_DOWNLOAD_URL: &str = "/apk_download.php?download=true";

/// Timestamp layout used by both text logs
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
