//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use apkdrop_shared::constants::{DEFAULT_HTTP_PORT, MAX_APK_SIZE, MAX_VIDEO_SIZE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Directory holding the JSON documents, the text logs, and the
    /// `apk_files/` and `gifs/` storage directories.
    /// Env: `DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Directory served as the public landing page.
    /// Env: `STATIC_DIR`
    /// Default: `./static`
    pub static_dir: PathBuf,

    /// Fixed admin login.
    /// Env: `ADMIN_USERNAME` / `ADMIN_PASSWORD`
    /// Default: `admin` / `admin123`
    pub admin_username: String,
    pub admin_password: String,

    /// Product prefix for stored APK names (`<product><version>.apk`) and
    /// the download filename allow-list.
    /// Env: `PRODUCT_NAME`
    /// Default: `mParivahan`
    pub product_name: String,

    /// Name and blurb reported by the info API.
    /// Env: `APP_NAME` / `APP_DESCRIPTION`
    pub app_name: String,
    pub app_description: String,

    /// Upload limits in bytes.
    /// Env: `MAX_APK_SIZE` / `MAX_VIDEO_SIZE`
    /// Default: 100 MiB each.
    pub max_apk_size: u64,
    pub max_video_size: u64,

    /// Admin session lifetime.
    /// Env: `SESSION_TTL_SECS`
    /// Default: `86400`
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            data_dir: PathBuf::from("./data"),
            static_dir: PathBuf::from("./static"),
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            product_name: "mParivahan".to_string(),
            app_name: "mParivahan NextGen".to_string(),
            app_description:
                "Official digital vehicle & license management app by the Government of India"
                    .to_string(),
            max_apk_size: MAX_APK_SIZE,
            max_video_size: MAX_VIDEO_SIZE,
            session_ttl_secs: 24 * 60 * 60,
        }
    }
}

// The admin password must never reach the logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("data_dir", &self.data_dir)
            .field("static_dir", &self.static_dir)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("product_name", &self.product_name)
            .field("app_name", &self.app_name)
            .field("max_apk_size", &self.max_apk_size)
            .field("max_video_size", &self.max_video_size)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("STATIC_DIR") {
            config.static_dir = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("ADMIN_USERNAME") {
            if !name.is_empty() {
                config.admin_username = name;
            }
        }

        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            if !password.is_empty() {
                config.admin_password = password;
            }
        }

        if let Ok(name) = std::env::var("PRODUCT_NAME") {
            if is_plain_token(&name) {
                config.product_name = name;
            } else {
                tracing::warn!(value = %name, "Invalid PRODUCT_NAME, using default");
            }
        }

        if let Ok(name) = std::env::var("APP_NAME") {
            config.app_name = name;
        }

        if let Ok(text) = std::env::var("APP_DESCRIPTION") {
            config.app_description = text;
        }

        config.max_apk_size = env_u64("MAX_APK_SIZE", config.max_apk_size);
        config.max_video_size = env_u64("MAX_VIDEO_SIZE", config.max_video_size);
        config.session_ttl_secs = env_u64("SESSION_TTL_SECS", config.session_ttl_secs);

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(val) => match val.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::warn!(var = name, value = %val, "Invalid number, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// A value usable as part of a filename: non-empty, no separators, no `..`.
pub fn is_plain_token(value: &str) -> bool {
    !value.is_empty()
        && !value.contains('/')
        && !value.contains('\\')
        && !value.contains("..")
        && !value.chars().any(|c| c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.max_apk_size, 100 * 1024 * 1024);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", ServerConfig::default());
        assert!(!rendered.contains("admin123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_plain_token() {
        assert!(is_plain_token("mParivahan"));
        assert!(is_plain_token("2.0.1-beta"));
        assert!(!is_plain_token(""));
        assert!(!is_plain_token("../etc"));
        assert!(!is_plain_token("a/b"));
        assert!(!is_plain_token("a\\b"));
    }
}
