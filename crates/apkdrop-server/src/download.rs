//! Public APK endpoints: metadata, info, and the logged download stream.

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream, Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use apkdrop_shared::constants::{
    APK_MIME_TYPE, CONFIG_DOWNLOAD_URL, DOWNLOAD_CHUNK_SIZE, INFO_DOWNLOAD_URL,
};
use apkdrop_shared::format::format_file_size;
use apkdrop_shared::logline::DownloadStatus;

use crate::api::{AppState, ClientInfo};
use crate::resolver::{iso8601, resolve_latest, ApkInfo};
use crate::store::DataStore;

const NO_APK_MESSAGE: &str = "No APK files available";

lazy_static! {
    static ref MOBILE_AGENT: Regex =
        Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini")
            .expect("mobile agent pattern is valid");
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    download: Option<String>,
    file: Option<String>,
}

#[derive(Serialize)]
struct ApkMetadata {
    version: String,
    filename: String,
    size: u64,
    size_formatted: String,
    download_url: &'static str,
    last_updated: String,
}

#[derive(Serialize)]
struct ApkDetails {
    version: String,
    filename: String,
    size: u64,
    size_formatted: String,
    download_url: &'static str,
    last_updated: String,
    release_notes: String,
    app_name: String,
    app_description: String,
    download_count: usize,
}

#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: Option<T>,
}

/// `GET /apk_download.php`: a download when `download` is present,
/// metadata otherwise.
pub async fn apk_endpoint(
    State(state): State<AppState>,
    client: ClientInfo,
    Query(query): Query<DownloadQuery>,
) -> Response {
    if query.download.is_some() {
        return serve_download(&state, &client, query.file.as_deref()).await;
    }

    let Some(apk) = resolve_latest(&state.store).await else {
        return Json(serde_json::json!({
            "status": "error",
            "message": NO_APK_MESSAGE,
        }))
        .into_response();
    };

    Json(Envelope {
        status: "success",
        message: None,
        data: Some(ApkMetadata {
            size_formatted: format_file_size(apk.size),
            last_updated: iso8601(apk.modified),
            download_url: CONFIG_DOWNLOAD_URL,
            version: apk.version,
            filename: apk.filename,
            size: apk.size,
        }),
    })
    .into_response()
}

/// `GET /apk/download`
pub async fn apk_download(
    State(state): State<AppState>,
    client: ClientInfo,
    Query(query): Query<DownloadQuery>,
) -> Response {
    serve_download(&state, &client, query.file.as_deref()).await
}

/// `GET /api/apk_info.php`
pub async fn apk_info(State(state): State<AppState>) -> Response {
    let Some(apk) = resolve_latest(&state.store).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(Envelope::<ApkDetails> {
                status: "error",
                message: Some(NO_APK_MESSAGE),
                data: None,
            }),
        )
            .into_response();
    };

    let download_count = match state.store.downloads.line_count().await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Could not count download log lines");
            0
        }
    };

    Json(Envelope {
        status: "success",
        message: None,
        data: Some(ApkDetails {
            size_formatted: format_file_size(apk.size),
            download_url: INFO_DOWNLOAD_URL,
            app_name: state.config.app_name.clone(),
            app_description: state.config.app_description.clone(),
            download_count,
            version: apk.version,
            filename: apk.filename,
            size: apk.size,
            last_updated: apk.last_updated,
            release_notes: apk.release_notes,
        }),
    })
    .into_response()
}

/// Basename of a requested download name, kept only when it looks like
/// one of ours.
fn override_filename(requested: Option<&str>, product_name: &str) -> Option<String> {
    let requested = requested?;
    let base = requested
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(requested)
        .trim();
    if base.is_empty() || base.chars().any(|c| c.is_control()) {
        return None;
    }
    if base.contains(product_name) || base.contains(".apk") {
        Some(base.to_string())
    } else {
        None
    }
}

fn is_mobile(user_agent: &str) -> bool {
    MOBILE_AGENT.is_match(user_agent)
}

fn content_disposition(filename: &str, mobile: bool) -> HeaderValue {
    let name = filename.replace('"', "");
    let value = if name.is_ascii() {
        if mobile {
            format!("attachment; filename={name}")
        } else {
            format!("attachment; filename=\"{name}\"")
        }
    } else {
        // RFC 5987: ASCII fallback plus the UTF-8 name for clients that read it.
        let fallback: String = name
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(&name)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn serve_download(state: &AppState, client: &ClientInfo, requested: Option<&str>) -> Response {
    let store = &state.store;

    let Some(apk) = resolve_latest(store).await else {
        store
            .downloads
            .record(
                &client.ip,
                &client.user_agent,
                "None",
                DownloadStatus::NoApkAvailable,
            )
            .await;
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": NO_APK_MESSAGE,
                "message": "Please contact administrator to upload APK files",
            })),
        )
            .into_response();
    };

    stream_apk(state, client, apk, requested).await
}

/// Log `Started`, open the resolved file and hand back the streaming
/// response.
async fn stream_apk(
    state: &AppState,
    client: &ClientInfo,
    apk: ApkInfo,
    requested: Option<&str>,
) -> Response {
    let store = &state.store;

    store
        .downloads
        .record(&client.ip, &client.user_agent, &apk.version, DownloadStatus::Started)
        .await;

    let file = match File::open(&apk.path).await {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, path = %apk.path.display(), "Failed to open APK file");
            store
                .downloads
                .record(&client.ip, &client.user_agent, &apk.version, DownloadStatus::Failed)
                .await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to open APK file" })),
            )
                .into_response();
        }
    };

    let length = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => apk.size,
    };

    let filename = override_filename(requested, &state.config.product_name)
        .unwrap_or_else(|| apk.filename.clone());

    info!(
        ip = %client.ip,
        file = %apk.filename,
        served_as = %filename,
        version = %apk.version,
        source = ?apk.source,
        size = length,
        "Serving APK download"
    );

    let body = Body::from_stream(logged_stream(DownloadProgress::new(
        ReaderStream::with_capacity(file, DOWNLOAD_CHUNK_SIZE),
        store.clone(),
        client,
        apk.version,
    )));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(APK_MIME_TYPE)),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&filename, is_mobile(&client.user_agent)),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, must-revalidate"),
            ),
            (
                header::EXPIRES,
                HeaderValue::from_static("Sat, 26 Jul 1997 05:00:00 GMT"),
            ),
        ],
        body,
    )
        .into_response()
}

struct DownloadProgress<R> {
    chunks: ReaderStream<R>,
    store: Arc<DataStore>,
    ip: String,
    user_agent: String,
    version: String,
    finished: bool,
}

impl<R> DownloadProgress<R> {
    fn new(chunks: ReaderStream<R>, store: Arc<DataStore>, client: &ClientInfo, version: String) -> Self {
        Self {
            chunks,
            store,
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            version,
            finished: false,
        }
    }

    async fn finish(mut self, status: DownloadStatus) {
        self.finished = true;
        self.store
            .downloads
            .record(&self.ip, &self.user_agent, &self.version, status)
            .await;
    }
}

// A body dropped before end of file means the client went away mid-transfer.
impl<R> Drop for DownloadProgress<R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(ip = %self.ip, version = %self.version, "APK download aborted before completion");

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available to log aborted download");
            return;
        };
        let store = self.store.clone();
        let ip = std::mem::take(&mut self.ip);
        let user_agent = std::mem::take(&mut self.user_agent);
        let version = std::mem::take(&mut self.version);
        handle.spawn(async move {
            store
                .downloads
                .record(&ip, &user_agent, &version, DownloadStatus::Failed)
                .await;
        });
    }
}

/// Pass chunks through, logging `Completed` at end of file, or `Failed` on
/// the first read error or when the stream is dropped early.
fn logged_stream<R>(
    progress: DownloadProgress<R>,
) -> impl Stream<Item = io::Result<axum::body::Bytes>> + Send + 'static
where
    R: AsyncRead + Send + Unpin + 'static,
{
    stream::unfold(Some(progress), |state| async move {
        let mut progress = state?;
        match progress.chunks.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), Some(progress))),
            Some(Err(e)) => {
                error!(error = %e, ip = %progress.ip, "APK stream read failed");
                progress.finish(DownloadStatus::Failed).await;
                Some((Err(e), None))
            }
            None => {
                progress.finish(DownloadStatus::Completed).await;
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use apkdrop_shared::logline::DownloadLogEntry;
    use apkdrop_shared::types::ApkConfig;

    fn statuses(log: &str) -> Vec<DownloadStatus> {
        log.lines()
            .map(|l| DownloadLogEntry::parse(l).unwrap().status)
            .collect()
    }

    #[test]
    fn test_override_filename() {
        assert_eq!(
            override_filename(Some("../../mParivahan2.0.apk"), "mParivahan").as_deref(),
            Some("mParivahan2.0.apk")
        );
        assert_eq!(
            override_filename(Some("custom.apk"), "mParivahan").as_deref(),
            Some("custom.apk")
        );
        assert_eq!(override_filename(Some("evil.exe"), "mParivahan"), None);
        assert_eq!(override_filename(Some("dir/"), "mParivahan"), None);
        assert_eq!(override_filename(None, "mParivahan"), None);
    }

    #[test]
    fn test_mobile_disposition() {
        assert!(is_mobile("Mozilla/5.0 (Linux; ANDROID 14)"));
        assert!(is_mobile("Opera Mini/8"));
        assert!(!is_mobile("Mozilla/5.0 (X11; Linux x86_64)"));

        assert_eq!(
            content_disposition("a.apk", true),
            "attachment; filename=a.apk"
        );
        assert_eq!(
            content_disposition("a\".apk", false),
            "attachment; filename=\"a.apk\""
        );
    }

    #[tokio::test]
    async fn test_download_without_apk() {
        let (state, _dir) = test_state().await;
        let response = send(&state, get_request("/apk/download", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], NO_APK_MESSAGE);

        let log = state.store.downloads.read_to_string().await.unwrap();
        let entry = DownloadLogEntry::parse(log.trim_end()).unwrap();
        assert_eq!(entry.version, "None");
        assert_eq!(entry.status, DownloadStatus::NoApkAvailable);
    }

    #[tokio::test]
    async fn test_download_streams_and_logs() {
        let (state, _dir) = test_state().await;
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(state.store.apk_dir().join("mParivahan3.1.4.apk"), &payload).unwrap();

        let request = axum::http::Request::builder()
            .uri("/apk_download.php?download=true&file=mParivahan-latest.apk")
            .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU OS 17)")
            .body(Body::empty())
            .unwrap();
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), APK_MIME_TYPE);
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=mParivahan-latest.apk"
        );
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "20000");
        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "no-cache, must-revalidate"
        );
        assert_eq!(body_bytes(response).await, payload);

        let log = state.store.downloads.read_to_string().await.unwrap();
        assert_eq!(
            statuses(&log),
            vec![DownloadStatus::Started, DownloadStatus::Completed]
        );
        assert!(log.contains("Version: 3.1.4"));
    }

    #[tokio::test]
    async fn test_metadata_reports_published_apk() {
        let (state, _dir) = test_state().await;
        let response = send(&state, get_request("/apk_download.php", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], NO_APK_MESSAGE);

        std::fs::write(state.store.apk_dir().join("mParivahan2.0.0.apk"), vec![1u8; 1536])
            .unwrap();
        let config = ApkConfig::published("2.0.0", "mParivahan2.0.0.apk", 1536, "n", "t".into());
        state.store.apk_config.save(&config).await.unwrap();

        let response = send(&state, get_request("/apk_download.php", None)).await;
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["version"], "2.0.0");
        assert_eq!(body["data"]["filename"], "mParivahan2.0.0.apk");
        assert_eq!(body["data"]["size"], 1536);
        assert_eq!(body["data"]["size_formatted"], "1.5KB");
        assert_eq!(body["data"]["download_url"], CONFIG_DOWNLOAD_URL);

        // Metadata requests are not downloads.
        assert_eq!(state.store.downloads.line_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_info_endpoint() {
        let (state, _dir) = test_state().await;
        let response = send(&state, get_request("/api/apk_info.php", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["data"].is_null());

        std::fs::write(state.store.apk_dir().join("app-v1.2.3.apk"), b"apk").unwrap();
        let download = send(&state, get_request("/apk/download", None)).await;
        assert_eq!(body_bytes(download).await, b"apk");

        let response = send(&state, get_request("/api/apk_info.php", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["version"], "1.2.3");
        assert_eq!(body["data"]["download_url"], INFO_DOWNLOAD_URL);
        assert_eq!(body["data"]["app_name"], "mParivahan NextGen");
        assert_eq!(body["data"]["release_notes"], "Latest version");
        // Started + Completed for the download above.
        assert_eq!(body["data"]["download_count"], 2);
    }

    #[test]
    fn test_non_ascii_disposition() {
        let value = content_disposition("mParivahan2.0-é.apk", true);
        assert_eq!(
            value,
            "attachment; filename=\"mParivahan2.0-_.apk\"; filename*=UTF-8''mParivahan2.0-%C3%A9.apk"
        );
    }

    #[tokio::test]
    async fn test_download_open_failure_logs_failed() {
        let (state, _dir) = test_state().await;
        let apk = ApkInfo {
            path: state.store.apk_dir().join("gone3.0.0.apk"),
            filename: "gone3.0.0.apk".into(),
            version: "3.0.0".into(),
            size: 10,
            modified: std::time::SystemTime::now(),
            last_updated: "t".into(),
            release_notes: "n".into(),
            source: crate::resolver::ApkSource::Scan,
        };
        let client = ClientInfo {
            ip: "10.0.0.7".into(),
            user_agent: "curl/8".into(),
        };

        let response = stream_apk(&state, &client, apk, None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to open APK file");

        let log = state.store.downloads.read_to_string().await.unwrap();
        assert_eq!(
            statuses(&log),
            vec![DownloadStatus::Started, DownloadStatus::Failed]
        );
        assert!(log.contains("Version: 3.0.0"));
    }

    /// Yields one chunk, then fails every read.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(io::Error::other("disk gone")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_mid_stream_logs_failed() {
        let (state, _dir) = test_state().await;
        let client = ClientInfo {
            ip: "10.0.0.8".into(),
            user_agent: "curl/8".into(),
        };
        state
            .store
            .downloads
            .record(&client.ip, &client.user_agent, "4.0.0", DownloadStatus::Started)
            .await;

        let progress = DownloadProgress::new(
            ReaderStream::new(BrokenReader { sent: false }),
            state.store.clone(),
            &client,
            "4.0.0".into(),
        );
        let items: Vec<_> = logged_stream(progress).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().as_ref(), b"partial");
        assert!(items[1].is_err());

        let log = state.store.downloads.read_to_string().await.unwrap();
        assert_eq!(
            statuses(&log),
            vec![DownloadStatus::Started, DownloadStatus::Failed]
        );
    }

    #[tokio::test]
    async fn test_client_disconnect_logs_failed() {
        let (state, _dir) = test_state().await;
        std::fs::write(state.store.apk_dir().join("app5.0.0.apk"), vec![7u8; 200_000]).unwrap();

        let response = send(&state, get_request("/apk/download", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(!first.is_empty() && first.len() <= DOWNLOAD_CHUNK_SIZE);
        drop(body);

        // The Failed line is written from a spawned task.
        let mut log = String::new();
        for _ in 0..50 {
            log = state.store.downloads.read_to_string().await.unwrap();
            if log.lines().count() >= 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(
            statuses(&log),
            vec![DownloadStatus::Started, DownloadStatus::Failed]
        );
        assert!(!log.contains("Completed"));
    }
}
