//! Admin panel actions. Every route here sits behind
//! [`require_admin`](crate::session::require_admin), so handlers can take
//! the [`AdminSession`] extension for granted.
//!
//! Mutating actions write exactly one audit line per outcome and answer
//! either with JSON or, for plain browser form posts, with a redirect back to
//! the originating page carrying `status` and `message` query parameters.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use apkdrop_shared::constants::{
    DEFAULT_VERSION, LOG_TIMESTAMP_FORMAT, MIN_PASSWORD_LEN, VIDEO_EXTENSIONS,
};
use apkdrop_shared::format::{format_file_size, format_views};
use apkdrop_shared::logline::AdminAction;
use apkdrop_shared::types::{
    ApkConfig, ApkFileRecord, PasswordConfig, SiteSettings, VideoRecord,
};
use apkdrop_shared::version::version_or_default;

use crate::analytics::{summarize, AnalyticsSummary};
use crate::api::AppState;
use crate::config::is_plain_token;
use crate::error::PortalError;
use crate::logs::AuditLog;
use crate::resolver::{iso8601, sort_newest_first};
use crate::session::AdminSession;

const APK_PAGE: &str = "/admin/apks";
const VIDEO_PAGE: &str = "/admin/videos";
const SETTINGS_PAGE: &str = "/admin/settings";

const RECENT_ACTIVITY_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Whether the caller wants JSON rather than a redirect. A missing `Accept`
/// header counts as JSON.
fn wants_json(headers: &HeaderMap) -> bool {
    match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(accept) => accept.trim().is_empty() || accept.contains("application/json"),
    }
}

struct ActionReply {
    message: String,
    data: Option<Value>,
}

impl ActionReply {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct UploadLimits {
    max_file_size: u64,
    max_file_size_formatted: String,
}

impl UploadLimits {
    fn new(max: u64) -> Self {
        Self {
            max_file_size: max,
            max_file_size_formatted: format_file_size(max),
        }
    }
}

#[derive(Serialize)]
struct ActionResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<UploadLimits>,
}

fn respond(
    headers: &HeaderMap,
    page: &str,
    result: Result<ActionReply, PortalError>,
    limits: Option<UploadLimits>,
) -> Response {
    let (code, body) = match result {
        Ok(reply) => (
            StatusCode::OK,
            ActionResponse {
                status: "success",
                message: reply.message,
                data: reply.data,
                debug: None,
            },
        ),
        Err(e) => (
            e.status(),
            ActionResponse {
                status: "error",
                message: e.public_message(),
                data: None,
                debug: limits,
            },
        ),
    };

    if wants_json(headers) {
        return (code, Json(body)).into_response();
    }

    let location = format!(
        "{page}?status={}&message={}",
        body.status,
        urlencoding::encode(&body.message)
    );
    Redirect::to(&location).into_response()
}

/// `status`/`message` carried back to a page by a redirect.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Flash {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// A partially received upload. Error paths call [`StagedUpload::discard`];
/// a request cancelled mid-upload falls back to a spawned removal on drop.
struct StagedUpload {
    path: PathBuf,
    settled: bool,
}

impl StagedUpload {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!(".upload-{}.part", uuid::Uuid::new_v4().simple())),
            settled: false,
        }
    }

    async fn persist(mut self, dest: &Path) -> Result<(), PortalError> {
        match fs::rename(&self.path, dest).await {
            Ok(()) => {
                self.settled = true;
                Ok(())
            }
            Err(e) => {
                self.discard().await;
                Err(PortalError::io("Failed to move uploaded file", e))
            }
        }
    }

    async fn discard(mut self) {
        self.settled = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, path = %self.path.display(), "Failed to remove partial upload");
            }
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = fs::remove_file(&path).await;
                });
            }
            Err(_) => warn!(path = %path.display(), "Partial upload left behind"),
        }
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError, max: u64) -> PortalError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PortalError::TooLarge { max }
    } else {
        PortalError::Validation(format!("Upload failed: {}", err.body_text()))
    }
}

/// Stream a multipart file field into a staged file in `dir`, refusing to
/// write more than `max` bytes. A failed write leaves nothing behind.
async fn stage_upload(
    dir: &Path,
    field: Field<'_>,
    max: u64,
) -> Result<(StagedUpload, u64), PortalError> {
    let staged = StagedUpload::new(dir);
    match write_field(&staged.path, field, max).await {
        Ok(written) => Ok((staged, written)),
        Err(e) => {
            staged.discard().await;
            Err(e)
        }
    }
}

async fn write_field(path: &Path, mut field: Field<'_>, max: u64) -> Result<u64, PortalError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| PortalError::io("Failed to create upload file", e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max))? {
        written += chunk.len() as u64;
        if written > max {
            return Err(PortalError::TooLarge { max });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| PortalError::io("Failed to write file to disk", e))?;
    }
    file.flush()
        .await
        .map_err(|e| PortalError::io("Failed to write file to disk", e))?;

    Ok(written)
}

/// Hold at most one staged file per request, discarding any it replaces.
async fn keep_staged(slot: &mut Option<StagedUpload>, upload: StagedUpload) {
    if let Some(previous) = slot.replace(upload) {
        previous.discard().await;
    }
}

/// Lowercased extension of an uploaded filename.
fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn text_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

// ---------------------------------------------------------------------------
// APKs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PublishedApk {
    filename: String,
    version: String,
    size: u64,
    size_formatted: String,
}

async fn receive_apk(state: &AppState, multipart: Multipart) -> Result<PublishedApk, PortalError> {
    let mut staged = None;
    let result = publish_apk(state, multipart, &mut staged).await;
    if let Some(upload) = staged.take() {
        upload.discard().await;
    }
    result
}

async fn publish_apk(
    state: &AppState,
    mut multipart: Multipart,
    staged: &mut Option<StagedUpload>,
) -> Result<PublishedApk, PortalError> {
    let store = &state.store;
    let max = state.config.max_apk_size;

    let mut written = None;
    let mut version = None;
    let mut release_notes = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, max))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "apk_file" => {
                let original = field.file_name().unwrap_or_default().to_string();
                if original.is_empty() {
                    continue;
                }
                if extension_of(&original).as_deref() != Some("apk") {
                    return Err(PortalError::Validation(
                        "Invalid file type. Only APK files (.apk extension) are allowed."
                            .to_string(),
                    ));
                }
                let (upload, size) = stage_upload(store.apk_dir(), field, max).await?;
                keep_staged(staged, upload).await;
                written = Some(size);
            }
            "version" => {
                version = Some(field.text().await.map_err(|e| multipart_error(e, max))?);
            }
            "release_notes" => {
                release_notes = Some(field.text().await.map_err(|e| multipart_error(e, max))?);
            }
            _ => {}
        }
    }

    let Some(written) = written else {
        return Err(PortalError::Validation(
            "Upload failed: No file was uploaded".to_string(),
        ));
    };

    let version = text_or(version, DEFAULT_VERSION);
    if !is_plain_token(&version) {
        return Err(PortalError::Validation(format!("Invalid version: {version}")));
    }
    let release_notes = text_or(release_notes, "New version uploaded");

    let filename = format!("{}{}.apk", state.config.product_name, version);
    let dest = store.apk_path(&filename)?;
    if let Some(upload) = staged.take() {
        upload.persist(&dest).await?;
    }

    let size = match store.stat(&dest).await {
        Some(file) if file.size == written => file.size,
        _ => {
            return Err(PortalError::Io(
                "Uploaded file failed size verification".to_string(),
            ))
        }
    };

    let config = ApkConfig::published(
        &version,
        &filename,
        size,
        &release_notes,
        iso8601(SystemTime::now()),
    );
    store.apk_config.save(&config).await?;

    info!(file = %filename, version = %version, size, "APK published");

    Ok(PublishedApk {
        size_formatted: format_file_size(size),
        filename,
        version,
        size,
    })
}

/// `POST /admin/apks/upload`
pub async fn upload_apk(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let result = receive_apk(&state, multipart).await;

    let entry = match &result {
        Ok(apk) => AuditLog::entry(AdminAction::ApkUploaded)
            .field("Version", &apk.version)
            .field("Size", &apk.size_formatted),
        Err(e) => AuditLog::entry(AdminAction::ApkUploadFailed)
            .field("Username", &session.username)
            .field("Error", e.public_message()),
    };
    state.store.audit.record(entry).await;

    let reply = result.map(|apk| {
        ActionReply::new(format!("APK uploaded successfully! Version: {}", apk.version))
            .with_data(apk)
    });
    respond(
        &headers,
        APK_PAGE,
        reply,
        Some(UploadLimits::new(state.config.max_apk_size)),
    )
}

#[derive(Debug, Deserialize)]
pub struct ApkActionForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    filename: String,
}

async fn delete_apk(state: &AppState, filename: &str) -> Result<ActionReply, PortalError> {
    let path = state.store.apk_path(filename)?;
    if state.store.stat(&path).await.is_none() {
        return Err(PortalError::NotFound("APK file not found".to_string()));
    }
    fs::remove_file(&path)
        .await
        .map_err(|e| PortalError::io("Failed to delete APK file", e))?;

    info!(file = %filename, "APK deleted");
    Ok(ActionReply::new(format!("APK file deleted: {filename}")))
}

async fn set_latest(state: &AppState, filename: &str) -> Result<(ActionReply, String), PortalError> {
    let path = state.store.apk_path(filename)?;
    let Some(file) = state.store.stat(&path).await else {
        return Err(PortalError::NotFound("APK file not found".to_string()));
    };

    let version = version_or_default(filename);
    let config = ApkConfig::published(
        &version,
        filename,
        file.size,
        "Set as latest version",
        iso8601(SystemTime::now()),
    );
    state.store.apk_config.save(&config).await?;

    info!(file = %filename, version = %version, "APK set as latest");
    let reply = ActionReply::new(format!("APK set as latest version: {filename}"))
        .with_data(serde_json::json!({ "filename": filename, "version": version }));
    Ok((reply, version))
}

/// `POST /admin/apks` with `action=delete` or `action=set_latest`.
pub async fn apk_action(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    headers: HeaderMap,
    Form(form): Form<ApkActionForm>,
) -> Response {
    let filename = form.filename.trim();

    let (result, entry) = match form.action.as_str() {
        "delete" => {
            let result = delete_apk(&state, filename).await;
            let entry = match &result {
                Ok(_) => AuditLog::entry(AdminAction::ApkDeleted).field("File", filename),
                Err(e) => AuditLog::entry(AdminAction::ApkDeleteFailed)
                    .field("File", filename)
                    .field("Username", &session.username)
                    .field("Error", e.public_message()),
            };
            (result, Some(entry))
        }
        "set_latest" => match set_latest(&state, filename).await {
            Ok((reply, version)) => (
                Ok(reply),
                Some(
                    AuditLog::entry(AdminAction::ApkSetLatest)
                        .field("File", filename)
                        .field("Version", version),
                ),
            ),
            Err(e) => {
                let entry = AuditLog::entry(AdminAction::ApkSetLatestFailed)
                    .field("File", filename)
                    .field("Username", &session.username)
                    .field("Error", e.public_message());
                (Err(e), Some(entry))
            }
        },
        other => (
            Err(PortalError::Validation(format!("Unknown action: {other}"))),
            None,
        ),
    };

    if let Some(entry) = entry {
        state.store.audit.record(entry).await;
    }
    respond(&headers, APK_PAGE, result, None)
}

/// `GET /admin/apks`
pub async fn list_apks(
    State(state): State<AppState>,
    Query(flash): Query<Flash>,
) -> Json<Value> {
    let store = &state.store;
    let mut files = store.list_apks().await;
    sort_newest_first(&mut files);

    let latest = store
        .apk_config
        .load()
        .await
        .ok()
        .flatten()
        .and_then(|config| config.file_path);

    let records: Vec<ApkFileRecord> = files
        .into_iter()
        .map(|file| ApkFileRecord {
            is_latest: latest.as_deref() == Some(file.filename.as_str()),
            size_formatted: format_file_size(file.size),
            modified: file.modified_unix(),
            modified_formatted: DateTime::<Local>::from(file.modified)
                .format(LOG_TIMESTAMP_FORMAT)
                .to_string(),
            size: file.size,
            filename: file.filename,
        })
        .collect();

    Json(serde_json::json!({
        "status": "success",
        "flash": flash,
        "latest": latest,
        "count": records.len(),
        "data": records,
    }))
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

async fn receive_video(state: &AppState, multipart: Multipart) -> Result<VideoRecord, PortalError> {
    let mut staged = None;
    let result = publish_video(state, multipart, &mut staged).await;
    if let Some(upload) = staged.take() {
        upload.discard().await;
    }
    result
}

async fn publish_video(
    state: &AppState,
    mut multipart: Multipart,
    staged: &mut Option<StagedUpload>,
) -> Result<VideoRecord, PortalError> {
    let store = &state.store;
    let max = state.config.max_video_size;

    let mut upload = None;
    let mut text: std::collections::HashMap<String, String> = std::collections::HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, max))? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "video_file" {
            let original = field.file_name().unwrap_or_default().to_string();
            if original.is_empty() {
                continue;
            }
            let ext = extension_of(&original)
                .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
                .ok_or_else(|| {
                    PortalError::Validation(format!(
                        "Invalid file type. Allowed: {}",
                        VIDEO_EXTENSIONS.join(", ")
                    ))
                })?;
            let (file, written) = stage_upload(store.video_dir(), field, max).await?;
            keep_staged(staged, file).await;
            upload = Some((written, ext, original));
        } else {
            let value = field.text().await.map_err(|e| multipart_error(e, max))?;
            text.insert(name, value);
        }
    }

    let Some((size, ext, original_name)) = upload else {
        return Err(PortalError::Validation(
            "Upload failed: No file was uploaded".to_string(),
        ));
    };
    if size == 0 {
        return Err(PortalError::Validation(
            "File size is 0 - possible upload configuration issue".to_string(),
        ));
    }

    let filename = format!(
        "{}_{}.{}",
        uuid::Uuid::new_v4().simple(),
        Utc::now().timestamp(),
        ext
    );
    let dest = store.video_path(&filename)?;
    if let Some(upload) = staged.take() {
        upload.persist(&dest).await?;
    }

    let mut videos = store.videos.load().await?.unwrap_or_default();

    let duration = text
        .get("duration")
        .map(|d| {
            d.trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0);

    let record = VideoRecord {
        id: (videos.len() + 1).to_string(),
        title: text_or(text.remove("title"), "Untitled Video"),
        category: text_or(text.remove("category"), "general"),
        description: text.remove("description").unwrap_or_default().trim().to_string(),
        views: format!("{} views", format_views(&text_or(text.remove("views"), "0"))),
        duration,
        video: format!("gifs/{filename}"),
        last_updated: iso8601(SystemTime::now()),
        file_size: size,
        original_name,
        filename,
    };
    videos.push(record.clone());
    store.videos.save(&videos).await?;

    info!(file = %record.filename, title = %record.title, size, "Video uploaded");
    Ok(record)
}

/// `POST /admin/videos/upload`
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let result = receive_video(&state, multipart).await;

    let entry = match &result {
        Ok(video) => AuditLog::entry(AdminAction::VideoUploaded)
            .field("File", &video.filename)
            .field("Title", &video.title),
        Err(e) => AuditLog::entry(AdminAction::VideoUploadFailed)
            .field("Username", &session.username)
            .field("Error", e.public_message()),
    };
    state.store.audit.record(entry).await;

    let reply = result.map(|video| {
        ActionReply::new(format!("Video uploaded successfully: {}", video.title)).with_data(video)
    });
    respond(
        &headers,
        VIDEO_PAGE,
        reply,
        Some(UploadLimits::new(state.config.max_video_size)),
    )
}

/// `GET /admin/videos`
pub async fn list_videos(
    State(state): State<AppState>,
    Query(flash): Query<Flash>,
) -> Result<Json<Value>, PortalError> {
    let videos = state.store.videos.load().await?.unwrap_or_default();
    Ok(Json(serde_json::json!({
        "status": "success",
        "flash": flash,
        "count": videos.len(),
        "data": videos,
    })))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    action: String,
    // Accepted from the form but never compared.
    #[allow(dead_code)]
    current_password: String,
    new_password: String,
    confirm_password: String,
    site_title: String,
    site_description: String,
    max_upload_size: String,
    allowed_file_types: String,
}

async fn change_password(state: &AppState, form: &SettingsForm) -> Result<ActionReply, PortalError> {
    if form.new_password != form.confirm_password
        || form.new_password.chars().count() < MIN_PASSWORD_LEN
    {
        return Err(PortalError::Validation(format!(
            "New passwords do not match or are too short (minimum {MIN_PASSWORD_LEN} characters)"
        )));
    }

    let document = PasswordConfig {
        admin_username: state.config.admin_username.clone(),
        admin_password: form.new_password.clone(),
        last_changed: iso8601(SystemTime::now()),
    };
    state
        .store
        .password
        .save(&document)
        .await
        .map_err(|_| PortalError::Io("Failed to update password".to_string()))?;

    Ok(ActionReply::new("Password changed successfully!"))
}

async fn update_settings(state: &AppState, form: &SettingsForm) -> Result<ActionReply, PortalError> {
    let settings = SiteSettings {
        site_title: form.site_title.clone(),
        site_description: form.site_description.clone(),
        max_upload_size: form.max_upload_size.clone(),
        allowed_file_types: form
            .allowed_file_types
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        last_updated: iso8601(SystemTime::now()),
    };
    state
        .store
        .site_settings
        .save(&settings)
        .await
        .map_err(|_| PortalError::Io("Failed to update site settings".to_string()))?;

    Ok(ActionReply::new("Site settings updated successfully!").with_data(settings))
}

/// `POST /admin/settings` with `action=change_password` or
/// `action=update_settings`.
pub async fn settings_action(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    headers: HeaderMap,
    Form(form): Form<SettingsForm>,
) -> Response {
    let (result, entry) = match form.action.as_str() {
        "change_password" => {
            let result = change_password(&state, &form).await;
            let action = if result.is_ok() {
                AdminAction::PasswordChanged
            } else {
                AdminAction::PasswordChangeFailed
            };
            (result, Some(action))
        }
        "update_settings" => {
            let result = update_settings(&state, &form).await;
            let action = if result.is_ok() {
                AdminAction::SiteSettingsUpdated
            } else {
                AdminAction::SiteSettingsUpdateFailed
            };
            (result, Some(action))
        }
        other => (
            Err(PortalError::Validation(format!("Unknown action: {other}"))),
            None,
        ),
    };

    if let Some(action) = entry {
        info!(username = %session.username, action = %action, "Settings action");
        state
            .store
            .audit
            .record(AuditLog::entry(action).field("Username", &session.username))
            .await;
    }
    respond(&headers, SETTINGS_PAGE, result, None)
}

#[derive(Serialize)]
struct SystemInfo {
    server_version: &'static str,
    product_name: String,
    max_apk_size: String,
    max_video_size: String,
    session_ttl_secs: u64,
    data_dir: String,
    apk_dir: String,
    video_dir: String,
}

/// `GET /admin/settings`
pub async fn settings_view(
    State(state): State<AppState>,
    Query(flash): Query<Flash>,
) -> Json<Value> {
    let store = &state.store;
    let settings = store.site_settings.load_or_default().await;
    let password = store.password.load_or_default().await;
    let last_changed = Some(password.last_changed).filter(|s| !s.is_empty());

    let system = SystemInfo {
        server_version: env!("CARGO_PKG_VERSION"),
        product_name: state.config.product_name.clone(),
        max_apk_size: format_file_size(state.config.max_apk_size),
        max_video_size: format_file_size(state.config.max_video_size),
        session_ttl_secs: state.config.session_ttl_secs,
        data_dir: store.root().display().to_string(),
        apk_dir: store.apk_dir().display().to_string(),
        video_dir: store.video_dir().display().to_string(),
    };

    Json(serde_json::json!({
        "status": "success",
        "flash": flash,
        "data": {
            "site_settings": settings,
            "password_last_changed": last_changed,
            "system": system,
        },
    }))
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Dashboard {
    username: String,
    apk_count: usize,
    total_downloads: usize,
    latest_apk: String,
    latest_version: String,
    recent_activity: Vec<String>,
}

/// `GET /admin/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> Result<Json<Value>, PortalError> {
    let store = &state.store;
    let config = store.apk_config.load_or_default().await;
    let audit = store.audit.read_to_string().await?;

    let recent_activity = audit
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(RECENT_ACTIVITY_LIMIT)
        .map(str::to_string)
        .collect();

    let view = Dashboard {
        username: session.username,
        apk_count: store.list_apks().await.len(),
        total_downloads: store.downloads.line_count().await?,
        latest_apk: config.file_path.clone().unwrap_or_else(|| "None".to_string()),
        latest_version: config.version().to_string(),
        recent_activity,
    };

    Ok(Json(serde_json::json!({ "status": "success", "data": view })))
}

/// `GET /admin/analytics`
pub async fn analytics_view(
    State(state): State<AppState>,
) -> Result<Json<Value>, PortalError> {
    let text = state.store.downloads.read_to_string().await?;
    let summary: AnalyticsSummary = summarize(&text, Local::now().naive_local());
    Ok(Json(serde_json::json!({ "status": "success", "data": summary })))
}
