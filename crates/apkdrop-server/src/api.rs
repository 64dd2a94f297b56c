use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Request},
    http::{
        header::{self, HeaderValue},
        request::Parts,
        HeaderMap, Method,
    },
    middleware::{self, Next},
    response::{Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admin;
use crate::config::ServerConfig;
use crate::download;
use crate::session::{self, CredentialVerifier, SessionStore, DASHBOARD_PATH};
use crate::store::DataStore;

/// Extra room on top of the largest upload limit for multipart framing and
/// the text fields that ride along with the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DataStore>,
    pub sessions: SessionStore,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let upload_limit = state.config.max_apk_size.max(state.config.max_video_size)
        + MULTIPART_OVERHEAD;

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/apk_download.php", get(download::apk_endpoint))
        .route("/apk/download", get(download::apk_download))
        .route("/api/apk_info.php", get(download::apk_info))
        .layer(cors);

    let auth = Router::new()
        .route("/admin", get(|| async { Redirect::to(DASHBOARD_PATH) }))
        .route("/admin/login", get(session::login_page).post(session::login))
        .route("/admin/logout", get(session::logout).post(session::logout));

    let admin = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/apks", get(admin::list_apks).post(admin::apk_action))
        .route("/admin/apks/upload", post(admin::upload_apk))
        .route("/admin/videos", get(admin::list_videos))
        .route("/admin/videos/upload", post(admin::upload_video))
        .route(
            "/admin/settings",
            get(admin::settings_view).post(admin::settings_action),
        )
        .route("/admin/analytics", get(admin::analytics_view))
        .layer(DefaultBodyLimit::max(upload_limit as usize))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(auth)
        .merge(admin)
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );

    response
}

// ---------------------------------------------------------------------------
// Client identity
// ---------------------------------------------------------------------------

/// Who is on the other end of a request, as recorded in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
    pub fn from_parts(headers: &HeaderMap, connect: Option<&ConnectInfo<SocketAddr>>) -> Self {
        let ip = connect
            .map(|info| info.0.ip().to_string())
            .or_else(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or_else(|| "Unknown".to_string());

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string();

        Self { ip, user_agent }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self::from_parts(&parts.headers, connect))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::session::StaticCredentials;

    pub const BOUNDARY: &str = "apkdropTestBoundary7MA4YWxkTrZu0gW";

    pub async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            data_dir: dir.path().join("data"),
            static_dir: dir.path().join("static"),
            ..ServerConfig::default()
        };
        let store = DataStore::open(config.data_dir.clone()).await.unwrap();
        let state = AppState {
            store: Arc::new(store),
            sessions: SessionStore::new(config.session_ttl_secs),
            credentials: Arc::new(StaticCredentials::new(
                &config.admin_username,
                &config.admin_password,
            )),
            config: Arc::new(config),
        };
        (state, dir)
    }

    pub async fn send(state: &AppState, request: axum::http::Request<Body>) -> Response {
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    /// Log in with the default credentials and return the `Cookie` header
    /// value for the new session.
    pub async fn login_cookie(state: &AppState) -> String {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/admin/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=admin&password=admin123"))
            .unwrap();
        let response = send(state, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// A multipart body with one file part followed by text parts.
    pub fn multipart_body(
        file_field: &str,
        file_name: &str,
        contents: &[u8],
        fields: &[(&str, &str)],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{file_field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn multipart_request(uri: &str, cookie: &str, body: Vec<u8>) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn form_request(uri: &str, cookie: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get_request(uri: &str, cookie: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }
}
