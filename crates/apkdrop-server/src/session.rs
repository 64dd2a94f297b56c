//! Admin sessions and the login gate.
//!
//! Sessions are kept in memory, keyed by a random token carried in an
//! `HttpOnly` cookie, and forgotten on restart.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use apkdrop_shared::logline::AdminAction;

use crate::api::{AppState, ClientInfo};
use crate::error::PortalError;
use crate::logs::AuditLog;

pub const SESSION_COOKIE: &str = "apkdrop_session";
pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin/dashboard";

const CLEAR_COOKIE: &str = "apkdrop_session=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax";

/// Decides whether a username/password pair may log in.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// A single fixed username/password pair.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).unwrap_u8() == 1
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both so timing does not reveal which one was wrong.
        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, &self.password);
        user_ok & pass_ok
    }
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
    pub login_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, AdminSession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    fn is_fresh(&self, session: &AdminSession) -> bool {
        Utc::now() - session.login_time < self.ttl
    }

    /// Start a session for `username` and return its token.
    pub async fn create(&self, username: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = AdminSession {
            username: username.to_string(),
            login_time: Utc::now(),
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// The live session for `token`; expired sessions count as absent.
    pub async fn get(&self, token: &str) -> Option<AdminSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|session| self.is_fresh(session))
            .cloned()
    }

    pub async fn destroy(&self, token: &str) -> Option<AdminSession> {
        self.sessions.write().await.remove(token)
    }

    pub async fn purge_expired(&self) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| Utc::now() - session.login_time < self.ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired admin sessions");
        }
    }

    #[cfg(test)]
    async fn backdate(&self, token: &str, by: Duration) {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.login_time = session.login_time - by;
        }
    }
}

/// Session token from the `Cookie` header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(token: &str, max_age: i64) -> Result<HeaderValue, PortalError> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={max_age}; SameSite=Lax"
    ))
    .map_err(|e| PortalError::Internal(format!("session cookie: {e}")))
}

async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<AdminSession> {
    let token = session_token(headers)?;
    state.sessions.get(&token).await
}

/// Gate for every admin route: anonymous requests are sent to the login
/// page, authenticated ones carry their [`AdminSession`] as an extension.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match current_session(&state, request.headers()).await {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "Anonymous admin request, redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if current_session(&state, &headers).await.is_some() {
        return Redirect::to(DASHBOARD_PATH).into_response();
    }

    Json(serde_json::json!({
        "status": "login_required",
        "message": "POST username and password to /admin/login",
        "fields": ["username", "password"],
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, PortalError> {
    if current_session(&state, &headers).await.is_some() {
        return Ok(Redirect::to(DASHBOARD_PATH).into_response());
    }

    if !state.credentials.verify(&form.username, &form.password) {
        warn!(ip = %client.ip, username = %form.username, "Admin login failed");
        state
            .store
            .audit
            .record(
                AuditLog::entry(AdminAction::LoginFailed)
                    .field("IP", &client.ip)
                    .field("Username", &form.username),
            )
            .await;
        return Err(PortalError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    let token = state.sessions.create(&form.username).await;
    let cookie = session_cookie(&token, state.sessions.ttl_secs())?;

    info!(ip = %client.ip, username = %form.username, "Admin logged in");
    state
        .store
        .audit
        .record(AuditLog::entry(AdminAction::LoginSuccess).field("IP", &client.ip))
        .await;

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(DASHBOARD_PATH)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Some(session) = state.sessions.destroy(&token).await {
            info!(username = %session.username, "Admin logged out");
            state
                .store
                .audit
                .record(
                    AuditLog::entry(AdminAction::Logout)
                        .field("Username", &session.username)
                        .field("IP", &client.ip),
                )
                .await;
        }
    }

    (
        [(header::SET_COOKIE, HeaderValue::from_static(CLEAR_COOKIE))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}
