//! Authentication: session extractor, password signup/login, Google OAuth
//! and logout.

use axum::{
    async_trait,
    body::Body,
    extract::{rejection::JsonRejection, FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gifter_store::password::{hash_password, verify_password};
use gifter_store::users::check_signup_fields;

use crate::api::{invalid_payload, AppState};
use crate::error::ServerError;
use crate::session::{clear_session_cookie, session_cookie, session_cookie_value, CookieOptions};

/// The authenticated user of a request.  Rejects with 401 when the request
/// carries no live session.
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookie = session_cookie_value(&parts.headers).ok_or(ServerError::Unauthorized)?;
        state
            .sessions
            .resolve(&cookie)
            .await
            .map(CurrentUser)
            .ok_or(ServerError::Unauthorized)
    }
}

#[derive(Deserialize)]
pub struct SignupRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;
    check_signup_fields(&req.name, &req.email, &req.password)?;

    // Hash before taking the database lock.
    let password = req.password;
    let hash = blocking(move || hash_password(&password)).await??;

    let user_id = {
        let db = state.db.lock().await;
        db.create_password_user(&req.name, &req.email, &hash)?
    };

    start_session(&state, user_id).await
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;

    let credential = {
        let db = state.db.lock().await;
        db.password_credential(&req.email)?
    };
    let Some((user_id, hash)) = credential else {
        return Err(unknown_login());
    };

    let password = req.password;
    if blocking(move || verify_password(&hash, &password)).await? {
        start_session(&state, user_id).await
    } else {
        debug!(user = %user_id, "password mismatch");
        Err(unknown_login())
    }
}

/// Redirect to the provider's consent screen.
pub async fn oauth_begin(State(state): State<AppState>) -> Result<Response, ServerError> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("OAuth login is not configured".into()))?;

    let csrf = state.sessions.issue_oauth_state().await;
    let url = oauth.authorize_url(&csrf)?;
    redirect(url.as_str(), None)
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ServerError> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("OAuth login is not configured".into()))?;

    if let Some(error) = query.error {
        warn!(error = %error, "oauth provider returned an error");
        return Err(ServerError::BadRequest("OAuth login was cancelled".into()));
    }

    let csrf = query.state.unwrap_or_default();
    if !state.sessions.take_oauth_state(&csrf).await {
        return Err(ServerError::BadRequest("Invalid OAuth state".into()));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing OAuth code".into()))?;

    let candidate = oauth.fetch_user(&code).await?;

    let user_id = {
        let db = state.db.lock().await;
        db.find_or_create_user(&candidate)?
    };

    info!(user = %user_id, "oauth login");
    start_session(&state, user_id).await
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ServerError> {
    if let Some(cookie) = session_cookie_value(&headers) {
        state.sessions.remove(&cookie).await;
    }
    redirect(
        &state.config.redirect_logout,
        Some(clear_session_cookie(&cookie_options(&state))),
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_session(state: &AppState, user_id: Uuid) -> Result<Response, ServerError> {
    let value = state.sessions.create(user_id).await;
    let cookie = session_cookie(&value, state.sessions.max_age(), &cookie_options(state));
    redirect(&state.config.redirect_secure, Some(cookie))
}

fn unknown_login() -> ServerError {
    ServerError::NotFound("Unknown email or password".into())
}

/// Run CPU-heavy password work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("Password task failed: {e}")))
}

fn cookie_options(state: &AppState) -> CookieOptions {
    CookieOptions {
        domain: state.config.cookie_domain.clone(),
        secure: state.config.secure_cookies,
    }
}

fn redirect(location: &str, set_cookie: Option<String>) -> Result<Response, ServerError> {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location);
    if let Some(cookie) = set_cookie {
        builder = builder.header(header::SET_COOKIE, cookie);
    }
    builder
        .body(Body::empty())
        .map_err(|e| ServerError::Internal(format!("Failed to build redirect: {e}")))
}
