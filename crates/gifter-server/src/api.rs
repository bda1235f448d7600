use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use gifter_store::{
    CommentView, Database, EventSummary, GiftStatus, GiftView, ParticipantView, StoreError, User,
};

use crate::auth::{self, CurrentUser};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::oauth::GoogleOAuth;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub sessions: SessionStore,
    pub oauth: Option<GoogleOAuth>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: SessionStore::new(&config.session_secret, config.session_max_age),
            oauth: config.google.clone().map(GoogleOAuth::new),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth", get(auth::oauth_begin))
        .route("/auth/callback", get(auth::oauth_callback))
        .route("/auth/logout", get(auth::logout))
        .route("/api/user", get(current_user))
        .route("/api/events", get(list_events))
        .route("/api/events/create", post(create_event))
        .route("/api/events/:event_id/participants", get(list_participants))
        .route(
            "/api/events/:event_id/participants/create",
            post(add_participant),
        )
        .route("/api/events/:event_id/gifts", get(list_gifts))
        .route("/api/events/:event_id/gifts/create", post(create_gift))
        .route(
            "/api/events/:event_id/gifts/:gift_id/update",
            post(update_gift),
        )
        .route(
            "/api/events/:event_id/gifts/:gift_id/delete",
            post(delete_gift),
        )
        .route(
            "/api/events/:event_id/gifts/:gift_id/comments",
            get(list_comments),
        )
        .route(
            "/api/events/:event_id/gifts/:gift_id/comments/create",
            post(create_comment),
        )
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct EventsResponse {
    events: Vec<EventSummary>,
}

#[derive(Serialize)]
struct ParticipantsResponse {
    participants: Vec<ParticipantView>,
}

#[derive(Serialize)]
struct GiftsResponse {
    gifts: Vec<GiftView>,
}

#[derive(Serialize)]
struct CommentsResponse {
    comments: Vec<CommentView>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: GiftStatus,
}

#[derive(Deserialize)]
struct CreateEventRequest {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct AddParticipantRequest {
    participant_email: String,
}

#[derive(Deserialize)]
struct CreateGiftRequest {
    name: String,
    to_id: String,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    secret: bool,
}

#[derive(Deserialize)]
struct UpdateGiftRequest {
    status: GiftStatus,
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    message: String,
}

pub(crate) fn invalid_payload(e: JsonRejection) -> ServerError {
    debug!(error = %e, "rejected request body");
    ServerError::BadRequest("Invalid request payload".into())
}

/// Event ids that do not parse cannot belong to the user.
fn parse_event_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::NoAccess)
}

fn parse_gift_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest("Gift not found".into()))
}

/// Unknown, foreign and tombstoned gifts all read as "Gift not found".
fn gift_error(e: StoreError) -> ServerError {
    match e {
        StoreError::NotFound => ServerError::BadRequest("Gift not found".into()),
        other => other.into(),
    }
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn current_user(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ServerError> {
    let db = state.db.lock().await;
    match db.get_user(user_id) {
        Ok(user) => Ok(Json(user)),
        Err(StoreError::NotFound) => Err(ServerError::NotFound("User not found".into())),
        Err(e) => Err(e.into()),
    }
}

async fn list_events(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, ServerError> {
    let db = state.db.lock().await;
    let events = db.list_events(user_id)?;
    Ok(Json(EventsResponse { events }))
}

async fn create_event(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    body: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;

    let mut db = state.db.lock().await;
    let event = db.create_event(user_id, &req.name, req.date)?;
    Ok(Json(CreatedResponse { id: event.id }))
}

async fn list_participants(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<ParticipantsResponse>, ServerError> {
    let event_id = parse_event_id(&event_id)?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let participants = db.list_participants(event_id)?;
    Ok(Json(ParticipantsResponse { participants }))
}

async fn add_participant(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    body: Result<Json<AddParticipantRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;
    let event_id = parse_event_id(&event_id)?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let participant = db.add_participant(event_id, &req.participant_email)?;

    info!(event = %event_id, invited_by = %user_id, "participant invited");
    Ok(Json(CreatedResponse {
        id: participant.user_id,
    }))
}

async fn list_gifts(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<GiftsResponse>, ServerError> {
    let event_id = parse_event_id(&event_id)?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let gifts = db.list_gifts(user_id, event_id)?;
    Ok(Json(GiftsResponse { gifts }))
}

async fn create_gift(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    body: Result<Json<CreateGiftRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;

    if req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("Gift name is required".into()));
    }
    if req.to_id.trim().is_empty() {
        return Err(ServerError::BadRequest("To ID is required".into()));
    }
    let event_id = parse_event_id(&event_id)?;
    let to_id = Uuid::parse_str(req.to_id.trim())
        .map_err(|_| ServerError::BadRequest("Unknown recipient".into()))?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let gift = db.create_gift(
        user_id,
        event_id,
        &req.name,
        to_id,
        req.urls.as_slice(),
        req.secret,
    )?;
    Ok(Json(CreatedResponse { id: gift.id }))
}

async fn update_gift(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path((event_id, gift_id)): Path<(String, String)>,
    body: Result<Json<UpdateGiftRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;
    let event_id = parse_event_id(&event_id)?;
    let gift_id = parse_gift_id(&gift_id)?;

    let mut db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let content = db
        .update_gift_status(user_id, event_id, gift_id, req.status)
        .map_err(gift_error)?;
    Ok(Json(StatusResponse {
        status: content.status,
    }))
}

async fn delete_gift(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path((event_id, gift_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, ServerError> {
    let event_id = parse_event_id(&event_id)?;
    let gift_id = parse_gift_id(&gift_id)?;

    let mut db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    let content = db
        .mark_gift_for_deletion(user_id, event_id, gift_id)
        .map_err(gift_error)?;
    Ok(Json(StatusResponse {
        status: content.status,
    }))
}

async fn list_comments(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path((event_id, gift_id)): Path<(String, String)>,
) -> Result<Json<CommentsResponse>, ServerError> {
    let event_id = parse_event_id(&event_id)?;
    let gift_id = parse_gift_id(&gift_id)?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    if !db.has_gift(event_id, gift_id)? {
        return Err(ServerError::BadRequest("Gift not found".into()));
    }
    let comments = db.list_comments(gift_id)?;
    Ok(Json(CommentsResponse { comments }))
}

async fn create_comment(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path((event_id, gift_id)): Path<(String, String)>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ServerError> {
    let Json(req) = body.map_err(invalid_payload)?;
    if req.message.trim().is_empty() {
        return Err(ServerError::BadRequest("Message is required".into()));
    }
    let event_id = parse_event_id(&event_id)?;
    let gift_id = parse_gift_id(&gift_id)?;

    let db = state.db.lock().await;
    db.require_event_access(user_id, event_id)?;
    if !db.has_gift(event_id, gift_id)? {
        return Err(ServerError::BadRequest("Gift not found".into()));
    }
    let comment = db.create_comment(user_id, gift_id, &req.message)?;
    Ok(Json(CreatedResponse { id: comment.id }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
