use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use ltm_core::{
    AccountDeletion, AddMembersReport, ChangeFeed, ChatError, ChatService, CreatedGroup,
    NewMessage, ProfileUpdate, WorkflowOutcome,
};
use ltm_shared::payment::PaymentEvent;
use ltm_shared::UserRole;
use ltm_store::{Group, GroupMessage, GroupUser, UserIndex};

use crate::auth::{verify_webhook_secret, AuthUser};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::events::{change_stream, group_filter, user_filter};
use crate::media_store::{MediaPrefix, MediaStore};

/// Headroom for multipart framing on top of the media size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<Mutex<ChatService>>,
    pub feed: ChangeFeed,
    pub media: Arc<MediaStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = state.media.max_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Profiles
        .route("/me", get(get_me).delete(delete_me))
        .route("/me/recent-group", patch(set_recent_group))
        .route("/me/events", get(my_events))
        .route("/users/search", get(search_users))
        .route("/users/:id", get(get_user).patch(update_user))
        .route("/users/:id/role", put(set_user_role))
        .route("/users/:id/locked-bio", put(set_locked_bio))
        // Groups
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/by-slug/:slug", get(get_group_by_slug))
        .route(
            "/groups/:id",
            get(get_group).patch(rename_group).delete(delete_group),
        )
        .route("/groups/:id/members", get(list_members).post(add_members))
        .route("/groups/:id/members/:user_id", delete(remove_member))
        .route("/groups/:id/leave", post(leave_group))
        .route("/groups/:id/messages", get(list_messages).post(post_message))
        .route("/groups/:id/events", get(group_events))
        // Media
        .route("/media/upload", post(media_upload))
        .route("/media/:prefix/:id", get(media_download))
        // Payment provider
        .route("/webhooks/privilege", post(privilege_webhook))
        .route("/webhooks/vip", post(vip_webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Payloads ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    auth_enabled: bool,
    webhooks_enabled: bool,
    lawyer_configured: bool,
    max_media_size: usize,
}

#[derive(Serialize)]
struct MediaUploadResponse {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    emails: Vec<String>,
}

#[derive(Deserialize)]
struct RenameGroupRequest {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct AddMembersRequest {
    #[serde(default)]
    emails: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentGroupRequest {
    #[serde(default)]
    recent_group: String,
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: UserRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockedBioRequest {
    #[serde(default)]
    locked_bio: Option<String>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

// ─── Service ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        auth_enabled: state.config.identity_provider_pubkey.is_some(),
        webhooks_enabled: state.config.webhook_secret.is_some(),
        lawyer_configured: state.config.workflow.lawyer_user_id.is_some(),
        max_media_size: state.media.max_size(),
    })
}

// ─── Profiles ───

async fn get_me(user: AuthUser) -> Json<UserIndex> {
    Json(user.0)
}

async fn delete_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AccountDeletion>, ServerError> {
    let report = state.chat.lock().await.delete_account(user.user_id())?;
    info!(user = %user.user_id(), "Account deleted via API");
    Ok(Json(report))
}

async fn set_recent_group(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RecentGroupRequest>,
) -> Result<Json<UserIndex>, ServerError> {
    let updated = state
        .chat
        .lock()
        .await
        .set_recent_group(user.user_id(), &req.recent_group)?;
    Ok(Json(updated))
}

async fn search_users(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserIndex>>, ServerError> {
    let found = state.chat.lock().await.search_users(&params.query)?;
    Ok(Json(found))
}

async fn get_user(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserIndex>, ServerError> {
    let profile = state.chat.lock().await.get_profile(id)?;
    Ok(Json(profile))
}

async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserIndex>, ServerError> {
    let updated = state
        .chat
        .lock()
        .await
        .update_profile(user.user_id(), id, update)?;
    Ok(Json(updated))
}

async fn set_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<UserIndex>, ServerError> {
    let updated = state.chat.lock().await.set_role(user.user_id(), id, req.role)?;
    info!(by = %user.user_id(), target = %updated.user_id, role = %req.role, "Role changed via API");
    Ok(Json(updated))
}

async fn set_locked_bio(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LockedBioRequest>,
) -> Result<Json<UserIndex>, ServerError> {
    let updated = state
        .chat
        .lock()
        .await
        .set_locked_bio(user.user_id(), id, req.locked_bio)?;
    Ok(Json(updated))
}

async fn my_events(
    user: AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();
    Sse::new(change_stream(rx, user_filter(user.0.user_id))).keep_alive(KeepAlive::default())
}

// ─── Groups ───

async fn list_groups(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Group>>, ServerError> {
    let groups = state.chat.lock().await.list_my_groups(user.user_id())?;
    Ok(Json(groups))
}

async fn create_group(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<CreatedGroup>), ServerError> {
    let created = state
        .chat
        .lock()
        .await
        .create_group(user.user_id(), &req.name, &req.emails)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_group_by_slug(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Group>, ServerError> {
    let group = state.chat.lock().await.get_group_by_slug(user.user_id(), &slug)?;
    Ok(Json(group))
}

async fn get_group(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Group>, ServerError> {
    let group = state.chat.lock().await.get_group(user.user_id(), id)?;
    Ok(Json(group))
}

async fn rename_group(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameGroupRequest>,
) -> Result<Json<Group>, ServerError> {
    let group = state
        .chat
        .lock()
        .await
        .rename_group(user.user_id(), id, &req.name)?;
    Ok(Json(group))
}

async fn delete_group(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.chat.lock().await.delete_group(user.user_id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GroupUser>>, ServerError> {
    let members = state.chat.lock().await.list_members(user.user_id(), id)?;
    Ok(Json(members))
}

async fn add_members(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMembersRequest>,
) -> Result<Json<AddMembersReport>, ServerError> {
    let report = state
        .chat
        .lock()
        .await
        .add_members_by_email(user.user_id(), id, &req.emails)?;
    Ok(Json(report))
}

async fn remove_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, member_user_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .chat
        .lock()
        .await
        .remove_member(user.user_id(), id, &member_user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_group(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.chat.lock().await.leave_group(user.user_id(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GroupMessage>>, ServerError> {
    let messages = state.chat.lock().await.list_messages(user.user_id(), id)?;
    Ok(Json(messages))
}

async fn post_message(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(message): Json<NewMessage>,
) -> Result<(StatusCode, Json<GroupMessage>), ServerError> {
    let stored = state
        .chat
        .lock()
        .await
        .post_message(user.user_id(), id, message)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn group_events(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    // Subscribe under the lock so no change slips in after the check.
    let rx = {
        let chat = state.chat.lock().await;
        chat.get_group(user.user_id(), id)?;
        state.feed.subscribe()
    };
    let stream = change_stream(rx, group_filter(id, user.0.user_id));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ─── Media ───

async fn media_upload(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaUploadResponse>), ServerError> {
    let mut prefix = None;
    let mut data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "path" => {
                let hint = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                prefix = Some(MediaPrefix::parse(&hint)?);
            }
            "file" => {
                match field.content_type() {
                    Some(content_type) if content_type.starts_with("image/") => {}
                    Some(content_type) => {
                        return Err(ServerError::BadRequest(format!(
                            "Only images can be uploaded, got {content_type}"
                        )));
                    }
                    None => {
                        return Err(ServerError::BadRequest(
                            "Missing content type on 'file' field".into(),
                        ));
                    }
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                data = Some(bytes);
            }
            _ => {}
        }
    }

    let prefix =
        prefix.ok_or_else(|| ServerError::BadRequest("Missing 'path' field in multipart form".into()))?;
    let data =
        data.ok_or_else(|| ServerError::BadRequest("Missing 'file' field in multipart form".into()))?;

    let reference = state.media.store(prefix, &data).await?;
    info!(reference = %reference, size = data.len(), user = %user.user_id(), "Media uploaded via API");

    Ok((StatusCode::CREATED, Json(MediaUploadResponse { reference })))
}

async fn media_download(
    State(state): State<AppState>,
    Path((prefix, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServerError> {
    let prefix = MediaPrefix::parse(&prefix)?;
    let data = state.media.load(prefix, id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

// ─── Payment provider webhooks ───

async fn privilege_webhook(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WorkflowOutcome>, ServerError> {
    verify_webhook_secret(&headers, &state.config)?;
    let event = parse_event(&body)?;
    let outcome = state
        .chat
        .lock()
        .await
        .handle_privilege_event(&event)
        .map_err(|e| log_webhook_failure("privilege", &event, e))?;
    Ok(Json(outcome))
}

async fn vip_webhook(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WorkflowOutcome>, ServerError> {
    verify_webhook_secret(&headers, &state.config)?;
    let event = parse_event(&body)?;
    let outcome = state
        .chat
        .lock()
        .await
        .handle_vip_event(&event)
        .map_err(|e| log_webhook_failure("vip", &event, e))?;
    Ok(Json(outcome))
}

fn parse_event(body: &[u8]) -> Result<PaymentEvent, ServerError> {
    PaymentEvent::parse(body).map_err(|e| ServerError::Chat(ChatError::from(e)))
}

fn log_webhook_failure(endpoint: &str, event: &PaymentEvent, err: ChatError) -> ServerError {
    if err.is_client_error() {
        warn!(endpoint, key = %event.key, error = %err, "Webhook event rejected");
    } else {
        error!(
            endpoint,
            key = %event.key,
            retryable = err.is_retryable(),
            error = %err,
            "Webhook event not applied"
        );
    }
    ServerError::Chat(err)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
