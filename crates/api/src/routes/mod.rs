use axum::extract::{Extension, Path, Query, State};
use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kumpul_domain::group::{Group, GroupCreate, GroupInfo, GroupMembers};
use kumpul_domain::identity::ActorIdentity;
use kumpul_domain::mute::MuteStatus;
use kumpul_domain::notify::{SystemNotification, SystemNotificationInput};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::AuthContext;
use crate::observability;
use crate::{error::ApiError, middleware as app_middleware, state::AppState, validation};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/groups", post(create_group))
        .route("/v1/groups/joined", get(joined_groups))
        .route("/v1/groups/:group_id", get(group_info))
        .route("/v1/groups/:group_id/avatar", get(group_avatar))
        .route("/v1/groups/:group_id/members", get(group_members).post(add_members))
        .route("/v1/groups/:group_id/members/remove", post(remove_member))
        .route("/v1/groups/:group_id/name", post(rename_group))
        .route("/v1/groups/:group_id/exit", post(exit_group))
        .route("/v1/groups/:group_id/dismiss", post(dismiss_group))
        .route("/v1/groups/:group_id/mute-status", get(get_mute_status))
        .route("/v1/groups/:group_id/mute", post(set_mute_status))
        .route(
            "/v1/groups/:group_id/notifications",
            post(post_notification).get(list_notifications),
        )
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(app_middleware::metrics_layer));

    if !state.config.is_test() {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn metrics() -> Response {
    let body = observability::render_metrics().unwrap_or_default();
    (StatusCode::OK, body).into_response()
}

fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    let user_id = auth.user_id.ok_or(ApiError::Unauthorized)?;
    Ok(ActorIdentity {
        user_id,
        username: auth
            .username
            .clone()
            .unwrap_or_else(|| user_id.to_string()),
    })
}

#[derive(Debug, Deserialize, Validate)]
struct CreateGroupRequest {
    #[validate(length(min = 1, max = 20))]
    name: String,
    #[serde(default)]
    members: Vec<i64>,
    photo: Option<String>,
}

async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<Response, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let group = state
        .groups
        .create_group(
            &actor,
            GroupCreate {
                name: payload.name,
                members: payload.members,
                photo: payload.photo,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(group)).into_response())
}

#[derive(Debug, Deserialize)]
struct JoinedQuery {
    limit: Option<usize>,
}

async fn joined_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<JoinedQuery>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let groups = state.groups.joined_groups(&actor, query.limit).await?;
    Ok(Json(groups))
}

async fn group_info(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupInfo>, ApiError> {
    let info = state.groups.group_info(&group_id).await?;
    Ok(Json(info))
}

#[derive(Serialize)]
struct AvatarResponse {
    group_id: String,
    photos: Vec<String>,
}

async fn group_avatar(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<AvatarResponse>, ApiError> {
    let photos = state.groups.avatar_photos(&group_id).await?;
    Ok(Json(AvatarResponse { group_id, photos }))
}

async fn group_members(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupMembers>, ApiError> {
    let members = state.groups.members_with_profiles(&group_id).await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
struct AddMembersRequest {
    members: Vec<i64>,
}

async fn add_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Json(payload): Json<AddMembersRequest>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_identity(&auth)?;
    let group = state
        .groups
        .add_members(&actor, &group_id, payload.members)
        .await?;
    Ok(Json(group))
}

#[derive(Debug, Deserialize)]
struct RemoveMemberRequest {
    user_id: i64,
}

async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Json(payload): Json<RemoveMemberRequest>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_identity(&auth)?;
    let group = state
        .groups
        .remove_member(&actor, &group_id, payload.user_id)
        .await?;
    Ok(Json(group))
}

#[derive(Debug, Deserialize, Validate)]
struct RenameGroupRequest {
    #[validate(length(min = 1, max = 20))]
    name: String,
}

async fn rename_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Json(payload): Json<RenameGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let group = state
        .groups
        .rename_group(&actor, &group_id, &payload.name)
        .await?;
    Ok(Json(group))
}

async fn exit_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_identity(&auth)?;
    let group = state.groups.exit_group(&actor, &group_id).await?;
    Ok(Json(group))
}

async fn dismiss_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_identity(&auth)?;
    let group = state.groups.dismiss_group(&actor, &group_id).await?;
    Ok(Json(group))
}

async fn get_mute_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
) -> Result<Json<MuteStatus>, ApiError> {
    let actor = actor_identity(&auth)?;
    let status = state.mutes.get_status(&actor, &group_id).await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
struct SetMuteRequest {
    muted: bool,
}

async fn set_mute_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Json(payload): Json<SetMuteRequest>,
) -> Result<Json<MuteStatus>, ApiError> {
    let actor = actor_identity(&auth)?;
    let status = state
        .mutes
        .set_status(&actor, &group_id, payload.muted)
        .await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize, Validate)]
struct PostNotificationRequest {
    id: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    content: String,
    sender_id: i64,
    sender_name: String,
    action: String,
    created_at_ms: Option<i64>,
}

async fn post_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Json(payload): Json<PostNotificationRequest>,
) -> Result<Response, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let notification = state
        .notifications
        .post(
            &actor,
            &group_id,
            SystemNotificationInput {
                id: payload.id,
                content: payload.content,
                sender_id: payload.sender_id,
                sender_name: payload.sender_name,
                action: payload.action,
                created_at_ms: payload.created_at_ms,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(notification)).into_response())
}

#[derive(Debug, Deserialize)]
struct NotificationListQuery {
    limit: Option<usize>,
    before_ms: Option<i64>,
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<String>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Vec<SystemNotification>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let notifications = state
        .notifications
        .list(&actor, &group_id, query.limit, query.before_ms)
        .await?;
    Ok(Json(notifications))
}
