/// In-app notification endpoints
///
/// - `GET /v1/notifications?unread=true&limit=50`
/// - `POST /v1/notifications/:id/read`
/// - `POST /v1/notifications/read-all`
/// - `DELETE /v1/notifications/:id`
///
/// All operations are scoped to the recipient. A notification belonging to
/// someone else looks exactly like one that does not exist.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::notification::Notification;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

impl ListNotificationsQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Notification {id} not found"))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<NotificationList>> {
    let notifications = Notification::list_for_user(&state.db, auth.user_id, query.unread, query.limit()).await?;
    let unread = Notification::count_unread(&state.db, auth.user_id).await?;

    Ok(Json(NotificationList { notifications, unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::mark_read(&state.db, auth.user_id, id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = Notification::mark_all_read(&state.db, auth.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::delete(&state.db, auth.user_id, id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
