/// Task board endpoints
///
/// - `GET /v1/houses/:house_id/tasks?status=&assigned_to=`
/// - `POST /v1/houses/:house_id/tasks`
/// - `GET|PATCH|DELETE /v1/houses/:house_id/tasks/:task_id`
/// - `POST /v1/houses/:house_id/tasks/:task_id/complete`
/// - `POST /v1/houses/:house_id/tasks/reorder`
///
/// Any member may read. Mutations need the `manage_tasks` flag, except that
/// an assignee may always complete their own task. Every mutation
/// broadcasts a `task_update` event; assigning someone else also creates a
/// `task_assigned` notification for them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hearth_shared::auth::authorization::{ensure_permission, require_membership, require_permission};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::membership::{MemberPermission, Membership};
use hearth_shared::models::task::{
    AssignmentChange, CreateTask, Task, TaskPatch, TaskPriority, TaskStatus, TaskUpdate,
};
use hearth_shared::notify::best_effort;
use hearth_shared::realtime::{EventAction, RealtimeEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: TaskPriority,

    pub assigned_to: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 100, message = "Effort must be between 1 and 100"))]
    pub effort: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(length(min = 1, max = 500, message = "Provide 1-500 positions"))]
    pub positions: Vec<TaskPosition>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TaskPosition {
    pub id: Uuid,
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub moved: u64,
}

async fn require_assignable(pool: &PgPool, house_id: Uuid, assignee: Option<Uuid>) -> ApiResult<()> {
    if let Some(user_id) = assignee {
        if !Membership::has_access(pool, house_id, user_id).await? {
            return Err(ApiError::invalid("assigned_to", "Assignee must be a member of this house"));
        }
    }
    Ok(())
}

fn invalid_window() -> ApiError {
    ApiError::invalid("end_date", "End date must not be before start date")
}

fn check_patch(patch: &TaskPatch) -> ApiResult<()> {
    if let Some(title) = &patch.title {
        if title.trim().is_empty() || title.chars().count() > 255 {
            return Err(ApiError::invalid("title", "Title must be 1-255 characters"));
        }
    }
    if let Some(Some(effort)) = patch.effort {
        if !(1..=100).contains(&effort) {
            return Err(ApiError::invalid("effort", "Effort must be between 1 and 100"));
        }
    }
    Ok(())
}

/// Which event a patch produces
fn patch_action(change: AssignmentChange, before: TaskStatus, after: TaskStatus) -> EventAction {
    if before != TaskStatus::Completed && after == TaskStatus::Completed {
        return EventAction::Completed;
    }
    match change {
        AssignmentChange::Assigned(_) => EventAction::Assigned,
        AssignmentChange::Unassigned => EventAction::Unassigned,
        AssignmentChange::Unchanged => EventAction::Updated,
    }
}

/// Notifies the assignee in the background
fn notify_assignee(state: &AppState, task: &Task, auth: &AuthContext) {
    let notifier = state.notifier.clone();
    let task = task.clone();
    let actor_id = auth.user_id;
    let actor_name = auth.display_name().to_string();

    best_effort("task_assigned_notification", async move {
        notifier.task_assigned(&task, actor_id, &actor_name).await
    });
}

fn not_found(task_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Task {task_id} not found"))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    require_membership(&state.db, house_id, auth.user_id).await?;
    let tasks = Task::list_by_house(&state.db, house_id, query.status, query.assigned_to).await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageTasks).await?;
    req.validate()?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::invalid("title", "Title must not be blank"));
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if start > end {
            return Err(invalid_window());
        }
    }
    require_assignable(&state.db, house_id, req.assigned_to).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            house_id,
            title,
            description: req.description,
            priority: req.priority,
            assigned_to: req.assigned_to,
            start_date: req.start_date,
            end_date: req.end_date,
            effort: req.effort,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(house_id = %house_id, task_id = %task.id, status = task.status.as_str(), "Task created");

    if task.assigned_to.is_some() {
        notify_assignee(&state, &task, &auth);
    }
    state.broadcaster.publish(RealtimeEvent::task(EventAction::Created, house_id, &task));

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Task>> {
    require_membership(&state.db, house_id, auth.user_id).await?;

    Task::find_in_house(&state.db, house_id, task_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(task_id))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, task_id)): Path<(Uuid, Uuid)>,
    Json(mut patch): Json<TaskPatch>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageTasks).await?;
    check_patch(&patch)?;

    if let Some(title) = patch.title.take() {
        patch.title = Some(title.trim().to_string());
    }

    let TaskUpdate {
        task,
        change,
        previous_status,
    } = Task::update(&state.db, house_id, task_id, patch, Utc::now()).await?;

    if matches!(change, AssignmentChange::Assigned(_)) {
        notify_assignee(&state, &task, &auth);
    }

    let action = patch_action(change, previous_status, task.status);
    state.broadcaster.publish(RealtimeEvent::task(action, house_id, &task));

    Ok(Json(task))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Task>> {
    let membership = require_membership(&state.db, house_id, auth.user_id).await?;

    let task = Task::find_in_house(&state.db, house_id, task_id)
        .await?
        .ok_or_else(|| not_found(task_id))?;

    if task.assigned_to != Some(auth.user_id) {
        ensure_permission(&membership, MemberPermission::ManageTasks)?;
    }

    let task = Task::complete(&state.db, house_id, task_id)
        .await?
        .ok_or_else(|| not_found(task_id))?;

    tracing::info!(
        house_id = %house_id,
        task_id = %task_id,
        completed_by = ?task.completed_by,
        "Task completed"
    );

    state.broadcaster.publish(RealtimeEvent::task(EventAction::Completed, house_id, &task));

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageTasks).await?;

    if !Task::delete(&state.db, house_id, task_id).await? {
        return Err(not_found(task_id));
    }

    state
        .broadcaster
        .publish(RealtimeEvent::task(EventAction::Deleted, house_id, json!({ "id": task_id })));

    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites Kanban positions; ids outside the house are ignored
pub async fn reorder_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<ReorderResponse>> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageTasks).await?;
    req.validate()?;

    let positions: Vec<(Uuid, i32)> = req.positions.iter().map(|p| (p.id, p.position)).collect();
    let moved = Task::reorder(&state.db, house_id, &positions).await?;

    state.broadcaster.publish(RealtimeEvent::task(
        EventAction::Updated,
        house_id,
        json!({ "reordered": req.positions }),
    ));

    Ok(Json(ReorderResponse { moved }))
}
