/// Member management endpoints
///
/// - `GET /v1/houses/:house_id/members`
/// - `PUT /v1/houses/:house_id/members/:user_id` - change role and permission flags
/// - `DELETE /v1/houses/:house_id/members/:user_id` - remove and release held tasks
///
/// Changes and removals go through the role policy: owners manage members,
/// admins manage admins and members, nobody manages owners or themselves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::auth::authorization::{require_membership, AuthzError};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::auth::policy::{check_member_action, Party, RoleAction};
use hearth_shared::models::membership::{MemberPermission, MemberRole, MemberWithUser, Membership};
use hearth_shared::realtime::{EventAction, RealtimeEvent};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,

    /// Replaces the flags when present
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Rejects unknown flags and removes duplicates
fn normalize_permissions(permissions: Vec<String>) -> ApiResult<Vec<String>> {
    let mut parsed: Vec<MemberPermission> = Vec::with_capacity(permissions.len());

    for raw in &permissions {
        let permission = MemberPermission::parse(raw)
            .ok_or_else(|| ApiError::invalid("permissions", format!("Unknown permission '{raw}'")))?;
        if !parsed.contains(&permission) {
            parsed.push(permission);
        }
    }

    Ok(parsed.into_iter().map(|p| p.as_str().to_string()).collect())
}

/// Resolves both parties of a member-management request
async fn parties(pool: &PgPool, house_id: Uuid, actor_id: Uuid, target_id: Uuid) -> ApiResult<(Party, Party)> {
    let actor = require_membership(pool, house_id, actor_id).await?;
    let target = Membership::find(pool, house_id, target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {target_id} is not a member of this house")))?;

    Ok((
        Party {
            user_id: actor.user_id,
            role: actor.role,
        },
        Party {
            user_id: target.user_id,
            role: target.role,
        },
    ))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberWithUser>>> {
    require_membership(&state.db, house_id, auth.user_id).await?;
    let members = Membership::list_by_house(&state.db, house_id).await?;
    Ok(Json(members))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<Membership>> {
    let permissions = req.permissions.map(normalize_permissions).transpose()?;

    let (actor, target) = parties(&state.db, house_id, auth.user_id, user_id).await?;
    check_member_action(actor, target, RoleAction::ChangeRole, Some(req.role))
        .into_result()
        .map_err(AuthzError::from)?;

    let membership = Membership::update(&state.db, house_id, user_id, req.role, permissions)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} is not a member of this house")))?;

    info!(
        house_id = %house_id,
        user_id = %user_id,
        actor_id = %auth.user_id,
        role = membership.role.as_str(),
        "Member updated"
    );

    state
        .broadcaster
        .publish(RealtimeEvent::membership(EventAction::Updated, house_id, &membership));

    Ok(Json(membership))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let (actor, target) = parties(&state.db, house_id, auth.user_id, user_id).await?;
    check_member_action(actor, target, RoleAction::Remove, None)
        .into_result()
        .map_err(AuthzError::from)?;

    let removed = state.directory.remove_member(house_id, user_id).await?;

    let event = RealtimeEvent::membership(EventAction::Removed, house_id, &removed);
    state.broadcaster.publish_to_user(user_id, event.clone());
    state.broadcaster.publish(event);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_permissions() {
        let flags = normalize_permissions(vec![
            "manage_tasks".to_string(),
            "manage_devices".to_string(),
            "manage_tasks".to_string(),
        ])
        .unwrap();
        assert_eq!(flags, vec!["manage_tasks", "manage_devices"]);

        assert!(normalize_permissions(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let err = normalize_permissions(vec!["launch_rockets".to_string()]).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(details) if details[0].field == "permissions"));
    }
}
