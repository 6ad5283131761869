/// House endpoints
///
/// - `GET /v1/houses` - houses of the caller, earliest joined first
/// - `GET /v1/houses/primary` - the caller's earliest joined house
/// - `POST /v1/houses` - create a house; the caller becomes its owner
/// - `GET /v1/houses/:house_id` - house detail with the caller's role
/// - `PATCH /v1/houses/:house_id` - rename (owner/admin)
/// - `POST /v1/houses/:house_id/leave` - remove yourself

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::auth::authorization::{require_manager, require_membership};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::house::{CreateHouse, House, HouseWithRole, OWNER_NAME_CONSTRAINT};
use hearth_shared::models::is_unique_violation;
use hearth_shared::models::membership::MemberRole;
use hearth_shared::realtime::{EventAction, RealtimeEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct HouseNameRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

impl HouseNameRequest {
    /// Validated, trimmed name
    fn name(&self) -> ApiResult<String> {
        self.validate()?;
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::invalid("name", "Name must not be blank"));
        }
        Ok(name.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct HouseDetail {
    #[serde(flatten)]
    pub house: House,
    pub role: MemberRole,
    pub permissions: Vec<String>,
}

fn duplicate_name(name: &str) -> ApiError {
    ApiError::Conflict(format!("You already own a house named \"{name}\""))
}

pub async fn list_houses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<HouseWithRole>>> {
    let houses = House::list_by_user(&state.db, auth.user_id).await?;
    Ok(Json(houses))
}

/// Clients that show one house at a time use this as their default
pub async fn primary_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<HouseWithRole>> {
    House::primary_for_user(&state.db, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("You are not a member of any house".to_string()))
}

pub async fn create_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<HouseNameRequest>,
) -> ApiResult<(StatusCode, Json<House>)> {
    let name = req.name()?;

    let house = House::create_with_owner(
        &state.db,
        CreateHouse {
            name: name.clone(),
            created_by: auth.user_id,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e, OWNER_NAME_CONSTRAINT) {
            duplicate_name(&name)
        } else {
            e.into()
        }
    })?;

    info!(house_id = %house.id, user_id = %auth.user_id, "House created");

    Ok((StatusCode::CREATED, Json(house)))
}

pub async fn get_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<Json<HouseDetail>> {
    let membership = require_membership(&state.db, house_id, auth.user_id).await?;

    let house = House::find_by_id(&state.db, house_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("House {house_id} not found")))?;

    Ok(Json(HouseDetail {
        house,
        role: membership.role,
        permissions: membership.permissions,
    }))
}

pub async fn rename_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<HouseNameRequest>,
) -> ApiResult<Json<House>> {
    require_manager(&state.db, house_id, auth.user_id).await?;
    let name = req.name()?;

    let house = House::rename(&state.db, house_id, &name)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, OWNER_NAME_CONSTRAINT) {
                duplicate_name(&name)
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| ApiError::NotFound(format!("House {house_id} not found")))?;

    state.broadcaster.publish(RealtimeEvent::membership(
        EventAction::Updated,
        house_id,
        json!({ "house_id": house_id, "name": house.name }),
    ));

    Ok(Json(house))
}

/// Leaving follows the same rules as removal: the last member and the
/// last owner cannot leave.
pub async fn leave_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = state.directory.remove_member(house_id, auth.user_id).await?;

    let event = RealtimeEvent::membership(EventAction::Removed, house_id, &removed);
    // the leaver is no longer resolved as a member, so tell them directly
    state.broadcaster.publish_to_user(auth.user_id, event.clone());
    state.broadcaster.publish(event);

    Ok(StatusCode::NO_CONTENT)
}
