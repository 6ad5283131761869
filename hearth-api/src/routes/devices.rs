/// Device endpoints
///
/// - `GET|POST /v1/houses/:house_id/devices`
/// - `PATCH|DELETE /v1/houses/:house_id/devices/:device_id`
///
/// Device state is an opaque JSON object owned by the client; the server
/// stores it and broadcasts `device_update` on every change.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::auth::authorization::{require_membership, require_permission};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::device::{CreateDevice, Device, DevicePatch};
use hearth_shared::models::membership::MemberPermission;
use hearth_shared::realtime::{EventAction, RealtimeEvent};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddDeviceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// e.g. `light`, `thermostat`, `lock`
    #[validate(length(min = 1, max = 50, message = "Kind must be 1-50 characters"))]
    pub kind: String,

    #[serde(default = "empty_state")]
    pub state: JsonValue,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeviceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub state: Option<JsonValue>,
}

fn empty_state() -> JsonValue {
    json!({})
}

fn check_state(state: &JsonValue) -> ApiResult<()> {
    if !state.is_object() {
        return Err(ApiError::invalid("state", "State must be a JSON object"));
    }
    Ok(())
}

fn not_found(device_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Device {device_id} not found"))
}

pub async fn list_devices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Device>>> {
    require_membership(&state.db, house_id, auth.user_id).await?;
    let devices = Device::list_by_house(&state.db, house_id).await?;
    Ok(Json(devices))
}

pub async fn add_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<AddDeviceRequest>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageDevices).await?;
    req.validate()?;
    check_state(&req.state)?;

    let device = Device::create(
        &state.db,
        CreateDevice {
            house_id,
            name: req.name.trim().to_string(),
            kind: req.kind.trim().to_lowercase(),
            state: req.state,
            created_by: auth.user_id,
        },
    )
    .await?;

    state
        .broadcaster
        .publish(RealtimeEvent::device(EventAction::Created, house_id, &device));

    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn update_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, device_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateDeviceRequest>,
) -> ApiResult<Json<Device>> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageDevices).await?;
    req.validate()?;
    if let Some(device_state) = &req.state {
        check_state(device_state)?;
    }

    let patch = DevicePatch {
        name: req.name.map(|n| n.trim().to_string()),
        state: req.state,
    };

    let device = Device::update(&state.db, house_id, device_id, patch, auth.user_id)
        .await?
        .ok_or_else(|| not_found(device_id))?;

    tracing::debug!(house_id = %house_id, device_id = %device_id, "Device state changed");

    state
        .broadcaster
        .publish(RealtimeEvent::device(EventAction::Updated, house_id, &device));

    Ok(Json(device))
}

pub async fn delete_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, device_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageDevices).await?;

    if !Device::delete(&state.db, house_id, device_id).await? {
        return Err(not_found(device_id));
    }

    state
        .broadcaster
        .publish(RealtimeEvent::device(EventAction::Deleted, house_id, json!({ "id": device_id })));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_must_be_object() {
        assert!(check_state(&json!({ "on": true })).is_ok());
        assert!(check_state(&json!([1, 2])).is_err());
        assert!(check_state(&JsonValue::Null).is_err());
    }

    #[test]
    fn test_state_defaults_to_empty_object() {
        let req: AddDeviceRequest =
            serde_json::from_value(json!({ "name": "Hall light", "kind": "light" })).unwrap();
        assert_eq!(req.state, json!({}));
    }
}
