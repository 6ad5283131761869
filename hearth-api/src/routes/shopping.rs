/// Shopping list endpoints
///
/// - `GET|POST /v1/houses/:house_id/shopping`
/// - `PATCH|DELETE /v1/houses/:house_id/shopping/:item_id`
/// - `POST /v1/houses/:house_id/shopping/commit`
///
/// Item edits only broadcast `shopping_list_update`. Members get a
/// notification when someone commits the list, so a burst of edits while
/// shopping produces one notification instead of dozens.

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
use hearth_shared::models::membership::MemberPermission;
use hearth_shared::models::shopping_item::{CreateShoppingItem, ShoppingItem, ShoppingItemPatch};
use hearth_shared::notify::best_effort;
use hearth_shared::realtime::{EventAction, RealtimeEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: Option<i32>,

    pub checked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub open_items: i64,
}

fn not_found(item_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Shopping item {item_id} not found"))
}

pub async fn list_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ShoppingItem>>> {
    require_membership(&state.db, house_id, auth.user_id).await?;
    let items = ShoppingItem::list_by_house(&state.db, house_id).await?;
    Ok(Json(items))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<ShoppingItem>)> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageShopping).await?;
    req.validate()?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("name", "Name must not be blank"));
    }

    let item = ShoppingItem::create(
        &state.db,
        CreateShoppingItem {
            house_id,
            name: name.to_string(),
            quantity: req.quantity,
            added_by: auth.user_id,
        },
    )
    .await?;

    state
        .broadcaster
        .publish(RealtimeEvent::shopping(EventAction::Created, house_id, &item));

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<ShoppingItem>> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageShopping).await?;
    req.validate()?;

    let patch = ShoppingItemPatch {
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        quantity: req.quantity,
        checked: req.checked,
    };

    let item = ShoppingItem::update(&state.db, house_id, item_id, patch, auth.user_id)
        .await?
        .ok_or_else(|| not_found(item_id))?;

    state
        .broadcaster
        .publish(RealtimeEvent::shopping(EventAction::Updated, house_id, &item));

    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageShopping).await?;

    if !ShoppingItem::delete(&state.db, house_id, item_id).await? {
        return Err(not_found(item_id));
    }

    state
        .broadcaster
        .publish(RealtimeEvent::shopping(EventAction::Deleted, house_id, json!({ "id": item_id })));

    Ok(StatusCode::NO_CONTENT)
}

/// Tells the other members the list is ready
pub async fn commit_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CommitResponse>)> {
    require_permission(&state.db, house_id, auth.user_id, MemberPermission::ManageShopping).await?;

    let open_items = ShoppingItem::count_open(&state.db, house_id).await?;

    let notifier = state.notifier.clone();
    let actor_id = auth.user_id;
    let actor_name = auth.display_name().to_string();
    best_effort("shopping_list_notification", async move {
        notifier
            .shopping_list_updated(house_id, actor_id, &actor_name, open_items)
            .await
    });

    Ok((StatusCode::ACCEPTED, Json(CommitResponse { open_items })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() {
        let req: AddItemRequest = serde_json::from_value(json!({ "name": "Milk" })).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_validation() {
        let req: UpdateItemRequest = serde_json::from_value(json!({ "quantity": 0 })).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("quantity"));

        let req: UpdateItemRequest = serde_json::from_value(json!({ "checked": true })).unwrap();
        assert!(req.validate().is_ok());
    }
}
