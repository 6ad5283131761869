/// Push endpoint registration
///
/// - `POST /v1/push-subscriptions` - register (or move) a browser endpoint
/// - `DELETE /v1/push-subscriptions` - unregister it
///
/// Registration is an upsert on the endpoint URL: a browser that signs in
/// as someone else moves its endpoint to the new user.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::push_subscription::{CreatePushSubscription, PushSubscription};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionKeys {
    #[validate(length(min = 1, max = 255, message = "p256dh key is required"))]
    pub p256dh: String,

    #[validate(length(min = 1, max = 255, message = "auth secret is required"))]
    pub auth: String,
}

/// Same shape as a browser's `PushSubscription.toJSON()`
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(url(message = "Endpoint must be a URL"))]
    pub endpoint: String,

    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnregisterRequest {
    #[validate(url(message = "Endpoint must be a URL"))]
    pub endpoint: String,
}

pub async fn register(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<PushSubscription>)> {
    req.validate()?;
    req.keys.validate()?;

    let subscription = PushSubscription::upsert(
        &state.db,
        CreatePushSubscription {
            user_id: auth.user_id,
            endpoint: req.endpoint,
            p256dh: req.keys.p256dh,
            auth: req.keys.auth,
        },
    )
    .await?;

    tracing::debug!(user_id = %auth.user_id, subscription_id = %subscription.id, "Push endpoint registered");

    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn unregister(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UnregisterRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;

    if !PushSubscription::delete_for_user(&state.db, auth.user_id, &req.endpoint).await? {
        return Err(ApiError::NotFound("Push endpoint not registered".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
