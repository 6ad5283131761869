/// Session bootstrap
///
/// ```text
/// POST /v1/auth/session
/// Authorization: Bearer <identity token>
/// ```
///
/// The auth layer has already verified the token and synchronised the
/// profile; this returns what a freshly signed-in client needs to render
/// its first screen.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::models::house::{House, HouseWithRole};
use hearth_shared::models::user::User;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub houses: Vec<HouseWithRole>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SessionResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or(ApiError::Unauthorized("User no longer exists".to_string()))?;

    let houses = House::list_by_user(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, houses = houses.len(), "Session started");

    Ok(Json(SessionResponse { user, houses }))
}
