/// Identity token verification
///
/// The identity provider signs HS256 tokens. Verification checks signature,
/// expiry and, when configured, the issuer. The local user row is created on
/// first sight and refreshed when profile claims change.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hearth_shared::auth::jwt::{self, IdentityClaims};
use hearth_shared::auth::middleware::{bearer_token, AuthContext};
use hearth_shared::models::is_unique_violation;
use hearth_shared::models::user::User;
use tracing::debug;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

const USERS_EMAIL_KEY: &str = "users_email_key";

/// Verifies a token and resolves the local user
pub async fn authenticate(state: &AppState, token: &str) -> ApiResult<User> {
    let claims = jwt::validate_token(token, &state.config.auth.jwt_secret, state.config.auth.issuer.as_deref())?;
    resolve_user(state, &claims).await
}

async fn resolve_user(state: &AppState, claims: &IdentityClaims) -> ApiResult<User> {
    if let Some(user) = User::find_by_uid(&state.db, &claims.sub).await? {
        if !profile_changed(&user, claims) {
            return Ok(user);
        }
    }

    let user = User::upsert_from_identity(&state.db, claims.profile())
        .await
        .map_err(|e| {
            if is_unique_violation(&e, USERS_EMAIL_KEY) {
                ApiError::Conflict("Email is already linked to another account".to_string())
            } else {
                e.into()
            }
        })?;

    debug!(user_id = %user.id, "User profile synchronised from identity token");
    Ok(user)
}

/// Whether the token carries profile data the stored user lacks
fn profile_changed(user: &User, claims: &IdentityClaims) -> bool {
    user.email != claims.email
        || claims.name.as_ref().is_some_and(|n| user.name.as_ref() != Some(n))
        || claims.picture.as_ref().is_some_and(|p| user.avatar_url.as_ref() != Some(p))
}

/// Authenticates `/v1` requests and stores an [`AuthContext`] for handlers
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();
    let user = authenticate(&state, &token).await?;

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}
