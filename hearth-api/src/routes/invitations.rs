/// Invitation endpoints
///
/// House side (owners and admins):
///
/// - `GET /v1/houses/:house_id/invitations` - pending invitations
/// - `POST /v1/houses/:house_id/invitations` - invite by email
/// - `DELETE /v1/houses/:house_id/invitations/:invitation_id` - revoke
///
/// Invitee side:
///
/// - `GET /v1/invitations` - pending invitations for the caller's email
/// - `GET /v1/invitations/:token` - accept-page lookup
/// - `POST /v1/invitations/:token/accept`
/// - `POST /v1/invitations/:token/decline`
///
/// The plaintext token only ever travels in the invitation email; responses
/// never include it.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::auth::middleware::AuthContext;
use hearth_shared::invitations::{Inviter, IssuedInvitation};
use hearth_shared::models::invitation::InvitationDetails;
use hearth_shared::models::membership::{MemberRole, Membership};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[serde(default = "default_role")]
    pub role: MemberRole,
}

pub async fn list_house_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
) -> ApiResult<Json<Vec<InvitationDetails>>> {
    let invitations = state.invitations.list_for_house(house_id, auth.user_id).await?;
    Ok(Json(invitations))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(house_id): Path<Uuid>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<(StatusCode, Json<IssuedInvitation>)> {
    req.validate()?;

    let inviter = Inviter {
        user_id: auth.user_id,
        name: auth.display_name(),
    };
    let issued = state
        .invitations
        .create(house_id, inviter, &req.email, req.role)
        .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn revoke_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((house_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.invitations.revoke(house_id, invitation_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_my_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<InvitationDetails>>> {
    let invitations = state.invitations.list_for_email(&auth.email).await?;
    Ok(Json(invitations))
}

/// Any signed-in user holding the token may look at it; acceptance is
/// where the email has to match.
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<InvitationDetails>> {
    let details = state.invitations.fetch_by_token(&token).await?;
    Ok(Json(details))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<Membership>> {
    let membership = state
        .invitations
        .accept(&token, auth.user_id, &auth.email)
        .await?;
    Ok(Json(membership))
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    state.invitations.decline(&token, &auth.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_defaults_to_member() {
        let req: CreateInvitationRequest =
            serde_json::from_value(json!({ "email": "carol@example.com" })).unwrap();
        assert_eq!(req.role, MemberRole::Member);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let req: CreateInvitationRequest =
            serde_json::from_value(json!({ "email": "not-an-email", "role": "admin" })).unwrap();
        assert_eq!(req.role, MemberRole::Admin);
        assert!(req.validate().unwrap_err().field_errors().contains_key("email"));
    }
}
