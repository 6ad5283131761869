/// Invitation workflow
///
/// Ties the invitation store to membership, mail and notifications.
///
/// # Accept
///
/// Accepting runs in one transaction that row-locks the invitation, so two
/// concurrent accepts of the same token serialize:
///
/// 1. email mismatch: [`InvitationError::Forbidden`], nothing written
/// 2. pending but past expiry: the row moves to `expired`, that is committed,
///    then [`InvitationError::Expired`]
/// 3. already a member: the row moves to `accepted`,
///    then [`InvitationError::Conflict`]
/// 4. otherwise the membership is inserted and the row moves to `accepted`
///
/// A token that was already accepted answers Conflict to a user who is now
/// a member and Expired to anyone else.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::token::{generate_token, hash_token, is_valid_format};
use crate::auth::authorization::{require_manager, AuthzError};
use crate::auth::policy::DenyReason;
use crate::models::house::House;
use crate::models::invitation::{
    AcceptCheck, CreateInvitation, Invitation, InvitationDetails, InvitationStatus, PENDING_UNIQUE_INDEX,
};
use crate::models::is_unique_violation;
use crate::models::membership::{CreateMembership, MemberRole, Membership};
use crate::models::user::User;
use crate::notify::mail::{invitation_email, invitation_link};
use crate::notify::{best_effort, Notifier};
use crate::realtime::{ChangeBroadcaster, EventAction, RealtimeEvent};

const MEMBERSHIP_PK: &str = "memberships_pkey";

#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("Invitation not found")]
    NotFound,

    #[error("Invitation is no longer valid")]
    Expired,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<DenyReason> for InvitationError {
    fn from(reason: DenyReason) -> Self {
        InvitationError::Authz(AuthzError::Denied(reason))
    }
}

/// Tunables for issuing invitations
#[derive(Debug, Clone)]
pub struct InvitationSettings {
    /// Base URL of the web app; links point to `{base}/accept-invite`
    pub app_base_url: String,
    pub ttl: Duration,
}

impl Default for InvitationSettings {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:3000".to_string(),
            ttl: Duration::days(7),
        }
    }
}

/// Who is issuing an invitation
#[derive(Debug, Clone, Copy)]
pub struct Inviter<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
}

/// A freshly stored invitation and its plaintext token
///
/// The token is not recoverable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    #[serde(skip_serializing)]
    pub token: String,
}

#[derive(Clone)]
pub struct InvitationService {
    pool: PgPool,
    notifier: Notifier,
    broadcaster: ChangeBroadcaster,
    settings: Arc<InvitationSettings>,
}

impl InvitationService {
    pub fn new(
        pool: PgPool,
        notifier: Notifier,
        broadcaster: ChangeBroadcaster,
        settings: InvitationSettings,
    ) -> Self {
        Self {
            pool,
            notifier,
            broadcaster,
            settings: Arc::new(settings),
        }
    }

    /// Issues an invitation and sends it
    ///
    /// Only owners and admins may invite, and only owners may invite owners.
    /// Mail and notification delivery happen in the background.
    pub async fn create(
        &self,
        house_id: Uuid,
        inviter: Inviter<'_>,
        email: &str,
        role: MemberRole,
    ) -> Result<IssuedInvitation, InvitationError> {
        let membership = require_manager(&self.pool, house_id, inviter.user_id).await?;
        if role == MemberRole::Owner && membership.role != MemberRole::Owner {
            return Err(DenyReason::OwnerGrantRequiresOwner.into());
        }

        let email = email.trim();

        if Membership::email_is_member(&self.pool, house_id, email).await? {
            return Err(InvitationError::Conflict(format!("{email} is already a member of this house")));
        }

        let expired = Invitation::expire_stale(&self.pool, house_id, email).await?;
        if expired > 0 {
            debug!(house_id = %house_id, expired, "Expired stale invitations before reissue");
        }

        if Invitation::pending_exists(&self.pool, house_id, email).await? {
            return Err(pending_conflict(email));
        }

        let house = House::find_by_id(&self.pool, house_id)
            .await?
            .ok_or(InvitationError::NotFound)?;

        let (token, token_hash) = generate_token();
        let invitation = Invitation::create(
            &self.pool,
            CreateInvitation {
                house_id,
                email: email.to_string(),
                role,
                invited_by: inviter.user_id,
                token_hash,
                expires_at: Utc::now() + self.settings.ttl,
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e, PENDING_UNIQUE_INDEX) {
                pending_conflict(email)
            } else {
                InvitationError::DatabaseError(e)
            }
        })?;

        info!(
            invitation_id = %invitation.id,
            house_id = %house_id,
            role = role.as_str(),
            "Invitation created"
        );

        self.dispatch_invitation(&invitation, &house.name, inviter.name, &token);

        Ok(IssuedInvitation { invitation, token })
    }

    fn dispatch_invitation(&self, invitation: &Invitation, house_name: &str, inviter_name: &str, token: &str) {
        let link = invitation_link(&self.settings.app_base_url, token);
        let message = invitation_email(&invitation.email, house_name, inviter_name, &link, invitation.expires_at);

        let notifier = self.notifier.clone();
        best_effort("invitation_email", async move { notifier.send_mail(&message).await });

        let notifier = self.notifier.clone();
        let pool = self.pool.clone();
        let invitation = invitation.clone();
        let house_name = house_name.to_string();
        let inviter_name = inviter_name.to_string();
        best_effort("invitation_notification", async move {
            let Some(invitee) = User::find_by_email(&pool, &invitation.email).await? else {
                return Ok(None);
            };

            notifier
                .house_invitation(
                    invitee.id,
                    invitation.house_id,
                    invitation.id,
                    &house_name,
                    &inviter_name,
                    invitation.role,
                )
                .await
                .map(Some)
        });
    }

    /// Looks up an invitation for the accept page
    ///
    /// A pending invitation past its expiry is moved to `expired` here.
    pub async fn fetch_by_token(&self, token: &str) -> Result<InvitationDetails, InvitationError> {
        if !is_valid_format(token) {
            return Err(InvitationError::NotFound);
        }

        let details = Invitation::find_details_by_token_hash(&self.pool, &hash_token(token))
            .await?
            .ok_or(InvitationError::NotFound)?;

        let id = details.invitation.id;
        match details.invitation.status {
            InvitationStatus::Pending if details.invitation.is_expired_at(Utc::now()) => {
                Invitation::transition(&self.pool, id, InvitationStatus::Expired).await?;
                debug!(invitation_id = %id, "Invitation expired on lookup");
                Err(InvitationError::Expired)
            }
            InvitationStatus::Pending => Ok(details),
            InvitationStatus::Accepted | InvitationStatus::Expired => Err(InvitationError::Expired),
        }
    }

    /// Accepts an invitation on behalf of the signed-in user
    pub async fn accept(&self, token: &str, user_id: Uuid, email: &str) -> Result<Membership, InvitationError> {
        if !is_valid_format(token) {
            return Err(InvitationError::NotFound);
        }

        let mut tx = self.pool.begin().await?;

        let invitation = Invitation::lock_by_token_hash(&mut *tx, &hash_token(token))
            .await?
            .ok_or(InvitationError::NotFound)?;

        match invitation.check_accept(email, Utc::now()) {
            AcceptCheck::EmailMismatch => {
                return Err(InvitationError::Forbidden(
                    "This invitation was sent to a different email address".to_string(),
                ));
            }
            AcceptCheck::Expired => return Err(InvitationError::Expired),
            AcceptCheck::NeedsExpiry => {
                Invitation::transition(&mut *tx, invitation.id, InvitationStatus::Expired).await?;
                tx.commit().await?;
                debug!(invitation_id = %invitation.id, "Invitation expired on accept");
                return Err(InvitationError::Expired);
            }
            AcceptCheck::AlreadyAccepted => {
                return match Membership::find(&mut *tx, invitation.house_id, user_id).await? {
                    Some(_) => Err(already_member()),
                    None => Err(InvitationError::Expired),
                };
            }
            AcceptCheck::Acceptable => {}
        }

        if Membership::find(&mut *tx, invitation.house_id, user_id).await?.is_some() {
            Invitation::transition(&mut *tx, invitation.id, InvitationStatus::Accepted).await?;
            tx.commit().await?;
            return Err(already_member());
        }

        let membership = Membership::create(
            &mut *tx,
            CreateMembership {
                house_id: invitation.house_id,
                user_id,
                role: invitation.role,
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e, MEMBERSHIP_PK) {
                already_member()
            } else {
                InvitationError::DatabaseError(e)
            }
        })?;

        Invitation::transition(&mut *tx, invitation.id, InvitationStatus::Accepted).await?;
        tx.commit().await?;

        info!(
            invitation_id = %invitation.id,
            house_id = %membership.house_id,
            user_id = %user_id,
            role = membership.role.as_str(),
            "Invitation accepted"
        );

        self.broadcaster.publish(RealtimeEvent::membership(
            EventAction::Joined,
            membership.house_id,
            json!({ "user_id": user_id, "role": membership.role }),
        ));

        Ok(membership)
    }

    /// Invitee turns the invitation down; the row is deleted
    pub async fn decline(&self, token: &str, email: &str) -> Result<(), InvitationError> {
        let details = self.fetch_by_token(token).await?;
        let invitation = details.invitation;

        if invitation.email != email {
            return Err(InvitationError::Forbidden(
                "This invitation was sent to a different email address".to_string(),
            ));
        }

        if !Invitation::delete(&self.pool, invitation.id).await? {
            return Err(InvitationError::NotFound);
        }

        info!(invitation_id = %invitation.id, house_id = %invitation.house_id, "Invitation declined");
        Ok(())
    }

    /// Owner or admin withdraws an invitation; the row is deleted
    pub async fn revoke(&self, house_id: Uuid, invitation_id: Uuid, actor_id: Uuid) -> Result<(), InvitationError> {
        require_manager(&self.pool, house_id, actor_id).await?;

        let invitation = Invitation::find_by_id(&self.pool, invitation_id)
            .await?
            .filter(|i| i.house_id == house_id)
            .ok_or(InvitationError::NotFound)?;

        Invitation::delete(&self.pool, invitation.id).await?;

        info!(invitation_id = %invitation.id, house_id = %house_id, "Invitation revoked");
        Ok(())
    }

    /// Pending invitations of a house; owners and admins only
    pub async fn list_for_house(
        &self,
        house_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Vec<InvitationDetails>, InvitationError> {
        require_manager(&self.pool, house_id, actor_id).await?;
        Ok(Invitation::list_pending_by_house(&self.pool, house_id).await?)
    }

    /// Pending invitations addressed to `email`
    pub async fn list_for_email(&self, email: &str) -> Result<Vec<InvitationDetails>, InvitationError> {
        Ok(Invitation::list_pending_by_email(&self.pool, email).await?)
    }
}

fn pending_conflict(email: &str) -> InvitationError {
    InvitationError::Conflict(format!("A pending invitation for {email} already exists"))
}

fn already_member() -> InvitationError {
    InvitationError::Conflict("You are already a member of this house".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = InvitationSettings::default();
        assert_eq!(settings.ttl, Duration::days(7));
        assert_eq!(settings.app_base_url, "http://localhost:3000");
    }

    #[test]
    fn test_deny_reason_maps_to_authz() {
        let err: InvitationError = DenyReason::OwnerGrantRequiresOwner.into();
        assert!(matches!(
            err,
            InvitationError::Authz(AuthzError::Denied(DenyReason::OwnerGrantRequiresOwner))
        ));
    }

    #[test]
    fn test_issued_invitation_hides_token() {
        let now = Utc::now();
        let issued = IssuedInvitation {
            invitation: Invitation {
                id: Uuid::new_v4(),
                house_id: Uuid::new_v4(),
                email: "bob@x.io".to_string(),
                role: MemberRole::Member,
                invited_by: Uuid::new_v4(),
                token_hash: hash_token("inv_secret"),
                status: InvitationStatus::Pending,
                expires_at: now,
                created_at: now,
                updated_at: now,
            },
            token: "inv_secret".to_string(),
        };

        let json = serde_json::to_string(&issued).unwrap();
        assert!(!json.contains("inv_secret"));
        assert!(!json.contains(&hash_token("inv_secret")));
    }
}
