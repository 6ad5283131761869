/// Invitation model and database operations
///
/// Invitations move through a small state machine:
///
/// ```text
/// pending --accept--> accepted
/// pending --expire--> expired
/// pending --revoke/decline--> (row deleted)
/// ```
///
/// `accepted` and `expired` are terminal. Only the SHA-256 hash of the token
/// is stored; the plaintext lives in the email link.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     email VARCHAR(320) NOT NULL,
///     role member_role NOT NULL DEFAULT 'member',
///     invited_by UUID NOT NULL REFERENCES users(id),
///     token_hash CHAR(64) NOT NULL,
///     status invitation_status NOT NULL DEFAULT 'pending',
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT invitations_token_hash_unique UNIQUE (token_hash)
/// );
///
/// CREATE UNIQUE INDEX idx_invitations_pending_unique
///     ON invitations(house_id, email) WHERE status = 'pending';
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnection, PgExecutor};
use sqlx::PgPool;
use uuid::Uuid;

use super::membership::MemberRole;

/// Index allowing a single pending invitation per (house, email)
pub const PENDING_UNIQUE_INDEX: &str = "idx_invitations_pending_unique";

/// Invitation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    /// Valid transitions: pending to accepted, pending to expired
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        matches!(
            (self, next),
            (InvitationStatus::Pending, InvitationStatus::Accepted)
                | (InvitationStatus::Pending, InvitationStatus::Expired)
        )
    }
}

/// Outcome of checking whether a user may accept an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptCheck {
    /// Pending, unexpired, email matches
    Acceptable,
    /// The accepting user's email differs from the invited one
    EmailMismatch,
    /// Pending but past its expiry; must be moved to `expired`
    NeedsExpiry,
    /// Already expired
    Expired,
    /// Already accepted
    AlreadyAccepted,
}

/// Invitation row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub house_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub invited_by: Uuid,

    /// SHA-256 of the token, never serialized
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Decides whether `email` may accept this invitation at `now`
    ///
    /// The email is compared exactly. The email check runs first so a
    /// stranger holding the link learns nothing about the invitation state.
    pub fn check_accept(&self, email: &str, now: DateTime<Utc>) -> AcceptCheck {
        if self.email != email {
            return AcceptCheck::EmailMismatch;
        }

        match self.status {
            InvitationStatus::Accepted => AcceptCheck::AlreadyAccepted,
            InvitationStatus::Expired => AcceptCheck::Expired,
            InvitationStatus::Pending if self.is_expired_at(now) => AcceptCheck::NeedsExpiry,
            InvitationStatus::Pending => AcceptCheck::Acceptable,
        }
    }
}

/// Invitation with the names shown on the accept page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvitationDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invitation: Invitation,
    pub house_name: String,
    pub inviter_name: String,
}

/// Input for storing a new invitation
#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub house_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub invited_by: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

const DETAILS_SELECT: &str = r#"
    SELECT i.id, i.house_id, i.email, i.role, i.invited_by, i.token_hash, i.status,
           i.expires_at, i.created_at, i.updated_at,
           h.name AS house_name,
           COALESCE(u.name, u.email) AS inviter_name
    FROM invitations i
    JOIN houses h ON h.id = i.house_id
    JOIN users u ON u.id = i.invited_by
"#;

impl Invitation {
    /// Stores a pending invitation
    ///
    /// # Errors
    ///
    /// Unique violation on [`PENDING_UNIQUE_INDEX`] when a pending invitation
    /// for the same (house, email) exists.
    pub async fn create(pool: &PgPool, data: CreateInvitation) -> Result<Self, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (house_id, email, role, invited_by, token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, house_id, email, role, invited_by, token_hash, status,
                      expires_at, created_at, updated_at
            "#,
        )
        .bind(data.house_id)
        .bind(data.email)
        .bind(data.role)
        .bind(data.invited_by)
        .bind(data.token_hash)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await?;

        Ok(invitation)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, house_id, email, role, invited_by, token_hash, status,
                   expires_at, created_at, updated_at
            FROM invitations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(invitation)
    }

    /// Finds an invitation and its display names by token hash
    pub async fn find_details_by_token_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<InvitationDetails>, sqlx::Error> {
        let query = format!("{DETAILS_SELECT} WHERE i.token_hash = $1");
        let details = sqlx::query_as::<_, InvitationDetails>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await?;

        Ok(details)
    }

    /// Loads and row-locks an invitation inside an accept transaction
    pub async fn lock_by_token_hash(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, house_id, email, role, invited_by, token_hash, status,
                   expires_at, created_at, updated_at
            FROM invitations
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await?;

        Ok(invitation)
    }

    /// Moves a pending invitation to `next`
    ///
    /// Returns `None` when the row is not pending anymore; terminal rows are
    /// never rewritten.
    pub async fn transition<'e, E>(
        executor: E,
        id: Uuid,
        next: InvitationStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if !InvitationStatus::Pending.can_transition_to(next) {
            return Ok(None);
        }

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitations
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, house_id, email, role, invited_by, token_hash, status,
                      expires_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(next)
        .fetch_optional(executor)
        .await?;

        Ok(invitation)
    }

    /// Expires pending invitations for (house, email) whose expiry has passed
    ///
    /// Run before creating a new invitation so a stale row does not trip the
    /// pending unique index.
    pub async fn expire_stale(pool: &PgPool, house_id: Uuid, email: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'expired', updated_at = NOW()
            WHERE house_id = $1 AND email = $2 AND status = 'pending' AND expires_at <= NOW()
            "#,
        )
        .bind(house_id)
        .bind(email)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Whether a live pending invitation exists for (house, email)
    pub async fn pending_exists(pool: &PgPool, house_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invitations
                WHERE house_id = $1 AND email = $2 AND status = 'pending' AND expires_at > NOW()
            )
            "#,
        )
        .bind(house_id)
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Deletes an invitation (revoke or decline)
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending invitations of a house, newest first
    pub async fn list_pending_by_house(
        pool: &PgPool,
        house_id: Uuid,
    ) -> Result<Vec<InvitationDetails>, sqlx::Error> {
        let query = format!(
            "{DETAILS_SELECT} WHERE i.house_id = $1 AND i.status = 'pending' AND i.expires_at > NOW() \
             ORDER BY i.created_at DESC"
        );
        let invitations = sqlx::query_as::<_, InvitationDetails>(&query)
            .bind(house_id)
            .fetch_all(pool)
            .await?;

        Ok(invitations)
    }

    /// Pending invitations addressed to an email, newest first
    pub async fn list_pending_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Vec<InvitationDetails>, sqlx::Error> {
        let query = format!(
            "{DETAILS_SELECT} WHERE i.email = $1 AND i.status = 'pending' AND i.expires_at > NOW() \
             ORDER BY i.created_at DESC"
        );
        let invitations = sqlx::query_as::<_, InvitationDetails>(&query)
            .bind(email)
            .fetch_all(pool)
            .await?;

        Ok(invitations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            house_id: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            role: MemberRole::Member,
            invited_by: Uuid::new_v4(),
            token_hash: "0".repeat(64),
            status,
            expires_at: now + expires_in,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transitions() {
        use InvitationStatus::*;

        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Accepted, Expired] {
            assert!(terminal.is_terminal());
            for next in [Pending, Accepted, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_check_accept_pending() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(7));
        assert_eq!(inv.check_accept("bob@example.com", Utc::now()), AcceptCheck::Acceptable);
    }

    #[test]
    fn test_check_accept_email_mismatch_is_exact() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(7));
        assert_eq!(inv.check_accept("eve@example.com", Utc::now()), AcceptCheck::EmailMismatch);
        assert_eq!(inv.check_accept("Bob@example.com", Utc::now()), AcceptCheck::EmailMismatch);
    }

    #[test]
    fn test_check_accept_past_expiry() {
        let inv = invitation(InvitationStatus::Pending, Duration::seconds(-1));
        assert_eq!(inv.check_accept("bob@example.com", Utc::now()), AcceptCheck::NeedsExpiry);
    }

    #[test]
    fn test_check_accept_terminal_states() {
        let accepted = invitation(InvitationStatus::Accepted, Duration::days(7));
        assert_eq!(
            accepted.check_accept("bob@example.com", Utc::now()),
            AcceptCheck::AlreadyAccepted
        );

        let expired = invitation(InvitationStatus::Expired, Duration::days(7));
        assert_eq!(expired.check_accept("bob@example.com", Utc::now()), AcceptCheck::Expired);
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(7));
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["status"], "pending");
    }
}
