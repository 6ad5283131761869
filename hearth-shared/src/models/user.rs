/// User model and database operations
///
/// Users are created the first time an identity-provider token is seen and
/// refreshed whenever the provider reports new profile fields. They are
/// never hard-deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     uid VARCHAR(128) NOT NULL UNIQUE,
///     email VARCHAR(320) NOT NULL UNIQUE,
///     name VARCHAR(255),
///     avatar_url VARCHAR(1024),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_shared::models::user::{User, IdentityProfile};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::upsert_from_identity(&pool, IdentityProfile {
///     uid: "idp|42".to_string(),
///     email: "alice@example.com".to_string(),
///     name: Some("Alice".to_string()),
///     avatar_url: None,
/// }).await?;
///
/// let same = User::find_by_uid(&pool, "idp|42").await?;
/// assert_eq!(same.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User account keyed by the identity provider's subject id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Internal user ID
    pub id: Uuid,

    /// External identity id (`sub` claim of the provider token)
    pub uid: String,

    /// Email address, unique across users
    pub email: String,

    /// Display name
    pub name: Option<String>,

    /// Avatar URL
    pub avatar_url: Option<String>,

    /// When the user first signed in
    pub created_at: DateTime<Utc>,

    /// When the profile last changed
    pub updated_at: DateTime<Utc>,
}

/// Profile fields reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// External identity id
    pub uid: String,

    /// Verified email
    pub email: String,

    /// Display name, if the provider has one
    pub name: Option<String>,

    /// Avatar URL, if the provider has one
    pub avatar_url: Option<String>,
}

/// Public view of a user embedded in other responses
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl User {
    /// Creates the user on first sign-in, refreshes profile fields afterwards
    ///
    /// Name and avatar are only overwritten when the provider supplies a value,
    /// so a token without a `name` claim does not erase an existing one.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` when another
    /// identity already uses the email.
    pub async fn upsert_from_identity(
        pool: &PgPool,
        profile: IdentityProfile,
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uid, email, name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (uid) DO UPDATE
            SET email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, users.name),
                avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url),
                updated_at = CASE
                    WHEN users.email IS DISTINCT FROM EXCLUDED.email
                      OR (EXCLUDED.name IS NOT NULL AND users.name IS DISTINCT FROM EXCLUDED.name)
                      OR (EXCLUDED.avatar_url IS NOT NULL AND users.avatar_url IS DISTINCT FROM EXCLUDED.avatar_url)
                    THEN NOW()
                    ELSE users.updated_at
                END
            RETURNING id, uid, email, name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(profile.uid)
        .bind(profile.email)
        .bind(profile.name)
        .bind(profile.avatar_url)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by internal ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uid, email, name, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by external identity id
    pub async fn find_by_uid(pool: &PgPool, uid: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uid, email, name, avatar_url, created_at, updated_at
            FROM users
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by exact email
    ///
    /// Used to decide whether an invitee already has an account.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uid, email, name, avatar_url, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Display label: the name when set, otherwise the email
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            uid: "idp|1".to_string(),
            email: "bob@example.com".to_string(),
            name: name.map(str::to_string),
            avatar_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_prefers_name() {
        assert_eq!(user(Some("Bob")).display_name(), "Bob");
        assert_eq!(user(None).display_name(), "bob@example.com");
    }

    #[test]
    fn test_summary_copies_public_fields() {
        let u = user(Some("Bob"));
        let summary = u.summary();
        assert_eq!(summary.id, u.id);
        assert_eq!(summary.email, u.email);
        assert_eq!(summary.name.as_deref(), Some("Bob"));
    }
}
