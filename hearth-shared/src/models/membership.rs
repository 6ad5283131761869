/// Membership model and database operations
///
/// A membership grants a user a role inside a house. Users may belong to
/// several houses; every house keeps at least one owner.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE memberships (
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role member_role NOT NULL DEFAULT 'member',
///     permissions TEXT[] NOT NULL DEFAULT ARRAY['manage_tasks', 'manage_shopping', 'manage_devices'],
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (house_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: created the house, may invite and manage plain members
/// - **admin**: may invite and manage members and other admins
/// - **member**: works on tasks, shopping and devices as its flags allow
///
/// Removal lives in [`crate::directory`] because it must release task
/// assignments in the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

/// Role of a user inside a house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    /// Owners and admins run the house: invitations, roles, removals
    pub fn can_manage_members(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

/// Fine-grained flags carried by plain members
///
/// Owners and admins implicitly hold every flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberPermission {
    ManageTasks,
    ManageShopping,
    ManageDevices,
}

impl MemberPermission {
    pub const ALL: [MemberPermission; 3] = [
        MemberPermission::ManageTasks,
        MemberPermission::ManageShopping,
        MemberPermission::ManageDevices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberPermission::ManageTasks => "manage_tasks",
            MemberPermission::ManageShopping => "manage_shopping",
            MemberPermission::ManageDevices => "manage_devices",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manage_tasks" => Some(MemberPermission::ManageTasks),
            "manage_shopping" => Some(MemberPermission::ManageShopping),
            "manage_devices" => Some(MemberPermission::ManageDevices),
            _ => None,
        }
    }

    /// Flags a freshly joined member receives
    pub fn defaults() -> Vec<String> {
        Self::ALL.iter().map(|p| p.as_str().to_string()).collect()
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub house_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,

    /// Permission flags as stored (`manage_tasks`, ...)
    pub permissions: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// Whether this member may perform actions guarded by `permission`
    pub fn allows(&self, permission: MemberPermission) -> bool {
        self.role.can_manage_members() || self.permissions.iter().any(|p| p == permission.as_str())
    }
}

/// Member listing entry with profile fields
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberWithUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: MemberRole,
    pub permissions: Vec<String>,
    pub joined_at: DateTime<Utc>,
}

/// Input for adding a user to a house
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub house_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
}

impl Membership {
    /// Adds a user to a house with the default permission flags
    ///
    /// Accepts a pool or an open transaction.
    ///
    /// # Errors
    ///
    /// Primary key violation when the user is already a member.
    pub async fn create<'e, E>(executor: E, data: CreateMembership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (house_id, user_id, role, permissions)
            VALUES ($1, $2, $3, $4)
            RETURNING house_id, user_id, role, permissions, created_at
            "#,
        )
        .bind(data.house_id)
        .bind(data.user_id)
        .bind(data.role)
        .bind(MemberPermission::defaults())
        .fetch_one(executor)
        .await?;

        Ok(membership)
    }

    /// Finds the membership of a user in a house
    pub async fn find<'e, E>(
        executor: E,
        house_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT house_id, user_id, role, permissions, created_at
            FROM memberships
            WHERE house_id = $1 AND user_id = $2
            "#,
        )
        .bind(house_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Whether a user belongs to a house (any role)
    pub async fn has_access(pool: &PgPool, house_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM memberships WHERE house_id = $1 AND user_id = $2)",
        )
        .bind(house_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Whether the house has a member with this email
    pub async fn email_is_member(pool: &PgPool, house_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM memberships m
                JOIN users u ON u.id = m.user_id
                WHERE m.house_id = $1 AND u.email = $2
            )
            "#,
        )
        .bind(house_id)
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Updates role and, when given, the permission flags
    ///
    /// Returns `None` when the membership does not exist.
    pub async fn update(
        pool: &PgPool,
        house_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
        permissions: Option<Vec<String>>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET role = $3,
                permissions = COALESCE($4, permissions)
            WHERE house_id = $1 AND user_id = $2
            RETURNING house_id, user_id, role, permissions, created_at
            "#,
        )
        .bind(house_id)
        .bind(user_id)
        .bind(role)
        .bind(permissions)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Member ids of a house, oldest first
    pub async fn member_ids(pool: &PgPool, house_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM memberships WHERE house_id = $1 ORDER BY created_at ASC",
        )
        .bind(house_id)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Members of a house with their profiles
    pub async fn list_by_house(pool: &PgPool, house_id: Uuid) -> Result<Vec<MemberWithUser>, sqlx::Error> {
        let members = sqlx::query_as::<_, MemberWithUser>(
            r#"
            SELECT m.user_id, u.email, u.name, u.avatar_url, m.role, m.permissions,
                   m.created_at AS joined_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.house_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(house_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Every membership of a user, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT house_id, user_id, role, permissions, created_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }
}
