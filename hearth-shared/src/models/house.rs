/// House model and database operations
///
/// A house is the unit of sharing: tasks, shopping items, devices,
/// invitations and notifications all belong to exactly one house.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE houses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT houses_owner_name_unique UNIQUE (created_by, name)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_shared::models::house::{House, CreateHouse};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let house = House::create_with_owner(&pool, CreateHouse {
///     name: "Lakeview".to_string(),
///     created_by: user_id,
/// }).await?;
///
/// let houses = House::list_by_user(&pool, user_id).await?;
/// assert!(houses.iter().any(|h| h.id == house.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::membership::{CreateMembership, MemberRole, Membership};

/// Constraint rejecting two houses with the same name for one creator
pub const OWNER_NAME_CONSTRAINT: &str = "houses_owner_name_unique";

/// House row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct House {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// House as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseWithRole {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Input for creating a house
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHouse {
    pub name: String,
    pub created_by: Uuid,
}

impl House {
    /// Creates a house and makes its creator the owner
    ///
    /// Both rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Unique violation on [`OWNER_NAME_CONSTRAINT`] when the creator already
    /// has a house with this name.
    pub async fn create_with_owner(pool: &PgPool, data: CreateHouse) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let house = sqlx::query_as::<_, House>(
            r#"
            INSERT INTO houses (name, created_by)
            VALUES ($1, $2)
            RETURNING id, name, created_by, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        Membership::create(
            &mut *tx,
            CreateMembership {
                house_id: house.id,
                user_id: data.created_by,
                role: MemberRole::Owner,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(house)
    }

    /// Finds a house by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let house = sqlx::query_as::<_, House>(
            r#"
            SELECT id, name, created_by, created_at, updated_at
            FROM houses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(house)
    }

    /// Houses the user belongs to, earliest joined first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<HouseWithRole>, sqlx::Error> {
        let houses = sqlx::query_as::<_, HouseWithRole>(
            r#"
            SELECT h.id, h.name, h.created_by, h.created_at, m.role, m.created_at AS joined_at
            FROM houses h
            JOIN memberships m ON m.house_id = h.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC, h.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(houses)
    }

    /// The house the user joined first
    ///
    /// Single-house clients use this as their default house.
    pub async fn primary_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<HouseWithRole>, sqlx::Error> {
        let house = sqlx::query_as::<_, HouseWithRole>(
            r#"
            SELECT h.id, h.name, h.created_by, h.created_at, m.role, m.created_at AS joined_at
            FROM houses h
            JOIN memberships m ON m.house_id = h.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC, h.id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(house)
    }

    /// Renames a house
    pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<Self>, sqlx::Error> {
        let house = sqlx::query_as::<_, House>(
            r#"
            UPDATE houses
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(house)
    }
}
