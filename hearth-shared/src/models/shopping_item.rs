/// Shared shopping list items
///
/// Each house keeps one list. Checking an item records who checked it;
/// unchecking clears it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShoppingItem {
    pub id: Uuid,
    pub house_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub checked: bool,
    pub added_by: Uuid,
    pub checked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShoppingItem {
    pub house_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub added_by: Uuid,
}

/// Partial update; absent fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShoppingItemPatch {
    pub name: Option<String>,
    pub quantity: Option<i32>,
    pub checked: Option<bool>,
}

impl ShoppingItem {
    pub async fn create(pool: &PgPool, data: CreateShoppingItem) -> Result<Self, sqlx::Error> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            INSERT INTO shopping_items (house_id, name, quantity, added_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, house_id, name, quantity, checked, added_by, checked_by,
                      created_at, updated_at
            "#,
        )
        .bind(data.house_id)
        .bind(data.name)
        .bind(data.quantity)
        .bind(data.added_by)
        .fetch_one(pool)
        .await?;

        Ok(item)
    }

    /// Unchecked items first, then oldest first
    pub async fn list_by_house(pool: &PgPool, house_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let items = sqlx::query_as::<_, ShoppingItem>(
            r#"
            SELECT id, house_id, name, quantity, checked, added_by, checked_by,
                   created_at, updated_at
            FROM shopping_items
            WHERE house_id = $1
            ORDER BY checked ASC, created_at ASC
            "#,
        )
        .bind(house_id)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Applies a patch; `actor` becomes `checked_by` when the item gets checked
    pub async fn update(
        pool: &PgPool,
        house_id: Uuid,
        id: Uuid,
        patch: ShoppingItemPatch,
        actor: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let item = sqlx::query_as::<_, ShoppingItem>(
            r#"
            UPDATE shopping_items
            SET name = COALESCE($3, name),
                quantity = COALESCE($4, quantity),
                checked = COALESCE($5, checked),
                checked_by = CASE
                    WHEN $5 IS NULL THEN checked_by
                    WHEN $5 THEN $6
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1 AND house_id = $2
            RETURNING id, house_id, name, quantity, checked, added_by, checked_by,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(house_id)
        .bind(patch.name)
        .bind(patch.quantity)
        .bind(patch.checked)
        .bind(actor)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    pub async fn delete(pool: &PgPool, house_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shopping_items WHERE id = $1 AND house_id = $2")
            .bind(id)
            .bind(house_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of unchecked items, quoted in the commit notification
    pub async fn count_open(pool: &PgPool, house_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shopping_items WHERE house_id = $1 AND NOT checked")
                .bind(house_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
