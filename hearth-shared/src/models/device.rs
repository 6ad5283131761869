/// Smart-home device records
///
/// A device is a named, typed JSON state blob. Nothing drives real hardware;
/// the state is whatever the last member wrote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    pub house_id: Uuid,
    pub name: String,

    /// Free-form kind tag (`light`, `thermostat`, ...)
    pub kind: String,

    pub state: JsonValue,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDevice {
    pub house_id: Uuid,
    pub name: String,
    pub kind: String,
    pub state: JsonValue,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub state: Option<JsonValue>,
}

impl Device {
    pub async fn create(pool: &PgPool, data: CreateDevice) -> Result<Self, sqlx::Error> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (house_id, name, kind, state, updated_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, house_id, name, kind, state, updated_by, created_at, updated_at
            "#,
        )
        .bind(data.house_id)
        .bind(data.name)
        .bind(data.kind)
        .bind(data.state)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(device)
    }

    pub async fn list_by_house(pool: &PgPool, house_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, house_id, name, kind, state, updated_by, created_at, updated_at
            FROM devices
            WHERE house_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(house_id)
        .fetch_all(pool)
        .await?;

        Ok(devices)
    }

    /// Replaces name and/or state, recording who changed it
    pub async fn update(
        pool: &PgPool,
        house_id: Uuid,
        id: Uuid,
        patch: DevicePatch,
        actor: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            UPDATE devices
            SET name = COALESCE($3, name),
                state = COALESCE($4, state),
                updated_by = $5,
                updated_at = NOW()
            WHERE id = $1 AND house_id = $2
            RETURNING id, house_id, name, kind, state, updated_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(house_id)
        .bind(patch.name)
        .bind(patch.state)
        .bind(actor)
        .fetch_optional(pool)
        .await?;

        Ok(device)
    }

    pub async fn delete(pool: &PgPool, house_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1 AND house_id = $2")
            .bind(id)
            .bind(house_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
