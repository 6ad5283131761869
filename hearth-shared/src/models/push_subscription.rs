/// Push subscription storage
///
/// A user registers one endpoint per browser/device. The notifier removes an
/// endpoint once the push gateway reports it permanently gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Registered push endpoint
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering an endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// Registers an endpoint; re-registering moves it to the calling user
    pub async fn upsert(pool: &PgPool, data: CreatePushSubscription) -> Result<Self, sqlx::Error> {
        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (endpoint) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth
            RETURNING id, user_id, endpoint, p256dh, auth, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.endpoint)
        .bind(data.p256dh)
        .bind(data.auth)
        .fetch_one(pool)
        .await?;

        Ok(subscription)
    }

    /// Lists every endpoint of a user
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            r#"
            SELECT id, user_id, endpoint, p256dh, auth, created_at
            FROM push_subscriptions
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(subscriptions)
    }

    /// Removes an endpoint owned by the user
    pub async fn delete_for_user(
        pool: &PgPool,
        user_id: Uuid,
        endpoint: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND endpoint = $2")
            .bind(user_id)
            .bind(endpoint)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes an endpoint the push gateway reported as gone
    pub async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
