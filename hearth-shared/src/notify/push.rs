/// Push delivery through a web-push gateway
///
/// The gateway owns VAPID signing and payload encryption. Hearth posts the
/// stored subscription keys together with the message:
///
/// ```json
/// { "endpoint": "...", "keys": { "p256dh": "...", "auth": "..." },
///   "title": "...", "body": "...", "data": { ... } }
/// ```
///
/// A 404 or 410 from the gateway means the browser dropped the
/// subscription; it surfaces as [`PushError::Gone`] and the caller deletes
/// the row.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::models::push_subscription::PushSubscription;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Push subscription is gone")]
    Gone,

    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Push gateway rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Content of one push message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: JsonValue,
}

#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<(), PushError>;
}

#[derive(Serialize)]
struct PushKeys<'a> {
    p256dh: &'a str,
    auth: &'a str,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    endpoint: &'a str,
    keys: PushKeys<'a>,
    title: &'a str,
    body: &'a str,
    data: &'a JsonValue,
}

#[derive(Clone)]
pub struct HttpPushDispatcher {
    client: Client,
    gateway_url: String,
    api_key: Option<String>,
}

impl HttpPushDispatcher {
    pub fn new(gateway_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PushDispatcher for HttpPushDispatcher {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<(), PushError> {
        let mut request = self.client.post(&self.gateway_url).json(&PushRequest {
            endpoint: &subscription.endpoint,
            keys: PushKeys {
                p256dh: &subscription.p256dh,
                auth: &subscription.auth,
            },
            title: &message.title,
            body: &message.body,
            data: &message.data,
        });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        classify_status(status, body)
    }
}

/// Maps a gateway status to the push outcome
pub(crate) fn classify_status(status: StatusCode, body: String) -> Result<(), PushError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushError::Gone),
        s => Err(PushError::Rejected {
            status: s.as_u16(),
            body,
        }),
    }
}

/// Used when no push gateway is configured
#[derive(Debug, Clone, Default)]
pub struct NoopPushDispatcher;

#[async_trait]
impl PushDispatcher for NoopPushDispatcher {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> Result<(), PushError> {
        debug!(
            user_id = %subscription.user_id,
            title = %message.title,
            "Push gateway not configured, skipping push"
        );
        Ok(())
    }
}
