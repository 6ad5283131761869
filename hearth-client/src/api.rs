/// REST client for the Hearth API
///
/// Every request carries the identity token as a bearer header. Non-success
/// responses become [`ClientError::Api`] with the server's message.

use crate::cache::QueryFetcher;
use crate::error::ClientError;
use crate::query::QueryKey;
use async_trait::async_trait;
use hearth_shared::models::house::HouseWithRole;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of `POST /v1/auth/session`
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub user: SessionUser,

    /// Earliest joined first; the first entry is the primary house
    pub houses: Vec<HouseWithRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl Session {
    pub fn primary_house(&self) -> Option<&HouseWithRole> {
        self.houses.first()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }

    /// `POST /v1/auth/session`: upserts the caller and lists their houses
    pub async fn create_session(&self) -> Result<Session, ClientError> {
        self.send(self.request(reqwest::Method::POST, "/v1/auth/session")).await
    }
}

#[async_trait]
impl QueryFetcher for ApiClient {
    async fn fetch(&self, key: &QueryKey) -> Result<JsonValue, ClientError> {
        debug!(query = %key, "Fetching query");
        self.get(&key.path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", "token").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_session_ignores_extra_user_fields() {
        let house_id = Uuid::new_v4();
        let session: Session = serde_json::from_value(serde_json::json!({
            "user": {
                "id": Uuid::new_v4(),
                "uid": "idp|alice",
                "email": "alice@example.com",
                "name": "Alice",
                "avatar_url": null
            },
            "houses": [{
                "id": house_id,
                "name": "Lakeview",
                "created_by": Uuid::new_v4(),
                "created_at": "2026-01-05T12:00:00Z",
                "role": "owner",
                "joined_at": "2026-01-05T12:00:00Z"
            }]
        }))
        .unwrap();

        assert_eq!(session.user.email, "alice@example.com");
        assert_eq!(session.primary_house().map(|h| h.id), Some(house_id));
    }
}
