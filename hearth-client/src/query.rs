/// Cached query identifiers
///
/// Every list the client keeps locally is named by a [`QueryKey`]. House
/// scoped lists carry the house id; per-user lists carry the viewer's id.
/// Each key maps to exactly one REST read endpoint.

use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// `GET /v1/houses/{house}/tasks`
    Tasks(Uuid),

    /// `GET /v1/houses/{house}/devices`
    Devices(Uuid),

    /// `GET /v1/houses/{house}/shopping`
    ShoppingItems(Uuid),

    /// `GET /v1/houses/{house}/members`
    Members(Uuid),

    /// `GET /v1/notifications`, keyed by viewer
    Notifications(Uuid),

    /// `GET /v1/houses`, keyed by viewer
    Houses(Uuid),
}

impl QueryKey {
    /// REST path relative to the API base URL
    pub fn path(&self) -> String {
        match self {
            QueryKey::Tasks(house) => format!("/v1/houses/{house}/tasks"),
            QueryKey::Devices(house) => format!("/v1/houses/{house}/devices"),
            QueryKey::ShoppingItems(house) => format!("/v1/houses/{house}/shopping"),
            QueryKey::Members(house) => format!("/v1/houses/{house}/members"),
            QueryKey::Notifications(_) => "/v1/notifications".to_string(),
            QueryKey::Houses(_) => "/v1/houses".to_string(),
        }
    }

    /// Every house-scoped key for `house`
    pub fn house_queries(house: Uuid) -> [QueryKey; 4] {
        [
            QueryKey::Tasks(house),
            QueryKey::Devices(house),
            QueryKey::ShoppingItems(house),
            QueryKey::Members(house),
        ]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Tasks(id) => write!(f, "tasks:{id}"),
            QueryKey::Devices(id) => write!(f, "devices:{id}"),
            QueryKey::ShoppingItems(id) => write!(f, "shopping:{id}"),
            QueryKey::Members(id) => write!(f, "members:{id}"),
            QueryKey::Notifications(id) => write!(f, "notifications:{id}"),
            QueryKey::Houses(id) => write!(f, "houses:{id}"),
        }
    }
}
