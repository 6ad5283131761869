/// Client error type
///
/// Server errors keep the server's `message` so callers can show it as is
/// ("This invitation is no longer valid" and the like).

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Realtime protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Builds an [`ClientError::Api`] from a non-success response body
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Body {
            error: String,
            message: String,
        }

        match serde_json::from_str::<Body>(body) {
            Ok(parsed) => ClientError::Api {
                status,
                code: parsed.error,
                message: parsed.message,
            },
            Err(_) => ClientError::Api {
                status,
                code: "unknown".to_string(),
                message: format!("Request failed with status {status}"),
            },
        }
    }

    /// Expired or already-used invitations (HTTP 410)
    pub fn is_expired(&self) -> bool {
        matches!(self, ClientError::Api { status: 410, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}
