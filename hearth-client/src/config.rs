/// Client configuration
///
/// | variable                     | default                 |
/// |------------------------------|-------------------------|
/// | `HEARTH_API_URL`             | `http://localhost:8080` |
/// | `HEARTH_TOKEN`               | required                |
/// | `HEARTH_HOUSE_ID`            | primary house           |
/// | `HEARTH_POLL_INTERVAL_SECS`  | `300`                   |

use std::env;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: String,

    /// House to watch; the caller's primary house when unset
    pub house_id: Option<Uuid>,

    /// Fallback refetch period while realtime is down
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = var("HEARTH_TOKEN")
            .ok_or_else(|| anyhow::anyhow!("HEARTH_TOKEN environment variable is required"))?;

        let house_id = var("HEARTH_HOUSE_ID")
            .map(|id| id.parse::<Uuid>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("HEARTH_HOUSE_ID is not a UUID: {e}"))?;

        let poll_secs = var("HEARTH_POLL_INTERVAL_SECS")
            .unwrap_or_else(|| "300".to_string())
            .parse::<u64>()?;
        if poll_secs == 0 {
            anyhow::bail!("HEARTH_POLL_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            api_url: var("HEARTH_API_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            token,
            house_id,
            poll_interval: Duration::from_secs(poll_secs),
        })
    }

    /// `ws(s)://…/v1/realtime` derived from the API URL
    pub fn realtime_url(&self) -> String {
        let base = self.api_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/v1/realtime")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<ClientConfig> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("HEARTH_TOKEN", "abc")]).unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert!(config.house_id.is_none());
    }

    #[test]
    fn test_token_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_invalid_house_id() {
        assert!(config(&[("HEARTH_TOKEN", "abc"), ("HEARTH_HOUSE_ID", "house-1")]).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        assert!(config(&[("HEARTH_TOKEN", "abc"), ("HEARTH_POLL_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_realtime_url() {
        let secure = config(&[("HEARTH_TOKEN", "abc"), ("HEARTH_API_URL", "https://hearth.example.com/")]).unwrap();
        assert_eq!(secure.realtime_url(), "wss://hearth.example.com/v1/realtime");

        let local = config(&[("HEARTH_TOKEN", "abc")]).unwrap();
        assert_eq!(local.realtime_url(), "ws://localhost:8080/v1/realtime");
    }
}
