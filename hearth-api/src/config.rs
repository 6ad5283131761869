/// Configuration for the API server
///
/// Loaded from environment variables (a `.env` file is honoured in
/// development).
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for permissive (default `*`)
/// - `PRODUCTION`: enables HSTS (default `false`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `AUTH_JWT_SECRET`: identity provider HS256 secret, at least 32 chars (required)
/// - `AUTH_ISSUER`: expected `iss` claim (unchecked when unset)
/// - `REDIS_URL`: enables the cross-instance realtime relay
/// - `REALTIME_SESSION_BUFFER`: queued events per WebSocket session (default 64)
/// - `APP_BASE_URL`: web app origin used in invitation links
/// - `MAIL_API_URL` / `MAIL_API_KEY` / `MAIL_FROM`: transactional mail API
/// - `PUSH_GATEWAY_URL` / `PUSH_GATEWAY_KEY`: web-push gateway
/// - `INVITATION_TTL_DAYS`: invitation lifetime (default 7)
///
/// # Example
///
/// ```no_run
/// use hearth_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
    pub invitations: InvitationConfig,
    pub mail: MailConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Adds HSTS and other production-only headers
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Identity provider token verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    ///
    /// Must be at least 32 bytes.
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// Expected `iss`; tokens from any issuer are accepted when unset
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Redis URL for multi-instance fan-out
    pub redis_url: Option<String>,

    /// Queued events per session before drops
    pub session_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    /// Web app origin; invitation links point to `{app_base_url}/accept-invite`
    pub app_base_url: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub api_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub gateway_url: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let port = or("API_PORT", "8080").parse::<u16>()?;
        let cors_origins = or("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let production = or("PRODUCTION", "false").parse::<bool>()?;

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?;

        let jwt_secret = var("AUTH_JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("AUTH_JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("AUTH_JWT_SECRET must be at least 32 characters long");
        }

        let session_buffer = or("REALTIME_SESSION_BUFFER", "64").parse::<usize>()?;
        if session_buffer == 0 {
            anyhow::bail!("REALTIME_SESSION_BUFFER must be positive");
        }

        let ttl_days = or("INVITATION_TTL_DAYS", "7").parse::<i64>()?;
        if ttl_days <= 0 {
            anyhow::bail!("INVITATION_TTL_DAYS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: or("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig {
                jwt_secret,
                issuer: var("AUTH_ISSUER"),
            },
            realtime: RealtimeConfig {
                redis_url: var("REDIS_URL"),
                session_buffer,
            },
            invitations: InvitationConfig {
                app_base_url: or("APP_BASE_URL", "http://localhost:3000"),
                ttl_days,
            },
            mail: MailConfig {
                api_url: var("MAIL_API_URL"),
                api_key: var("MAIL_API_KEY"),
                from: or("MAIL_FROM", "Hearth <no-reply@hearth.local>"),
            },
            push: PushConfig {
                gateway_url: var("PUSH_GATEWAY_URL"),
                gateway_key: var("PUSH_GATEWAY_KEY"),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/hearth"), ("AUTH_JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.allows_any_origin());
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.issuer, None);
        assert_eq!(config.realtime.redis_url, None);
        assert_eq!(config.realtime.session_buffer, 64);
        assert_eq!(config.invitations.app_base_url, "http://localhost:3000");
        assert_eq!(config.invitations.ttl_days, 7);
        assert_eq!(config.mail.from, "Hearth <no-reply@hearth.local>");
        assert!(config.push.gateway_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://db/hearth"),
            ("AUTH_JWT_SECRET", SECRET),
            ("AUTH_ISSUER", "https://id.hearth.app"),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://hearth.app, https://admin.hearth.app"),
            ("REDIS_URL", "redis://cache:6379"),
            ("INVITATION_TTL_DAYS", "3"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.api.cors_origins, vec!["https://hearth.app", "https://admin.hearth.app"]);
        assert!(!config.allows_any_origin());
        assert_eq!(config.auth.issuer.as_deref(), Some("https://id.hearth.app"));
        assert_eq!(config.realtime.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.invitations.ttl_days, 3);
    }

    #[test]
    fn test_required_and_invalid_values() {
        assert!(load(&[("AUTH_JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://db")]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://db"), ("AUTH_JWT_SECRET", "short")]).is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgresql://db"),
            ("AUTH_JWT_SECRET", SECRET),
            ("API_PORT", "not-a-port"),
        ])
        .is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgresql://db"),
            ("AUTH_JWT_SECRET", SECRET),
            ("INVITATION_TTL_DAYS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://db"),
            ("AUTH_JWT_SECRET", SECRET),
            ("MAIL_API_KEY", "mail-key"),
        ])
        .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
        assert!(!json.contains("mail-key"));
    }
}
