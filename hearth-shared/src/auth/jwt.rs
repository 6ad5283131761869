/// Identity token verification
///
/// Authentication is delegated to an external identity provider that issues
/// HS256-signed JWTs. Hearth never issues session tokens of its own; it only
/// verifies the provider's tokens and maps them onto a local user.
///
/// # Claims
///
/// - `sub`: the provider's user id (stored as `users.uid`)
/// - `email`: verified email
/// - `name`, `picture`: optional profile fields
/// - `iss`: issuer, checked when an expected issuer is configured
/// - `iat`, `exp`: issue and expiry timestamps
///
/// # Example
///
/// ```
/// use hearth_shared::auth::jwt::{create_token, validate_token, IdentityClaims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-provider-secret-of-at-least-32-bytes";
/// let claims = IdentityClaims::new("idp|42", "alice@example.com", Some("idp"));
/// let token = create_token(&claims, secret)?;
///
/// let verified = validate_token(&token, secret, Some("idp"))?;
/// assert_eq!(verified.sub, "idp|42");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::IdentityProfile;

/// Error type for identity token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    /// Signature checks out but a required profile claim is empty
    #[error("Token is missing claim: {0}")]
    MissingClaim(&'static str),
}

/// Claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject - external user id
    pub sub: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl IdentityClaims {
    /// Claims valid for one hour
    pub fn new(sub: impl Into<String>, email: impl Into<String>, issuer: Option<&str>) -> Self {
        Self::with_expiration(sub, email, issuer, Duration::hours(1))
    }

    pub fn with_expiration(
        sub: impl Into<String>,
        email: impl Into<String>,
        issuer: Option<&str>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: sub.into(),
            email: email.into(),
            name: None,
            picture: None,
            iss: issuer.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Profile fields used to upsert the local user
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            uid: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.picture.clone(),
        }
    }
}

/// Signs claims with HS256
///
/// The server only needs this for tests and local tooling; production tokens
/// come from the identity provider.
pub fn create_token(claims: &IdentityClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry and (when given) issuer
///
/// # Errors
///
/// - [`JwtError::Expired`] past `exp`
/// - [`JwtError::InvalidIssuer`] when `issuer` is set and differs
/// - [`JwtError::MissingClaim`] when `sub` or `email` is empty
/// - [`JwtError::ValidationError`] for every other failure
pub fn validate_token(
    token: &str,
    secret: &str,
    issuer: Option<&str>,
) -> Result<IdentityClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    let claims = token_data.claims;
    if claims.sub.trim().is_empty() {
        return Err(JwtError::MissingClaim("sub"));
    }
    if claims.email.trim().is_empty() {
        return Err(JwtError::MissingClaim("email"));
    }

    Ok(claims)
}
