/// Error handling for the API server
///
/// Handlers return [`ApiResult`]. Domain errors from `hearth-shared` convert
/// into [`ApiError`] through `From`, so `?` picks the right status code.
///
/// Every error renders as:
///
/// ```json
/// { "error": "conflict", "message": "...", "details": [ ... ] }
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Task not found".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hearth_shared::auth::authorization::AuthzError;
use hearth_shared::auth::jwt::JwtError;
use hearth_shared::auth::middleware::AuthError;
use hearth_shared::directory::DirectoryError;
use hearth_shared::invitations::InvitationError;
use hearth_shared::models::task::TaskUpdateError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403: role policy, not a member, email mismatch
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409: duplicate invitation, already a member, duplicate house name, last member
    Conflict(String),

    /// 410: the invitation is expired or already used
    Expired(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500; the message is logged, never returned
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Expired(_) => StatusCode::GONE,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Expired(_) => "invitation_expired",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Expired(msg) => write!(f, "Expired: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code().to_string();

        let (message, details) = match self {
            ApiError::ValidationError(errors) => ("Request validation failed".to_string(), Some(errors)),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
            ApiError::Conflict(msg) | ApiError::Expired(msg) => {
                tracing::info!(code = %error, message = %msg, "Request refused");
                (msg, None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => (msg, None),
        };

        (status, Json(ErrorResponse { error, message, details })).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Resource already exists".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::invalid("reference", "Referenced record does not exist")
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                ApiError::invalid(db_err.constraint().unwrap_or("body"), "Value violates a constraint")
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => ApiError::Forbidden("Not a member of this house".to_string()),
            AuthzError::NotManager { .. } => {
                ApiError::Forbidden("Only owners and admins may do this".to_string())
            }
            AuthzError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("Missing permission: {}", permission.as_str()))
            }
            AuthzError::Denied(reason) => ApiError::Forbidden(reason.to_string()),
            AuthzError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { .. } => ApiError::NotFound("Member not found".to_string()),
            DirectoryError::Conflict(msg) => ApiError::Conflict(msg),
            DirectoryError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<TaskUpdateError> for ApiError {
    fn from(err: TaskUpdateError) -> Self {
        match err {
            TaskUpdateError::NotFound(id) => ApiError::NotFound(format!("Task {id} not found")),
            TaskUpdateError::Invalid(e) => ApiError::invalid(e.field, e.message),
            TaskUpdateError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<InvitationError> for ApiError {
    fn from(err: InvitationError) -> Self {
        match err {
            InvitationError::NotFound => ApiError::NotFound("Invitation not found".to_string()),
            InvitationError::Expired => ApiError::Expired("Invitation is no longer valid".to_string()),
            InvitationError::Conflict(msg) => ApiError::Conflict(msg),
            InvitationError::Forbidden(msg) => ApiError::Forbidden(msg),
            InvitationError::Authz(e) => e.into(),
            InvitationError::DatabaseError(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_shared::auth::policy::DenyReason;
    use hearth_shared::models::membership::MemberRole;
    use hearth_shared::models::task::InvalidPatch;

    #[test]
    fn test_status_and_code_table() {
        let cases = [
            (ApiError::NotFound(String::new()), StatusCode::NOT_FOUND, "not_found"),
            (ApiError::Conflict(String::new()), StatusCode::CONFLICT, "conflict"),
            (ApiError::Forbidden(String::new()), StatusCode::FORBIDDEN, "forbidden"),
            (ApiError::Expired(String::new()), StatusCode::GONE, "invitation_expired"),
            (ApiError::ValidationError(vec![]), StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            (ApiError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED, "unauthorized"),
            (ApiError::InternalError(String::new()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_domain_errors_map() {
        assert!(matches!(ApiError::from(InvitationError::Expired), ApiError::Expired(_)));
        assert!(matches!(ApiError::from(InvitationError::NotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(InvitationError::Forbidden("mismatch".into())),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(DirectoryError::Conflict("last member".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(AuthzError::Denied(DenyReason::OwnerOnAdmin)),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(AuthzError::NotManager { actual: MemberRole::Member }),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(ApiError::from(JwtError::Expired), ApiError::Unauthorized(_)));
        assert!(matches!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(sqlx::Error::PoolTimedOut),
            ApiError::InternalError(_)
        ));
    }

    #[test]
    fn test_task_update_errors_map() {
        let invalid = TaskUpdateError::Invalid(InvalidPatch {
            field: "status",
            message: "A task must have an assignee to be in_progress".to_string(),
        });
        match ApiError::from(invalid) {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "status");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert!(matches!(
            ApiError::from(TaskUpdateError::NotFound(uuid::Uuid::nil())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(TaskUpdateError::DatabaseError(sqlx::Error::PoolTimedOut)),
            ApiError::InternalError(_)
        ));
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = ApiError::InternalError("password=hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_validation_body_has_details() {
        let response = ApiError::invalid("title", "must not be empty").into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();

        let details = body.details.unwrap();
        assert_eq!(details[0].field, "title");
        assert_eq!(details[0].message, "must not be empty");
    }
}
