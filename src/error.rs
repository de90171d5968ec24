/// Unified error handling for the service.
///
/// Domain-specific error enums are folded into a single `AppError` used for
/// control flow; `ResponseError` maps every variant onto the wire envelope
/// `{status, message, success: false}`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Input validation errors (malformed or missing request data).
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(&'static str),
    MissingField(&'static str),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} must not be blank", field),
            ValidationError::MissingField(field) => write!(f, "{} is required", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Credential and token errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token was presented at all.
    MissingToken,
    /// Access token failed signature or expiry checks, or its subject is gone.
    InvalidAccessToken,
    /// Refresh token failed signature or expiry checks, or its subject is gone.
    InvalidRefreshToken,
    /// Refresh token is signed and unexpired but no longer matches the stored
    /// slot: it was rotated, revoked by logout, or replayed.
    RefreshTokenSuperseded,
    /// Wrong password at login.
    InvalidCredentials,
    /// Wrong old password on a password change (400, not 401).
    InvalidOldPassword,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "unauthorized request"),
            AuthError::InvalidAccessToken => write!(f, "invalid access token"),
            AuthError::InvalidRefreshToken => write!(f, "invalid refresh token"),
            AuthError::RefreshTokenSuperseded => write!(f, "refresh token is expired or used"),
            AuthError::InvalidCredentials => write!(f, "invalid user credentials"),
            AuthError::InvalidOldPassword => write!(f, "invalid old password"),
        }
    }
}

impl StdError for AuthError {}

/// Persistence-layer errors.
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "duplicate entry: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central error type all handlers return.
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(String),
    Auth(AuthError),
    NotFound(String),
    Upstream(String),
    Database(DatabaseError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "{}", msg),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Upstream(msg) => write!(f, "{}", msg),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("record not found".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some("23505") =>
            {
                AppError::Conflict("user with email or username already exists".to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::QueryExecution(err.to_string())),
        }
    }
}

/// Wire envelope for failures: `{status, message, success: false}`.
#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    pub success: bool,
}

impl ErrorBody {
    pub fn new(status: u16, message: String) -> Self {
        Self {
            status,
            message,
            success: false,
        }
    }
}

impl AppError {
    fn log(&self) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "validation error");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(error = %msg, "duplicate identity attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error = %e, "authentication error");
            }
            AppError::NotFound(msg) => {
                tracing::warn!(error = %msg, "resource not found");
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "media host error");
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::InvalidOldPassword) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();

        let status = self.status_code();
        let message = match self {
            // Internal detail never leaks to the client.
            AppError::Database(_) => "database error occurred".to_string(),
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorBody::new(status.as_u16(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = AppError::Validation(ValidationError::EmptyField("email"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::Conflict("user with email or username already exists".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_errors_map_to_401_except_old_password() {
        assert_eq!(
            AppError::Auth(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::RefreshTokenSuperseded).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidOldPassword).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::NotFound("user does not exist".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_maps_to_500() {
        let err = AppError::Upstream("media host unreachable".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn row_not_found_converts_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        match err {
            AppError::NotFound(_) => (),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn envelope_marks_failure() {
        let body = ErrorBody::new(401, "unauthorized request".to_string());
        assert!(!body.success);
        assert_eq!(body.status, 401);
    }

    #[test]
    fn replayed_token_message_matches_contract() {
        assert_eq!(
            AuthError::RefreshTokenSuperseded.to_string(),
            "refresh token is expired or used"
        );
    }
}
