use crate::error::AppError;

/// Reasons the authorization gate rejects a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredential,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Access token required")]
    WrongTokenKind,
    #[error("User not found")]
    UserNotFound,
    #[error("Account is deactivated")]
    AccountDeactivated,
    #[error("Insufficient permissions")]
    Forbidden,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "AUTH_REQUIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "TOKEN_EXPIRED",
            AuthError::WrongTokenKind => "INVALID_TOKEN_TYPE",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            AuthError::Forbidden => "FORBIDDEN",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Forbidden => AppError::Forbidden(e.to_string()),
            other => AppError::Unauthenticated {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}
