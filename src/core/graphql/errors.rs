//! Mapping service errors onto the `ApplicationErrors` result member

use async_graphql::{Context, SimpleObject};

use crate::core::auth::AuthError;
use crate::core::config::Environment;
use crate::core::listings::ListingError;

/// Message shown to clients in place of internal failure details
pub const GENERIC_ERROR_MESSAGE: &str = "Error while processing Request";

/// Error member of every result union
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct ApplicationErrors {
    pub error_message: String,
    pub code: String,
    /// Underlying error detail, only populated in development
    pub stack: Option<String>,
}

impl ApplicationErrors {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            code: code.into(),
            stack: None,
        }
    }

    /// Build from a service error, hiding internal detail outside development
    pub fn from_error<E: ClientError>(err: &E, environment: Environment) -> Self {
        let internal = err.is_internal();
        if internal {
            tracing::error!(error = %err, code = err.code(), "Resolver failed");
        } else {
            tracing::debug!(error = %err, code = err.code(), "Request rejected");
        }

        let message = if internal {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            err.to_string()
        };

        Self {
            error_message: message,
            code: err.code().to_string(),
            stack: environment.is_development().then(|| format!("{err:?}")),
        }
    }
}

/// Errors that can be reported to GraphQL clients
pub trait ClientError: std::error::Error {
    /// Stable SCREAMING_SNAKE code
    fn code(&self) -> &'static str;

    /// Whether the message may leak server internals
    fn is_internal(&self) -> bool {
        false
    }
}

impl ClientError for AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "BAD_USER_INPUT",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::EmailAlreadyExists => "EMAIL_EXISTS",
            AuthError::UnknownEmail => "BAD_REQUEST",
            AuthError::InvalidOtp => "INVALID_OTP",
            AuthError::OtpExpired => "OTP_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::Storage(_) => "UPLOAD_FAILED",
            AuthError::Mail(_) | AuthError::InternalError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, AuthError::Mail(_) | AuthError::InternalError(_))
            || matches!(self, AuthError::Storage(e) if is_internal_storage(e))
    }
}

impl ClientError for ListingError {
    fn code(&self) -> &'static str {
        match self {
            ListingError::Validation(_) => "BAD_USER_INPUT",
            ListingError::NotManager | ListingError::Forbidden => "FORBIDDEN",
            ListingError::PropertyNotFound => "PROPERTY_NOT_FOUND",
            ListingError::UnitNotFound => "UNIT_NOT_FOUND",
            ListingError::TenantNotFound => "TENANT_NOT_FOUND",
            ListingError::UnitOccupied => "UNIT_OCCUPIED",
            ListingError::NotOccupant => "NOT_OCCUPANT",
            ListingError::DeleteOccupiedUnit | ListingError::PropertyHasOccupiedUnits => {
                "INVALID_OPERATION"
            }
            ListingError::Storage(_) => "UPLOAD_FAILED",
            ListingError::InternalError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ListingError::InternalError(_))
            || matches!(self, ListingError::Storage(e) if is_internal_storage(e))
    }
}

fn is_internal_storage(err: &crate::core::storage::StorageError) -> bool {
    use crate::core::storage::StorageError;
    matches!(err, StorageError::Io(_) | StorageError::Task(_))
}

/// `ApplicationErrors` for `err`, honouring the environment stored in schema data
pub fn app_error<E: ClientError>(ctx: &Context<'_>, err: E) -> ApplicationErrors {
    let environment = ctx.data_opt::<Environment>().copied().unwrap_or_default();
    ApplicationErrors::from_error(&err, environment)
}
