//! Command error types.
//!
//! Every failure a command can report is folded into [`CommandError`], and
//! every `CommandError` maps to exactly one canonical [`ErrorKind`] with a
//! fixed HTTP status. Transports translate responses mechanically; nothing
//! downstream ever inspects error text to decide behavior.

use crate::auth::PasswordError;
use crate::db::DbError;
use crate::model::ValidationError;
use crate::types::RequestId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical error codes of the command protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The security policy denied the operation
    SecurityPolicyDenied,
    /// The command was malformed or arrived in the wrong state
    ProtocolError,
    /// Input failed domain validation
    Validity,
    /// Credentials or session were missing or wrong
    AuthenticationError,
    /// The account is banned
    Banned,
    /// Too many login attempts
    RateLimitExceeded,
    /// The named admin does not exist
    AdminNonexistent,
    /// The named user does not exist
    UserNonexistent,
    /// The database failed
    SqlError,
    /// The operation would violate a uniqueness constraint
    SqlErrorUnique,
    /// The password subsystem failed
    PasswordError,
    /// An I/O error occurred
    IoError,
}

impl ErrorKind {
    /// The HTTP status a transport reports for this code.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::SecurityPolicyDenied => 403,
            ErrorKind::ProtocolError => 400,
            ErrorKind::Validity => 400,
            ErrorKind::AuthenticationError => 401,
            ErrorKind::Banned => 403,
            ErrorKind::RateLimitExceeded => 429,
            ErrorKind::AdminNonexistent => 404,
            ErrorKind::UserNonexistent => 404,
            ErrorKind::SqlError => 500,
            ErrorKind::SqlErrorUnique => 409,
            ErrorKind::PasswordError => 500,
            ErrorKind::IoError => 500,
        }
    }

    /// The canonical wire name of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SecurityPolicyDenied => "SECURITY_POLICY_DENIED",
            ErrorKind::ProtocolError => "PROTOCOL_ERROR",
            ErrorKind::Validity => "VALIDITY",
            ErrorKind::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorKind::Banned => "BANNED",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::AdminNonexistent => "ADMIN_NONEXISTENT",
            ErrorKind::UserNonexistent => "USER_NONEXISTENT",
            ErrorKind::SqlError => "SQL_ERROR",
            ErrorKind::SqlErrorUnique => "SQL_ERROR_UNIQUE",
            ErrorKind::PasswordError => "PASSWORD_ERROR",
            ErrorKind::IoError => "IO_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure while executing a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Operation not permitted: {reason}")]
    SecurityPolicyDenied { reason: String },

    #[error("{message}")]
    Protocol { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Authentication { message: String },

    #[error("Banned: {reason}")]
    Banned { reason: String },

    #[error("Too many login attempts. Try again shortly.")]
    RateLimitExceeded,

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl CommandError {
    pub fn protocol(message: impl Into<String>) -> Self {
        CommandError::Protocol { message: message.into() }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        CommandError::Authentication { message: message.into() }
    }

    /// The canonical code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::SecurityPolicyDenied { .. } => ErrorKind::SecurityPolicyDenied,
            CommandError::Protocol { .. } => ErrorKind::ProtocolError,
            CommandError::Validation(_) => ErrorKind::Validity,
            CommandError::Authentication { .. } => ErrorKind::AuthenticationError,
            CommandError::Banned { .. } => ErrorKind::Banned,
            CommandError::RateLimitExceeded => ErrorKind::RateLimitExceeded,
            CommandError::Database(DbError::AdminNonexistent { .. }) => ErrorKind::AdminNonexistent,
            CommandError::Database(DbError::UserNonexistent { .. }) => ErrorKind::UserNonexistent,
            CommandError::Database(DbError::UniqueViolation { .. }) => ErrorKind::SqlErrorUnique,
            CommandError::Database(_) => ErrorKind::SqlError,
            CommandError::Password(_) => ErrorKind::PasswordError,
            CommandError::Io(_) => ErrorKind::IoError,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// The message reported to the client.
    ///
    /// Infrastructure failures are collapsed to fixed sentences so driver and
    /// connection details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Database(DbError::UniqueViolation { .. }) => {
                "The operation would violate a uniqueness constraint.".to_string()
            }
            CommandError::Database(error @ (DbError::AdminNonexistent { .. } | DbError::UserNonexistent { .. })) => {
                error.to_string()
            }
            CommandError::Database(_) => "An internal database error occurred.".to_string(),
            CommandError::Password(_) => "An internal password error occurred.".to_string(),
            CommandError::Io(_) => "An internal I/O error occurred.".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this is a failure to authenticate, as opposed to a failure of
    /// the login machinery. Login handlers report these as error responses
    /// rather than command failures.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthenticationError | ErrorKind::Banned | ErrorKind::RateLimitExceeded
        )
    }
}

/// Password hashing and verification run on blocking threads; a join failure
/// means the runtime lost the task, not that the password was wrong.
impl From<tokio::task::JoinError> for CommandError {
    fn from(error: tokio::task::JoinError) -> Self {
        CommandError::Io(anyhow::Error::new(error))
    }
}

/// The wire form of a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: RequestId,
    pub error_code: ErrorKind,
    pub message: String,
}

impl ErrorResponse {
    pub fn of(request_id: RequestId, error: &CommandError) -> Self {
        Self {
            request_id,
            error_code: error.kind(),
            message: error.user_message(),
        }
    }
}

/// Type alias for command results
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kinds_have_canonical_names_and_statuses() {
        let cases = [
            (ErrorKind::SecurityPolicyDenied, "SECURITY_POLICY_DENIED", 403),
            (ErrorKind::ProtocolError, "PROTOCOL_ERROR", 400),
            (ErrorKind::Validity, "VALIDITY", 400),
            (ErrorKind::AuthenticationError, "AUTHENTICATION_ERROR", 401),
            (ErrorKind::Banned, "BANNED", 403),
            (ErrorKind::RateLimitExceeded, "RATE_LIMIT_EXCEEDED", 429),
            (ErrorKind::AdminNonexistent, "ADMIN_NONEXISTENT", 404),
            (ErrorKind::UserNonexistent, "USER_NONEXISTENT", 404),
            (ErrorKind::SqlError, "SQL_ERROR", 500),
            (ErrorKind::SqlErrorUnique, "SQL_ERROR_UNIQUE", 409),
            (ErrorKind::PasswordError, "PASSWORD_ERROR", 500),
            (ErrorKind::IoError, "IO_ERROR", 500),
        ];

        for (kind, name, status) in cases {
            assert_eq!(kind.as_str(), name);
            assert_eq!(kind.http_status(), status);
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
        }
    }

    #[test]
    fn test_database_errors_map_to_their_kinds() {
        let id = Uuid::new_v4();

        let missing_admin = CommandError::from(DbError::AdminNonexistent { id });
        assert_eq!(missing_admin.kind(), ErrorKind::AdminNonexistent);
        assert_eq!(missing_admin.http_status(), 404);
        assert!(missing_admin.user_message().contains(&id.to_string()));

        let missing_user = CommandError::from(DbError::UserNonexistent { id });
        assert_eq!(missing_user.kind(), ErrorKind::UserNonexistent);

        let duplicate = CommandError::from(DbError::UniqueViolation {
            constraint: Some("admins_idname_unique".to_string()),
            table: Some("admins".to_string()),
            message: "duplicate key value".to_string(),
        });
        assert_eq!(duplicate.kind(), ErrorKind::SqlErrorUnique);
        assert_eq!(duplicate.http_status(), 409);
    }

    #[test]
    fn test_validation_failures_have_their_own_code() {
        let error = CommandError::from(ValidationError::InvalidEmail("missing @".to_string()));
        assert_eq!(error.kind(), ErrorKind::Validity);
        assert_eq!(error.http_status(), 400);

        assert_eq!(CommandError::protocol("next before begin").kind(), ErrorKind::ProtocolError);
    }

    #[test]
    fn test_internal_details_stay_out_of_user_messages() {
        let db = CommandError::from(DbError::Other(anyhow::anyhow!("connection refused to 10.0.0.17:5432")));
        assert_eq!(db.kind(), ErrorKind::SqlError);
        assert!(!db.user_message().contains("10.0.0.17"));

        let duplicate = CommandError::from(DbError::UniqueViolation {
            constraint: Some("admin_emails_email_unique".to_string()),
            table: None,
            message: "Key (email)=(x@example.com) already exists.".to_string(),
        });
        assert!(!duplicate.user_message().contains("example.com"));
    }

    #[test]
    fn test_error_response_carries_the_request_id() {
        let request_id = Uuid::new_v4();
        let error = CommandError::authentication("Invalid username or password.");
        let response = ErrorResponse::of(request_id, &error);

        assert_eq!(response.request_id, request_id);
        assert_eq!(response.error_code, ErrorKind::AuthenticationError);
        assert_eq!(response.message, "Invalid username or password.");
    }

    #[test]
    fn test_authentication_failures_are_distinguished() {
        assert!(CommandError::authentication("bad credentials").is_authentication_failure());
        assert!(CommandError::Banned { reason: "spam".to_string() }.is_authentication_failure());
        assert!(CommandError::RateLimitExceeded.is_authentication_failure());

        assert!(!CommandError::protocol("bad field").is_authentication_failure());
        assert!(!CommandError::from(DbError::Other(anyhow::anyhow!("down"))).is_authentication_failure());
    }
}
