//! Error handler for the identity store.

use std::path::PathBuf;

use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Broad family an [`IdentityError`] belongs to.
///
/// Callers branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or non-compliant input.
    Validation,
    /// No record matches the supplied key.
    NotFound,
    /// A uniqueness rule would be broken.
    Conflict,
    /// Identity hints resolve to different users.
    Integrity,
    /// Operation or parameter is not supported.
    Unsupported,
    /// Uniform authentication failure.
    Authentication,
    /// File or snapshot failure.
    Io,
    /// Unexpected failure of a third-party primitive.
    Internal,
}

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Username,
    Email,
    UserId,
    PublicKey,
    MfaToken,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Username => "username",
            Self::Email => "email address",
            Self::UserId => "user id",
            Self::PublicKey => "public key",
            Self::MfaToken => "mfa token",
        };
        f.write_str(name)
    }
}

/// Enum representing identity store errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("{field} does not comply with policy: {reason}")]
    PolicyViolation { field: &'static str, reason: String },
    #[error("invalid user {id:?}: {reason}")]
    InvalidUser { id: String, reason: &'static str },

    #[error("{entity} {value:?} not found")]
    NotFound { entity: Entity, value: String },

    #[error("{entity} {value:?} already exists")]
    AlreadyExists { entity: Entity, value: String },
    #[error("mfa token with the same secret already exists")]
    DuplicateMfaSecret,
    #[error("mfa token with comment {0:?} already exists")]
    DuplicateMfaComment(String),

    #[error("username {username:?} and email {email:?} point to a different identity")]
    IdentityMismatch { username: String, email: String },

    #[error("{operation} is not supported")]
    UnsupportedOperation { operation: &'static str },
    #[error("unsupported {parameter}: {value}")]
    Unsupported {
        parameter: &'static str,
        value: String,
    },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cryptographic primitive failed: {cause}")]
    Crypto { cause: String },
    #[error("internal error")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl IdentityError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidField { .. }
            | Self::PolicyViolation { .. }
            | Self::InvalidUser { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. }
            | Self::DuplicateMfaSecret
            | Self::DuplicateMfaComment(_) => ErrorKind::Conflict,
            Self::IdentityMismatch { .. } => ErrorKind::Integrity,
            Self::UnsupportedOperation { .. } | Self::Unsupported { .. } => {
                ErrorKind::Unsupported
            }
            Self::InvalidCredentials => ErrorKind::Authentication,
            Self::Io { .. } | Self::Snapshot { .. } => ErrorKind::Io,
            Self::Crypto { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: Entity, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            value: value.into(),
        }
    }

    pub(crate) fn unsupported(
        parameter: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::Unsupported {
            parameter,
            value: value.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(|e| IdentityError::Internal(Box::new(e)))
    }
}
