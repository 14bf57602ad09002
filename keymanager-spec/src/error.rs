use crate::vault::VaultKind;
use thiserror::Error;

/// Result alias for key manager operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Canonical error surface shared by every store, registry and adapter.
///
/// Vendor failures are translated into these kinds at the adapter boundary;
/// callers above that boundary add context but never change the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("operation not supported: {0}")]
    NotSupported(String),
    #[error("status conflict: {0}")]
    StatusConflict(String),
    #[error("dependency failure: {0}")]
    DependencyFailure(String),
    #[error("{vendor} error: {message}")]
    Vendor { vendor: VaultKind, message: String },
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
        }
    }

    pub fn vendor(vendor: VaultKind, message: impl Into<String>) -> Self {
        Self::Vendor {
            vendor,
            message: message.into(),
        }
    }

    /// Stable identifier for the error kind, used by outer layers to pick a status code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Forbidden(_) => "forbidden",
            Self::NotSupported(_) => "not_supported",
            Self::StatusConflict(_) => "status_conflict",
            Self::DependencyFailure(_) => "dependency_failure",
            Self::Vendor { .. } => "vendor",
            Self::Config(_) => "config",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::not_found("key k1").code(), "not_found");
        assert_eq!(Error::already_exists("key k1").code(), "already_exists");
        assert_eq!(Error::StatusConflict("x".into()).code(), "status_conflict");
        assert_eq!(
            Error::vendor(VaultKind::Azure, "throttled").code(),
            "vendor"
        );
    }

    #[test]
    fn display_names_the_entity() {
        let err = Error::not_found("secret my-secret");
        assert_eq!(err.to_string(), "secret my-secret not found");
        let err = Error::vendor(VaultKind::Aws, "boom");
        assert_eq!(err.to_string(), "aws error: boom");
    }
}
