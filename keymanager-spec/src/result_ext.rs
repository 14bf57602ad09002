use crate::error::{Error, Result};

impl Error {
    /// Prefixes the message with `context` while keeping the kind.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound { entity } => Self::NotFound {
                entity: format!("{context}: {entity}"),
            },
            Self::AlreadyExists { entity } => Self::AlreadyExists {
                entity: format!("{context}: {entity}"),
            },
            Self::InvalidParameter(msg) => Self::InvalidParameter(format!("{context}: {msg}")),
            Self::InvalidFormat(msg) => Self::InvalidFormat(format!("{context}: {msg}")),
            Self::Forbidden(msg) => Self::Forbidden(format!("{context}: {msg}")),
            Self::NotSupported(msg) => Self::NotSupported(format!("{context}: {msg}")),
            Self::StatusConflict(msg) => Self::StatusConflict(format!("{context}: {msg}")),
            Self::DependencyFailure(msg) => Self::DependencyFailure(format!("{context}: {msg}")),
            Self::Vendor { vendor, message } => Self::Vendor {
                vendor,
                message: format!("{context}: {message}"),
            },
            Self::Config(msg) => Self::Config(format!("{context}: {msg}")),
        }
    }
}

pub trait ResultExt<T> {
    /// Adds store/entity context to the error without changing its kind.
    fn context_with<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;

    /// Turns `NotFound` into `Ok(None)`.
    fn found(self) -> Result<Option<T>>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context_with<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|err| err.with_context(context()))
    }

    fn found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
