use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    DatabaseError(#[from] almanac_db::error::DbError),

    #[error(transparent)]
    CoreError(#[from] almanac_core::error::CoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),
}

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    MalformedInput,
    StorageFailure,
    UpstreamFailure,
}

impl ServiceError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        use almanac_core::error::CoreError;
        use almanac_db::error::DbError;

        match self {
            Self::NotFound(_) | Self::DatabaseError(DbError::NotFound(_)) => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::MalformedInput(_)
            | Self::CoreError(CoreError::InvalidInput(_) | CoreError::ValidationError(_))
            | Self::DatabaseError(DbError::CoreError(
                CoreError::InvalidInput(_) | CoreError::ValidationError(_),
            )) => ErrorKind::MalformedInput,
            Self::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            Self::StorageFailure(_) | Self::DatabaseError(_) | Self::CoreError(_) => {
                ErrorKind::StorageFailure
            }
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
