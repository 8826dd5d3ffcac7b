//! Flat error taxonomy for the core, mirroring the teacher's `UserRepoError`
//! shape: one `thiserror` enum, `#[from]` conversions for the failure modes
//! that cross a module boundary, mapped at the edges (HTTP status / CLI exit
//! code) instead of being inspected by string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("patch mismatch: {0}")]
    PatchMismatch(String),

    #[error("task stop timed out after {0:?}")]
    TaskStopTimeout(std::time::Duration),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        CoreError::Forbidden(msg.into())
    }

    /// CLI exit code per the request boundary's external contract: success is
    /// 0, every other kind is a distinct non-zero code so scripts can branch
    /// on failure class without parsing the stderr line.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::InvalidArgument(_) => 2,
            CoreError::NotFound(_) => 3,
            CoreError::Forbidden(_) => 4,
            CoreError::PatchMismatch(_) => 5,
            CoreError::TaskStopTimeout(_) => 6,
            CoreError::Conflict(_) => 7,
            CoreError::Internal(_) => 1,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            CoreError::NotFound("row not found".to_string())
        } else {
            CoreError::Internal(err.to_string())
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            CoreError::NotFound(err.to_string())
        } else {
            CoreError::Internal(err.to_string())
        }
    }
}

impl From<bollard::errors::Error> for CoreError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError { status_code, .. }
                if *status_code == 404 =>
            {
                CoreError::NotFound(err.to_string())
            }
            _ => CoreError::Internal(err.to_string()),
        }
    }
}
