use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeamError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Malformed data in {}: {reason}", path.display())]
    MalformedData { path: PathBuf, reason: String },
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Profile '{0}' is locked by another invocation")]
    Locked(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl TeamError {
    /// Process exit code for the binary. Reported outcomes exit 1, environment faults exit 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            TeamError::NotFound(_)
            | TeamError::Conflict(_)
            | TeamError::ValidationError(_)
            | TeamError::Locked(_) => 1,
            _ => 2,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TeamError::NotFound(_))
    }
}
