//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
///
/// Filesystem failures come from the library and keep their path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pki(#[from] hardway_pki::Error),

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{failed} of {total} roles failed")]
    RolesFailed { failed: usize, total: usize },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}
