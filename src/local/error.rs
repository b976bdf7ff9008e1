//! Error types for local repository inspection.

use thiserror::Error;

/// Errors raised while reading the active local repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocalRepositoryError {
    /// The path is not within a Git repository.
    #[error("not inside a Git repository")]
    NotARepository,

    /// The repository is bare and has no working directory.
    #[error("repository has no working directory")]
    BareRepository,

    /// The named remote is not configured.
    #[error("remote '{name}' not found")]
    RemoteNotFound {
        /// Name of the missing remote.
        name: String,
    },

    /// The remote URL does not name an owner and repository.
    #[error("could not parse remote URL: {url}")]
    InvalidRemoteUrl {
        /// The unparseable URL string.
        url: String,
    },

    /// Git operation failed.
    #[error("git error: {message}")]
    Git {
        /// Error detail from the git2 library.
        message: String,
    },
}

impl From<git2::Error> for LocalRepositoryError {
    fn from(error: git2::Error) -> Self {
        Self::Git {
            message: error.message().to_owned(),
        }
    }
}
