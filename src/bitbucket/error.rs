//! Error types exposed by the Bitbucket client layer.

use thiserror::Error;

/// Errors surfaced while authenticating, calling Bitbucket, or driving the
/// pull request workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BitbucketError {
    /// Login or password was empty. Detected locally, before any request.
    #[error("credentials are invalid: {message}")]
    InvalidCredentials {
        /// Which credential field was rejected.
        message: String,
    },

    /// An operation was attempted without an active session.
    #[error("not logged in to Bitbucket")]
    NotAuthenticated,

    /// Bitbucket rejected the supplied credentials.
    #[error("Bitbucket rejected the credentials: {message}")]
    Authentication {
        /// Message returned with the 401/403 response.
        message: String,
    },

    /// Bitbucket rejected a request body, e.g. identical source and
    /// destination branches.
    #[error("Bitbucket rejected the request: {message}")]
    Validation {
        /// Validation message reported by Bitbucket.
        message: String,
    },

    /// A response could not be translated into domain types.
    #[error("malformed Bitbucket response: {message}")]
    Mapping {
        /// Deserialisation failure detail.
        message: String,
    },

    /// Networking failed while calling Bitbucket.
    #[error("network error talking to Bitbucket: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// Bitbucket returned a non-authentication, non-validation API error.
    #[error("Bitbucket API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Response message describing the failure.
        message: String,
    },

    /// A URL could not be parsed.
    #[error("URL is invalid: {0}")]
    InvalidUrl(String),

    /// Invalid pagination parameters.
    #[error("invalid pagination: {message}")]
    InvalidPagination {
        /// Description of the invalid parameter.
        message: String,
    },

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// The active local repository could not be inspected.
    #[error("local repository: {message}")]
    LocalRepository {
        /// Details about the local repository failure.
        message: String,
    },

    /// Local I/O operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl BitbucketError {
    /// Returns true when retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { status, .. } => matches!(*status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<crate::local::LocalRepositoryError> for BitbucketError {
    fn from(error: crate::local::LocalRepositoryError) -> Self {
        Self::LocalRepository {
            message: error.to_string(),
        }
    }
}
