//! Local Git repository inspection.
//!
//! The pull request workflow asks a [`LocalRepositoryProvider`] for the
//! repository the user is working in: its Bitbucket owner and name, parsed
//! from the `origin` remote, and its local and remote-tracking branches.
//!
//! # Example
//!
//! ```no_run
//! use bucketline::local::{Git2RepositoryProvider, LocalRepositoryProvider};
//!
//! let provider = Git2RepositoryProvider::new(".");
//! if let Ok(active) = provider.active_repository() {
//!     let head = active.head_branch().map(|branch| branch.name.as_str());
//!     assert!(head.is_none_or(|name| !name.is_empty()));
//! }
//! ```

mod discovery;
mod error;
mod remote;

pub use discovery::{ActiveRepository, DEFAULT_REMOTE_NAME, Git2RepositoryProvider, LocalBranch};
pub use error::LocalRepositoryError;
pub use remote::{RemoteOrigin, parse_remote_url};

/// Source of the active local repository.
#[cfg_attr(test, mockall::automock)]
pub trait LocalRepositoryProvider: Send + Sync {
    /// Reads the active repository and its branches.
    ///
    /// # Errors
    ///
    /// Returns [`LocalRepositoryError`] when no repository is active or it
    /// cannot be read.
    fn active_repository(&self) -> Result<ActiveRepository, LocalRepositoryError>;
}
