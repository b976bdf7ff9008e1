//! Collaborators the pull request workflow depends on.

use async_trait::async_trait;

use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::{Branch, NewPullRequest, PullRequest};
use crate::bitbucket::repository::RepositoryRef;

/// Bitbucket operations used while creating a pull request.
///
/// Implemented by [`crate::bitbucket::BitbucketClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Remote branches of the repository.
    async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError>;

    /// Submits a new pull request.
    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        draft: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError>;
}

/// Leaves the pull request form.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Returns to the previous view; `success` is true after a submission.
    fn navigate_back(&self, success: bool);
}
