//! Domain models for repositories, branches, commits and pull requests.
//!
//! Wire schemas for the two Bitbucket dialects live in [`cloud`] and
//! [`server`]; each converts into the types defined here and is dropped once
//! mapped. Only repository and pull request creation map in the other
//! direction.

use chrono::{DateTime, Utc};

use super::error::BitbucketError;
use super::repository::RepositoryRef;

pub(crate) mod cloud;
pub(crate) mod server;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// SCM identifier of the only repositories surfaced to callers.
pub const GIT_SCM: &str = "git";

/// A repository hosted on Bitbucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    /// Repository name (slug).
    pub name: String,
    /// Owning user, team, or Server project key.
    pub owner: String,
    /// HTTPS clone URL, when the provider reported one.
    pub clone_url: Option<String>,
    /// SCM identifier reported by the provider.
    pub scm: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Whether the repository is private.
    pub is_private: bool,
    /// Browser URL for the repository.
    pub html_url: Option<String>,
}

impl RemoteRepository {
    /// Returns true for git repositories.
    #[must_use]
    pub fn is_git(&self) -> bool {
        self.scm.eq_ignore_ascii_case(GIT_SCM)
    }

    /// Builds the owner/name reference used by the client API.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when owner or name is blank.
    pub fn reference(&self) -> Result<RepositoryRef, BitbucketError> {
        RepositoryRef::new(&self.owner, &self.name)
    }
}

/// Repository to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    /// Owner and name of the repository to create.
    pub target: RepositoryRef,
    /// Optional description.
    pub description: Option<String>,
    /// Whether the repository should be private.
    pub is_private: bool,
}

/// A branch as reported by Bitbucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Branch name without any `refs/heads/` prefix.
    pub name: String,
    /// Hash of the commit at the branch tip.
    pub target_hash: String,
    /// Whether this is the repository's default branch.
    pub is_default: bool,
}

/// A commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full commit hash; the identity key.
    pub hash: String,
    /// Commit message.
    pub message: Option<String>,
    /// Author as recorded in the commit (`Name <email>` on Cloud).
    pub author_name: Option<String>,
    /// Bitbucket account linked to the author, if any.
    pub author: Option<User>,
    /// Author date.
    pub date: Option<DateTime<Utc>>,
}

/// A Bitbucket account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    /// Provider identifier (UUID on Cloud, numeric id on Server).
    pub id: Option<String>,
    /// Login / username.
    pub username: String,
    /// Human readable name.
    pub display_name: Option<String>,
}

/// A team (Cloud) or project (Server) the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Provider identifier.
    pub id: Option<String>,
    /// Name used as repository owner in API paths.
    pub username: String,
    /// Human readable name.
    pub display_name: Option<String>,
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestState {
    /// Open for review.
    Open,
    /// Merged into the destination.
    Merged,
    /// Declined by a reviewer.
    Declined,
    /// Superseded by another pull request.
    Superseded,
}

impl PullRequestState {
    /// Parses the provider's state string, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "MERGED" => Some(Self::Merged),
            "DECLINED" => Some(Self::Declined),
            "SUPERSEDED" => Some(Self::Superseded),
            _ => None,
        }
    }

    /// Returns the API parameter value for this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
            Self::Superseded => "SUPERSEDED",
        }
    }
}

/// A pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Pull request identifier within its repository.
    pub id: u64,
    /// Title.
    pub title: String,
    /// Description body.
    pub description: Option<String>,
    /// Name of the branch being merged.
    pub source_branch: String,
    /// Name of the branch merged into.
    pub destination_branch: String,
    /// Whether the source branch is deleted after merge.
    pub close_source_branch: bool,
    /// Current state.
    pub state: Option<PullRequestState>,
    /// Author of the pull request.
    pub author: Option<User>,
    /// Commit at the source branch tip when last updated.
    pub source_commit: Option<String>,
    /// Creation timestamp.
    pub created_on: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_on: Option<DateTime<Utc>>,
}

/// Pull request to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Description body.
    pub description: Option<String>,
    /// Name of the branch being merged, as known to Bitbucket.
    pub source_branch: String,
    /// Name of the branch merged into.
    pub destination_branch: String,
    /// Whether the source branch is deleted after merge.
    pub close_source_branch: bool,
}

/// A pull request comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment identifier.
    pub id: u64,
    /// Raw comment text.
    pub body: Option<String>,
    /// Author.
    pub author: Option<User>,
    /// Creation timestamp.
    pub created_on: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_on: Option<DateTime<Utc>>,
    /// Comment this one replies to.
    pub parent_id: Option<u64>,
    /// File the comment is anchored to, for inline comments.
    pub file_path: Option<String>,
}

/// Result of approving a pull request.
///
/// The boolean API collapses [`Self::NotApproved`] and
/// [`Self::EmptyResponse`] into `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Bitbucket confirmed the approval.
    Approved,
    /// Bitbucket answered but did not mark the pull request approved.
    NotApproved,
    /// Bitbucket answered without a participant body.
    EmptyResponse,
}

impl ApprovalOutcome {
    /// Returns true only for a confirmed approval.
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Parses an ISO-8601 timestamp, returning `None` when it is malformed.
pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Converts epoch milliseconds into a UTC timestamp.
pub(crate) fn from_epoch_millis(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(DateTime::<Utc>::from_timestamp_millis)
}
