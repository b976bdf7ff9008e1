//! States and outcomes reported by the pull request workflow.

use std::fmt;

use crate::bitbucket::models::PullRequest;

/// Lifecycle of [`super::CreatePullRequestWorkflow`].
///
/// Branch validation runs synchronously inside every setter, so it has no
/// state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    /// Nothing loaded, or the last load failed.
    #[default]
    Idle,
    /// Branches are being read.
    Loading,
    /// Branches are loaded and the form can be edited.
    Ready,
    /// A pull request is being created.
    Submitting,
    /// The pull request was created.
    Completed,
}

/// Problem with the selected source branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchWarning {
    /// The branch does not track a remote branch.
    NotRemoteBranch {
        /// Local branch name.
        name: String,
    },
    /// The tracked remote branch is missing or points elsewhere.
    OutOfSync {
        /// Local branch name.
        name: String,
    },
}

impl fmt::Display for BranchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRemoteBranch { name } => {
                write!(f, "Warning! Selected branch {name} is not a remote branch.")
            }
            Self::OutOfSync { name } => write!(
                f,
                "Warning! Selected branch {name} is out of sync with a remote branch."
            ),
        }
    }
}

/// Result of a submission that was applied to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Bitbucket created the pull request.
    Completed(PullRequest),
    /// Creation failed; the message is also kept as the form's error.
    Failed(String),
}
