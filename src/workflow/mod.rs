//! Pull request creation workflow.
//!
//! [`CreatePullRequestWorkflow`] loads the active repository's branches,
//! picks default source and destination branches, warns when the source
//! branch is not pushed or has diverged from its remote branch, and submits
//! the pull request once the form is valid.

mod engine;
mod service;
mod state;

pub use engine::{
    BranchLoad, CreatePullRequestWorkflow, LoadOutcome, Submission, SubmissionOutcome,
};
#[cfg(test)]
pub use service::{MockNavigator, MockPullRequestService};
pub use service::{Navigator, PullRequestService};
pub use state::{BranchWarning, SubmitOutcome, WorkflowState};
