//! The create-pull-request form.
//!
//! Loading and submission are split into three phases so that callers can
//! drive the network part without holding the workflow borrowed:
//!
//! 1. `begin_*` performs the state transition and returns a detached job,
//!    or `None` while the operation cannot start.
//! 2. The job's `run` future does the I/O.
//! 3. `finish_*` applies the outcome, ignoring outcomes of superseded or
//!    cancelled jobs.
//!
//! [`CreatePullRequestWorkflow::reload`] and
//! [`CreatePullRequestWorkflow::submit`] chain the phases for callers that
//! own the workflow for the whole operation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::{Navigator, PullRequestService};
use super::state::{BranchWarning, SubmitOutcome, WorkflowState};
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::{Branch, NewPullRequest, PullRequest};
use crate::bitbucket::repository::RepositoryRef;
use crate::events::Event;
use crate::local::{LocalBranch, LocalRepositoryProvider};

#[derive(Debug)]
struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct LoadedBranches {
    repository: RepositoryRef,
    local: Vec<LocalBranch>,
    remote: Vec<Branch>,
}

/// Detached branch load returned by
/// [`CreatePullRequestWorkflow::begin_reload`].
pub struct BranchLoad {
    id: u64,
    cancel: CancellationToken,
    service: Arc<dyn PullRequestService>,
    local: Arc<dyn LocalRepositoryProvider>,
}

impl BranchLoad {
    /// Reads local branches and fetches remote branches, stopping early when
    /// the load is cancelled.
    #[must_use]
    pub async fn run(self) -> LoadOutcome {
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(BitbucketError::Cancelled),
            loaded = load_branches(self.service.as_ref(), self.local.as_ref()) => loaded,
        };
        LoadOutcome {
            id: self.id,
            result,
        }
    }
}

/// Outcome of a [`BranchLoad`], applied with
/// [`CreatePullRequestWorkflow::finish_reload`].
#[derive(Debug)]
pub struct LoadOutcome {
    id: u64,
    result: Result<LoadedBranches, BitbucketError>,
}

/// Detached submission returned by
/// [`CreatePullRequestWorkflow::begin_submit`].
pub struct Submission {
    id: u64,
    service: Arc<dyn PullRequestService>,
    repository: RepositoryRef,
    draft: NewPullRequest,
}

impl Submission {
    /// The pull request that will be created.
    #[must_use]
    pub const fn draft(&self) -> &NewPullRequest {
        &self.draft
    }

    /// Creates the pull request.
    #[must_use]
    pub async fn run(self) -> SubmissionOutcome {
        let result = self
            .service
            .create_pull_request(&self.repository, &self.draft)
            .await;
        SubmissionOutcome {
            id: self.id,
            result,
        }
    }
}

/// Outcome of a [`Submission`], applied with
/// [`CreatePullRequestWorkflow::finish_submit`].
#[derive(Debug)]
pub struct SubmissionOutcome {
    id: u64,
    result: Result<PullRequest, BitbucketError>,
}

async fn load_branches(
    service: &dyn PullRequestService,
    local: &dyn LocalRepositoryProvider,
) -> Result<LoadedBranches, BitbucketError> {
    let active = local.active_repository()?;
    let repository = RepositoryRef::new(&active.owner, &active.name)?;
    let mut remote = service.branches(&repository).await?;
    remote.sort_by(|left, right| left.name.cmp(&right.name));
    let local_branches = active
        .branches
        .into_iter()
        .filter(|branch| !branch.is_remote)
        .collect();
    Ok(LoadedBranches {
        repository,
        local: local_branches,
        remote,
    })
}

/// Form state for creating a pull request from the active local repository.
///
/// Every setter revalidates the form: the source branch warning and
/// [`Self::can_submit`] always reflect the current fields.
pub struct CreatePullRequestWorkflow {
    service: Arc<dyn PullRequestService>,
    local: Arc<dyn LocalRepositoryProvider>,
    navigator: Arc<dyn Navigator>,
    state: WorkflowState,
    repository: Option<RepositoryRef>,
    local_branches: Vec<LocalBranch>,
    remote_branches: Vec<Branch>,
    source: Option<LocalBranch>,
    destination: Option<Branch>,
    title: String,
    description: String,
    close_source_branch: bool,
    warning: Option<BranchWarning>,
    error_message: Option<String>,
    can_submit: bool,
    next_job_id: u64,
    load: Option<InFlight>,
    submission: Option<u64>,
}

impl CreatePullRequestWorkflow {
    /// Creates an idle workflow; call [`Self::reload`] to load branches.
    #[must_use]
    pub fn new(
        service: Arc<dyn PullRequestService>,
        local: Arc<dyn LocalRepositoryProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            service,
            local,
            navigator,
            state: WorkflowState::Idle,
            repository: None,
            local_branches: Vec::new(),
            remote_branches: Vec::new(),
            source: None,
            destination: None,
            title: String::new(),
            description: String::new(),
            close_source_branch: false,
            warning: None,
            error_message: None,
            can_submit: false,
            next_job_id: 0,
            load: None,
            submission: None,
        }
    }

    const fn allocate_job_id(&mut self) -> u64 {
        self.next_job_id = self.next_job_id.wrapping_add(1);
        self.next_job_id
    }

    /// Starts loading branches.
    ///
    /// Returns `None` while a load or a submission is in flight.
    pub fn begin_reload(&mut self) -> Option<BranchLoad> {
        if self.load.is_some() || self.submission.is_some() {
            debug!(state = ?self.state, "reload ignored while busy");
            return None;
        }
        let id = self.allocate_job_id();
        let cancel = CancellationToken::new();
        self.load = Some(InFlight {
            id,
            cancel: cancel.clone(),
        });
        self.state = WorkflowState::Loading;
        self.error_message = None;
        self.revalidate();
        debug!(load = id, "loading branches");
        Some(BranchLoad {
            id,
            cancel,
            service: Arc::clone(&self.service),
            local: Arc::clone(&self.local),
        })
    }

    /// Applies a finished load. Returns false when the outcome was stale and
    /// ignored.
    pub fn finish_reload(&mut self, outcome: LoadOutcome) -> bool {
        if self
            .load
            .as_ref()
            .is_none_or(|in_flight| in_flight.id != outcome.id)
        {
            debug!(load = outcome.id, "discarding stale branch load");
            return false;
        }
        self.load = None;
        match outcome.result {
            Ok(loaded) => self.apply_loaded(loaded),
            Err(error) => {
                warn!(%error, "loading branches failed");
                self.clear_branches();
                self.state = WorkflowState::Idle;
                self.error_message = Some(error.to_string());
                self.revalidate();
            }
        }
        true
    }

    /// Loads branches and applies them. Returns true when the form is
    /// ready afterwards.
    pub async fn reload(&mut self) -> bool {
        let Some(job) = self.begin_reload() else {
            return false;
        };
        let outcome = job.run().await;
        self.finish_reload(outcome) && self.state == WorkflowState::Ready
    }

    /// Cancels the branch load in flight, if any.
    pub fn cancel_load(&mut self) {
        let Some(in_flight) = self.load.take() else {
            return;
        };
        in_flight.cancel.cancel();
        debug!(load = in_flight.id, "branch load cancelled");
        if self.state == WorkflowState::Loading {
            self.state = WorkflowState::Idle;
        }
        self.revalidate();
    }

    /// Reacts to bus notifications, returning a load to run when one was
    /// started.
    ///
    /// A repository change cancels any load in flight and starts over.
    /// Logging out resets the form; logging in loads branches.
    pub fn handle_event(&mut self, event: &Event) -> Option<BranchLoad> {
        match event {
            Event::ActiveRepositoryChanged { .. } => {
                self.cancel_load();
                self.begin_reload()
            }
            Event::ConnectionChanged(connection) if connection.is_logged_in => {
                self.begin_reload()
            }
            Event::ConnectionChanged(_) => {
                self.cancel_load();
                if self.submission.is_none() {
                    self.clear_branches();
                    self.state = WorkflowState::Idle;
                    self.revalidate();
                }
                None
            }
        }
    }

    fn apply_loaded(&mut self, loaded: LoadedBranches) {
        let LoadedBranches {
            repository,
            local,
            remote,
        } = loaded;
        self.source = local.iter().find(|branch| branch.is_head).cloned();
        self.destination = default_destination(&remote, self.source.as_ref());
        info!(
            repository = %repository,
            local = local.len(),
            remote = remote.len(),
            source = self.source.as_ref().map(|branch| branch.name.as_str()),
            destination = self.destination.as_ref().map(|branch| branch.name.as_str()),
            "branches loaded"
        );
        self.repository = Some(repository);
        self.local_branches = local;
        self.remote_branches = remote;
        self.error_message = None;
        self.state = WorkflowState::Ready;
        self.revalidate();
    }

    fn clear_branches(&mut self) {
        self.repository = None;
        self.local_branches.clear();
        self.remote_branches.clear();
        self.source = None;
        self.destination = None;
    }

    /// Selects a local branch as source. Returns false, leaving the form
    /// unchanged, when no local branch has that name.
    pub fn set_source_branch(&mut self, name: &str) -> bool {
        let Some(branch) = self.local_branches.iter().find(|branch| branch.name == name) else {
            return false;
        };
        self.source = Some(branch.clone());
        self.revalidate();
        true
    }

    /// Clears the source branch.
    pub fn clear_source_branch(&mut self) {
        self.source = None;
        self.revalidate();
    }

    /// Selects a remote branch as destination. Returns false, leaving the
    /// form unchanged, when no remote branch has that name.
    pub fn set_destination_branch(&mut self, name: &str) -> bool {
        let Some(branch) = self.remote_branches.iter().find(|branch| branch.name == name) else {
            return false;
        };
        self.destination = Some(branch.clone());
        self.revalidate();
        true
    }

    /// Clears the destination branch.
    pub fn clear_destination_branch(&mut self) {
        self.destination = None;
        self.revalidate();
    }

    /// Sets the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.revalidate();
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.revalidate();
    }

    /// Sets whether the source branch is deleted after merge.
    pub fn set_close_source_branch(&mut self, close_source_branch: bool) {
        self.close_source_branch = close_source_branch;
        self.revalidate();
    }

    /// Recomputes the source branch warning and [`Self::can_submit`].
    pub fn revalidate(&mut self) {
        self.warning = self
            .source
            .as_ref()
            .and_then(|source| branch_warning(source, &self.remote_branches));
        self.can_submit = self.compute_can_submit();
    }

    fn compute_can_submit(&self) -> bool {
        if self.state != WorkflowState::Ready
            || self.load.is_some()
            || self.submission.is_some()
            || self.title.trim().is_empty()
        {
            return false;
        }
        match (self.tracked_source_name(), self.destination.as_ref()) {
            (Some(tracked), Some(destination)) => destination.name != tracked,
            _ => false,
        }
    }

    fn tracked_source_name(&self) -> Option<&str> {
        self.source
            .as_ref()
            .and_then(|source| source.tracked_branch_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Starts submitting the form.
    ///
    /// Returns `None` unless [`Self::can_submit`] holds.
    pub fn begin_submit(&mut self) -> Option<Submission> {
        if !self.can_submit {
            return None;
        }
        let repository = self.repository.clone()?;
        let source_branch = self.tracked_source_name()?.to_owned();
        let destination_branch = self.destination.as_ref()?.name.clone();
        let draft = NewPullRequest {
            title: self.title.clone(),
            description: Some(self.description.clone()).filter(|text| !text.trim().is_empty()),
            source_branch,
            destination_branch,
            close_source_branch: self.close_source_branch,
        };
        let id = self.allocate_job_id();
        self.submission = Some(id);
        self.state = WorkflowState::Submitting;
        self.error_message = None;
        self.revalidate();
        info!(
            repository = %repository,
            source = %draft.source_branch,
            destination = %draft.destination_branch,
            "submitting pull request"
        );
        Some(Submission {
            id,
            service: Arc::clone(&self.service),
            repository,
            draft,
        })
    }

    /// Applies a finished submission. Returns `None` for a stale outcome.
    ///
    /// On success the navigator is sent back exactly once. On failure the
    /// message is kept in [`Self::error_message`] and the form is ready for
    /// another attempt.
    pub fn finish_submit(&mut self, outcome: SubmissionOutcome) -> Option<SubmitOutcome> {
        if self.submission != Some(outcome.id) {
            debug!(submission = outcome.id, "discarding stale submission");
            return None;
        }
        self.submission = None;
        let applied = match outcome.result {
            Ok(pull_request) => {
                info!(id = pull_request.id, "pull request created");
                self.state = WorkflowState::Completed;
                self.navigator.navigate_back(true);
                SubmitOutcome::Completed(pull_request)
            }
            Err(error) => {
                warn!(%error, "creating pull request failed");
                let message = error.to_string();
                self.state = WorkflowState::Ready;
                self.error_message = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        };
        self.revalidate();
        Some(applied)
    }

    /// Submits the form. Returns `None` when it cannot be submitted.
    pub async fn submit(&mut self) -> Option<SubmitOutcome> {
        let submission = self.begin_submit()?;
        let outcome = submission.run().await;
        self.finish_submit(outcome)
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WorkflowState {
        self.state
    }

    /// Whether the form can be submitted.
    #[must_use]
    pub const fn can_submit(&self) -> bool {
        self.can_submit
    }

    /// Warning about the selected source branch.
    #[must_use]
    pub const fn warning(&self) -> Option<&BranchWarning> {
        self.warning.as_ref()
    }

    /// Message from the last failed load or submission.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Repository the branches were loaded for.
    #[must_use]
    pub const fn repository(&self) -> Option<&RepositoryRef> {
        self.repository.as_ref()
    }

    /// Local branches that can be selected as source.
    #[must_use]
    pub fn local_branches(&self) -> &[LocalBranch] {
        &self.local_branches
    }

    /// Remote branches, sorted by name.
    #[must_use]
    pub fn remote_branches(&self) -> &[Branch] {
        &self.remote_branches
    }

    /// Selected source branch.
    #[must_use]
    pub const fn source_branch(&self) -> Option<&LocalBranch> {
        self.source.as_ref()
    }

    /// Selected destination branch.
    #[must_use]
    pub const fn destination_branch(&self) -> Option<&Branch> {
        self.destination.as_ref()
    }

    /// Title as entered.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Description as entered.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the source branch is deleted after merge.
    #[must_use]
    pub const fn close_source_branch(&self) -> bool {
        self.close_source_branch
    }
}

/// The default branch, else the first branch not named like the source.
fn default_destination(remote: &[Branch], source: Option<&LocalBranch>) -> Option<Branch> {
    remote
        .iter()
        .find(|branch| branch.is_default)
        .or_else(|| {
            remote
                .iter()
                .find(|branch| source.is_none_or(|local| branch.name != local.name))
        })
        .cloned()
}

fn branch_warning(source: &LocalBranch, remote: &[Branch]) -> Option<BranchWarning> {
    let Some(tracked) = source
        .tracked_branch_name
        .as_deref()
        .filter(|name| !name.is_empty())
    else {
        return Some(BranchWarning::NotRemoteBranch {
            name: source.name.clone(),
        });
    };
    let in_sync = remote
        .iter()
        .find(|branch| branch.name == tracked)
        .is_some_and(|branch| branch.target_hash == source.target_hash);
    (!in_sync).then(|| BranchWarning::OutOfSync {
        name: source.name.clone(),
    })
}
