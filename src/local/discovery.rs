//! Reading the active repository and its branches with git2.

use std::path::{Path, PathBuf};

use git2::{BranchType, ErrorCode, ReferenceType, Repository};
use tracing::debug;

use super::LocalRepositoryProvider;
use super::error::LocalRepositoryError;
use super::remote::{RemoteOrigin, parse_remote_url};

/// Remote used to determine owner and repository name.
pub const DEFAULT_REMOTE_NAME: &str = "origin";

const HEADS_PREFIX: &str = "refs/heads/";

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBranch {
    /// Short name, e.g. `feature` or `origin/feature`.
    pub name: String,
    /// Hash of the commit at the branch tip.
    pub target_hash: String,
    /// Whether `HEAD` points at this branch.
    pub is_head: bool,
    /// Whether this is a remote-tracking branch.
    pub is_remote: bool,
    /// Upstream branch name on the remote, without `refs/heads/`.
    pub tracked_branch_name: Option<String>,
}

/// Snapshot of the repository the user is working in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRepository {
    /// Repository slug from the remote URL.
    pub name: String,
    /// Owner from the remote URL.
    pub owner: String,
    /// Host of the remote URL.
    pub host: String,
    /// Working directory.
    pub workdir: PathBuf,
    /// Local branches followed by remote-tracking branches.
    pub branches: Vec<LocalBranch>,
}

impl ActiveRepository {
    /// Branches that are not remote-tracking.
    pub fn local_branches(&self) -> impl Iterator<Item = &LocalBranch> {
        self.branches.iter().filter(|branch| !branch.is_remote)
    }

    /// The checked-out branch, if `HEAD` is attached.
    #[must_use]
    pub fn head_branch(&self) -> Option<&LocalBranch> {
        self.local_branches().find(|branch| branch.is_head)
    }
}

/// Reads the repository containing a path.
#[derive(Debug, Clone)]
pub struct Git2RepositoryProvider {
    start_path: PathBuf,
    remote_name: String,
}

impl Git2RepositoryProvider {
    /// Reads the repository containing `start_path`, using `origin`.
    #[must_use]
    pub fn new(start_path: impl Into<PathBuf>) -> Self {
        Self {
            start_path: start_path.into(),
            remote_name: DEFAULT_REMOTE_NAME.to_owned(),
        }
    }

    /// Uses `remote_name` instead of `origin` for owner and name.
    #[must_use]
    pub fn with_remote(mut self, remote_name: impl Into<String>) -> Self {
        self.remote_name = remote_name.into();
        self
    }
}

impl LocalRepositoryProvider for Git2RepositoryProvider {
    fn active_repository(&self) -> Result<ActiveRepository, LocalRepositoryError> {
        let repo = open_repository(&self.start_path)?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or(LocalRepositoryError::BareRepository)?;
        let origin = remote_origin(&repo, &self.remote_name)?;
        let branches = read_branches(&repo)?;
        debug!(
            workdir = %workdir.display(),
            owner = origin.owner(),
            name = origin.name(),
            branches = branches.len(),
            "read active repository"
        );
        Ok(ActiveRepository {
            name: origin.name().to_owned(),
            owner: origin.owner().to_owned(),
            host: origin.host().to_owned(),
            workdir,
            branches,
        })
    }
}

fn open_repository(start_path: &Path) -> Result<Repository, LocalRepositoryError> {
    Repository::discover(start_path).map_err(|error| {
        if error.code() == ErrorCode::NotFound {
            LocalRepositoryError::NotARepository
        } else {
            LocalRepositoryError::from(error)
        }
    })
}

fn remote_origin(
    repo: &Repository,
    remote_name: &str,
) -> Result<RemoteOrigin, LocalRepositoryError> {
    let remote = repo.find_remote(remote_name).map_err(|error| {
        if error.code() == ErrorCode::NotFound {
            LocalRepositoryError::RemoteNotFound {
                name: remote_name.to_owned(),
            }
        } else {
            LocalRepositoryError::from(error)
        }
    })?;
    let url = remote
        .url()
        .ok_or_else(|| LocalRepositoryError::InvalidRemoteUrl {
            url: "(no URL)".to_owned(),
        })?;
    parse_remote_url(url)
}

fn read_branches(repo: &Repository) -> Result<Vec<LocalBranch>, LocalRepositoryError> {
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for entry in repo.branches(None)? {
        let (branch, branch_type) = entry?;
        let reference = branch.get();
        if reference.kind() == Some(ReferenceType::Symbolic) {
            continue;
        }
        let (Some(name), Some(target)) = (branch.name()?, reference.target()) else {
            continue;
        };
        let is_remote = branch_type == BranchType::Remote;
        let tracked_branch_name = if is_remote {
            None
        } else {
            upstream_branch_name(repo, reference.name())
        };
        let snapshot = LocalBranch {
            name: name.to_owned(),
            target_hash: target.to_string(),
            is_head: !is_remote && branch.is_head(),
            is_remote,
            tracked_branch_name,
        };
        if is_remote {
            remote.push(snapshot);
        } else {
            local.push(snapshot);
        }
    }
    local.extend(remote);
    Ok(local)
}

/// Upstream branch name from `branch.<name>.merge`.
fn upstream_branch_name(repo: &Repository, refname: Option<&str>) -> Option<String> {
    let merge = repo.branch_upstream_merge(refname?).ok()?;
    let merge_ref = merge.as_str()?;
    let name = merge_ref.strip_prefix(HEADS_PREFIX).unwrap_or(merge_ref);
    (!name.is_empty()).then(|| name.to_owned())
}
