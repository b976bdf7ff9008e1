//! High-level Bitbucket client facade.
//!
//! [`BitbucketClient`] borrows the session's gateway for each call, so every
//! operation fails with [`BitbucketError::NotAuthenticated`] while logged
//! out. It adds the behaviour the raw gateways do not have: git-only
//! repository listings, team aggregation, and walking every page.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::diff::FileDiff;
use super::error::BitbucketError;
use super::gateway::BitbucketGateway;
use super::models::{
    ApprovalOutcome, Branch, Comment, Commit, NewPullRequest, NewRepository, PullRequest,
    RemoteRepository, Team, User,
};
use super::pagination::{DEFAULT_PAGE_SIZE, PageRequest, PagedResult};
use super::repository::RepositoryRef;
use super::session::CredentialSession;
use crate::workflow::PullRequestService;

/// Normalised operations against the logged-in Bitbucket instance.
#[derive(Clone)]
pub struct BitbucketClient {
    session: Arc<CredentialSession>,
}

impl BitbucketClient {
    /// Creates a facade over `session`.
    #[must_use]
    pub const fn new(session: Arc<CredentialSession>) -> Self {
        Self { session }
    }

    /// The session backing this client.
    #[must_use]
    pub const fn session(&self) -> &Arc<CredentialSession> {
        &self.session
    }

    fn gateway(&self) -> Result<Arc<dyn BitbucketGateway>, BitbucketError> {
        self.session.gateway()
    }

    /// Git repositories owned by the authenticated account.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn user_repositories(&self) -> Result<Vec<RemoteRepository>, BitbucketError> {
        let repositories = self.gateway()?.user_repositories().await?;
        Ok(only_git(repositories))
    }

    /// Git repositories of the account followed by those of every team it
    /// belongs to, in team order.
    ///
    /// A repository reachable through several owners appears once per
    /// owner.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// first gateway error.
    pub async fn all_repositories(&self) -> Result<Vec<RemoteRepository>, BitbucketError> {
        let gateway = self.gateway()?;
        let mut repositories = only_git(gateway.user_repositories().await?);
        for team in gateway.teams().await? {
            let owned = gateway.owner_repositories(&team.username).await?;
            debug!(team = %team.username, count = owned.len(), "loaded team repositories");
            repositories.extend(only_git(owned));
        }
        Ok(repositories)
    }

    /// Teams (Cloud) or projects (Server) of the account.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn teams(&self) -> Result<Vec<Team>, BitbucketError> {
        self.gateway()?.teams().await
    }

    /// Remote branches in provider order.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError> {
        self.gateway()?.branches(repo).await
    }

    /// Commits reachable from `from_branch` but not from `to_branch`.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn commits_range(
        &self,
        repo: &RepositoryRef,
        from_branch: &str,
        to_branch: &str,
    ) -> Result<Vec<Commit>, BitbucketError> {
        self.gateway()?
            .commits_range(repo, from_branch, to_branch)
            .await
    }

    /// A single commit by hash.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn commit_by_id(
        &self,
        repo: &RepositoryRef,
        hash: &str,
    ) -> Result<Commit, BitbucketError> {
        self.gateway()?.commit(repo, hash).await
    }

    /// One page of pull requests.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidPagination`] for a zero page or a
    /// limit outside `1..=100`, [`BitbucketError::NotAuthenticated`] when
    /// logged out, or the gateway error.
    pub async fn pull_requests(
        &self,
        repo: &RepositoryRef,
        limit: u8,
        page: u32,
    ) -> Result<PagedResult<PullRequest>, BitbucketError> {
        let request = PageRequest::new(page, limit)?;
        self.gateway()?.pull_requests(repo, request).await
    }

    /// Every pull request, one request per page, concatenated in page order.
    ///
    /// Stops at the first page that reports no successor or comes back
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// first gateway error.
    pub async fn all_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequest>, BitbucketError> {
        let gateway = self.gateway()?;
        let mut request = PageRequest::first(DEFAULT_PAGE_SIZE)?;
        let mut pull_requests = Vec::new();
        loop {
            let page = gateway.pull_requests(repo, request).await?;
            let exhausted = page.items.is_empty() || !page.page_info.has_next();
            pull_requests.extend(page.items);
            if exhausted {
                return Ok(pull_requests);
            }
            request = request.next();
        }
    }

    /// A single pull request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<PullRequest, BitbucketError> {
        self.gateway()?.pull_request(repo, id).await
    }

    /// The open pull request from `source` into `destination`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn pull_request_for_branches(
        &self,
        repo: &RepositoryRef,
        source: &str,
        destination: &str,
    ) -> Result<Option<PullRequest>, BitbucketError> {
        self.gateway()?
            .pull_request_for_branches(repo, source, destination)
            .await
    }

    /// Submits a pull request as given.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Validation`] when Bitbucket rejects the
    /// pull request, [`BitbucketError::NotAuthenticated`] when logged out,
    /// or another gateway error.
    pub async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        draft: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError> {
        self.gateway()?.create_pull_request(repo, draft).await
    }

    /// Approves a pull request, reporting exactly what Bitbucket answered.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn approve_pull_request_outcome(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<ApprovalOutcome, BitbucketError> {
        self.gateway()?.approve_pull_request(repo, id).await
    }

    /// Approves a pull request. True only when Bitbucket confirms the
    /// approval; an empty answer counts as not approved.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn approve_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<bool, BitbucketError> {
        Ok(self
            .approve_pull_request_outcome(repo, id)
            .await?
            .is_approved())
    }

    /// Withdraws an approval.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn disapprove_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<(), BitbucketError> {
        self.gateway()?.disapprove_pull_request(repo, id).await
    }

    /// Diff of a pull request, per file.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn pull_request_diff(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<FileDiff>, BitbucketError> {
        self.gateway()?.pull_request_diff(repo, id).await
    }

    /// Commits of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn pull_request_commits(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Commit>, BitbucketError> {
        self.gateway()?.pull_request_commits(repo, id).await
    }

    /// Comments of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn pull_request_comments(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Comment>, BitbucketError> {
        self.gateway()?.pull_request_comments(repo, id).await
    }

    /// Distinct pull request authors, in the order they first appear.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// first gateway error.
    pub async fn pull_requests_authors(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<User>, BitbucketError> {
        let mut seen = HashSet::new();
        Ok(self
            .all_pull_requests(repo)
            .await?
            .into_iter()
            .filter_map(|pull_request| pull_request.author)
            .filter(|author| seen.insert(author.username.clone()))
            .collect())
    }

    /// Users with access to the repository matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn repository_users(
        &self,
        repo: &RepositoryRef,
        filter: &str,
    ) -> Result<Vec<User>, BitbucketError> {
        self.gateway()?.repository_users(repo, filter).await
    }

    /// Creates a repository.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when logged out, or the
    /// gateway error.
    pub async fn create_repository(
        &self,
        repository: &NewRepository,
    ) -> Result<RemoteRepository, BitbucketError> {
        self.gateway()?.create_repository(repository).await
    }

    /// Whether `repository` is hosted on the logged-in Bitbucket instance.
    ///
    /// A missing repository or clone URL is never an origin, and is decided
    /// without a session.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when a clone URL is
    /// present but the session is logged out.
    pub fn is_origin_repo(
        &self,
        repository: Option<&RemoteRepository>,
    ) -> Result<bool, BitbucketError> {
        let Some(clone_url) = repository.and_then(|repo| repo.clone_url.as_deref()) else {
            return Ok(false);
        };
        let api_host = self.gateway()?.api_host().to_lowercase();
        Ok(clone_url_host(clone_url).is_some_and(|host| api_host.contains(&host)))
    }
}

fn only_git(repositories: Vec<RemoteRepository>) -> Vec<RemoteRepository> {
    repositories
        .into_iter()
        .filter(RemoteRepository::is_git)
        .collect()
}

/// Host of an HTTPS/SSH URL or an SCP-style `user@host:path` address.
fn clone_url_host(clone_url: &str) -> Option<String> {
    if let Ok(url) = Url::parse(clone_url) {
        return url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(str::to_lowercase);
    }
    let (authority, _) = clone_url.split_once(':')?;
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    (!host.is_empty() && !host.contains('/')).then(|| host.to_lowercase())
}

#[async_trait]
impl PullRequestService for BitbucketClient {
    async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError> {
        Self::branches(self, repo).await
    }

    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        draft: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError> {
        Self::create_pull_request(self, repo, draft).await
    }
}

#[cfg(test)]
mod tests;
