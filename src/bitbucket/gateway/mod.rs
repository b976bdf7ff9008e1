//! Gateways for calling the Bitbucket REST APIs.
//!
//! [`BitbucketGateway`] is the seam between the client facade and HTTP. Two
//! implementations exist, one per API dialect, and [`build_gateway`] or
//! [`connect_gateway`] picks between them from the session's [`Endpoint`].

mod cloud;
mod error_mapping;
mod factory;
mod retry;
mod server;
mod transport;

use std::sync::Arc;

pub use cloud::CloudGateway;
#[cfg(test)]
pub use factory::MockGatewayFactory;
pub use factory::{Connected, GatewayFactory, HttpGatewayFactory};
pub use retry::{DEFAULT_RETRY_ATTEMPTS, RetryPolicy};
pub use server::ServerGateway;

use async_trait::async_trait;

use crate::bitbucket::credentials::AuthHeader;
use crate::bitbucket::diff::FileDiff;
use crate::bitbucket::endpoint::Endpoint;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::{
    ApprovalOutcome, Branch, Comment, Commit, NewPullRequest, NewRepository, PullRequest,
    RemoteRepository, Team, User,
};
use crate::bitbucket::pagination::{PageRequest, PagedResult};
use crate::bitbucket::repository::RepositoryRef;

use transport::HttpTransport;

/// Authenticated access to one Bitbucket instance.
///
/// Every method maps the response into domain types before returning.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitbucketGateway: Send + Sync {
    /// `cloud` or `server`.
    fn client_type(&self) -> &'static str;

    /// Host name of the API.
    fn api_host(&self) -> String;

    /// The authenticated account.
    async fn current_user(&self) -> Result<User, BitbucketError>;

    /// Every repository owned by the authenticated account, any SCM.
    async fn user_repositories(&self) -> Result<Vec<RemoteRepository>, BitbucketError>;

    /// Every repository owned by a team, workspace, or project.
    async fn owner_repositories(
        &self,
        owner: &str,
    ) -> Result<Vec<RemoteRepository>, BitbucketError>;

    /// Teams (Cloud) or projects (Server) visible to the account.
    async fn teams(&self) -> Result<Vec<Team>, BitbucketError>;

    /// Every branch of the repository, in provider order.
    async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError>;

    /// Commits reachable from `from` and not from `to`.
    async fn commits_range(
        &self,
        repo: &RepositoryRef,
        from: &str,
        to: &str,
    ) -> Result<Vec<Commit>, BitbucketError>;

    /// A single commit.
    async fn commit(&self, repo: &RepositoryRef, hash: &str) -> Result<Commit, BitbucketError>;

    /// One page of pull requests.
    async fn pull_requests(
        &self,
        repo: &RepositoryRef,
        page: PageRequest,
    ) -> Result<PagedResult<PullRequest>, BitbucketError>;

    /// A single pull request.
    async fn pull_request(&self, repo: &RepositoryRef, id: u64)
    -> Result<PullRequest, BitbucketError>;

    /// The open pull request from `source` into `destination`, if any.
    async fn pull_request_for_branches(
        &self,
        repo: &RepositoryRef,
        source: &str,
        destination: &str,
    ) -> Result<Option<PullRequest>, BitbucketError>;

    /// Creates a pull request.
    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        draft: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError>;

    /// Approves a pull request as the authenticated account.
    async fn approve_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<ApprovalOutcome, BitbucketError>;

    /// Withdraws the account's approval.
    async fn disapprove_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<(), BitbucketError>;

    /// Diff of a pull request, split per file.
    async fn pull_request_diff(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<FileDiff>, BitbucketError>;

    /// Commits included in a pull request.
    async fn pull_request_commits(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Commit>, BitbucketError>;

    /// Comments on a pull request, replies after their parents.
    async fn pull_request_comments(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Comment>, BitbucketError>;

    /// Users with access to the repository whose name matches `filter`.
    async fn repository_users(
        &self,
        repo: &RepositoryRef,
        filter: &str,
    ) -> Result<Vec<User>, BitbucketError>;

    /// Creates a repository.
    async fn create_repository(
        &self,
        repository: &NewRepository,
    ) -> Result<RemoteRepository, BitbucketError>;
}

/// Builds the gateway for an endpoint.
///
/// This is the only place where the API dialect is chosen; the result is
/// fixed for the session's lifetime. Personal repositories are listed under
/// the login until [`connect_gateway`] binds the verified account.
///
/// # Errors
///
/// Returns [`BitbucketError::Network`] when the HTTP client cannot be built.
pub fn build_gateway(
    endpoint: Endpoint,
    auth: &AuthHeader,
    retry: RetryPolicy,
) -> Result<Arc<dyn BitbucketGateway>, BitbucketError> {
    let login = auth.login().to_owned();
    let gateway: Arc<dyn BitbucketGateway> = match endpoint {
        Endpoint::Cloud { .. } => Arc::new(CloudGateway::new(
            HttpTransport::new(endpoint, auth, retry)?,
            login,
        )),
        Endpoint::Server { .. } => Arc::new(ServerGateway::new(
            HttpTransport::new(endpoint, auth, retry)?,
            login,
        )),
    };
    Ok(gateway)
}

/// Builds the gateway for an endpoint and verifies the credentials.
///
/// The returned gateway lists personal repositories under the account
/// Bitbucket reports (the user slug on Server), not under the login, which
/// may be an email address.
///
/// # Errors
///
/// Returns [`BitbucketError::Network`] when the HTTP client cannot be built,
/// or the mapped failure of the current-user request.
pub async fn connect_gateway(
    endpoint: Endpoint,
    auth: &AuthHeader,
    retry: RetryPolicy,
) -> Result<Connected, BitbucketError> {
    let login = auth.login().to_owned();
    match endpoint {
        Endpoint::Cloud { .. } => {
            let gateway = CloudGateway::new(HttpTransport::new(endpoint, auth, retry)?, login);
            let user = gateway.current_user().await?;
            Ok(Connected {
                gateway: Arc::new(gateway.with_owner(&user.username)),
                user,
            })
        }
        Endpoint::Server { .. } => {
            let gateway = ServerGateway::new(HttpTransport::new(endpoint, auth, retry)?, login);
            let (user, slug) = gateway.verified_user().await?;
            Ok(Connected {
                gateway: Arc::new(gateway.with_owner(&slug)),
                user,
            })
        }
    }
}
