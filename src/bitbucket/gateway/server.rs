//! Bitbucket Server implementation of the gateway.

use async_trait::async_trait;
use http::Method;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::bitbucket::diff::{FileDiff, parse_unified_diff};
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::server::{
    ServerActivity, ServerBranch, ServerCommit, ServerNewPullRequest, ServerNewRepository,
    ServerPage, ServerParticipant, ServerProject, ServerPullRequest, ServerRepository,
    ServerUser, ServerUserPermission, branch_ref, comments_from_activities,
};
use crate::bitbucket::models::{
    ApprovalOutcome, Branch, Comment, Commit, GIT_SCM, NewPullRequest, NewRepository,
    PullRequest, RemoteRepository, Team, User,
};
use crate::bitbucket::pagination::{MAX_PAGE_SIZE, PageRequest, PagedResult};
use crate::bitbucket::repository::RepositoryRef;

use super::BitbucketGateway;
use super::transport::HttpTransport;

/// Gateway for Bitbucket Server's `/rest/api/1.0`.
pub struct ServerGateway {
    transport: HttpTransport,
    login: String,
    owner: String,
}

impl ServerGateway {
    pub(super) fn new(transport: HttpTransport, login: String) -> Self {
        Self {
            transport,
            owner: login.clone(),
            login,
        }
    }

    /// Lists personal projects under `slug`; blank slugs are ignored.
    pub(super) fn with_owner(mut self, slug: &str) -> Self {
        if !slug.is_empty() {
            slug.clone_into(&mut self.owner);
        }
        self
    }

    /// Fetches the authenticated account and its user slug.
    pub(super) async fn verified_user(&self) -> Result<(User, String), BitbucketError> {
        let url = self.transport.url(&["users", &self.login])?;
        let user: ServerUser = self.transport.get_json("current user", url).await?;
        let slug = user
            .slug
            .clone()
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| user.login());
        Ok((User::from(user), slug))
    }

    fn repo_url(&self, repo: &RepositoryRef, rest: &[&str]) -> Result<Url, BitbucketError> {
        let mut segments = vec![
            "projects",
            repo.owner().as_str(),
            "repos",
            repo.name().as_str(),
        ];
        segments.extend_from_slice(rest);
        self.transport.url(&segments)
    }

    fn pull_request_url(
        &self,
        repo: &RepositoryRef,
        id_segment: &str,
        rest: &[&str],
    ) -> Result<Url, BitbucketError> {
        let mut segments = vec!["pull-requests", id_segment];
        segments.extend_from_slice(rest);
        self.repo_url(repo, &segments)
    }

    /// Walks `start`/`limit` pages until Server reports the last page.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        operation: &str,
        base: Url,
    ) -> Result<Vec<T>, BitbucketError> {
        let mut items = Vec::new();
        let mut start = 0_u64;
        loop {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("start", &start.to_string())
                .append_pair("limit", &MAX_PAGE_SIZE.to_string());
            let page: ServerPage<T> = self.transport.get_json(operation, url).await?;
            items.extend(page.values);
            match page.next_page_start {
                Some(next) if !page.is_last_page && next > start => start = next,
                _ => return Ok(items),
            }
        }
    }

    async fn repositories_of(&self, owner: &str) -> Result<Vec<RemoteRepository>, BitbucketError> {
        let url = self.transport.url(&["projects", owner, "repos"])?;
        let repositories: Vec<ServerRepository> =
            self.collect_pages("list repositories", url).await?;
        Ok(repositories.into_iter().map(RemoteRepository::from).collect())
    }
}

#[async_trait]
impl BitbucketGateway for ServerGateway {
    fn client_type(&self) -> &'static str {
        self.transport.endpoint().client_type()
    }

    fn api_host(&self) -> String {
        self.transport.endpoint().api_host()
    }

    async fn current_user(&self) -> Result<User, BitbucketError> {
        self.verified_user().await.map(|(user, _)| user)
    }

    async fn user_repositories(&self) -> Result<Vec<RemoteRepository>, BitbucketError> {
        self.repositories_of(&format!("~{}", self.owner)).await
    }

    async fn owner_repositories(
        &self,
        owner: &str,
    ) -> Result<Vec<RemoteRepository>, BitbucketError> {
        self.repositories_of(owner).await
    }

    async fn teams(&self) -> Result<Vec<Team>, BitbucketError> {
        let url = self.transport.url(&["projects"])?;
        let projects: Vec<ServerProject> = self.collect_pages("list projects", url).await?;
        Ok(projects.into_iter().map(Team::from).collect())
    }

    async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError> {
        let url = self.repo_url(repo, &["branches"])?;
        let branches: Vec<ServerBranch> = self.collect_pages("list branches", url).await?;
        Ok(branches.into_iter().map(Branch::from).collect())
    }

    async fn commits_range(
        &self,
        repo: &RepositoryRef,
        from: &str,
        to: &str,
    ) -> Result<Vec<Commit>, BitbucketError> {
        let mut url = self.repo_url(repo, &["commits"])?;
        url.query_pairs_mut()
            .append_pair("until", from)
            .append_pair("since", to);
        let commits: Vec<ServerCommit> = self.collect_pages("list commits", url).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    async fn commit(&self, repo: &RepositoryRef, hash: &str) -> Result<Commit, BitbucketError> {
        let url = self.repo_url(repo, &["commits", hash])?;
        let commit: ServerCommit = self.transport.get_json("get commit", url).await?;
        Ok(Commit::from(commit))
    }

    async fn pull_requests(
        &self,
        repo: &RepositoryRef,
        page: PageRequest,
    ) -> Result<PagedResult<PullRequest>, BitbucketError> {
        let mut url = self.repo_url(repo, &["pull-requests"])?;
        url.query_pairs_mut()
            .append_pair("start", &page.start().to_string())
            .append_pair("limit", &page.per_page().to_string());
        let response: ServerPage<ServerPullRequest> =
            self.transport.get_json("list pull requests", url).await?;
        Ok(response.into_paged(page, PullRequest::from))
    }

    async fn pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<PullRequest, BitbucketError> {
        let url = self.pull_request_url(repo, &id.to_string(), &[])?;
        let pull_request: ServerPullRequest =
            self.transport.get_json("get pull request", url).await?;
        Ok(PullRequest::from(pull_request))
    }

    async fn pull_request_for_branches(
        &self,
        repo: &RepositoryRef,
        source: &str,
        destination: &str,
    ) -> Result<Option<PullRequest>, BitbucketError> {
        let mut url = self.repo_url(repo, &["pull-requests"])?;
        url.query_pairs_mut()
            .append_pair("at", &branch_ref(source))
            .append_pair("direction", "OUTGOING")
            .append_pair("state", "OPEN");
        let pull_requests: Vec<ServerPullRequest> =
            self.collect_pages("find pull request", url).await?;
        Ok(pull_requests
            .into_iter()
            .map(PullRequest::from)
            .find(|pr| pr.source_branch == source && pr.destination_branch == destination))
    }

    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        draft: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError> {
        let url = self.repo_url(repo, &["pull-requests"])?;
        let created: ServerPullRequest = self
            .transport
            .send_json(
                "create pull request",
                Method::POST,
                url,
                &ServerNewPullRequest::new(draft, repo),
            )
            .await?;
        debug!(repository = %repo, id = created.id, "created pull request");
        Ok(PullRequest::from(created))
    }

    async fn approve_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<ApprovalOutcome, BitbucketError> {
        let url = self.pull_request_url(repo, &id.to_string(), &["approve"])?;
        let participant: Option<ServerParticipant> = self
            .transport
            .send_empty("approve pull request", Method::POST, url)
            .await?;
        Ok(match participant {
            Some(body) if body.approved => ApprovalOutcome::Approved,
            Some(_) => ApprovalOutcome::NotApproved,
            None => ApprovalOutcome::EmptyResponse,
        })
    }

    async fn disapprove_pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<(), BitbucketError> {
        let url = self.pull_request_url(repo, &id.to_string(), &["approve"])?;
        self.transport
            .send_empty::<serde_json::Value>("disapprove pull request", Method::DELETE, url)
            .await?;
        Ok(())
    }

    async fn pull_request_diff(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<FileDiff>, BitbucketError> {
        let url = self.pull_request_url(repo, &format!("{id}.diff"), &[])?;
        let text = self.transport.get_text("get pull request diff", url).await?;
        Ok(parse_unified_diff(&text))
    }

    async fn pull_request_commits(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Commit>, BitbucketError> {
        let url = self.pull_request_url(repo, &id.to_string(), &["commits"])?;
        let commits: Vec<ServerCommit> =
            self.collect_pages("list pull request commits", url).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    async fn pull_request_comments(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Comment>, BitbucketError> {
        let url = self.pull_request_url(repo, &id.to_string(), &["activities"])?;
        let activities: Vec<ServerActivity> =
            self.collect_pages("list pull request comments", url).await?;
        Ok(comments_from_activities(activities))
    }

    async fn repository_users(
        &self,
        repo: &RepositoryRef,
        filter: &str,
    ) -> Result<Vec<User>, BitbucketError> {
        let mut url = self.repo_url(repo, &["permissions", "users"])?;
        if !filter.is_empty() {
            url.query_pairs_mut().append_pair("filter", filter);
        }
        let permissions: Vec<ServerUserPermission> =
            self.collect_pages("list repository users", url).await?;
        Ok(permissions
            .into_iter()
            .map(|permission| User::from(permission.user))
            .collect())
    }

    async fn create_repository(
        &self,
        repository: &NewRepository,
    ) -> Result<RemoteRepository, BitbucketError> {
        let target = &repository.target;
        if repository.description.is_some() {
            debug!(repository = %target, "Bitbucket Server ignores repository descriptions on create");
        }
        let url = self
            .transport
            .url(&["projects", target.owner().as_str(), "repos"])?;
        let body = ServerNewRepository {
            name: target.name().as_str().to_owned(),
            scm_id: GIT_SCM,
            forkable: true,
        };
        let created: ServerRepository = self
            .transport
            .send_json("create repository", Method::POST, url, &body)
            .await?;
        Ok(RemoteRepository::from(created))
    }
}
