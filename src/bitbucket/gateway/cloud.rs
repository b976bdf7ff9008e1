//! Bitbucket Cloud implementation of the gateway.

use async_trait::async_trait;
use http::Method;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::bitbucket::diff::{FileDiff, parse_unified_diff};
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::cloud::{
    CloudBranch, CloudComment, CloudCommit, CloudMembership, CloudNewPullRequest,
    CloudNewRepository, CloudPage, CloudParticipant, CloudPullRequest, CloudRepository, CloudUser,
    map_branch,
};
use crate::bitbucket::models::{
    ApprovalOutcome, Branch, Comment, Commit, NewPullRequest, NewRepository, PullRequest,
    RemoteRepository, Team, User,
};
use crate::bitbucket::pagination::{MAX_PAGE_SIZE, PageRequest, PagedResult};
use crate::bitbucket::repository::RepositoryRef;

use super::BitbucketGateway;
use super::transport::HttpTransport;

/// Gateway for `api.bitbucket.org/2.0`.
pub struct CloudGateway {
    transport: HttpTransport,
    owner: String,
}

impl CloudGateway {
    pub(super) const fn new(transport: HttpTransport, login: String) -> Self {
        Self {
            transport,
            owner: login,
        }
    }

    /// Lists personal repositories under `username`; blank names are ignored.
    pub(super) fn with_owner(mut self, username: &str) -> Self {
        if !username.is_empty() {
            username.clone_into(&mut self.owner);
        }
        self
    }

    fn repo_url(&self, repo: &RepositoryRef, rest: &[&str]) -> Result<Url, BitbucketError> {
        let mut segments = vec!["repositories", repo.owner().as_str(), repo.name().as_str()];
        segments.extend_from_slice(rest);
        self.transport.url(&segments)
    }

    fn pull_request_url(
        &self,
        repo: &RepositoryRef,
        id: u64,
        rest: &[&str],
    ) -> Result<Url, BitbucketError> {
        let id_segment = id.to_string();
        let mut segments = vec!["pullrequests", id_segment.as_str()];
        segments.extend_from_slice(rest);
        self.repo_url(repo, &segments)
    }

    /// Parses a `next` link, refusing hosts other than the API's own.
    fn next_link(&self, link: &str) -> Result<Url, BitbucketError> {
        let url =
            Url::parse(link).map_err(|error| BitbucketError::InvalidUrl(format!("{link}: {error}")))?;
        if url.origin() == self.transport.endpoint().api_base().origin() {
            Ok(url)
        } else {
            Err(BitbucketError::InvalidUrl(format!(
                "{link}: next page is outside {}",
                self.transport.endpoint().api_base()
            )))
        }
    }

    /// Follows `next` links from `first` and concatenates every page.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        operation: &str,
        first: Url,
    ) -> Result<Vec<T>, BitbucketError> {
        let mut items = Vec::new();
        let mut next = Some(with_page_len(first));
        while let Some(url) = next {
            let page: CloudPage<T> = self.transport.get_json(operation, url).await?;
            next = page
                .next
                .as_deref()
                .map(|link| self.next_link(link))
                .transpose()?;
            items.extend(page.values);
        }
        Ok(items)
    }

    async fn repositories_of(&self, owner: &str) -> Result<Vec<RemoteRepository>, BitbucketError> {
        let url = self.transport.url(&["repositories", owner])?;
        let repositories: Vec<CloudRepository> = self.collect_pages("list repositories", url).await?;
        Ok(repositories.into_iter().map(RemoteRepository::from).collect())
    }
}

fn with_page_len(mut url: Url) -> Url {
    if !url.query_pairs().any(|(key, _)| key == "pagelen") {
        url.query_pairs_mut()
            .append_pair("pagelen", &MAX_PAGE_SIZE.to_string());
    }
    url
}

#[async_trait]
impl BitbucketGateway for CloudGateway {
    fn client_type(&self) -> &'static str {
        self.transport.endpoint().client_type()
    }

    fn api_host(&self) -> String {
        self.transport.endpoint().api_host()
    }

    async fn current_user(&self) -> Result<User, BitbucketError> {
        let url = self.transport.url(&["user"])?;
        let user: CloudUser = self.transport.get_json("current user", url).await?;
        Ok(User::from(user))
    }

    async fn user_repositories(&self) -> Result<Vec<RemoteRepository>, BitbucketError> {
        self.repositories_of(&self.owner).await
    }

    async fn owner_repositories(
        &self,
        owner: &str,
    ) -> Result<Vec<RemoteRepository>, BitbucketError> {
        self.repositories_of(owner).await
    }

    async fn teams(&self) -> Result<Vec<Team>, BitbucketError> {
        let mut url = self.transport.url(&["teams"])?;
        url.query_pairs_mut().append_pair("role", "member");
        let teams: Vec<CloudUser> = self.collect_pages("list teams", url).await?;
        Ok(teams.into_iter().map(Team::from).collect())
    }

    async fn branches(&self, repo: &RepositoryRef) -> Result<Vec<Branch>, BitbucketError> {
        let repository: CloudRepository = self
            .transport
            .get_json("get repository", self.repo_url(repo, &[])?)
            .await?;
        let default_branch = repository.default_branch().map(str::to_owned);
        let url = self.repo_url(repo, &["refs", "branches"])?;
        let branches: Vec<CloudBranch> = self.collect_pages("list branches", url).await?;
        Ok(branches
            .into_iter()
            .map(|branch| map_branch(branch, default_branch.as_deref()))
            .collect())
    }

    async fn commits_range(
        &self,
        repo: &RepositoryRef,
        from: &str,
        to: &str,
    ) -> Result<Vec<Commit>, BitbucketError> {
        let mut url = self.repo_url(repo, &["commits", from])?;
        url.query_pairs_mut().append_pair("exclude", to);
        let commits: Vec<CloudCommit> = self.collect_pages("list commits", url).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    async fn commit(&self, repo: &RepositoryRef, hash: &str) -> Result<Commit, BitbucketError> {
        let url = self.repo_url(repo, &["commit", hash])?;
        let commit: CloudCommit = self.transport.get_json("get commit", url).await?;
        Ok(Commit::from(commit))
    }

    async fn pull_requests(
        &self,
        repo: &RepositoryRef,
        page: PageRequest,
    ) -> Result<PagedResult<PullRequest>, BitbucketError> {
        let mut url = self.repo_url(repo, &["pullrequests"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.page().to_string())
            .append_pair("pagelen", &page.per_page().to_string());
        let response: CloudPage<CloudPullRequest> =
            self.transport.get_json("list pull requests", url).await?;
        Ok(response.into_paged(page.page(), page.per_page(), PullRequest::from))
    }

    async fn pull_request(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<PullRequest, BitbucketError> {
        let url = self.pull_request_url(repo, id, &[])?;
        let pull_request: CloudPullRequest = self.transport.get_json("get pull request", url).await?;
        Ok(PullRequest::from(pull_request))
    }

    async fn pull_request_for_branches(
        &self,
        repo: &RepositoryRef,
        source: &str,
        destination: &str,
    ) -> Result<Option<PullRequest>, BitbucketError> {
        let mut url = self.repo_url(repo, &["pullrequests"])?;
        let query = format!(
            "source.branch.name=\"{source}\" AND destination.branch.name=\"{destination}\" AND state=\"OPEN\""
        );
        url.query_pairs_mut().append_pair("q", &query);
        let pull_requests: Vec<CloudPullRequest> =
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
        let url = self.repo_url(repo, &["pullrequests"])?;
        let created: CloudPullRequest = self
            .transport
            .send_json(
                "create pull request",
                Method::POST,
                url,
                &CloudNewPullRequest::from(draft),
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
        let url = self.pull_request_url(repo, id, &["approve"])?;
        let participant: Option<CloudParticipant> = self
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
        let url = self.pull_request_url(repo, id, &["approve"])?;
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
        let url = self.pull_request_url(repo, id, &["diff"])?;
        let text = self.transport.get_text("get pull request diff", url).await?;
        Ok(parse_unified_diff(&text))
    }

    async fn pull_request_commits(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Commit>, BitbucketError> {
        let url = self.pull_request_url(repo, id, &["commits"])?;
        let commits: Vec<CloudCommit> = self.collect_pages("list pull request commits", url).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    async fn pull_request_comments(
        &self,
        repo: &RepositoryRef,
        id: u64,
    ) -> Result<Vec<Comment>, BitbucketError> {
        let url = self.pull_request_url(repo, id, &["comments"])?;
        let comments: Vec<CloudComment> =
            self.collect_pages("list pull request comments", url).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn repository_users(
        &self,
        repo: &RepositoryRef,
        filter: &str,
    ) -> Result<Vec<User>, BitbucketError> {
        let url = self
            .transport
            .url(&["workspaces", repo.owner().as_str(), "members"])?;
        let members: Vec<CloudMembership> = self.collect_pages("list repository users", url).await?;
        let needle = filter.to_lowercase();
        Ok(members
            .into_iter()
            .map(|membership| User::from(membership.user))
            .filter(|user| matches_filter(user, &needle))
            .collect())
    }

    async fn create_repository(
        &self,
        repository: &NewRepository,
    ) -> Result<RemoteRepository, BitbucketError> {
        let target = &repository.target;
        let url = self
            .transport
            .url(&["repositories", target.owner().as_str(), target.name().as_str()])?;
        let created: CloudRepository = self
            .transport
            .send_json(
                "create repository",
                Method::POST,
                url,
                &CloudNewRepository::from(repository),
            )
            .await?;
        Ok(RemoteRepository::from(created))
    }
}

/// Case-insensitive match on username or display name; an empty filter
/// matches everyone.
fn matches_filter(user: &User, needle: &str) -> bool {
    needle.is_empty()
        || user.username.to_lowercase().contains(needle)
        || user
            .display_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(needle))
}
