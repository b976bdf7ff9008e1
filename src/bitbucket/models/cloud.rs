//! Bitbucket Cloud (`api.bitbucket.org/2.0`) wire schema and its mapping to
//! domain types.

use serde::{Deserialize, Serialize};

use super::{
    Branch, Comment, Commit, NewPullRequest, NewRepository, PullRequest, PullRequestState,
    RemoteRepository, Team, User, parse_timestamp,
};
use crate::bitbucket::pagination::{PageInfo, PagedResult};

/// Paginated envelope used by every Cloud list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudPage<T> {
    #[serde(default = "Vec::new")]
    pub(crate) values: Vec<T>,
    pub(crate) page: Option<u32>,
    pub(crate) pagelen: Option<u32>,
    pub(crate) size: Option<u64>,
    pub(crate) next: Option<String>,
}

impl<T> CloudPage<T> {
    /// Converts the envelope into a paged result, falling back to the
    /// requested page coordinates when Bitbucket omits them.
    pub(crate) fn into_paged<U>(
        self,
        requested_page: u32,
        requested_len: u8,
        map: impl FnMut(T) -> U,
    ) -> PagedResult<U> {
        let per_page = self
            .pagelen
            .and_then(|len| u8::try_from(len).ok())
            .unwrap_or(requested_len);
        let page_info = PageInfo::new(self.page.unwrap_or(requested_page), per_page)
            .with_total_count(self.size)
            .with_has_next(self.next.is_some());
        PagedResult::new(self.values.into_iter().map(map).collect(), page_info)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudUser {
    pub(crate) username: Option<String>,
    pub(crate) nickname: Option<String>,
    pub(crate) display_name: Option<String>,
    pub(crate) uuid: Option<String>,
    pub(crate) account_id: Option<String>,
}

impl CloudUser {
    fn login(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.nickname.clone())
            .or_else(|| self.account_id.clone())
            .or_else(|| self.display_name.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudLink {
    pub(crate) href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudNamedLink {
    pub(crate) href: String,
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CloudRepositoryLinks {
    #[serde(default)]
    pub(crate) clone: Vec<CloudNamedLink>,
    pub(crate) html: Option<CloudLink>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct CloudBranchName {
    pub(crate) name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudRepository {
    pub(crate) name: String,
    pub(crate) slug: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) scm: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_private: Option<bool>,
    pub(crate) owner: Option<CloudUser>,
    pub(crate) links: Option<CloudRepositoryLinks>,
    pub(crate) mainbranch: Option<CloudBranchName>,
}

impl CloudRepository {
    /// Owner login, taken from the owner object or the `owner/slug` full name.
    fn owner_login(&self) -> String {
        self.owner
            .as_ref()
            .map(CloudUser::login)
            .filter(|login| !login.is_empty())
            .or_else(|| {
                self.full_name
                    .as_deref()
                    .and_then(|full| full.split_once('/'))
                    .map(|(owner, _)| owner.to_owned())
            })
            .unwrap_or_default()
    }

    /// Default branch name, when the repository reports one.
    pub(crate) fn default_branch(&self) -> Option<&str> {
        self.mainbranch.as_ref().map(|branch| branch.name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommitRef {
    pub(crate) hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommitAuthor {
    pub(crate) raw: Option<String>,
    pub(crate) user: Option<CloudUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommit {
    pub(crate) hash: String,
    pub(crate) message: Option<String>,
    pub(crate) date: Option<String>,
    pub(crate) author: Option<CloudCommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudBranch {
    pub(crate) name: String,
    pub(crate) target: CloudCommitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudPullRequestEndpoint {
    pub(crate) branch: Option<CloudBranchName>,
    pub(crate) commit: Option<CloudCommitRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudPullRequest {
    pub(crate) id: u64,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) author: Option<CloudUser>,
    pub(crate) source: CloudPullRequestEndpoint,
    pub(crate) destination: CloudPullRequestEndpoint,
    pub(crate) close_source_branch: Option<bool>,
    pub(crate) created_on: Option<String>,
    pub(crate) updated_on: Option<String>,
}

/// Body returned by `POST .../approve`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudParticipant {
    #[serde(default)]
    pub(crate) approved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommentContent {
    pub(crate) raw: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommentParent {
    pub(crate) id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudCommentInline {
    pub(crate) path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudComment {
    pub(crate) id: u64,
    pub(crate) content: Option<CloudCommentContent>,
    pub(crate) user: Option<CloudUser>,
    pub(crate) created_on: Option<String>,
    pub(crate) updated_on: Option<String>,
    pub(crate) parent: Option<CloudCommentParent>,
    pub(crate) inline: Option<CloudCommentInline>,
}

/// Workspace membership entry from `/workspaces/{workspace}/members`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudMembership {
    pub(crate) user: CloudUser,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudErrorDetail {
    pub(crate) message: Option<String>,
    pub(crate) detail: Option<String>,
}

/// Error envelope returned with 4xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CloudErrorBody {
    pub(crate) error: Option<CloudErrorDetail>,
}

impl CloudErrorBody {
    pub(crate) fn message(self) -> Option<String> {
        let detail = self.error?;
        match (detail.message, detail.detail) {
            (Some(message), Some(extra)) if !extra.is_empty() => Some(format!("{message}: {extra}")),
            (Some(message), _) => Some(message),
            (None, extra) => extra,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CloudBranchSelector {
    pub(crate) branch: CloudBranchName,
}

/// Outbound body for `POST .../pullrequests`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CloudNewPullRequest {
    pub(crate) title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) source: CloudBranchSelector,
    pub(crate) destination: CloudBranchSelector,
    pub(crate) close_source_branch: bool,
}

/// Outbound body for `POST /repositories/{owner}/{slug}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CloudNewRepository {
    pub(crate) scm: &'static str,
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) is_private: bool,
}

impl From<CloudUser> for User {
    fn from(value: CloudUser) -> Self {
        let username = value.login();
        Self {
            id: value.uuid,
            username,
            display_name: value.display_name,
        }
    }
}

impl From<CloudUser> for Team {
    fn from(value: CloudUser) -> Self {
        let username = value.login();
        Self {
            id: value.uuid,
            username,
            display_name: value.display_name,
        }
    }
}

impl From<CloudRepository> for RemoteRepository {
    fn from(value: CloudRepository) -> Self {
        let owner = value.owner_login();
        let links = value.links.unwrap_or_default();
        let clone_url = select_clone_url(&links.clone);
        Self {
            name: value.slug.unwrap_or(value.name),
            owner,
            clone_url,
            scm: value.scm.unwrap_or_default(),
            description: value.description.filter(|text| !text.is_empty()),
            is_private: value.is_private.unwrap_or(false),
            html_url: links.html.map(|link| link.href),
        }
    }
}

/// Maps a branch, flagging it when it matches the repository default.
pub(crate) fn map_branch(value: CloudBranch, default_branch: Option<&str>) -> Branch {
    let is_default = default_branch.is_some_and(|name| name == value.name);
    Branch {
        name: value.name,
        target_hash: value.target.hash,
        is_default,
    }
}

impl From<CloudCommit> for Commit {
    fn from(value: CloudCommit) -> Self {
        let (author_name, author) = value
            .author
            .map_or((None, None), |author| (author.raw, author.user.map(User::from)));
        Self {
            hash: value.hash,
            message: value.message,
            author_name,
            author,
            date: parse_timestamp(value.date.as_deref()),
        }
    }
}

impl From<CloudPullRequest> for PullRequest {
    fn from(value: CloudPullRequest) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description.filter(|text| !text.is_empty()),
            source_branch: value
                .source
                .branch
                .map(|branch| branch.name)
                .unwrap_or_default(),
            destination_branch: value
                .destination
                .branch
                .map(|branch| branch.name)
                .unwrap_or_default(),
            close_source_branch: value.close_source_branch.unwrap_or(false),
            state: value.state.as_deref().and_then(PullRequestState::parse),
            author: value.author.map(User::from),
            source_commit: value.source.commit.map(|commit| commit.hash),
            created_on: parse_timestamp(value.created_on.as_deref()),
            updated_on: parse_timestamp(value.updated_on.as_deref()),
        }
    }
}

impl From<CloudComment> for Comment {
    fn from(value: CloudComment) -> Self {
        Self {
            id: value.id,
            body: value.content.and_then(|content| content.raw),
            author: value.user.map(User::from),
            created_on: parse_timestamp(value.created_on.as_deref()),
            updated_on: parse_timestamp(value.updated_on.as_deref()),
            parent_id: value.parent.map(|parent| parent.id),
            file_path: value.inline.and_then(|inline| inline.path),
        }
    }
}

impl From<&NewPullRequest> for CloudNewPullRequest {
    fn from(value: &NewPullRequest) -> Self {
        Self {
            title: value.title.clone(),
            description: value.description.clone(),
            source: CloudBranchSelector {
                branch: CloudBranchName {
                    name: value.source_branch.clone(),
                },
            },
            destination: CloudBranchSelector {
                branch: CloudBranchName {
                    name: value.destination_branch.clone(),
                },
            },
            close_source_branch: value.close_source_branch,
        }
    }
}

impl From<&NewRepository> for CloudNewRepository {
    fn from(value: &NewRepository) -> Self {
        Self {
            scm: super::GIT_SCM,
            name: value.target.name().as_str().to_owned(),
            description: value.description.clone(),
            is_private: value.is_private,
        }
    }
}

/// Prefers the HTTPS clone link and falls back to the first one listed.
fn select_clone_url(links: &[CloudNamedLink]) -> Option<String> {
    links
        .iter()
        .find(|link| {
            link.name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case("https"))
        })
        .or_else(|| links.first())
        .map(|link| link.href.clone())
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::{
        CloudBranch, CloudErrorBody, CloudNewPullRequest, CloudPage, CloudPullRequest,
        CloudRepository, map_branch,
    };
    use crate::bitbucket::models::{NewPullRequest, PullRequest, PullRequestState, RemoteRepository};

    #[fixture]
    fn repository_json() -> serde_json::Value {
        json!({
            "name": "Billing API",
            "slug": "billing-api",
            "full_name": "acme/billing-api",
            "scm": "git",
            "is_private": true,
            "description": "",
            "owner": { "username": "acme", "display_name": "Acme", "uuid": "{1}" },
            "links": {
                "clone": [
                    { "href": "git@bitbucket.org:acme/billing-api.git", "name": "ssh" },
                    { "href": "https://alice@bitbucket.org/acme/billing-api.git", "name": "https" }
                ],
                "html": { "href": "https://bitbucket.org/acme/billing-api" }
            },
            "mainbranch": { "name": "main", "type": "branch" }
        })
    }

    #[rstest]
    fn maps_repository_fields(repository_json: serde_json::Value) {
        let wire: CloudRepository =
            serde_json::from_value(repository_json).expect("repository should deserialise");
        assert_eq!(wire.default_branch(), Some("main"));

        let repository = RemoteRepository::from(wire);
        assert_eq!(repository.name, "billing-api");
        assert_eq!(repository.owner, "acme");
        assert_eq!(
            repository.clone_url.as_deref(),
            Some("https://alice@bitbucket.org/acme/billing-api.git")
        );
        assert!(repository.is_git());
        assert!(repository.is_private);
        assert_eq!(repository.description, None, "empty description is dropped");
        assert_eq!(
            repository.html_url.as_deref(),
            Some("https://bitbucket.org/acme/billing-api")
        );
    }

    #[rstest]
    fn owner_falls_back_to_full_name() {
        let wire: CloudRepository = serde_json::from_value(json!({
            "name": "tools",
            "full_name": "platform/tools",
            "scm": "hg"
        }))
        .expect("repository should deserialise");

        let repository = RemoteRepository::from(wire);
        assert_eq!(repository.owner, "platform");
        assert!(!repository.is_git());
        assert_eq!(repository.clone_url, None);
    }

    #[rstest]
    #[case::default_branch("main", true)]
    #[case::other_branch("feature/login", false)]
    fn flags_default_branch(#[case] name: &str, #[case] expected: bool) {
        let wire: CloudBranch = serde_json::from_value(json!({
            "name": name,
            "target": { "hash": "abc123", "type": "commit" }
        }))
        .expect("branch should deserialise");

        let branch = map_branch(wire, Some("main"));
        assert_eq!(branch.name, name);
        assert_eq!(branch.target_hash, "abc123");
        assert_eq!(branch.is_default, expected);
    }

    #[rstest]
    fn branch_without_target_is_malformed() {
        let result = serde_json::from_value::<CloudBranch>(json!({ "name": "main" }));
        assert!(result.is_err(), "missing target should not deserialise");
    }

    #[rstest]
    fn maps_pull_request_fields() {
        let wire: CloudPullRequest = serde_json::from_value(json!({
            "id": 17,
            "title": "Fix bug",
            "description": "Details",
            "state": "OPEN",
            "author": { "nickname": "alice", "display_name": "Alice", "uuid": "{a}" },
            "source": { "branch": { "name": "feature" }, "commit": { "hash": "f00" } },
            "destination": { "branch": { "name": "main" } },
            "close_source_branch": true,
            "created_on": "2024-01-02T03:04:05+00:00",
            "updated_on": null
        }))
        .expect("pull request should deserialise");

        let pull_request = PullRequest::from(wire);
        assert_eq!(pull_request.id, 17);
        assert_eq!(pull_request.source_branch, "feature");
        assert_eq!(pull_request.destination_branch, "main");
        assert!(pull_request.close_source_branch);
        assert_eq!(pull_request.state, Some(PullRequestState::Open));
        assert_eq!(
            pull_request.author.as_ref().map(|user| user.username.as_str()),
            Some("alice")
        );
        assert_eq!(pull_request.source_commit.as_deref(), Some("f00"));
        assert!(pull_request.created_on.is_some());
        assert!(pull_request.updated_on.is_none());
    }

    #[rstest]
    fn serialises_new_pull_request_body() {
        let draft = NewPullRequest {
            title: "Fix bug".to_owned(),
            description: None,
            source_branch: "feature".to_owned(),
            destination_branch: "main".to_owned(),
            close_source_branch: true,
        };

        let body = serde_json::to_value(CloudNewPullRequest::from(&draft))
            .expect("body should serialise");
        assert_eq!(
            body,
            json!({
                "title": "Fix bug",
                "source": { "branch": { "name": "feature" } },
                "destination": { "branch": { "name": "main" } },
                "close_source_branch": true
            })
        );
    }

    #[rstest]
    fn page_envelope_reports_next_and_total() {
        let page: CloudPage<serde_json::Value> = serde_json::from_value(json!({
            "values": [1, 2],
            "page": 2,
            "pagelen": 2,
            "size": 5,
            "next": "https://api.bitbucket.org/2.0/x?page=3"
        }))
        .expect("page should deserialise");

        let paged = page.into_paged(9, 50, |value| value);
        assert_eq!(paged.items.len(), 2);
        assert_eq!(paged.page_info.current_page(), 2);
        assert_eq!(paged.page_info.per_page(), 2);
        assert_eq!(paged.page_info.total_count(), Some(5));
        assert!(paged.page_info.has_next());
    }

    #[rstest]
    #[case::message_and_detail(
        json!({ "type": "error", "error": { "message": "Bad request", "detail": "same branch" } }),
        Some("Bad request: same branch")
    )]
    #[case::message_only(json!({ "error": { "message": "Not found" } }), Some("Not found"))]
    #[case::no_error(json!({ "type": "error" }), None)]
    fn extracts_error_messages(#[case] body: serde_json::Value, #[case] expected: Option<&str>) {
        let parsed: CloudErrorBody = serde_json::from_value(body).expect("body should parse");
        assert_eq!(parsed.message().as_deref(), expected);
    }
}
