//! Bitbucket Server (`/rest/api/1.0`) wire schema and its mapping to domain
//! types.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Branch, Comment, Commit, NewPullRequest, PullRequest, PullRequestState, RemoteRepository,
    Team, User, from_epoch_millis,
};
use crate::bitbucket::pagination::{PageInfo, PageRequest, PagedResult};
use crate::bitbucket::repository::RepositoryRef;

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Paginated envelope used by every Server list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerPage<T> {
    #[serde(default = "Vec::new")]
    pub(crate) values: Vec<T>,
    #[serde(default = "default_last_page")]
    pub(crate) is_last_page: bool,
    pub(crate) next_page_start: Option<u64>,
}

const fn default_last_page() -> bool {
    true
}

impl<T> ServerPage<T> {
    /// Converts the envelope into a 1-based paged result.
    ///
    /// Server reports only the size of the current page, so the total is left
    /// unknown.
    pub(crate) fn into_paged<U>(
        self,
        request: PageRequest,
        map: impl FnMut(T) -> U,
    ) -> PagedResult<U> {
        let has_next = !self.is_last_page && self.next_page_start.is_some();
        let page_info = PageInfo::new(request.page(), request.per_page()).with_has_next(has_next);
        PagedResult::new(self.values.into_iter().map(map).collect(), page_info)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerUser {
    pub(crate) id: Option<u64>,
    pub(crate) name: Option<String>,
    pub(crate) slug: Option<String>,
    pub(crate) display_name: Option<String>,
}

impl ServerUser {
    pub(crate) fn login(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.slug.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerProject {
    pub(crate) id: Option<u64>,
    pub(crate) key: String,
    pub(crate) name: Option<String>,
    pub(crate) owner: Option<ServerUser>,
}

impl ServerProject {
    /// Owner segment for API paths. Personal projects map to `~login`.
    fn owner_key(&self) -> String {
        self.owner
            .as_ref()
            .map(ServerUser::login)
            .filter(|login| !login.is_empty() && self.key.starts_with('~'))
            .map_or_else(|| self.key.clone(), |login| format!("~{login}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerLink {
    pub(crate) href: String,
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ServerRepositoryLinks {
    #[serde(default)]
    pub(crate) clone: Vec<ServerLink>,
    #[serde(default, rename = "self")]
    pub(crate) self_links: Vec<ServerLink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerRepository {
    pub(crate) slug: String,
    pub(crate) scm_id: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) public: Option<bool>,
    pub(crate) project: ServerProject,
    pub(crate) links: Option<ServerRepositoryLinks>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerBranch {
    pub(crate) display_id: String,
    pub(crate) latest_commit: Option<String>,
    #[serde(default)]
    pub(crate) is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerPerson {
    pub(crate) name: Option<String>,
    pub(crate) email_address: Option<String>,
    pub(crate) display_name: Option<String>,
    pub(crate) id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerCommit {
    pub(crate) id: String,
    pub(crate) message: Option<String>,
    pub(crate) author: Option<ServerPerson>,
    pub(crate) author_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerRef {
    pub(crate) id: String,
    pub(crate) display_id: Option<String>,
    pub(crate) latest_commit: Option<String>,
}

impl ServerRef {
    fn branch_name(self) -> String {
        self.display_id
            .unwrap_or_else(|| strip_branch_prefix(&self.id).to_owned())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerParticipant {
    pub(crate) user: Option<ServerUser>,
    #[serde(default)]
    pub(crate) approved: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerPullRequest {
    pub(crate) id: u64,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) author: Option<ServerParticipant>,
    pub(crate) from_ref: ServerRef,
    pub(crate) to_ref: ServerRef,
    pub(crate) created_date: Option<i64>,
    pub(crate) updated_date: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerComment {
    pub(crate) id: u64,
    pub(crate) text: Option<String>,
    pub(crate) author: Option<ServerUser>,
    pub(crate) created_date: Option<i64>,
    pub(crate) updated_date: Option<i64>,
    #[serde(default)]
    pub(crate) comments: Vec<ServerComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerCommentAnchor {
    pub(crate) path: Option<String>,
}

/// Entry of `/pull-requests/{id}/activities`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerActivity {
    pub(crate) action: String,
    pub(crate) comment: Option<ServerComment>,
    pub(crate) comment_anchor: Option<ServerCommentAnchor>,
}

/// Entry of `/permissions/users`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerUserPermission {
    pub(crate) user: ServerUser,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerErrorEntry {
    pub(crate) message: Option<String>,
}

/// Error envelope returned with 4xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerErrorBody {
    #[serde(default)]
    pub(crate) errors: Vec<ServerErrorEntry>,
}

impl ServerErrorBody {
    pub(crate) fn message(self) -> Option<String> {
        let messages: Vec<String> = self
            .errors
            .into_iter()
            .filter_map(|entry| entry.message)
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServerProjectKey {
    pub(crate) key: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServerRepositorySelector {
    pub(crate) slug: String,
    pub(crate) project: ServerProjectKey,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServerRefSelector {
    pub(crate) id: String,
    pub(crate) repository: ServerRepositorySelector,
}

/// Outbound body for `POST .../pull-requests`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerNewPullRequest {
    pub(crate) title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) from_ref: ServerRefSelector,
    pub(crate) to_ref: ServerRefSelector,
}

impl ServerNewPullRequest {
    /// Builds the body for a same-repository pull request.
    ///
    /// Server has no per-request source branch deletion, so
    /// `close_source_branch` is not sent.
    pub(crate) fn new(draft: &NewPullRequest, repo: &RepositoryRef) -> Self {
        if draft.close_source_branch {
            debug!(
                repository = %repo,
                "close_source_branch is not supported by Bitbucket Server; ignoring"
            );
        }
        let selector = |branch: &str| ServerRefSelector {
            id: branch_ref(branch),
            repository: ServerRepositorySelector {
                slug: repo.name().as_str().to_owned(),
                project: ServerProjectKey {
                    key: repo.owner().as_str().to_owned(),
                },
            },
        };
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            from_ref: selector(&draft.source_branch),
            to_ref: selector(&draft.destination_branch),
        }
    }
}

/// Outbound body for `POST /projects/{key}/repos`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerNewRepository {
    pub(crate) name: String,
    pub(crate) scm_id: &'static str,
    pub(crate) forkable: bool,
}

/// Fully qualified ref for a branch name.
pub(crate) fn branch_ref(name: &str) -> String {
    if name.starts_with(BRANCH_REF_PREFIX) {
        name.to_owned()
    } else {
        format!("{BRANCH_REF_PREFIX}{name}")
    }
}

fn strip_branch_prefix(name: &str) -> &str {
    name.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(name)
}

impl From<ServerUser> for User {
    fn from(value: ServerUser) -> Self {
        let username = value.login();
        Self {
            id: value.id.map(|id| id.to_string()),
            username,
            display_name: value.display_name,
        }
    }
}

impl From<ServerProject> for Team {
    fn from(value: ServerProject) -> Self {
        Self {
            id: value.id.map(|id| id.to_string()),
            username: value.key,
            display_name: value.name,
        }
    }
}

impl From<ServerRepository> for RemoteRepository {
    fn from(value: ServerRepository) -> Self {
        let owner = value.project.owner_key();
        let links = value.links.unwrap_or_default();
        let clone_url = links
            .clone
            .iter()
            .find(|link| {
                link.name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case("http"))
            })
            .or_else(|| links.clone.first())
            .map(|link| link.href.clone());
        Self {
            name: value.slug,
            owner,
            clone_url,
            scm: value.scm_id.unwrap_or_default(),
            description: value.description.filter(|text| !text.is_empty()),
            is_private: !value.public.unwrap_or(false),
            html_url: links.self_links.into_iter().next().map(|link| link.href),
        }
    }
}

impl From<ServerBranch> for Branch {
    fn from(value: ServerBranch) -> Self {
        Self {
            name: value.display_id,
            target_hash: value.latest_commit.unwrap_or_default(),
            is_default: value.is_default,
        }
    }
}

impl From<ServerCommit> for Commit {
    fn from(value: ServerCommit) -> Self {
        let (author_name, author) = value.author.map_or((None, None), |person| {
            let raw = match (&person.display_name, &person.email_address) {
                (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
                (Some(name), None) => Some(name.clone()),
                (None, _) => person.name.clone(),
            };
            let user = person.name.clone().map(|username| User {
                id: person.id.map(|id| id.to_string()),
                username,
                display_name: person.display_name.clone(),
            });
            (raw, user)
        });
        Self {
            hash: value.id,
            message: value.message,
            author_name,
            author,
            date: from_epoch_millis(value.author_timestamp),
        }
    }
}

impl From<ServerPullRequest> for PullRequest {
    fn from(value: ServerPullRequest) -> Self {
        let source_commit = value.from_ref.latest_commit.clone();
        Self {
            id: value.id,
            title: value.title,
            description: value.description.filter(|text| !text.is_empty()),
            source_branch: value.from_ref.branch_name(),
            destination_branch: value.to_ref.branch_name(),
            close_source_branch: false,
            state: value.state.as_deref().and_then(PullRequestState::parse),
            author: value
                .author
                .and_then(|participant| participant.user)
                .map(User::from),
            source_commit,
            created_on: from_epoch_millis(value.created_date),
            updated_on: from_epoch_millis(value.updated_date),
        }
    }
}

/// Flattens a comment and its replies, depth first.
fn flatten_comment(
    comment: ServerComment,
    parent_id: Option<u64>,
    file_path: Option<&str>,
    out: &mut Vec<Comment>,
) {
    let id = comment.id;
    out.push(Comment {
        id,
        body: comment.text,
        author: comment.author.map(User::from),
        created_on: from_epoch_millis(comment.created_date),
        updated_on: from_epoch_millis(comment.updated_date),
        parent_id,
        file_path: file_path.map(str::to_owned),
    });
    for reply in comment.comments {
        flatten_comment(reply, Some(id), file_path, out);
    }
}

/// Extracts comments from an activity stream, skipping other actions.
pub(crate) fn comments_from_activities(activities: Vec<ServerActivity>) -> Vec<Comment> {
    let mut comments = Vec::new();
    for activity in activities {
        if activity.action != "COMMENTED" {
            continue;
        }
        let Some(comment) = activity.comment else {
            continue;
        };
        let path = activity
            .comment_anchor
            .as_ref()
            .and_then(|anchor| anchor.path.as_deref());
        flatten_comment(comment, None, path, &mut comments);
    }
    comments
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::{
        ServerActivity, ServerBranch, ServerCommit, ServerErrorBody, ServerNewPullRequest,
        ServerPage, ServerPullRequest, ServerRepository, branch_ref, comments_from_activities,
    };
    use crate::bitbucket::models::{Branch, Commit, NewPullRequest, PullRequest, RemoteRepository};
    use crate::bitbucket::pagination::PageRequest;
    use crate::bitbucket::repository::RepositoryRef;

    #[rstest]
    fn maps_project_repository() {
        let wire: ServerRepository = serde_json::from_value(json!({
            "slug": "my-repo",
            "name": "My repo",
            "scmId": "git",
            "public": false,
            "project": { "key": "PRJ", "id": 1, "name": "Project" },
            "links": {
                "clone": [
                    { "href": "ssh://git@stash.example.com:7999/prj/my-repo.git", "name": "ssh" },
                    { "href": "https://stash.example.com/scm/prj/my-repo.git", "name": "http" }
                ],
                "self": [ { "href": "https://stash.example.com/projects/PRJ/repos/my-repo/browse" } ]
            }
        }))
        .expect("repository should deserialise");

        let repository = RemoteRepository::from(wire);
        assert_eq!(repository.owner, "PRJ");
        assert_eq!(repository.name, "my-repo");
        assert_eq!(
            repository.clone_url.as_deref(),
            Some("https://stash.example.com/scm/prj/my-repo.git")
        );
        assert!(repository.is_private);
        assert!(repository.is_git());
    }

    #[rstest]
    fn personal_repository_owner_uses_tilde_login() {
        let wire: ServerRepository = serde_json::from_value(json!({
            "slug": "dotfiles",
            "scmId": "git",
            "public": true,
            "project": { "key": "~ALICE", "owner": { "name": "alice" } }
        }))
        .expect("repository should deserialise");

        let repository = RemoteRepository::from(wire);
        assert_eq!(repository.owner, "~alice");
        assert!(!repository.is_private);
    }

    #[rstest]
    fn maps_branch_display_id() {
        let wire: ServerBranch = serde_json::from_value(json!({
            "id": "refs/heads/master",
            "displayId": "master",
            "latestCommit": "8d51122def5632836d1cb1026e879069e10a1e13",
            "isDefault": true
        }))
        .expect("branch should deserialise");

        assert_eq!(
            Branch::from(wire),
            Branch {
                name: "master".to_owned(),
                target_hash: "8d51122def5632836d1cb1026e879069e10a1e13".to_owned(),
                is_default: true,
            }
        );
    }

    #[rstest]
    fn maps_commit_author_and_epoch_date() {
        let wire: ServerCommit = serde_json::from_value(json!({
            "id": "abcdef0123abcdef4567abcdef8987abcdef6543",
            "displayId": "abcdef0123a",
            "message": "More work on feature 1",
            "author": { "name": "charlie", "emailAddress": "charlie@example.com", "displayName": "Charlie" },
            "authorTimestamp": 1_548_720_847_610_i64
        }))
        .expect("commit should deserialise");

        let commit = Commit::from(wire);
        assert_eq!(
            commit.author_name.as_deref(),
            Some("Charlie <charlie@example.com>")
        );
        assert_eq!(
            commit.author.as_ref().map(|user| user.username.as_str()),
            Some("charlie")
        );
        assert_eq!(commit.date.map(|date| date.timestamp()), Some(1_548_720_847));
    }

    #[rstest]
    fn maps_pull_request_refs_to_branch_names() {
        let wire: ServerPullRequest = serde_json::from_value(json!({
            "id": 101,
            "title": "Talking Nerdy",
            "state": "OPEN",
            "author": { "user": { "name": "tom", "id": 115_026 }, "approved": false },
            "fromRef": { "id": "refs/heads/feature-ABC-123", "latestCommit": "babecafe" },
            "toRef": { "id": "refs/heads/master", "displayId": "master" },
            "createdDate": 1_359_075_920,
            "updatedDate": 1_359_085_920
        }))
        .expect("pull request should deserialise");

        let pull_request = PullRequest::from(wire);
        assert_eq!(pull_request.source_branch, "feature-ABC-123");
        assert_eq!(pull_request.destination_branch, "master");
        assert_eq!(pull_request.source_commit.as_deref(), Some("babecafe"));
        assert!(!pull_request.close_source_branch);
        assert_eq!(
            pull_request.author.map(|user| user.username),
            Some("tom".to_owned())
        );
    }

    #[rstest]
    fn serialises_new_pull_request_refs() {
        let repo = RepositoryRef::new("PRJ", "my-repo").expect("valid reference");
        let draft = NewPullRequest {
            title: "Add feature".to_owned(),
            description: Some("Body".to_owned()),
            source_branch: "feature".to_owned(),
            destination_branch: "master".to_owned(),
            close_source_branch: true,
        };

        let body = serde_json::to_value(ServerNewPullRequest::new(&draft, &repo))
            .expect("body should serialise");
        assert_eq!(
            body,
            json!({
                "title": "Add feature",
                "description": "Body",
                "fromRef": {
                    "id": "refs/heads/feature",
                    "repository": { "slug": "my-repo", "project": { "key": "PRJ" } }
                },
                "toRef": {
                    "id": "refs/heads/master",
                    "repository": { "slug": "my-repo", "project": { "key": "PRJ" } }
                }
            })
        );
    }

    #[rstest]
    #[case::bare("feature", "refs/heads/feature")]
    #[case::qualified("refs/heads/feature", "refs/heads/feature")]
    fn qualifies_branch_refs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(branch_ref(input), expected);
    }

    #[rstest]
    #[case::more(json!({ "values": [1], "isLastPage": false, "nextPageStart": 25 }), true)]
    #[case::last(json!({ "values": [1], "isLastPage": true }), false)]
    #[case::missing_flag(json!({ "values": [] }), false)]
    fn page_envelope_reports_next(#[case] body: serde_json::Value, #[case] expected: bool) {
        let page: ServerPage<serde_json::Value> =
            serde_json::from_value(body).expect("page should deserialise");
        let request = PageRequest::new(2, 25).expect("valid request");

        let paged = page.into_paged(request, |value| value);
        assert_eq!(paged.page_info.has_next(), expected);
        assert_eq!(paged.page_info.current_page(), 2);
    }

    #[rstest]
    fn flattens_comment_threads_from_activities() {
        let activities: Vec<ServerActivity> = serde_json::from_value(json!([
            { "action": "APPROVED" },
            {
                "action": "COMMENTED",
                "commentAnchor": { "path": "src/lib.rs" },
                "comment": {
                    "id": 1,
                    "text": "Why?",
                    "author": { "name": "bob" },
                    "comments": [ { "id": 2, "text": "Because.", "author": { "name": "alice" } } ]
                }
            }
        ]))
        .expect("activities should deserialise");

        let comments = comments_from_activities(activities);
        let parents: Vec<Option<u64>> = comments.iter().map(|comment| comment.parent_id).collect();
        assert_eq!(parents, vec![None, Some(1)]);
        assert!(
            comments
                .iter()
                .all(|comment| comment.file_path.as_deref() == Some("src/lib.rs"))
        );
    }

    #[rstest]
    fn joins_error_messages() {
        let body: ServerErrorBody = serde_json::from_value(json!({
            "errors": [
                { "message": "Only one pull request may be open for a given source and target branch" },
                { "message": "second" }
            ]
        }))
        .expect("error body should parse");
        assert_eq!(
            body.message().as_deref(),
            Some("Only one pull request may be open for a given source and target branch; second")
        );
    }
}
