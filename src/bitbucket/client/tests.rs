//! Unit tests for the client facade.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::BitbucketClient;
use crate::bitbucket::credentials::Credentials;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::gateway::{Connected, MockBitbucketGateway, MockGatewayFactory};
use crate::bitbucket::models::test_support::{
    authored_pull_request, git_repository, hg_repository, pull_request, user,
};
use crate::bitbucket::models::{ApprovalOutcome, PullRequest, RemoteRepository, Team};
use crate::bitbucket::pagination::{PageInfo, PagedResult};
use crate::bitbucket::repository::RepositoryRef;
use crate::bitbucket::session::CredentialSession;
use crate::events::EventBus;

const CLOUD_API_HOST: &str = "api.bitbucket.org";

#[fixture]
fn repo() -> RepositoryRef {
    RepositoryRef::new("acme", "widgets").expect("valid reference")
}

fn team(name: &str) -> Team {
    Team {
        id: None,
        username: name.to_owned(),
        display_name: None,
    }
}

fn disconnected_client() -> BitbucketClient {
    let session = CredentialSession::new(
        Arc::new(MockGatewayFactory::new()),
        Arc::new(EventBus::new()),
    );
    BitbucketClient::new(Arc::new(session))
}

async fn client_with(mut gateway: MockBitbucketGateway) -> BitbucketClient {
    gateway
        .expect_api_host()
        .return_const(CLOUD_API_HOST.to_owned());
    let mut factory = MockGatewayFactory::new();
    factory.expect_connect().return_once(move |_| {
        Ok(Connected {
            gateway: Arc::new(gateway),
            user: user("alice"),
        })
    });
    let session = Arc::new(CredentialSession::new(
        Arc::new(factory),
        Arc::new(EventBus::new()),
    ));
    session
        .login(Credentials::cloud("alice", "secret"))
        .await
        .expect("login should succeed");
    BitbucketClient::new(session)
}

fn page_of(page: u32, count: u64, has_next: bool) -> PagedResult<PullRequest> {
    let first_id = u64::from(page.saturating_sub(1)) * 20;
    let items = (1..=count)
        .map(|offset| pull_request(first_id + offset, "PR", "feature", "main"))
        .collect();
    PagedResult::new(items, PageInfo::new(page, 20).with_has_next(has_next))
}

#[rstest]
#[tokio::test]
async fn all_repositories_keeps_git_only_and_duplicates() {
    let mut gateway = MockBitbucketGateway::new();
    gateway.expect_user_repositories().times(1).returning(|| {
        Ok(vec![
            git_repository("acme", "shared"),
            hg_repository("alice", "legacy"),
        ])
    });
    gateway
        .expect_teams()
        .times(1)
        .returning(|| Ok(vec![team("acme"), team("archive")]));
    gateway
        .expect_owner_repositories()
        .times(2)
        .returning(|owner| match owner {
            "acme" => Ok(vec![
                git_repository("acme", "shared"),
                git_repository("acme", "tools"),
            ]),
            _ => Ok(vec![hg_repository("archive", "old")]),
        });
    let client = client_with(gateway).await;

    let repositories = client
        .all_repositories()
        .await
        .expect("listing should succeed");

    let names: Vec<&str> = repositories.iter().map(|repo| repo.name.as_str()).collect();
    assert_eq!(names, vec!["shared", "shared", "tools"]);
    assert!(repositories.iter().all(RemoteRepository::is_git));
}

#[rstest]
#[tokio::test]
async fn all_pull_requests_requests_every_page_in_order(repo: RepositoryRef) {
    let mut gateway = MockBitbucketGateway::new();
    gateway
        .expect_pull_requests()
        .times(4)
        .returning(|_, request| {
            Ok(match request.page() {
                1..=3 => page_of(request.page(), 20, true),
                _ => page_of(request.page(), 5, false),
            })
        });
    let client = client_with(gateway).await;

    let pull_requests = client
        .all_pull_requests(&repo)
        .await
        .expect("listing should succeed");

    assert_eq!(pull_requests.len(), 65);
    let ids: Vec<u64> = pull_requests.iter().map(|pr| pr.id).collect();
    let expected: Vec<u64> = (1..=65).collect();
    assert_eq!(ids, expected);
}

#[rstest]
#[tokio::test]
async fn all_pull_requests_stops_on_empty_page(repo: RepositoryRef) {
    let mut gateway = MockBitbucketGateway::new();
    gateway
        .expect_pull_requests()
        .times(1)
        .returning(|_, request| Ok(page_of(request.page(), 0, true)));
    let client = client_with(gateway).await;

    let pull_requests = client
        .all_pull_requests(&repo)
        .await
        .expect("listing should succeed");

    assert!(pull_requests.is_empty());
}

#[rstest]
#[tokio::test]
async fn invalid_page_is_rejected_before_any_request(repo: RepositoryRef) {
    let mut gateway = MockBitbucketGateway::new();
    gateway.expect_pull_requests().times(0);
    let client = client_with(gateway).await;

    let result = client.pull_requests(&repo, 20, 0).await;

    assert!(matches!(result, Err(BitbucketError::InvalidPagination { .. })));
}

#[rstest]
#[case::approved(ApprovalOutcome::Approved, true)]
#[case::not_approved(ApprovalOutcome::NotApproved, false)]
#[case::empty(ApprovalOutcome::EmptyResponse, false)]
#[tokio::test]
async fn approval_collapses_to_bool(
    repo: RepositoryRef,
    #[case] outcome: ApprovalOutcome,
    #[case] expected: bool,
) {
    let mut gateway = MockBitbucketGateway::new();
    gateway
        .expect_approve_pull_request()
        .times(1)
        .returning(move |_, _| Ok(outcome));
    let client = client_with(gateway).await;

    let approved = client
        .approve_pull_request(&repo, 7)
        .await
        .expect("approve should complete");

    assert_eq!(approved, expected);
}

#[rstest]
#[tokio::test]
async fn authors_are_distinct_in_first_seen_order(repo: RepositoryRef) {
    let mut gateway = MockBitbucketGateway::new();
    gateway.expect_pull_requests().times(1).returning(|_, request| {
        let items = vec![
            authored_pull_request(1, "bob"),
            authored_pull_request(2, "alice"),
            authored_pull_request(3, "bob"),
            pull_request(4, "anonymous", "feature", "main"),
        ];
        Ok(PagedResult::new(
            items,
            PageInfo::new(request.page(), request.per_page()),
        ))
    });
    let client = client_with(gateway).await;

    let authors = client
        .pull_requests_authors(&repo)
        .await
        .expect("authors should load");

    let names: Vec<&str> = authors.iter().map(|author| author.username.as_str()).collect();
    assert_eq!(names, vec!["bob", "alice"]);
}

#[rstest]
#[tokio::test]
async fn operations_require_a_session(repo: RepositoryRef) {
    let client = disconnected_client();

    let branches = client.branches(&repo).await;
    let repositories = client.all_repositories().await;

    assert!(matches!(branches, Err(BitbucketError::NotAuthenticated)));
    assert!(matches!(repositories, Err(BitbucketError::NotAuthenticated)));
}

#[rstest]
fn missing_repository_or_clone_url_is_not_origin() {
    let client = disconnected_client();
    let without_url = RemoteRepository {
        clone_url: None,
        ..git_repository("acme", "widgets")
    };

    assert_eq!(client.is_origin_repo(None), Ok(false));
    assert_eq!(client.is_origin_repo(Some(&without_url)), Ok(false));
}

#[rstest]
fn origin_check_with_clone_url_requires_session() {
    let client = disconnected_client();
    let repository = git_repository("acme", "widgets");

    assert_eq!(
        client.is_origin_repo(Some(&repository)),
        Err(BitbucketError::NotAuthenticated)
    );
}

#[rstest]
#[case::https("https://alice@bitbucket.org/acme/widgets.git", true)]
#[case::upper_case_host("https://BITBUCKET.ORG/acme/widgets.git", true)]
#[case::scp("git@bitbucket.org:acme/widgets.git", true)]
#[case::ssh_url("ssh://git@bitbucket.org/acme/widgets.git", true)]
#[case::other_host("https://github.com/acme/widgets.git", false)]
#[case::garbage("not a url", false)]
#[tokio::test]
async fn origin_compares_clone_host_with_api_host(
    #[case] clone_url: &str,
    #[case] expected: bool,
) {
    let client = client_with(MockBitbucketGateway::new()).await;
    let repository = RemoteRepository {
        clone_url: Some(clone_url.to_owned()),
        ..git_repository("acme", "widgets")
    };

    assert_eq!(client.is_origin_repo(Some(&repository)), Ok(expected));
}
