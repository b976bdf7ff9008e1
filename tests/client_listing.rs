//! Integration tests for listing through a logged-in client.
#![expect(clippy::expect_used, reason = "Test setup invariants")]

use std::sync::Arc;
use std::time::Duration;

use bucketline::bitbucket::{BitbucketError, RetryPolicy};
use bucketline::{
    BitbucketClient, CredentialSession, Credentials, EventBus, EventKind, HttpGatewayFactory,
    RepositoryRef,
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLOUD_PULLS: &str = "/repositories/acme/widgets/pullrequests";

#[fixture]
fn repo() -> RepositoryRef {
    RepositoryRef::new("acme", "widgets").expect("valid reference")
}

fn session() -> (Arc<CredentialSession>, Arc<EventBus>) {
    let retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1));
    let events = Arc::new(EventBus::new());
    let session = Arc::new(CredentialSession::new(
        Arc::new(HttpGatewayFactory::new(retry)),
        Arc::clone(&events),
    ));
    (session, events)
}

async fn mount_user(server: &MockServer, user_path: &str) {
    Mock::given(method("GET"))
        .and(path(user_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "alice",
            "name": "alice",
            "display_name": "Alice",
            "displayName": "Alice"
        })))
        .mount(server)
        .await;
}

async fn cloud_client(server: &MockServer) -> BitbucketClient {
    mount_user(server, "/user").await;
    let (session, _events) = session();
    session
        .login(Credentials::cloud("alice", "secret").with_host(Some(server.uri())))
        .await
        .expect("login should succeed");
    BitbucketClient::new(session)
}

fn cloud_pull_request(id: u32, author: &str) -> Value {
    json!({
        "id": id,
        "title": format!("PR {id}"),
        "state": "OPEN",
        "author": { "username": author },
        "source": { "branch": { "name": format!("feature-{id}") } },
        "destination": { "branch": { "name": "main" } }
    })
}

fn cloud_repository(owner: &str, name: &str, scm: &str) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "scm": scm,
        "owner": { "username": owner },
        "links": {
            "clone": [
                { "name": "https", "href": format!("https://bitbucket.org/{owner}/{name}.git") }
            ]
        }
    })
}

#[rstest]
#[tokio::test]
async fn all_pull_requests_concatenates_every_page(repo: RepositoryRef) {
    let server = MockServer::start().await;
    let sizes: [u32; 4] = [20, 20, 20, 5];
    let mut first_id = 1;
    for (page, size) in (1_u32..).zip(sizes) {
        let values: Vec<Value> = (first_id..first_id + size)
            .map(|id| cloud_pull_request(id, "carol"))
            .collect();
        first_id += size;
        let mut body = json!({ "values": values, "page": page, "pagelen": 20, "size": 65 });
        if page < 4 {
            body["next"] = json!(format!("{}{CLOUD_PULLS}?page={}", server.uri(), page + 1));
        }
        Mock::given(method("GET"))
            .and(path(CLOUD_PULLS))
            .and(query_param("page", page.to_string()))
            .and(query_param("pagelen", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    let client = cloud_client(&server).await;

    let pull_requests = client
        .all_pull_requests(&repo)
        .await
        .expect("pull requests should load");

    let ids: Vec<u64> = pull_requests.iter().map(|pr| pr.id).collect();
    assert_eq!(ids, (1..=65).collect::<Vec<u64>>());
}

#[rstest]
#[tokio::test]
async fn pull_request_page_reports_position(repo: RepositoryRef) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CLOUD_PULLS))
        .and(query_param("page", "2"))
        .and(query_param("pagelen", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": (11..=20)
                .map(|id| cloud_pull_request(id, "carol"))
                .collect::<Vec<Value>>(),
            "page": 2,
            "pagelen": 10,
            "size": 25,
            "next": format!("{}{CLOUD_PULLS}?page=3", server.uri())
        })))
        .mount(&server)
        .await;
    let client = cloud_client(&server).await;

    let page = client
        .pull_requests(&repo, 10, 2)
        .await
        .expect("page should load");

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.page_info.current_page(), 2);
    assert_eq!(page.page_info.total_pages(), Some(3));
    assert!(page.page_info.has_next());
    assert!(page.page_info.has_prev());
}

#[rstest]
#[tokio::test]
async fn authors_are_distinct_across_pages(repo: RepositoryRef) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CLOUD_PULLS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                cloud_pull_request(1, "carol"),
                cloud_pull_request(2, "bob"),
                cloud_pull_request(3, "carol"),
                cloud_pull_request(4, "bob")
            ]
        })))
        .mount(&server)
        .await;
    let client = cloud_client(&server).await;

    let authors = client
        .pull_requests_authors(&repo)
        .await
        .expect("authors should load");

    let names: Vec<&str> = authors.iter().map(|user| user.username.as_str()).collect();
    assert_eq!(names, vec!["carol", "bob"]);
}

#[rstest]
#[tokio::test]
async fn all_repositories_keeps_git_repositories_of_user_and_teams() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repositories/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                cloud_repository("alice", "dotfiles", "git"),
                cloud_repository("alice", "legacy", "hg")
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/teams"))
        .and(query_param("role", "member"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [ { "username": "acme" } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [ cloud_repository("acme", "widgets", "git") ]
        })))
        .mount(&server)
        .await;
    let client = cloud_client(&server).await;

    let repositories = client
        .all_repositories()
        .await
        .expect("repositories should load");

    let names: Vec<(&str, &str)> = repositories
        .iter()
        .map(|repo| (repo.owner.as_str(), repo.name.as_str()))
        .collect();
    assert_eq!(names, vec![("alice", "dotfiles"), ("acme", "widgets")]);
}

#[rstest]
#[tokio::test]
async fn email_login_lists_repositories_of_the_verified_user() {
    let server = MockServer::start().await;
    mount_user(&server, "/user").await;
    Mock::given(method("GET"))
        .and(path("/repositories/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [ cloud_repository("alice", "dotfiles", "git") ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (session, _events) = session();
    let state = session
        .login(Credentials::cloud("alice@example.com", "secret").with_host(Some(server.uri())))
        .await
        .expect("login should succeed");
    let client = BitbucketClient::new(session);

    let repositories = client
        .user_repositories()
        .await
        .expect("repositories should load");

    assert_eq!(state.username.as_deref(), Some("alice"));
    assert_eq!(state.host, Some(server.uri()));
    let names: Vec<&str> = repositories.iter().map(|repo| repo.name.as_str()).collect();
    assert_eq!(names, vec!["dotfiles"]);
}

#[rstest]
#[tokio::test]
async fn server_listing_uses_start_offsets(repo: RepositoryRef) {
    let server = MockServer::start().await;
    mount_user(&server, "/rest/api/1.0/users/alice").await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/projects/acme/repos/widgets/pull-requests"))
        .and(query_param("start", "20"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{
                "id": 21,
                "title": "Server change",
                "state": "OPEN",
                "fromRef": { "id": "refs/heads/feature", "displayId": "feature" },
                "toRef": { "id": "refs/heads/master", "displayId": "master" }
            }],
            "isLastPage": true,
            "size": 1,
            "start": 20,
            "limit": 20
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (session, _events) = session();
    let state = session
        .login(Credentials::server("alice", "secret", server.uri()))
        .await
        .expect("login should succeed");
    let client = BitbucketClient::new(session);

    let page = client
        .pull_requests(&repo, 20, 2)
        .await
        .expect("page should load");

    assert!(state.is_enterprise);
    let titles: Vec<&str> = page.items.iter().map(|pr| pr.title.as_str()).collect();
    assert_eq!(titles, vec!["Server change"]);
    assert_eq!(
        page.items.first().map(|pr| pr.destination_branch.as_str()),
        Some("master")
    );
    assert!(!page.page_info.has_next());
}

#[rstest]
#[tokio::test]
async fn rejected_login_leaves_session_disconnected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let (session, events) = session();
    let (_id, mut received) = events.subscribe_channel(EventKind::ConnectionChanged);

    let result = session
        .login(Credentials::cloud("alice", "wrong").with_host(Some(server.uri())))
        .await;

    assert!(
        matches!(result, Err(BitbucketError::Authentication { .. })),
        "expected Authentication, got {result:?}"
    );
    assert!(!session.is_connected());
    assert!(received.try_recv().is_err(), "no connection change expected");
    let listing = BitbucketClient::new(session).all_repositories().await;
    assert!(matches!(listing, Err(BitbucketError::NotAuthenticated)));
}
