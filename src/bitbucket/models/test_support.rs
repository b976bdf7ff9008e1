//! Fixture builders for domain models.
//!
//! ```
//! use bucketline::bitbucket::models::test_support::{branch, pull_request};
//!
//! let main = branch("main", "abc123");
//! assert!(!main.is_default);
//!
//! let pr = pull_request(7, "Fix bug", "feature", "main");
//! assert_eq!(pr.destination_branch, "main");
//! ```

use super::{Branch, PullRequest, PullRequestState, RemoteRepository, User, GIT_SCM};

/// A git repository with an HTTPS clone URL on `bitbucket.org`.
#[must_use]
pub fn git_repository(owner: &str, name: &str) -> RemoteRepository {
    RemoteRepository {
        name: name.to_owned(),
        owner: owner.to_owned(),
        clone_url: Some(format!("https://bitbucket.org/{owner}/{name}.git")),
        scm: GIT_SCM.to_owned(),
        description: None,
        is_private: false,
        html_url: Some(format!("https://bitbucket.org/{owner}/{name}")),
    }
}

/// A Mercurial repository, which listings filter out.
#[must_use]
pub fn hg_repository(owner: &str, name: &str) -> RemoteRepository {
    RemoteRepository {
        scm: "hg".to_owned(),
        clone_url: Some(format!("https://bitbucket.org/{owner}/{name}")),
        ..git_repository(owner, name)
    }
}

/// A non-default branch.
#[must_use]
pub fn branch(name: &str, target_hash: &str) -> Branch {
    Branch {
        name: name.to_owned(),
        target_hash: target_hash.to_owned(),
        is_default: false,
    }
}

/// The repository's default branch.
#[must_use]
pub fn default_branch(name: &str, target_hash: &str) -> Branch {
    Branch {
        is_default: true,
        ..branch(name, target_hash)
    }
}

/// A user with only a login.
#[must_use]
pub fn user(username: &str) -> User {
    User {
        id: None,
        username: username.to_owned(),
        display_name: None,
    }
}

/// An open pull request without author or timestamps.
#[must_use]
pub fn pull_request(id: u64, title: &str, source: &str, destination: &str) -> PullRequest {
    PullRequest {
        id,
        title: title.to_owned(),
        description: None,
        source_branch: source.to_owned(),
        destination_branch: destination.to_owned(),
        close_source_branch: false,
        state: Some(PullRequestState::Open),
        author: None,
        source_commit: None,
        created_on: None,
        updated_on: None,
    }
}

/// An open pull request authored by `author`.
#[must_use]
pub fn authored_pull_request(id: u64, author: &str) -> PullRequest {
    PullRequest {
        author: Some(user(author)),
        ..pull_request(id, &format!("Change {id}"), "feature", "main")
    }
}
