//! Temporary Git checkouts with a Bitbucket origin.

use git2::{BranchType, Repository, Signature};
use tempfile::TempDir;

/// Creates a checkout of `owner/name` whose `branch` tracks
/// `origin/<upstream>`, returning the directory and the branch tip.
///
/// # Panics
///
/// Panics if the repository cannot be created.
#[expect(
    clippy::expect_used,
    reason = "integration test helper; allow-expect-in-tests does not cover integration tests"
)]
pub(crate) fn create_checkout(
    owner: &str,
    name: &str,
    branch: &str,
    upstream: &str,
) -> (TempDir, String) {
    let temp_dir = TempDir::new().expect("should create temp directory");
    let repo = Repository::init(temp_dir.path()).expect("should init repository");
    repo.remote("origin", &format!("https://bitbucket.org/{owner}/{name}.git"))
        .expect("should add origin remote");

    let signature = Signature::now("Alice", "alice@example.com").expect("valid signature");
    let tree_id = repo
        .index()
        .and_then(|mut index| index.write_tree())
        .expect("should write tree");
    let tree = repo.find_tree(tree_id).expect("tree should exist");
    let branch_ref = format!("refs/heads/{branch}");
    let tip = repo
        .commit(Some(&branch_ref), &signature, &signature, "initial", &tree, &[])
        .expect("should commit");
    repo.set_head(&branch_ref).expect("should move HEAD");

    repo.reference(
        &format!("refs/remotes/origin/{upstream}"),
        tip,
        true,
        "seed remote-tracking branch",
    )
    .expect("should create remote-tracking ref");
    repo.find_branch(branch, BranchType::Local)
        .and_then(|mut local| local.set_upstream(Some(&format!("origin/{upstream}"))))
        .expect("should set upstream");

    (temp_dir, tip.to_string())
}
