//! Bitbucket Cloud and Bitbucket Server access.
//!
//! Credentials open a [`CredentialSession`], which holds one gateway for the
//! endpoint chosen at login. [`BitbucketClient`] borrows that gateway per call
//! and returns domain models; wire schemas never leave the [`gateway`] and
//! [`models`] modules.

pub mod client;
pub mod credentials;
pub mod diff;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod session;

pub use client::BitbucketClient;
pub use credentials::{AuthHeader, ConnectionState, Credentials};
pub use diff::{DiffHunk, DiffLine, DiffLineKind, FileDiff, parse_unified_diff};
pub use endpoint::Endpoint;
pub use error::BitbucketError;
pub use gateway::{
    BitbucketGateway, CloudGateway, Connected, GatewayFactory, HttpGatewayFactory, RetryPolicy,
    ServerGateway,
};
pub use models::{
    ApprovalOutcome, Branch, Comment, Commit, NewPullRequest, NewRepository, PullRequest,
    PullRequestState, RemoteRepository, Team, User,
};
pub use pagination::{PageInfo, PageRequest, PagedResult};
pub use repository::{RepositoryName, RepositoryOwner, RepositoryRef};
pub use session::CredentialSession;
