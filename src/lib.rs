//! Bucketline library crate for Bitbucket pull request workflows.
//!
//! The library talks to Bitbucket Cloud and Bitbucket Server through one
//! client facade, keeps the credentialed session, and drives pull request
//! creation from the local checkout with branch validation.

pub mod bitbucket;
pub mod config;
pub mod events;
pub mod local;
pub mod logging;
pub mod workflow;

pub use bitbucket::{
    BitbucketClient, BitbucketError, ConnectionState, CredentialSession, Credentials,
    HttpGatewayFactory, RepositoryRef,
};
pub use config::{BucketlineConfig, OperationMode};
pub use events::{Event, EventBus, EventKind};
pub use local::{Git2RepositoryProvider, LocalRepositoryProvider};
pub use workflow::{CreatePullRequestWorkflow, Navigator, PullRequestService, SubmitOutcome};
