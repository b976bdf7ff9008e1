//! Support modules for the pull request workflow BDD tests.

pub(crate) mod checkout;
pub(crate) mod state;

pub(crate) use checkout::create_checkout;
pub(crate) use state::{CreationState, RecordingNavigator, ensure_runtime_and_server, server_uri};
