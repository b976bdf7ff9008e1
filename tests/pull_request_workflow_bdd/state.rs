//! Scenario state and runtime/server initialisation for the pull request
//! workflow BDD tests.

use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use bucketline::bitbucket::{BitbucketError, CredentialSession};
use bucketline::{CreatePullRequestWorkflow, Navigator, SubmitOutcome};
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::MockServer;

/// Runtime handle that can be stored in an `rstest-bdd` Slot.
#[derive(Clone)]
pub(crate) struct SharedRuntime(Rc<Runtime>);

impl SharedRuntime {
    pub(crate) fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.0.block_on(future)
    }
}

/// Navigator that remembers every request to leave the form.
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    calls: Mutex<Vec<bool>>,
}

impl RecordingNavigator {
    pub(crate) fn calls(&self) -> Vec<bool> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_back(&self, success: bool) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(success);
    }
}

#[derive(ScenarioState, Default)]
pub(crate) struct CreationState {
    pub(crate) runtime: Slot<SharedRuntime>,
    pub(crate) server: Slot<MockServer>,
    pub(crate) checkout: Slot<TempDir>,
    pub(crate) local_tip: Slot<String>,
    pub(crate) session: Slot<Arc<CredentialSession>>,
    pub(crate) navigator: Slot<Arc<RecordingNavigator>>,
    pub(crate) workflow: Slot<CreatePullRequestWorkflow>,
    pub(crate) outcome: Slot<SubmitOutcome>,
    pub(crate) login_error: Slot<BitbucketError>,
}

/// Ensures the runtime and server are initialised in `CreationState`.
pub(crate) fn ensure_runtime_and_server(creation_state: &CreationState) -> SharedRuntime {
    if creation_state.runtime.with_ref(|_| ()).is_none() {
        let runtime = Runtime::new()
            .unwrap_or_else(|error| panic!("failed to create Tokio runtime: {error}"));
        creation_state.runtime.set(SharedRuntime(Rc::new(runtime)));
    }

    let shared_runtime = creation_state
        .runtime
        .get()
        .unwrap_or_else(|| panic!("runtime not initialised after set"));

    if creation_state.server.with_ref(|_| ()).is_none() {
        creation_state
            .server
            .set(shared_runtime.block_on(MockServer::start()));
    }

    shared_runtime
}

/// Base URL of the mock server, used as the Cloud API host override.
pub(crate) fn server_uri(creation_state: &CreationState) -> String {
    creation_state
        .server
        .with_ref(MockServer::uri)
        .unwrap_or_else(|| panic!("mock server not initialised"))
}
