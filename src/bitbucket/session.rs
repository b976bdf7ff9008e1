//! Credentialed session lifecycle.
//!
//! A [`CredentialSession`] holds at most one authenticated gateway. The
//! gateway is shared read-only with the client facade; only [`login`] and
//! [`logout`] replace it.
//!
//! [`login`]: CredentialSession::login
//! [`logout`]: CredentialSession::logout

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::credentials::{ConnectionState, Credentials};
use super::error::BitbucketError;
use super::gateway::{BitbucketGateway, GatewayFactory};
use crate::events::{Event, EventBus};

#[derive(Default)]
struct SessionSlot {
    gateway: Option<Arc<dyn BitbucketGateway>>,
    state: ConnectionState,
}

/// Owns the authenticated gateway and the connection record.
pub struct CredentialSession {
    factory: Arc<dyn GatewayFactory>,
    events: Arc<EventBus>,
    slot: RwLock<SessionSlot>,
}

impl CredentialSession {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(factory: Arc<dyn GatewayFactory>, events: Arc<EventBus>) -> Self {
        Self {
            factory,
            events,
            slot: RwLock::new(SessionSlot::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSlot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs in, verifying the credentials against Bitbucket.
    ///
    /// Returns the current state without contacting Bitbucket when already
    /// connected. Empty credentials are rejected before any request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] for empty fields,
    /// [`BitbucketError::Authentication`] when Bitbucket rejects them, or the
    /// transport error that prevented verification.
    pub async fn login(&self, credentials: Credentials) -> Result<ConnectionState, BitbucketError> {
        {
            let slot = self.read();
            if slot.gateway.is_some() {
                debug!("login requested while connected; keeping current session");
                return Ok(slot.state.clone());
            }
        }
        credentials.validate()?;

        let is_enterprise = credentials.is_enterprise();
        let configured_host = credentials.host().map(str::to_owned);
        let connected = self.factory.connect(credentials).await?;
        let state = ConnectionState {
            is_logged_in: true,
            username: Some(connected.user.username),
            host: Some(configured_host.unwrap_or_else(|| connected.gateway.api_host())),
            is_enterprise,
        };
        {
            let mut slot = self.write();
            slot.gateway = Some(connected.gateway);
            slot.state = state.clone();
        }
        info!(
            username = state.username.as_deref().unwrap_or_default(),
            is_enterprise,
            "logged in"
        );
        self.events.publish(&Event::ConnectionChanged(state.clone()));
        Ok(state)
    }

    /// Drops the gateway and resets the connection record.
    pub fn logout(&self) {
        {
            let mut slot = self.write();
            slot.gateway = None;
            slot.state = ConnectionState::not_logged_in();
        }
        info!("logged out");
        self.events
            .publish(&Event::ConnectionChanged(ConnectionState::not_logged_in()));
    }

    /// True while a gateway is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.read().gateway.is_some()
    }

    /// Snapshot of the connection record.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.read().state.clone()
    }

    /// `cloud` or `server` while connected.
    #[must_use]
    pub fn git_client_type(&self) -> Option<&'static str> {
        self.read()
            .gateway
            .as_ref()
            .map(|gateway| gateway.client_type())
    }

    /// The authenticated gateway.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::NotAuthenticated`] when disconnected.
    pub fn gateway(&self) -> Result<Arc<dyn BitbucketGateway>, BitbucketError> {
        self.read()
            .gateway
            .clone()
            .ok_or(BitbucketError::NotAuthenticated)
    }
}
