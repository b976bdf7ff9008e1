//! Construction of authenticated gateways during login.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::bitbucket::credentials::Credentials;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::User;

use super::retry::RetryPolicy;
use super::{BitbucketGateway, connect_gateway};

/// A verified gateway and the account it authenticates.
pub struct Connected {
    /// Gateway bound to the session's endpoint.
    pub gateway: Arc<dyn BitbucketGateway>,
    /// Account reported by Bitbucket for the credentials.
    pub user: User,
}

/// Turns credentials into a verified gateway.
///
/// This is the only step of a login that touches the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    /// Builds a gateway for the credentials and verifies them.
    async fn connect(&self, credentials: Credentials) -> Result<Connected, BitbucketError>;
}

/// Factory producing reqwest-backed gateways.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpGatewayFactory {
    retry: RetryPolicy,
}

impl HttpGatewayFactory {
    /// Creates a factory whose gateways use `retry` for GET requests.
    #[must_use]
    pub const fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

#[async_trait]
impl GatewayFactory for HttpGatewayFactory {
    async fn connect(&self, credentials: Credentials) -> Result<Connected, BitbucketError> {
        let endpoint = credentials.endpoint()?;
        let auth = credentials.into_authorization()?;
        let connected = connect_gateway(endpoint, &auth, self.retry).await?;
        info!(
            username = %connected.user.username,
            client = connected.gateway.client_type(),
            host = %connected.gateway.api_host(),
            "authenticated with Bitbucket"
        );
        Ok(connected)
    }
}
