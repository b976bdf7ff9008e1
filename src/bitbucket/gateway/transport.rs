//! Authenticated HTTP transport shared by the Cloud and Server gateways.

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::bitbucket::credentials::AuthHeader;
use crate::bitbucket::endpoint::Endpoint;
use crate::bitbucket::error::BitbucketError;

use super::error_mapping::{extract_message, map_decode_error, map_http_error, map_reqwest_error};
use super::retry::RetryPolicy;

const JSON: &str = "application/json";

/// Sends requests to one Bitbucket endpoint with a fixed `Authorization`
/// header.
pub(super) struct HttpTransport {
    client: Client,
    endpoint: Endpoint,
    authorization: HeaderValue,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub(super) fn new(
        endpoint: Endpoint,
        auth: &AuthHeader,
        retry: RetryPolicy,
    ) -> Result<Self, BitbucketError> {
        let client = Client::builder()
            .user_agent(concat!("bucketline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| BitbucketError::Network {
                message: format!("build client failed: {error}"),
            })?;
        Ok(Self {
            client,
            endpoint,
            authorization: auth.value().clone(),
            retry,
        })
    }

    pub(super) const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(super) fn url(&self, segments: &[&str]) -> Result<Url, BitbucketError> {
        self.endpoint.url(segments)
    }

    /// GETs and decodes a JSON body, retrying transient failures.
    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
    ) -> Result<T, BitbucketError> {
        let body = self
            .retry
            .run(operation, || {
                self.execute(operation, Method::GET, url.clone(), None)
            })
            .await?;
        serde_json::from_slice(&body).map_err(|error| map_decode_error(operation, &error))
    }

    /// GETs a plain-text body, retrying transient failures.
    pub(super) async fn get_text(&self, operation: &str, url: Url) -> Result<String, BitbucketError> {
        let body = self
            .retry
            .run(operation, || {
                self.execute(operation, Method::GET, url.clone(), None)
            })
            .await?;
        String::from_utf8(body).map_err(|error| BitbucketError::Mapping {
            message: format!("{operation}: {error}"),
        })
    }

    /// Sends a JSON body once and decodes the JSON response.
    pub(super) async fn send_json<B, T>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, BitbucketError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|error| map_decode_error(operation, &error))?;
        let response = self.execute(operation, method, url, Some(payload)).await?;
        serde_json::from_slice(&response).map_err(|error| map_decode_error(operation, &error))
    }

    /// Sends a bodiless request once and returns the decoded body, or `None`
    /// when the response is empty.
    pub(super) async fn send_empty<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
    ) -> Result<Option<T>, BitbucketError> {
        let response = self.execute(operation, method, url, None).await?;
        if response.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&response)
            .map(Some)
            .map_err(|error| map_decode_error(operation, &error))
    }

    async fn execute(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, BitbucketError> {
        debug!(operation, %method, %url, "sending Bitbucket request");
        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, JSON);
        if let Some(payload) = body {
            request = request.header(CONTENT_TYPE, JSON).body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }
        debug!(operation, status = status.as_u16(), "Bitbucket request failed");
        Err(map_http_error(operation, status, extract_message(&bytes)))
    }
}
