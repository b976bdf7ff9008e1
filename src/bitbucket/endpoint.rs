//! API endpoint selection for Bitbucket Cloud and Bitbucket Server.

use url::Url;

use super::error::BitbucketError;

/// Base URL of the public Bitbucket Cloud REST API.
pub const CLOUD_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Path of the REST API below a Bitbucket Server host.
pub const SERVER_API_PATH: &str = "rest/api/1.0";

/// API flavour and base URL, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Bitbucket Cloud (`api.bitbucket.org/2.0` unless overridden).
    Cloud {
        /// Base URL every request path is joined to.
        api_base: Url,
    },
    /// Bitbucket Server / Data Center.
    Server {
        /// Base URL every request path is joined to.
        api_base: Url,
    },
}

impl Endpoint {
    /// Resolves the endpoint from an optional host and the enterprise flag.
    ///
    /// Cloud uses `host` as the full API base when given, otherwise the
    /// public API. Server appends `/rest/api/1.0` to the host.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidUrl`] when the host does not parse,
    /// and [`BitbucketError::Configuration`] for Server without a host.
    pub fn resolve(host: Option<&str>, is_enterprise: bool) -> Result<Self, BitbucketError> {
        let trimmed = host.map(str::trim).filter(|value| !value.is_empty());
        if is_enterprise {
            let server_host = trimmed.ok_or_else(|| BitbucketError::Configuration {
                message: "Bitbucket Server requires a host".to_owned(),
            })?;
            let api_base = parse_base(&format!(
                "{}/{SERVER_API_PATH}",
                with_scheme(server_host).trim_end_matches('/')
            ))?;
            return Ok(Self::Server { api_base });
        }

        let api_base = parse_base(&trimmed.map_or_else(|| CLOUD_API_BASE.to_owned(), with_scheme))?;
        Ok(Self::Cloud { api_base })
    }

    /// Base URL of the API.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        match self {
            Self::Cloud { api_base } | Self::Server { api_base } => api_base,
        }
    }

    /// Host name of the API, used for origin checks and connection state.
    #[must_use]
    pub fn api_host(&self) -> String {
        self.api_base().host_str().unwrap_or_default().to_owned()
    }

    /// Whether this is a Bitbucket Server endpoint.
    #[must_use]
    pub const fn is_enterprise(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Short name of the client flavour: `cloud` or `server`.
    #[must_use]
    pub const fn client_type(&self) -> &'static str {
        match self {
            Self::Cloud { .. } => "cloud",
            Self::Server { .. } => "server",
        }
    }

    /// Joins path segments onto the API base.
    ///
    /// Segments are percent-encoded individually, so owners such as
    /// `~alice` and branch names containing `/` stay one segment.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidUrl`] when the base cannot carry a
    /// path.
    pub fn url(&self, segments: &[&str]) -> Result<Url, BitbucketError> {
        let mut url = self.api_base().clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| BitbucketError::InvalidUrl(self.api_base().to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }
}

fn with_scheme(host: &str) -> String {
    if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}

fn parse_base(raw: &str) -> Result<Url, BitbucketError> {
    Url::parse(raw.trim_end_matches('/')).map_err(|error| BitbucketError::InvalidUrl(format!("{raw}: {error}")))
}
