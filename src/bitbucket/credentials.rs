//! Login credentials and the connection record derived from them.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;

use super::endpoint::Endpoint;
use super::error::BitbucketError;

/// Credentials supplied by the user for one login attempt.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
    host: Option<String>,
    is_enterprise: bool,
}

impl Credentials {
    /// Creates credentials for Bitbucket Cloud.
    #[must_use]
    pub fn cloud(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            host: None,
            is_enterprise: false,
        }
    }

    /// Creates credentials for a Bitbucket Server instance at `host`.
    #[must_use]
    pub fn server(
        login: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            host: Some(host.into()),
            is_enterprise: true,
        }
    }

    /// Overrides the API host; used to point Cloud credentials at a mirror.
    #[must_use]
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host.filter(|value| !value.trim().is_empty());
        self
    }

    /// Login name.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Configured host, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether these credentials target Bitbucket Server.
    #[must_use]
    pub const fn is_enterprise(&self) -> bool {
        self.is_enterprise
    }

    /// Checks that login and password are present.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] naming the empty field.
    pub fn validate(&self) -> Result<(), BitbucketError> {
        if self.login.trim().is_empty() {
            return Err(BitbucketError::InvalidCredentials {
                message: "login must not be empty".to_owned(),
            });
        }
        if self.password.is_empty() {
            return Err(BitbucketError::InvalidCredentials {
                message: "password must not be empty".to_owned(),
            });
        }
        if self.is_enterprise && self.host.as_deref().is_none_or(|host| host.trim().is_empty()) {
            return Err(BitbucketError::InvalidCredentials {
                message: "Bitbucket Server requires a host".to_owned(),
            });
        }
        Ok(())
    }

    /// Resolves the API endpoint for these credentials.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidUrl`] when the host cannot be parsed.
    pub fn endpoint(&self) -> Result<Endpoint, BitbucketError> {
        Endpoint::resolve(self.host.as_deref(), self.is_enterprise)
    }

    /// Consumes the credentials into a sensitive Basic `Authorization`
    /// header, dropping the plaintext password.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] when the encoded value
    /// is not a valid header.
    pub fn into_authorization(self) -> Result<AuthHeader, BitbucketError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.login, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|error| {
            BitbucketError::InvalidCredentials {
                message: format!("credentials cannot be sent: {error}"),
            }
        })?;
        value.set_sensitive(true);
        Ok(AuthHeader {
            login: self.login,
            value,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("is_enterprise", &self.is_enterprise)
            .finish()
    }
}

/// Encoded `Authorization` header plus the login it was built from.
#[derive(Clone)]
pub struct AuthHeader {
    login: String,
    value: HeaderValue,
}

impl AuthHeader {
    /// Login the header authenticates.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Header value, marked sensitive.
    #[must_use]
    pub const fn value(&self) -> &HeaderValue {
        &self.value
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("login", &self.login)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Connection record published on login and logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// Whether a session is active.
    pub is_logged_in: bool,
    /// Username reported by Bitbucket for the session.
    pub username: Option<String>,
    /// Host from the credentials, or the API host when none was configured.
    pub host: Option<String>,
    /// Whether the session targets Bitbucket Server.
    pub is_enterprise: bool,
}

impl ConnectionState {
    /// The canonical disconnected state.
    #[must_use]
    pub const fn not_logged_in() -> Self {
        Self {
            is_logged_in: false,
            username: None,
            host: None,
            is_enterprise: false,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::not_logged_in()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BitbucketError, Credentials};

    #[rstest]
    #[case::empty_login(Credentials::cloud("", "secret"))]
    #[case::blank_login(Credentials::cloud("  ", "secret"))]
    #[case::empty_password(Credentials::cloud("alice", ""))]
    #[case::server_without_host(Credentials::server("alice", "secret", ""))]
    fn rejects_incomplete_credentials(#[case] credentials: Credentials) {
        let result = credentials.validate();
        assert!(
            matches!(result, Err(BitbucketError::InvalidCredentials { .. })),
            "expected InvalidCredentials, got {result:?}"
        );
    }

    #[rstest]
    fn debug_output_redacts_password() {
        let credentials = Credentials::cloud("alice", "hunter2");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[rstest]
    fn authorization_header_is_basic_and_sensitive() {
        let header = Credentials::cloud("alice", "secret")
            .into_authorization()
            .expect("header should build");
        assert_eq!(header.login(), "alice");
        assert!(header.value().is_sensitive());
        assert_eq!(
            header.value().to_str().ok(),
            Some("Basic YWxpY2U6c2VjcmV0")
        );
        assert!(!format!("{header:?}").contains("YWxpY2U6c2VjcmV0"));
    }
}
