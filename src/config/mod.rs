//! Application configuration loaded from CLI, environment, and files.
//!
//! Values are merged with ortho-config's layered approach.
//!
//! # Precedence
//!
//! Configuration values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – Built-in application defaults
//! 2. **Configuration file** – `.bucketline.toml` in the current directory,
//!    home directory, or XDG config directory
//! 3. **Environment variables** – `BUCKETLINE_USERNAME`,
//!    `BUCKETLINE_PASSWORD`, and so on; the password also falls back to
//!    `BITBUCKET_APP_PASSWORD`
//! 4. **Command-line arguments** – `--username`/`-u`, `--password`/`-p`, ...
//!
//! # Configuration File
//!
//! ```toml
//! username = "alice"
//! host = "https://git.example.com"
//! enterprise = true
//! owner = "PROJ"
//! repo = "widgets"
//! per_page = 50
//! log_filter = "bucketline=debug"
//! ```

use std::env;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::bitbucket::credentials::Credentials;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::gateway::{DEFAULT_RETRY_ATTEMPTS, RetryPolicy};
use crate::bitbucket::pagination::DEFAULT_PAGE_SIZE;
use crate::bitbucket::repository::RepositoryRef;

/// Environment variable consulted when no password is configured.
pub const APP_PASSWORD_ENV: &str = "BITBUCKET_APP_PASSWORD";

const DEFAULT_LOG_FILTER: &str = "warn";

/// Operation mode determined by the configured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Create a pull request from the current checkout.
    CreatePullRequest,
    /// List one page of pull requests for a repository.
    ListPullRequests,
    /// List every git repository of the account and its teams.
    ListRepositories,
}

/// Application configuration supporting CLI, environment, and file sources.
///
/// # Example
///
/// ```no_run
/// use bucketline::BucketlineConfig;
/// use ortho_config::OrthoConfig;
///
/// let config = BucketlineConfig::load().expect("failed to load configuration");
/// let credentials = config.credentials().expect("credentials required");
/// assert!(!credentials.login().is_empty());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "BUCKETLINE",
    discovery(
        dotfile_name = ".bucketline.toml",
        config_file_name = "bucketline.toml",
        app_name = "bucketline"
    )
)]
pub struct BucketlineConfig {
    /// Bitbucket login.
    #[ortho_config(cli_short = 'u')]
    pub username: Option<String>,

    /// Password or app password.
    ///
    /// Falls back to `BITBUCKET_APP_PASSWORD` when unset.
    #[ortho_config(cli_short = 'p')]
    pub password: Option<String>,

    /// Bitbucket Server base URL, or an API base overriding Bitbucket Cloud.
    #[ortho_config(cli_short = 'H')]
    pub host: Option<String>,

    /// Connects to Bitbucket Server instead of Bitbucket Cloud.
    ///
    /// Can be provided via the CLI (`--enterprise` / `-e`) or a configuration
    /// file; `ortho_config` does not load booleans from the environment.
    #[ortho_config(cli_short = 'e')]
    pub enterprise: bool,

    /// Repository owner: user, workspace, or Server project key.
    #[ortho_config(cli_short = 'o')]
    pub owner: Option<String>,

    /// Repository name.
    #[ortho_config(cli_short = 'r')]
    pub repo: Option<String>,

    /// Page of pull requests to list, starting at 1.
    #[ortho_config()]
    pub page: u32,

    /// Pull requests per page, at most 100.
    #[ortho_config()]
    pub per_page: u8,

    /// Title of the pull request to create. Selects create mode.
    #[ortho_config(cli_short = 't')]
    pub title: Option<String>,

    /// Description of the pull request to create.
    #[ortho_config(cli_short = 'd')]
    pub description: Option<String>,

    /// Destination branch; defaults to the repository's default branch.
    #[ortho_config()]
    pub destination: Option<String>,

    /// Deletes the source branch after merge (Bitbucket Cloud only).
    #[ortho_config()]
    pub close_source_branch: bool,

    /// Attempts per GET request, including the first.
    #[ortho_config()]
    pub retry_attempts: u32,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[ortho_config()]
    pub log_filter: String,
}

impl Default for BucketlineConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            host: None,
            enterprise: false,
            owner: None,
            repo: None,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
            title: None,
            description: None,
            destination: None,
            close_source_branch: false,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl BucketlineConfig {
    /// Resolves the password from configuration or `BITBUCKET_APP_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] when no source provides
    /// a password.
    pub fn resolve_password(&self) -> Result<String, BitbucketError> {
        self.password
            .clone()
            .or_else(|| env::var(APP_PASSWORD_ENV).ok())
            .ok_or_else(|| BitbucketError::InvalidCredentials {
                message: format!(
                    "password is required (use --password or {APP_PASSWORD_ENV})"
                ),
            })
    }

    /// Returns the login or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] when no login is
    /// configured.
    pub fn require_username(&self) -> Result<&str, BitbucketError> {
        self.username
            .as_deref()
            .ok_or_else(|| BitbucketError::InvalidCredentials {
                message: "username is required (use --username or -u)".to_owned(),
            })
    }

    /// Builds login credentials for Bitbucket Cloud or Bitbucket Server.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidCredentials`] when the login or
    /// password is missing, or [`BitbucketError::Configuration`] when
    /// Bitbucket Server is selected without a host.
    pub fn credentials(&self) -> Result<Credentials, BitbucketError> {
        let login = self.require_username()?;
        let password = self.resolve_password()?;
        if !self.enterprise {
            return Ok(Credentials::cloud(login, password).with_host(self.host.clone()));
        }
        let host = self
            .host
            .as_deref()
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| BitbucketError::Configuration {
                message: "Bitbucket Server host is required (use --host)".to_owned(),
            })?;
        Ok(Credentials::server(login, password, host))
    }

    /// Determines the operation mode based on provided configuration.
    ///
    /// Returns `CreatePullRequest` when a title is set, `ListPullRequests`
    /// when both owner and repo are set, or `ListRepositories` otherwise.
    #[must_use]
    pub const fn operation_mode(&self) -> OperationMode {
        if self.title.is_some() {
            OperationMode::CreatePullRequest
        } else if self.owner.is_some() && self.repo.is_some() {
            OperationMode::ListPullRequests
        } else {
            OperationMode::ListRepositories
        }
    }

    /// Returns the configured repository.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when owner or repo is
    /// missing or blank.
    pub fn require_repository(&self) -> Result<RepositoryRef, BitbucketError> {
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => RepositoryRef::new(owner, repo),
            (None, _) => Err(BitbucketError::Configuration {
                message: "repository owner is required (use --owner or -o)".to_owned(),
            }),
            (_, None) => Err(BitbucketError::Configuration {
                message: "repository name is required (use --repo or -r)".to_owned(),
            }),
        }
    }

    /// Retry policy for GET requests.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.retry_attempts)
    }
}
