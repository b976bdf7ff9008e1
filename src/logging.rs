//! Tracing subscriber setup for the binary.
//!
//! Events go to stderr so that command output on stdout stays parseable.
//! `RUST_LOG` takes precedence over the configured filter.

use std::env;
use std::io;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the configuration is usable.
pub const FALLBACK_FILTER: &str = "warn";

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TryInitError`] when a global subscriber is already installed.
pub fn init_tracing(configured_filter: &str) -> Result<(), TryInitError> {
    let from_env = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(from_env.as_deref(), configured_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init()
}

fn build_filter(from_env: Option<&str>, configured: &str) -> EnvFilter {
    [from_env, Some(configured)]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::build_filter;

    #[rstest]
    #[case::env_wins(Some("debug"), "warn", "debug")]
    #[case::configured_when_env_unset(None, "bucketline=info", "bucketline=info")]
    #[case::configured_when_env_blank(Some("  "), "info", "info")]
    #[case::configured_when_env_invalid(Some("bucketline=loud"), "info", "info")]
    #[case::fallback_when_both_invalid(None, "bucketline=loud", "warn")]
    #[case::fallback_when_both_empty(None, "", "warn")]
    fn picks_first_usable_filter(
        #[case] from_env: Option<&str>,
        #[case] configured: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(build_filter(from_env, configured).to_string(), expected);
    }
}
