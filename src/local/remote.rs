//! Remote URL parsing for Bitbucket origins.
//!
//! Cloud remotes look like `git@bitbucket.org:owner/repo.git` or
//! `https://user@bitbucket.org/owner/repo.git`. Server remotes put the
//! project key before the slug, either under `/scm/` for HTTP
//! (`https://host/scm/PROJ/repo.git`) or directly for SSH
//! (`ssh://git@host:7999/proj/repo.git`).

use super::error::LocalRepositoryError;

/// Host, owner and repository parsed from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrigin {
    host: String,
    owner: String,
    name: String,
}

impl RemoteOrigin {
    /// Host name, lowercased.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Owner: user, workspace, or Server project key.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository slug without the `.git` suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Parses a remote URL into its host, owner and repository.
///
/// The last two path segments are taken as owner and repository, so Server
/// context paths and the `/scm/` prefix are skipped.
///
/// # Errors
///
/// Returns [`LocalRepositoryError::InvalidRemoteUrl`] when the URL has no
/// host or fewer than two path segments.
pub fn parse_remote_url(url: &str) -> Result<RemoteOrigin, LocalRepositoryError> {
    let trimmed = url.trim();
    try_parse_scp_style(trimmed)
        .or_else(|| try_parse_url_style(trimmed))
        .ok_or_else(|| LocalRepositoryError::InvalidRemoteUrl {
            url: url.to_owned(),
        })
}

/// `user@host:path`, which has no scheme and no port.
fn try_parse_scp_style(url: &str) -> Option<RemoteOrigin> {
    if url.contains("://") {
        return None;
    }
    let (authority, path) = url.split_once(':')?;
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    if host.contains('/') {
        return None;
    }
    origin_from_path(host, path)
}

fn try_parse_url_style(url: &str) -> Option<RemoteOrigin> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    origin_from_path(host, parsed.path())
}

fn origin_from_path(host: &str, path: &str) -> Option<RemoteOrigin> {
    if host.is_empty() {
        return None;
    }
    let mut segments = path.split('/').filter(|segment| !segment.is_empty()).rev();
    let repository = segments.next()?;
    let owner = segments.next()?;
    let name = repository.strip_suffix(".git").unwrap_or(repository);
    if name.is_empty() {
        return None;
    }
    Some(RemoteOrigin {
        host: host.to_lowercase(),
        owner: owner.to_owned(),
        name: name.to_owned(),
    })
}
