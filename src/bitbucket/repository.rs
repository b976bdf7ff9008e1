//! Identity wrappers for repository coordinates.

use std::fmt;

use super::error::BitbucketError;

/// Repository owner (user, team, workspace, or Server project key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    /// Validates that the owner is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when the value is blank.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BitbucketError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(BitbucketError::Configuration {
                message: "repository owner must not be empty".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the owner value.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository name (the slug used in API paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Validates that the name is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when the value is blank.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BitbucketError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(BitbucketError::Configuration {
                message: "repository name must not be empty".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the repository name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Owner and name of a remote repository.
///
/// # Example
///
/// ```
/// use bucketline::RepositoryRef;
///
/// let repo = RepositoryRef::new("atlassian", "stash-example-plugin")
///     .expect("owner and name are non-empty");
/// assert_eq!(repo.to_string(), "atlassian/stash-example-plugin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    owner: RepositoryOwner,
    name: RepositoryName,
}

impl RepositoryRef {
    /// Creates a reference from owner and repository name strings.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when either part is blank.
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self, BitbucketError> {
        Ok(Self {
            owner: RepositoryOwner::new(owner)?,
            name: RepositoryName::new(name)?,
        })
    }

    /// Repository owner.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub const fn name(&self) -> &RepositoryName {
        &self.name
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner.as_str(), self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BitbucketError, RepositoryRef};

    #[rstest]
    #[case::blank_owner("", "repo")]
    #[case::whitespace_owner("   ", "repo")]
    #[case::blank_name("owner", "")]
    fn rejects_blank_parts(#[case] owner: &str, #[case] name: &str) {
        let result = RepositoryRef::new(owner, name);
        assert!(
            matches!(result, Err(BitbucketError::Configuration { .. })),
            "expected Configuration error, got {result:?}"
        );
    }

    #[rstest]
    fn trims_surrounding_whitespace() {
        let repo = RepositoryRef::new(" team ", " api ").expect("should accept padded values");
        assert_eq!(repo.owner().as_str(), "team");
        assert_eq!(repo.name().as_str(), "api");
    }
}
