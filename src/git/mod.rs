//! Git operations abstraction layer
//!
//! The pipeline depends on the [Repository] trait rather than on `git2`
//! directly. Implementations:
//!
//! - [repository::Git2Repository]: real repository backed by the `git2` crate
//! - [mock::MockRepository]: in-memory stand-in recording every side effect
//!
//! ```rust
//! # use pyrelease::git::Repository;
//! # fn example<R: Repository>(repo: &R) -> pyrelease::Result<()> {
//! let tags = repo.list_tags()?;
//! if repo.tag_exists("v1.0.0")? {
//!     println!("v1.0.0 is already released ({} tags total)", tags.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use git2::Oid;
use std::path::PathBuf;

/// Credentials used for fetch and push.
///
/// With a token, HTTPS remotes authenticate as `username` with the token as
/// password. SSH remotes use the SSH agent. Otherwise git's default
/// credential lookup applies.
#[derive(Clone, Default, PartialEq)]
pub struct RemoteAuth {
    pub username: String,
    pub token: Option<String>,
}

impl RemoteAuth {
    pub fn anonymous() -> Self {
        RemoteAuth::default()
    }

    pub fn token(username: impl Into<String>, token: impl Into<String>) -> Self {
        RemoteAuth {
            username: username.into(),
            token: Some(token.into()),
        }
    }
}

impl std::fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAuth")
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Request to commit a directory's contents into a branch under a subpath.
#[derive(Debug, Clone, PartialEq)]
pub struct TreePublish {
    /// Local branch to commit on, created when missing.
    pub branch: String,
    /// Remote whose tracking branch seeds a missing local branch.
    pub remote: String,
    /// Subpath in the branch replaced by `source`; empty means the root.
    pub destination: String,
    pub source: PathBuf,
    pub message: String,
    /// Commit even when the resulting tree equals the parent's.
    pub allow_empty: bool,
}

/// Git operations needed by the release pipeline.
///
/// All methods return [crate::error::Result<T>]; implementations map
/// `git2::Error` into [crate::error::ReleaseError].
pub trait Repository {
    /// Root of the working tree.
    fn workdir(&self) -> Result<PathBuf>;

    /// All tag names in the repository.
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Whether a tag with exactly this name exists.
    fn tag_exists(&self, name: &str) -> Result<bool>;

    /// Create an annotated tag on HEAD. Fails when the tag already exists.
    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid>;

    fn fetch(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()>;

    fn push(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()>;

    /// Commit `request.source` into `request.branch` under `request.destination`.
    ///
    /// Returns the new commit id, or `None` when nothing changed and empty
    /// commits are not allowed.
    fn publish_tree(&self, request: &TreePublish) -> Result<Option<Oid>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_debug_hides_token() {
        let auth = RemoteAuth::token("x-access-token", "ghp_secret");
        let shown = format!("{:?}", auth);
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn test_anonymous_has_no_token() {
        assert_eq!(RemoteAuth::anonymous().token, None);
    }
}
