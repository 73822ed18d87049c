use crate::error::{ReleaseError, Result};
use crate::git::{RemoteAuth, TreePublish};
use git2::{BranchType, ErrorCode, ObjectType, Oid, Repository as Git2Repo, Signature, Tree};
use std::fs;
use std::path::{Path, PathBuf};

const MODE_TREE: i32 = 0o040000;
const MODE_BLOB: i32 = 0o100644;
const MODE_BLOB_EXECUTABLE: i32 = 0o100755;

/// libgit2 keeps asking for credentials while they are rejected.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now("pyrelease", "pyrelease@localhost")?),
        }
    }

    /// Tip of `branch`, preferring the remote-tracking ref over the local one.
    fn branch_tip(&self, branch: &str, remote: &str) -> Result<Option<git2::Commit<'_>>> {
        let tracking = format!("refs/remotes/{}/{}", remote, branch);
        match self.repo.find_reference(&tracking) {
            Ok(reference) => return Ok(Some(reference.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match self.repo.find_branch(branch, BranchType::Local) {
            Ok(local) => Ok(Some(local.get().peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `dir` as a tree object. `None` when the directory holds no files.
    fn write_dir_tree(&self, dir: &Path) -> Result<Option<Oid>> {
        let mut builder = self.repo.treebuilder(None)?;
        let mut entries = 0usize;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| {
                ReleaseError::docs(format!("Non UTF-8 file name in {}", dir.display()))
            })?;
            let metadata = fs::metadata(&path)?;

            if metadata.is_dir() {
                if let Some(oid) = self.write_dir_tree(&path)? {
                    builder.insert(name, oid, MODE_TREE)?;
                    entries += 1;
                }
            } else {
                let oid = self.repo.blob_path(&path)?;
                builder.insert(name, oid, file_mode(&metadata))?;
                entries += 1;
            }
        }

        if entries == 0 {
            return Ok(None);
        }
        Ok(Some(builder.write()?))
    }

    /// Rebuild `base` with the subtree at `components` replaced by `new`
    /// (removed when `new` is `None`).
    fn replace_subtree(
        &self,
        base: Option<&Tree<'_>>,
        components: &[&str],
        new: Option<Oid>,
    ) -> Result<Oid> {
        let mut builder = self.repo.treebuilder(base)?;

        let Some((&head, rest)) = components.split_first() else {
            return match new {
                Some(oid) => Ok(oid),
                None => Ok(self.repo.treebuilder(None)?.write()?),
            };
        };

        let replacement = if rest.is_empty() {
            new
        } else {
            let existing = match builder.get(head)? {
                Some(entry) if entry.kind() == Some(ObjectType::Tree) => Some(entry.id()),
                _ => None,
            };
            let child = existing.map(|oid| self.repo.find_tree(oid)).transpose()?;
            let oid = self.replace_subtree(child.as_ref(), rest, new)?;
            if self.repo.find_tree(oid)?.len() == 0 {
                None
            } else {
                Some(oid)
            }
        };

        match replacement {
            Some(oid) => {
                builder.insert(head, oid, MODE_TREE)?;
            }
            None => {
                if builder.get(head)?.is_some() {
                    builder.remove(head)?;
                }
            }
        }

        Ok(builder.write()?)
    }

    fn callbacks<'a>(auth: &'a RemoteAuth) -> git2::RemoteCallbacks<'a> {
        let mut callbacks = git2::RemoteCallbacks::new();
        let mut attempts = 0usize;

        callbacks.credentials(move |_url, username_from_url, allowed_types| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication rejected"));
            }

            if let Some(token) = auth.token.as_deref() {
                if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                    return git2::Cred::userpass_plaintext(&auth.username, token);
                }
            }

            if allowed_types.contains(git2::CredentialType::SSH_KEY) {
                return git2::Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
            }

            git2::Cred::default()
        });

        callbacks
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        MODE_BLOB_EXECUTABLE
    } else {
        MODE_BLOB
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> i32 {
    MODE_BLOB
}

impl super::Repository for Git2Repository {
    fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| ReleaseError::config("Repository has no working directory"))
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;

        Ok(tags.iter().flatten().map(|s| s.to_string()).collect())
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        match self.repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            // Names git refuses as ref names cannot exist as tags either.
            Err(e) if e.code() == ErrorCode::InvalidSpec => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid> {
        let head = self.repo.head()?.peel_to_commit()?;
        let signature = self.signature()?;

        let oid = self
            .repo
            .tag(name, head.as_object(), &signature, message, false)
            .map_err(|e| {
                if e.code() == ErrorCode::Exists {
                    ReleaseError::TagExists(name.to_string())
                } else {
                    ReleaseError::Git(e)
                }
            })?;

        Ok(oid)
    }

    fn fetch(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()> {
        let mut remote_handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::remote(format!("Cannot find remote '{}': {}", remote, e)))?;

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(Self::callbacks(auth));

        remote_handle
            .fetch(refspecs, Some(&mut fetch_options), None)
            .map_err(|e| ReleaseError::remote(format!("Fetch from '{}' failed: {}", remote, e)))?;

        Ok(())
    }

    fn push(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()> {
        let mut remote_handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| ReleaseError::remote(format!("Cannot find remote '{}': {}", remote, e)))?;

        let mut callbacks = Self::callbacks(auth);
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote_handle
            .push(refspecs, Some(&mut push_options))
            .map_err(|e| match e.class() {
                git2::ErrorClass::Net => {
                    ReleaseError::remote(format!("Network error during push: {}", e))
                }
                _ => ReleaseError::remote(format!("Push to '{}' failed: {}", remote, e)),
            })?;

        Ok(())
    }

    fn publish_tree(&self, request: &TreePublish) -> Result<Option<Oid>> {
        let parent = self.branch_tip(&request.branch, &request.remote)?;
        let parent_tree = parent.as_ref().map(|c| c.tree()).transpose()?;

        let components: Vec<&str> = request
            .destination
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();
        let content = self.write_dir_tree(&request.source)?;
        let tree_oid = self.replace_subtree(parent_tree.as_ref(), &components, content)?;

        let unchanged = parent_tree.as_ref().map(|t| t.id()) == Some(tree_oid);
        if unchanged && !request.allow_empty {
            return Ok(None);
        }

        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let commit = self.repo.commit(
            None,
            &signature,
            &signature,
            &request.message,
            &tree,
            &parents,
        )?;

        self.repo.reference(
            &format!("refs/heads/{}", request.branch),
            commit,
            true,
            &request.message,
        )?;

        Ok(Some(commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, Git2Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Git2Repo::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        (dir, Git2Repository::from_git2(repo))
    }

    fn commit_file(repo: &Git2Repository, name: &str, content: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.repo.signature().unwrap();
        let parent = repo.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.repo
            .commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_annotated_tag_and_exact_lookup() {
        let (_dir, repo) = init_repo();
        commit_file(&repo, "README.md", "hello\n");

        repo.create_annotated_tag("v1.2.3", "Release v1.2.3").unwrap();

        assert!(repo.tag_exists("v1.2.3").unwrap());
        assert!(!repo.tag_exists("v1.2.30").unwrap());
        assert!(!repo.tag_exists("v1.2").unwrap());
        assert_eq!(repo.list_tags().unwrap(), vec!["v1.2.3".to_string()]);

        let reference = repo.repo.find_reference("refs/tags/v1.2.3").unwrap();
        let tag = reference.peel_to_tag().unwrap();
        assert_eq!(tag.message(), Some("Release v1.2.3"));
    }

    #[test]
    fn test_duplicate_tag_is_tag_exists() {
        let (_dir, repo) = init_repo();
        commit_file(&repo, "README.md", "hello\n");
        repo.create_annotated_tag("v1.0.0", "first").unwrap();

        let err = repo.create_annotated_tag("v1.0.0", "again").unwrap_err();
        assert!(matches!(err, ReleaseError::TagExists(_)));
    }

    #[test]
    fn test_publish_tree_creates_branch_under_destination() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "README.md", "hello\n");

        let site = dir.path().join("site");
        fs::create_dir_all(site.join("api")).unwrap();
        fs::write(site.join("index.html"), "<h1>docs</h1>").unwrap();
        fs::write(site.join("api/index.html"), "<h1>api</h1>").unwrap();

        let request = TreePublish {
            branch: "gh-pages".to_string(),
            remote: "origin".to_string(),
            destination: "docs".to_string(),
            source: site,
            message: "Deploy".to_string(),
            allow_empty: true,
        };
        let oid = repo.publish_tree(&request).unwrap().unwrap();

        let commit = repo.repo.find_commit(oid).unwrap();
        assert_eq!(commit.parent_count(), 0);
        let tree = commit.tree().unwrap();
        assert!(tree.get_path(Path::new("docs/index.html")).is_ok());
        assert!(tree.get_path(Path::new("docs/api/index.html")).is_ok());
        assert!(tree.get_path(Path::new("README.md")).is_err());

        let branch = repo.repo.find_branch("gh-pages", BranchType::Local).unwrap();
        assert_eq!(branch.get().target(), Some(oid));
    }

    #[test]
    fn test_publish_tree_keeps_content_outside_destination() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "README.md", "hello\n");

        let site = dir.path().join("site");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("index.html"), "v1").unwrap();

        let mut request = TreePublish {
            branch: "gh-pages".to_string(),
            remote: "origin".to_string(),
            destination: "other".to_string(),
            source: site.clone(),
            message: "first".to_string(),
            allow_empty: true,
        };
        repo.publish_tree(&request).unwrap();

        fs::write(site.join("index.html"), "v2").unwrap();
        request.destination = "docs".to_string();
        request.message = "second".to_string();
        let oid = repo.publish_tree(&request).unwrap().unwrap();

        let commit = repo.repo.find_commit(oid).unwrap();
        assert_eq!(commit.parent_count(), 1);
        let tree = commit.tree().unwrap();
        assert!(tree.get_path(Path::new("other/index.html")).is_ok());
        assert!(tree.get_path(Path::new("docs/index.html")).is_ok());
    }

    #[test]
    fn test_publish_tree_unchanged_respects_empty_allowance() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "README.md", "hello\n");

        let site = dir.path().join("site");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("index.html"), "same").unwrap();

        let mut request = TreePublish {
            branch: "gh-pages".to_string(),
            remote: "origin".to_string(),
            destination: "docs".to_string(),
            source: site,
            message: "deploy".to_string(),
            allow_empty: true,
        };
        let first = repo.publish_tree(&request).unwrap().unwrap();

        let second = repo.publish_tree(&request).unwrap().unwrap();
        assert_ne!(first, second);
        let second_commit = repo.repo.find_commit(second).unwrap();
        assert_eq!(second_commit.parent_id(0).unwrap(), first);

        request.allow_empty = false;
        assert_eq!(repo.publish_tree(&request).unwrap(), None);
    }
}
