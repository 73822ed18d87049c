use crate::error::{ReleaseError, Result};
use crate::git::{RemoteAuth, Repository, TreePublish};
use git2::Oid;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

/// A push or fetch recorded by [MockRepository]
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub remote: String,
    pub refspecs: Vec<String>,
    pub authenticated: bool,
}

/// Mock repository for testing without actual git operations
pub struct MockRepository {
    workdir: PathBuf,
    tags: RefCell<Vec<String>>,
    annotated: RefCell<Vec<(String, String)>>,
    fetches: RefCell<Vec<RemoteCall>>,
    pushes: RefCell<Vec<RemoteCall>>,
    publishes: RefCell<Vec<TreePublish>>,
    next_oid: Cell<u8>,
    fail_fetch: bool,
}

impl MockRepository {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        MockRepository {
            workdir: workdir.into(),
            tags: RefCell::new(Vec::new()),
            annotated: RefCell::new(Vec::new()),
            fetches: RefCell::new(Vec::new()),
            pushes: RefCell::new(Vec::new()),
            publishes: RefCell::new(Vec::new()),
            next_oid: Cell::new(1),
            fail_fetch: false,
        }
    }

    pub fn with_tags(self, tags: &[&str]) -> Self {
        self.tags
            .borrow_mut()
            .extend(tags.iter().map(|t| t.to_string()));
        self
    }

    /// Make every fetch fail, as with an unreachable remote.
    pub fn with_failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Annotated tags created so far, as (name, message).
    pub fn annotated_tags(&self) -> Vec<(String, String)> {
        self.annotated.borrow().clone()
    }

    pub fn fetches(&self) -> Vec<RemoteCall> {
        self.fetches.borrow().clone()
    }

    pub fn pushes(&self) -> Vec<RemoteCall> {
        self.pushes.borrow().clone()
    }

    pub fn publishes(&self) -> Vec<TreePublish> {
        self.publishes.borrow().clone()
    }

    fn allocate_oid(&self) -> Result<Oid> {
        let n = self.next_oid.get();
        self.next_oid.set(n.wrapping_add(1));
        Ok(Oid::from_bytes(&[n; 20])?)
    }
}

impl Repository for MockRepository {
    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.borrow().clone())
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tags.borrow().iter().any(|t| t == name))
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<Oid> {
        if self.tag_exists(name)? {
            return Err(ReleaseError::TagExists(name.to_string()));
        }
        self.tags.borrow_mut().push(name.to_string());
        self.annotated
            .borrow_mut()
            .push((name.to_string(), message.to_string()));
        self.allocate_oid()
    }

    fn fetch(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()> {
        self.fetches.borrow_mut().push(RemoteCall {
            remote: remote.to_string(),
            refspecs: refspecs.to_vec(),
            authenticated: auth.token.is_some(),
        });
        if self.fail_fetch {
            return Err(ReleaseError::remote(format!("Cannot reach remote '{}'", remote)));
        }
        Ok(())
    }

    fn push(&self, remote: &str, refspecs: &[String], auth: &RemoteAuth) -> Result<()> {
        self.pushes.borrow_mut().push(RemoteCall {
            remote: remote.to_string(),
            refspecs: refspecs.to_vec(),
            authenticated: auth.token.is_some(),
        });
        Ok(())
    }

    fn publish_tree(&self, request: &TreePublish) -> Result<Option<Oid>> {
        self.publishes.borrow_mut().push(request.clone());
        self.allocate_oid().map(Some)
    }
}
