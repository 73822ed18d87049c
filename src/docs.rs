//! Documentation build and deployment to the publishing branch.

use crate::boundary::BoundaryWarning;
use crate::config::DocsConfig;
use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use crate::git::{RemoteAuth, Repository, TreePublish};
use crate::runner::{resolve, CommandRunner, CommandSpec};
use crate::tagging::render_message;
use git2::Oid;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocsOutcome {
    /// Commit created on the publishing branch, if any.
    pub commit: Option<Oid>,
    pub pushed: bool,
    pub warnings: Vec<BoundaryWarning>,
}

pub struct DocsDeployer<'a, R: Repository + ?Sized> {
    repo: &'a R,
    config: &'a DocsConfig,
    remote: &'a str,
    workdir: &'a Path,
    env: &'a [(String, String)],
}

impl<'a, R: Repository + ?Sized> DocsDeployer<'a, R> {
    pub fn new(
        repo: &'a R,
        config: &'a DocsConfig,
        remote: &'a str,
        workdir: &'a Path,
        env: &'a [(String, String)],
    ) -> Self {
        DocsDeployer {
            repo,
            config,
            remote,
            workdir,
            env,
        }
    }

    /// Build the site and publish it. Runs the same way on dry runs.
    pub fn deploy(
        &self,
        runner: &dyn CommandRunner,
        version: &Version,
        tag: &str,
        auth: &RemoteAuth,
    ) -> Result<DocsOutcome> {
        let mut outcome = DocsOutcome::default();

        let cwd = resolve(self.workdir, &self.config.working_dir);
        let spec = CommandSpec::from_argv(&self.config.command, cwd)?.envs(self.env);
        runner.run(&spec)?;

        let output = resolve(self.workdir, &self.config.output_dir);
        if !output.is_dir() {
            return Err(ReleaseError::docs(format!(
                "output directory {} was not created",
                output.display()
            )));
        }

        if auth.token.is_none() {
            outcome.warnings.push(BoundaryWarning::TokenMissing {
                variable: self.config.token_env.clone(),
            });
        }

        let branch = &self.config.branch;
        let tracking = format!("+refs/heads/{}:refs/remotes/{}/{}", branch, self.remote, branch);
        if let Err(e) = self.repo.fetch(self.remote, &[tracking], auth) {
            // A first deployment has no remote branch to fetch.
            tracing::debug!(branch = %branch, error = %e, "publish branch not fetched");
        }

        let request = TreePublish {
            branch: branch.clone(),
            remote: self.remote.to_string(),
            destination: self.config.destination.clone(),
            source: output,
            message: render_message(&self.config.commit_message, version, tag),
            allow_empty: self.config.allow_empty_commit,
        };

        outcome.commit = self.repo.publish_tree(&request)?;
        let Some(commit) = outcome.commit else {
            outcome.warnings.push(BoundaryWarning::DocsUnchanged {
                branch: branch.clone(),
            });
            return Ok(outcome);
        };
        tracing::info!(branch = %branch, commit = %commit, "committed documentation");

        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        self.repo.push(self.remote, &[refspec], auth)?;
        outcome.pushed = true;

        Ok(outcome)
    }
}
