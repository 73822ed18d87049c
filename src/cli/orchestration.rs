//! Release pipeline orchestration
//!
//! Runs the stages in order and stops at the first error. The CLI in
//! `main.rs` only parses arguments, picks the real repository and command
//! runner, and reports the outcome.

use std::path::PathBuf;

use git2::Oid;

use crate::boundary::BoundaryWarning;
use crate::config::Config;
use crate::docs::DocsDeployer;
use crate::domain::{BumpLevel, TagPattern, Version};
use crate::environment::EnvironmentPreparer;
use crate::error::Result;
use crate::git::{RemoteAuth, Repository};
use crate::inputs::ReleaseInputs;
use crate::package::PackageBuilder;
use crate::resolver::{write_step_output, VersionResolver};
use crate::runner::CommandRunner;
use crate::tagging::TagPublisher;
use crate::ui;

const STAGES: usize = 6;

/// Username paired with a repository token for HTTPS pushes.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Raw release parameters, exactly as the operator typed them
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseArgs {
    pub version: String,
    pub level: String,
    pub dry_run: String,
}

impl Default for ReleaseArgs {
    fn default() -> Self {
        ReleaseArgs {
            version: crate::inputs::DEFAULT_VERSION.to_string(),
            level: crate::inputs::DEFAULT_LEVEL.to_string(),
            dry_run: crate::inputs::DEFAULT_DRY_RUN.to_string(),
        }
    }
}

/// Secrets and CI hooks taken from the process environment
#[derive(Clone, Default, PartialEq)]
pub struct RunEnvironment {
    pub index_token: Option<String>,
    pub git_token: Option<String>,
    /// File receiving `version=<next>`, like a CI step output.
    pub step_output: Option<PathBuf>,
}

impl RunEnvironment {
    pub fn from_process(config: &Config) -> Self {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|v| !v.is_empty());
        RunEnvironment {
            index_token: non_empty(&config.publish.token_env),
            git_token: non_empty(&config.docs.token_env),
            step_output: std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from),
        }
    }

    fn git_auth(&self) -> RemoteAuth {
        match &self.git_token {
            Some(token) => RemoteAuth::token(TOKEN_USERNAME, token.clone()),
            None => RemoteAuth::anonymous(),
        }
    }
}

impl std::fmt::Debug for RunEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEnvironment")
            .field("index_token", &self.index_token.as_ref().map(|_| "***"))
            .field("git_token", &self.git_token.as_ref().map(|_| "***"))
            .field("step_output", &self.step_output)
            .finish()
    }
}

/// Result of a successful release run
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseReport {
    pub version: Version,
    pub tag: String,
    pub level: BumpLevel,
    pub bumped: bool,
    pub dry_run: bool,
    pub artifacts: Vec<PathBuf>,
    pub uploaded: bool,
    pub tag_pushed: bool,
    pub docs_commit: Option<Oid>,
    pub warnings: Vec<BoundaryWarning>,
}

fn report_warnings(collected: &mut Vec<BoundaryWarning>, new: Vec<BoundaryWarning>) {
    for warning in new {
        tracing::warn!(warning = %warning, "boundary warning");
        ui::display_boundary_warning(&warning);
        collected.push(warning);
    }
}

/// Main release pipeline
///
/// 1. Validate inputs
/// 2. Resolve the next version
/// 3. Prepare the child-process environment
/// 4. Patch, build and (unless dry run) upload the package
/// 5. Create and push the release tag (unless dry run)
/// 6. Build and deploy documentation (always)
pub fn run_release<R: Repository + ?Sized>(
    args: &ReleaseArgs,
    config: &Config,
    repo: &R,
    runner: &dyn CommandRunner,
    env: &RunEnvironment,
) -> Result<ReleaseReport> {
    ui::display_stage(1, STAGES, "Validate inputs");
    let inputs = ReleaseInputs::validate(&args.version, &args.level, &args.dry_run)?;
    tracing::info!(version = %inputs.version, level = %inputs.level, dry_run = inputs.dry_run, "inputs");
    ui::display_success("Inputs are valid");

    let mut warnings = Vec::new();
    let workdir = repo.workdir()?;
    let auth = env.git_auth();
    let remote = config.git.remote.as_str();

    ui::display_stage(2, STAGES, "Resolve version");
    let resolution = {
        let _span = tracing::info_span!("resolve").entered();
        if config.git.fetch_tags && inputs.wants_autobump() {
            ui::display_status(&format!("Fetching tags from {}", remote));
            let refspecs = ["+refs/tags/*:refs/tags/*".to_string()];
            if let Err(e) = repo.fetch(remote, &refspecs, &auth) {
                report_warnings(
                    &mut warnings,
                    vec![BoundaryWarning::FetchFailed {
                        remote: remote.to_string(),
                        reason: e.to_string(),
                    }],
                );
            }
        }
        let pattern = TagPattern::new(config.tag.prefix.clone())?;
        VersionResolver::new(repo, pattern, config.git.tag_order).resolve(&inputs)?
    };
    report_warnings(&mut warnings, resolution.warnings.clone());
    ui::display_resolution(
        resolution.last_version.as_ref(),
        &resolution.next,
        resolution.bumped,
    );
    if let Some(path) = &env.step_output {
        write_step_output(path, "version", &resolution.next.to_string())?;
    }

    ui::display_stage(3, STAGES, "Prepare environment");
    let prepared = {
        let _span = tracing::info_span!("environment").entered();
        EnvironmentPreparer::new(&config.environment, &workdir).prepare(runner)?
    };
    report_warnings(&mut warnings, prepared.warnings.clone());
    ui::display_success(&format!("Timezone {}", config.environment.timezone));

    ui::display_stage(4, STAGES, "Build package");
    let package = {
        let _span = tracing::info_span!("package").entered();
        PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            &workdir,
            &prepared.vars,
        )
        .with_token(env.index_token.clone())
        .run(runner, &resolution.next, inputs.dry_run)?
    };
    report_warnings(&mut warnings, package.warnings.clone());
    ui::display_artifacts(
        &package
            .artifacts
            .iter()
            .map(|a| a.display().to_string())
            .collect::<Vec<_>>(),
    );
    if package.uploaded {
        ui::display_success(&format!("Published {} {}", config.package.name, resolution.next));
    } else if inputs.dry_run {
        ui::display_skipped("Dry run, nothing was published");
    }

    ui::display_stage(5, STAGES, "Tag release");
    let tag = {
        let _span = tracing::info_span!("tag").entered();
        TagPublisher::new(repo, &config.tag, remote).publish(
            &resolution.tag,
            &resolution.next,
            inputs.dry_run,
            &auth,
        )?
    };
    if tag.pushed {
        ui::display_success(&format!("Pushed tag {} to {}", tag.tag, remote));
    } else {
        ui::display_skipped(&format!("Dry run, tag {} was not created", tag.tag));
    }

    ui::display_stage(6, STAGES, "Deploy documentation");
    let docs = {
        let _span = tracing::info_span!("docs").entered();
        DocsDeployer::new(repo, &config.docs, remote, &workdir, &prepared.vars).deploy(
            runner,
            &resolution.next,
            &resolution.tag,
            &auth,
        )?
    };
    report_warnings(&mut warnings, docs.warnings.clone());
    if docs.pushed {
        ui::display_success(&format!(
            "Deployed documentation to {}/{}",
            config.docs.branch, config.docs.destination
        ));
    }

    Ok(ReleaseReport {
        version: resolution.next,
        tag: resolution.tag,
        level: resolution.level,
        bumped: resolution.bumped,
        dry_run: inputs.dry_run,
        artifacts: package.artifacts,
        uploaded: package.uploaded,
        tag_pushed: tag.pushed,
        docs_commit: docs.commit,
        warnings,
    })
}
