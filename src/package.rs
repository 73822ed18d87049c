//! Version placeholder substitution, distribution build and index upload.

use crate::boundary::BoundaryWarning;
use crate::config::{BuildConfig, PackageConfig, PublishConfig};
use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use crate::runner::{resolve, CommandRunner, CommandSpec};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageOutcome {
    pub artifacts: Vec<PathBuf>,
    pub uploaded: bool,
    pub warnings: Vec<BoundaryWarning>,
}

/// Replace the placeholder in `path` with the same text carrying `version`.
///
/// Fails without touching the file when the placeholder is absent, which also
/// catches a file that was already patched.
pub fn patch_version_file(path: &Path, placeholder: &str, version: &Version) -> Result<()> {
    let content = fs::read_to_string(path)?;
    if !content.contains(placeholder) {
        return Err(ReleaseError::PlaceholderMissing {
            placeholder: placeholder.to_string(),
            file: path.display().to_string(),
        });
    }

    let replacement = placeholder.replacen("0.0.0", &version.to_string(), 1);
    fs::write(path, content.replace(placeholder, &replacement))?;
    Ok(())
}

/// Wheel-style distribution name: runs of `-`, `_` and `.` become `_`.
pub fn normalize_dist_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('_');
            }
            in_separator = true;
        } else {
            normalized.push(c);
            in_separator = false;
        }
    }
    normalized
}

/// Files in `dist_dir` named `<package>-<version>` followed by `.` or `-`.
pub fn collect_artifacts(dist_dir: &Path, package: &str, version: &Version) -> Result<Vec<PathBuf>> {
    if !dist_dir.is_dir() {
        return Ok(Vec::new());
    }

    let prefixes = [
        format!("{}-{}", package, version),
        format!("{}-{}", normalize_dist_name(package), version),
    ];

    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dist_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let matched = prefixes.iter().any(|prefix| {
            name.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('-'))
        });
        if matched && entry.path().is_file() {
            artifacts.push(entry.path());
        }
    }

    artifacts.sort();
    Ok(artifacts)
}

pub struct PackageBuilder<'a> {
    package: &'a PackageConfig,
    build: &'a BuildConfig,
    publish: &'a PublishConfig,
    workdir: &'a Path,
    env: &'a [(String, String)],
    token: Option<String>,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(
        package: &'a PackageConfig,
        build: &'a BuildConfig,
        publish: &'a PublishConfig,
        workdir: &'a Path,
        env: &'a [(String, String)],
    ) -> Self {
        PackageBuilder {
            package,
            build,
            publish,
            workdir,
            env,
            token: None,
        }
    }

    /// Index token used for upload.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Patch, build and (unless `dry_run`) upload.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        version: &Version,
        dry_run: bool,
    ) -> Result<PackageOutcome> {
        let mut outcome = PackageOutcome::default();

        let version_file = resolve(self.workdir, &self.package.version_file);
        patch_version_file(&version_file, &self.package.placeholder, version)?;
        tracing::info!(file = %version_file.display(), version = %version, "patched version");

        let build = CommandSpec::from_argv(&self.build.command, self.workdir)?.envs(self.env);
        runner.run(&build)?;

        let dist_dir = resolve(self.workdir, &self.package.dist_dir);
        outcome.artifacts = collect_artifacts(&dist_dir, &self.package.name, version)?;
        if outcome.artifacts.is_empty() {
            return Err(ReleaseError::build(format!(
                "no distributions for {} {} found in {}",
                self.package.name,
                version,
                dist_dir.display()
            )));
        }

        if dry_run {
            tracing::info!("dry run, skipping upload");
            return Ok(outcome);
        }
        if !self.publish.enabled {
            outcome.warnings.push(BoundaryWarning::UploadDisabled);
            return Ok(outcome);
        }

        self.upload(runner, &outcome.artifacts)?;
        outcome.uploaded = true;
        Ok(outcome)
    }

    fn upload(&self, runner: &dyn CommandRunner, artifacts: &[PathBuf]) -> Result<()> {
        let token = self.token.as_deref().ok_or_else(|| {
            ReleaseError::publish(format!("{} is not set", self.publish.token_env))
        })?;

        let mut spec = CommandSpec::from_argv(&self.publish.command, self.workdir)?.envs(self.env);
        if let Some(url) = &self.publish.repository_url {
            spec = spec.arg("--repository-url").arg(url.clone());
        }
        let spec = spec
            .args(artifacts.iter().map(|a| a.to_string_lossy().into_owned()))
            .env("TWINE_USERNAME", self.publish.username.clone())
            .env("TWINE_PASSWORD", token);

        runner.run(&spec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use tempfile::TempDir;

    const PLACEHOLDER: &str = "__version__ = '0.0.0'";

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("grizzly")).unwrap();
        fs::write(
            dir.path().join("grizzly/__init__.py"),
            format!("\"\"\"pkg\"\"\"\n{}\n", PLACEHOLDER),
        )
        .unwrap();
        dir
    }

    fn fake_build(root: PathBuf) -> RecordingRunner {
        RecordingRunner::new().on("build", move |_| {
            let dist = root.join("dist");
            fs::create_dir_all(&dist)?;
            fs::write(dist.join("grizzly_loadtester-0.5.0.tar.gz"), "sdist")?;
            fs::write(dist.join("grizzly_loadtester-0.5.0-py3-none-any.whl"), "wheel")?;
            fs::write(dist.join("grizzly_loadtester-0.4.1.tar.gz"), "old")?;
            Ok(())
        })
    }

    #[test]
    fn test_patch_version_file() {
        let dir = project();
        let file = dir.path().join("grizzly/__init__.py");
        patch_version_file(&file, PLACEHOLDER, &Version::new(1, 2, 3)).unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert!(content.contains("__version__ = '1.2.3'"));
        assert!(!content.contains("0.0.0"));
        assert!(content.starts_with("\"\"\"pkg\"\"\""));
    }

    #[test]
    fn test_patch_twice_fails() {
        let dir = project();
        let file = dir.path().join("grizzly/__init__.py");
        patch_version_file(&file, PLACEHOLDER, &Version::new(1, 2, 3)).unwrap();

        let err = patch_version_file(&file, PLACEHOLDER, &Version::new(1, 2, 4)).unwrap_err();
        assert!(matches!(err, ReleaseError::PlaceholderMissing { .. }));
    }

    #[test]
    fn test_normalize_dist_name() {
        assert_eq!(normalize_dist_name("grizzly-loadtester"), "grizzly_loadtester");
        assert_eq!(normalize_dist_name("a.b--c"), "a_b_c");
        assert_eq!(normalize_dist_name("plain"), "plain");
    }

    #[test]
    fn test_collect_artifacts_filters_version() {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        for name in [
            "grizzly-loadtester-1.0.0.tar.gz",
            "grizzly_loadtester-1.0.0-py3-none-any.whl",
            "grizzly_loadtester-1.0.01.tar.gz",
            "grizzly_loadtester-1.0.0",
            "other-1.0.0.tar.gz",
        ] {
            fs::write(dist.join(name), "x").unwrap();
        }

        let artifacts =
            collect_artifacts(&dist, "grizzly-loadtester", &Version::new(1, 0, 0)).unwrap();
        let names: Vec<String> = artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "grizzly-loadtester-1.0.0.tar.gz".to_string(),
                "grizzly_loadtester-1.0.0-py3-none-any.whl".to_string(),
            ]
        );
    }

    #[test]
    fn test_dry_run_builds_without_upload() {
        let dir = project();
        let config = crate::config::Config::default();
        let runner = fake_build(dir.path().to_path_buf());

        let outcome = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .with_token(Some("pypi-token".to_string()))
        .run(&runner, &Version::new(0, 5, 0), true)
        .unwrap();

        assert_eq!(outcome.artifacts.len(), 2);
        assert!(!outcome.uploaded);
        assert!(runner.ran("python -m build"));
        assert!(!runner.ran("twine"));
    }

    #[test]
    fn test_upload_passes_token_and_artifacts() {
        let dir = project();
        let config = crate::config::Config::default();
        let runner = fake_build(dir.path().to_path_buf());

        let outcome = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .with_token(Some("pypi-token".to_string()))
        .run(&runner, &Version::new(0, 5, 0), false)
        .unwrap();

        assert!(outcome.uploaded);
        let calls = runner.calls();
        let upload = calls.iter().find(|c| c.display().contains("twine upload")).unwrap();
        assert_eq!(upload.env_value("TWINE_USERNAME"), Some("__token__"));
        assert_eq!(upload.env_value("TWINE_PASSWORD"), Some("pypi-token"));
        assert_eq!(upload.args.iter().filter(|a| a.contains("0.5.0")).count(), 2);
        assert!(!upload.args.iter().any(|a| a.contains("0.4.1")));
    }

    #[test]
    fn test_upload_without_token_fails() {
        let dir = project();
        let config = crate::config::Config::default();
        let runner = fake_build(dir.path().to_path_buf());

        let err = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .with_token(Some(String::new()))
        .run(&runner, &Version::new(0, 5, 0), false)
        .unwrap_err();

        assert!(err.to_string().contains("PYPI_TOKEN"));
        assert!(!runner.ran("twine"));
    }

    #[test]
    fn test_disabled_upload_warns() {
        let dir = project();
        let mut config = crate::config::Config::default();
        config.publish.enabled = false;
        let runner = fake_build(dir.path().to_path_buf());

        let outcome = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .run(&runner, &Version::new(0, 5, 0), false)
        .unwrap();

        assert!(!outcome.uploaded);
        assert_eq!(outcome.warnings, vec![BoundaryWarning::UploadDisabled]);
    }

    #[test]
    fn test_missing_placeholder_runs_no_build() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("grizzly")).unwrap();
        fs::write(dir.path().join("grizzly/__init__.py"), "__version__ = '9.9.9'\n").unwrap();
        let config = crate::config::Config::default();
        let runner = RecordingRunner::new();

        let err = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .run(&runner, &Version::new(1, 0, 0), true)
        .unwrap_err();

        assert!(matches!(err, ReleaseError::PlaceholderMissing { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_build_without_artifacts_fails() {
        let dir = project();
        let config = crate::config::Config::default();
        let runner = RecordingRunner::new();

        let err = PackageBuilder::new(
            &config.package,
            &config.build,
            &config.publish,
            dir.path(),
            &[],
        )
        .run(&runner, &Version::new(1, 0, 0), true)
        .unwrap_err();

        assert!(matches!(err, ReleaseError::Build(_)));
    }
}
