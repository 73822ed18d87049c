//! External command execution
//!
//! Packaging, upload and documentation tools stay external processes. Stages
//! describe them as [`CommandSpec`] values and hand them to a [`CommandRunner`],
//! so the pipeline can run against a recording runner in tests.

use crate::error::{ReleaseError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

/// A fully described subprocess invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    /// Build from a configured argv; the first element is the program.
    pub fn from_argv(argv: &[String], cwd: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ReleaseError::config("command must not be empty"))?;
        Ok(CommandSpec::new(program.clone(), cwd).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend(vars.iter().cloned());
        self
    }

    /// Program and arguments joined for display. Environment is never shown.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. Nonzero exit is an error.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), cwd = %spec.cwd.display(), "running");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).current_dir(&spec.cwd);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| ReleaseError::Command {
            command: spec.display(),
            code: -1,
            stderr: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ReleaseError::Command {
                command: spec.display(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

type Effect = Box<dyn Fn(&CommandSpec) -> Result<()> + Send + Sync>;

/// Runner that records invocations instead of spawning processes.
///
/// Effects registered for a program run when it is invoked, which lets tests
/// simulate a build writing artifacts or a docs tool writing a site.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    effects: Vec<(String, Effect)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an effect for invocations whose argv contains `marker`.
    pub fn on<F>(mut self, marker: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<()> + Send + Sync + 'static,
    {
        self.effects.push((marker.into(), Box::new(effect)));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// True when any recorded command line contains `needle`.
    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.display().contains(needle))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        for (marker, effect) in &self.effects {
            if spec.program == *marker || spec.args.iter().any(|a| a == marker) {
                effect(spec)?;
            }
        }
        Ok(CommandOutput::default())
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_argv_splits_program() {
        let argv = vec!["python".to_string(), "-m".to_string(), "build".to_string()];
        let spec = CommandSpec::from_argv(&argv, "/tmp").unwrap();
        assert_eq!(spec.program, "python");
        assert_eq!(spec.args, vec!["-m", "build"]);
        assert_eq!(spec.display(), "python -m build");
    }

    #[test]
    fn test_from_empty_argv_fails() {
        assert!(CommandSpec::from_argv(&[], "/tmp").is_err());
    }

    #[test]
    fn test_display_hides_environment() {
        let spec = CommandSpec::new("twine", ".")
            .arg("upload")
            .env("TWINE_PASSWORD", "secret");
        assert!(!spec.display().contains("secret"));
        assert_eq!(spec.env_value("TWINE_PASSWORD"), Some("secret"));
    }

    #[test]
    fn test_env_value_prefers_last() {
        let spec = CommandSpec::new("x", ".").env("TZ", "UTC").env("TZ", "Europe/Stockholm");
        assert_eq!(spec.env_value("TZ"), Some("Europe/Stockholm"));
    }

    #[test]
    fn test_system_runner_reports_nonzero_exit() {
        let spec = CommandSpec::new("sh", std::env::temp_dir())
            .args(["-c", "echo broken >&2; exit 3"]);
        let err = SystemRunner.run(&spec).unwrap_err();
        match err {
            ReleaseError::Command { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_system_runner_passes_env() {
        let spec = CommandSpec::new("sh", std::env::temp_dir())
            .args(["-c", "printf %s \"$PYRELEASE_PROBE\""])
            .env("PYRELEASE_PROBE", "42");
        let output = SystemRunner.run(&spec).unwrap();
        assert_eq!(output.stdout, "42");
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let spec = CommandSpec::new("/nonexistent/pyrelease-tool", std::env::temp_dir());
        assert!(matches!(
            SystemRunner.run(&spec),
            Err(ReleaseError::Command { code: -1, .. })
        ));
    }

    #[test]
    fn test_recording_runner_runs_effects() {
        let runner = RecordingRunner::new().on("build", |spec| {
            assert_eq!(spec.program, "python");
            Ok(())
        });
        let spec = CommandSpec::new("python", ".").args(["-m", "build"]);
        runner.run(&spec).unwrap();
        assert!(runner.ran("python -m build"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        assert_eq!(resolve(Path::new("/repo"), Path::new("dist")), PathBuf::from("/repo/dist"));
        assert_eq!(resolve(Path::new("/repo"), Path::new("/abs")), PathBuf::from("/abs"));
    }
}
