//! Child-process environment and the keyed dependency cache.

use crate::boundary::BoundaryWarning;
use crate::config::EnvironmentConfig;
use crate::error::{ReleaseError, Result};
use crate::runner::{resolve, CommandRunner, CommandSpec};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment handed to every later subprocess
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedEnvironment {
    pub vars: Vec<(String, String)>,
    /// Hex SHA-256 over the dependency manifests; `None` when none exist or
    /// one could not be read.
    pub cache_key: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub warnings: Vec<BoundaryWarning>,
}

pub struct EnvironmentPreparer<'a> {
    config: &'a EnvironmentConfig,
    workdir: &'a Path,
}

impl<'a> EnvironmentPreparer<'a> {
    pub fn new(config: &'a EnvironmentConfig, workdir: &'a Path) -> Self {
        EnvironmentPreparer { config, workdir }
    }

    pub fn prepare(&self, runner: &dyn CommandRunner) -> Result<PreparedEnvironment> {
        let mut prepared = PreparedEnvironment::default();
        prepared
            .vars
            .push(("TZ".to_string(), self.config.timezone.clone()));

        if let Some(bin_dir) = self.bin_dir() {
            let path = prepend_path(&bin_dir, std::env::var_os("PATH"))?;
            prepared.vars.push(("PATH".to_string(), path));
        }

        match dependency_cache_key(self.workdir, &self.config.manifests) {
            Ok(key) => prepared.cache_key = key,
            Err(e) => prepared.warnings.push(BoundaryWarning::CacheUnavailable {
                reason: e.to_string(),
            }),
        }
        if let Some(key) = prepared.cache_key.as_deref() {
            match self.cache_dir(key) {
                Ok(dir) => {
                    tracing::info!(key = %key, dir = %dir.display(), "dependency cache");
                    prepared
                        .vars
                        .push(("PIP_CACHE_DIR".to_string(), dir.to_string_lossy().into_owned()));
                    prepared.cache_dir = Some(dir);
                }
                Err(e) => prepared.warnings.push(BoundaryWarning::CacheUnavailable {
                    reason: e.to_string(),
                }),
            }
        }

        if !self.config.install_command.is_empty() {
            let spec = CommandSpec::from_argv(&self.config.install_command, self.workdir)?
                .envs(&prepared.vars);
            runner.run(&spec)?;
        }

        Ok(prepared)
    }

    fn bin_dir(&self) -> Option<PathBuf> {
        match &self.config.bin_dir {
            Some(dir) => Some(resolve(self.workdir, dir)),
            None => dirs::home_dir().map(|home| home.join(".local").join("bin")),
        }
    }

    fn cache_dir(&self, key: &str) -> Result<PathBuf> {
        let root = match &self.config.cache_dir {
            Some(dir) => resolve(self.workdir, dir),
            None => dirs::cache_dir()
                .ok_or_else(|| ReleaseError::config("No user cache directory"))?
                .join("pyrelease"),
        };
        let dir = root.join("pip").join(key);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// `PATH` with `bin_dir` in front, unchanged when already present.
pub fn prepend_path(bin_dir: &Path, current: Option<OsString>) -> Result<String> {
    let mut entries: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    if !entries.iter().any(|e| e == bin_dir) {
        entries.insert(0, bin_dir.to_path_buf());
    }

    let joined = std::env::join_paths(entries)
        .map_err(|e| ReleaseError::config(format!("Cannot build PATH: {}", e)))?;
    Ok(joined.to_string_lossy().into_owned())
}

/// Content hash of the manifests that exist under `workdir`, in the given order.
pub fn dependency_cache_key(workdir: &Path, manifests: &[PathBuf]) -> Result<Option<String>> {
    let mut hasher = Sha256::new();
    let mut hashed = 0usize;

    for manifest in manifests {
        let path = resolve(workdir, manifest);
        if !path.is_file() {
            continue;
        }
        hasher.update(manifest.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(&path)?);
        hasher.update([0u8]);
        hashed += 1;
    }

    if hashed == 0 {
        return Ok(None);
    }
    Ok(Some(hex::encode(hasher.finalize())))
}
