use crate::domain::TagOrder;
use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "pyrelease.toml";

/// Represents the complete configuration for pyrelease.
///
/// Every section has defaults, so an empty or partial file is valid. Relative
/// paths are resolved against the repository working directory.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub tag: TagConfig,

    #[serde(default)]
    pub docs: DocsConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The Python package being released.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PackageConfig {
    /// Distribution name; artifacts are `<name>-<version>*` after normalization.
    pub name: String,
    /// Source file holding the version placeholder.
    pub version_file: PathBuf,
    /// Exact text that must be present in `version_file`.
    pub placeholder: String,
    pub dist_dir: PathBuf,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            name: "grizzly-loadtester".to_string(),
            version_file: PathBuf::from("grizzly/__init__.py"),
            placeholder: "__version__ = '0.0.0'".to_string(),
            dist_dir: PathBuf::from("dist"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    pub remote: String,
    /// Fetch tags from `remote` before resolving the next version.
    pub fetch_tags: bool,
    pub tag_order: TagOrder,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            remote: "origin".to_string(),
            fetch_tags: false,
            tag_order: TagOrder::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub timezone: String,
    /// Directory prepended to `PATH`; `~/.local/bin` when unset.
    pub bin_dir: Option<PathBuf>,
    /// Files hashed into the dependency cache key. Missing files are skipped.
    pub manifests: Vec<PathBuf>,
    /// Empty means no dependency installation.
    pub install_command: Vec<String>,
    /// Root of keyed dependency caches; `<user cache dir>/pyrelease` when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            timezone: "Europe/Stockholm".to_string(),
            bin_dir: None,
            manifests: ["pyproject.toml", "setup.cfg", "setup.py", "requirements.txt"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            install_command: strings(&["python", "-m", "pip", "install", "-e", ".[dev,docs]"]),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            command: strings(&[
                "python", "-m", "build", "--sdist", "--wheel", "--outdir", "dist/",
            ]),
        }
    }
}

/// Upload of built distributions to a package index.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    /// Artifact paths are appended to this command.
    pub command: Vec<String>,
    pub username: String,
    /// Environment variable holding the index token.
    pub token_env: String,
    pub repository_url: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            enabled: true,
            command: strings(&["python", "-m", "twine", "upload", "--non-interactive"]),
            username: "__token__".to_string(),
            token_env: "PYPI_TOKEN".to_string(),
            repository_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TagConfig {
    pub prefix: String,
    /// `{version}` is replaced by the resolved version.
    pub message: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        TagConfig {
            prefix: "v".to_string(),
            message: "Release v{version}".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DocsConfig {
    pub command: Vec<String>,
    /// Directory the docs command runs in.
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Publishing branch receiving the built site.
    pub branch: String,
    /// Subpath inside `branch` replaced by the contents of `output_dir`.
    pub destination: String,
    pub token_env: String,
    pub allow_empty_commit: bool,
    pub commit_message: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        DocsConfig {
            command: strings(&["pydoc-markdown", "--build", "--site-dir", "_site"]),
            working_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("docs/_site"),
            branch: "gh-pages".to_string(),
            destination: "docs".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            allow_empty_commit: true,
            commit_message: "Deploy documentation for v{version}".to_string(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Lookup order:
/// 1. Custom path provided as parameter (must exist)
/// 2. `pyrelease.toml` in `project_dir`, the repository working directory
/// 3. `pyrelease.toml` in the user config directory
/// 4. Default configuration
pub fn load_config(config_path: Option<&Path>, project_dir: &Path) -> Result<Config> {
    let project_config = project_dir.join(CONFIG_FILE_NAME);

    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path).map_err(|e| {
            ReleaseError::config(format!("Cannot read {}: {}", path.display(), e))
        })?
    } else if project_config.exists() {
        fs::read_to_string(&project_config)?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    parse_config(&config_str)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject settings that would make later stages fail in confusing ways.
    pub fn validate(&self) -> Result<()> {
        if self.package.placeholder.is_empty() {
            return Err(ReleaseError::config("package.placeholder must not be empty"));
        }
        if !self.package.placeholder.contains("0.0.0") {
            return Err(ReleaseError::config(
                "package.placeholder must contain the 0.0.0 version text",
            ));
        }
        if self.build.command.is_empty() {
            return Err(ReleaseError::config("build.command must not be empty"));
        }
        if self.publish.enabled && self.publish.command.is_empty() {
            return Err(ReleaseError::config("publish.command must not be empty"));
        }
        if self.docs.command.is_empty() {
            return Err(ReleaseError::config("docs.command must not be empty"));
        }
        if self.docs.branch.is_empty() {
            return Err(ReleaseError::config("docs.branch must not be empty"));
        }
        if Path::new(&self.docs.destination).is_absolute()
            || self.docs.destination.split('/').any(|c| c == "..")
        {
            return Err(ReleaseError::config(
                "docs.destination must be a relative path inside the branch",
            ));
        }
        Ok(())
    }
}
