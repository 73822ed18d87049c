use thiserror::Error;

/// Unified error type for release pipeline operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("invalid version format '{0}'")]
    InvalidVersion(String),

    #[error("invalid level '{0}', expected one of major, minor, patch")]
    InvalidLevel(String),

    #[error("invalid dry-run value '{0}', expected true or false")]
    InvalidDryRun(String),

    #[error("could not set next version")]
    UnresolvedVersion,

    #[error("tag {0} already exists")]
    TagExists(String),

    #[error("placeholder '{placeholder}' not found in {file}")]
    PlaceholderMissing { placeholder: String, file: String },

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Documentation error: {0}")]
    Docs(String),

    #[error("command `{command}` failed with exit code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in pyrelease
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        ReleaseError::Remote(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        ReleaseError::Build(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        ReleaseError::Publish(msg.into())
    }

    pub fn docs(msg: impl Into<String>) -> Self {
        ReleaseError::Docs(msg.into())
    }
}

impl From<toml::de::Error> for ReleaseError {
    fn from(err: toml::de::Error) -> Self {
        ReleaseError::Config(err.to_string())
    }
}
