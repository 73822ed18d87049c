//! Validation of the three raw release parameters.

use crate::domain::{BumpLevel, Version};
use crate::error::{ReleaseError, Result};

pub const DEFAULT_VERSION: &str = "0.0.0";
pub const DEFAULT_LEVEL: &str = "patch";
pub const DEFAULT_DRY_RUN: &str = "true";

/// Validated release parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInputs {
    pub version: Version,
    pub level: BumpLevel,
    pub dry_run: bool,
}

impl ReleaseInputs {
    /// Check version, level and dry-run in that order; the first failure wins.
    pub fn validate(version: &str, level: &str, dry_run: &str) -> Result<Self> {
        let pattern = regex::Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$")
            .map_err(|e| ReleaseError::config(e.to_string()))?;
        if !pattern.is_match(version) {
            return Err(ReleaseError::InvalidVersion(version.to_string()));
        }
        let version = Version::parse(version)?;

        let level: BumpLevel = level.parse()?;

        let dry_run = match dry_run {
            "true" => true,
            "false" => false,
            other => return Err(ReleaseError::InvalidDryRun(other.to_string())),
        };

        Ok(ReleaseInputs {
            version,
            level,
            dry_run,
        })
    }

    /// Whether the resolver should compute the version from tags.
    pub fn wants_autobump(&self) -> bool {
        self.version.is_unset()
    }
}
