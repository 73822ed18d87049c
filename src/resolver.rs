//! Next-version resolution from release tags.

use crate::boundary::BoundaryWarning;
use crate::domain::{BumpLevel, TagOrder, TagPattern, Version};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::inputs::ReleaseInputs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Outcome of version resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Version of the latest release tag; `None` when there was none or the
    /// version was given explicitly.
    pub last_version: Option<Version>,
    /// Level actually applied, after forcing `major` for a first release.
    pub level: BumpLevel,
    pub next: Version,
    /// Whether `next` was computed by bumping.
    pub bumped: bool,
    /// Tag name the release will carry.
    pub tag: String,
    pub warnings: Vec<BoundaryWarning>,
}

pub struct VersionResolver<'a, R: Repository + ?Sized> {
    repo: &'a R,
    pattern: TagPattern,
    order: TagOrder,
}

impl<'a, R: Repository + ?Sized> VersionResolver<'a, R> {
    pub fn new(repo: &'a R, pattern: TagPattern, order: TagOrder) -> Self {
        VersionResolver {
            repo,
            pattern,
            order,
        }
    }

    /// Latest release tag under the configured ordering.
    pub fn latest_tag(&self) -> Result<Option<String>> {
        let tags = self.repo.list_tags()?;
        Ok(self
            .order
            .latest(&self.pattern, &tags)
            .map(str::to_string))
    }

    pub fn resolve(&self, inputs: &ReleaseInputs) -> Result<Resolution> {
        let mut warnings = Vec::new();

        let (last_version, level, next, bumped) = if inputs.wants_autobump() {
            let latest = self.latest_tag()?;
            let (current, level) = match latest.as_deref().and_then(|t| self.pattern.parse(t)) {
                Some(version) => (version, inputs.level),
                None => {
                    warnings.push(BoundaryWarning::NoPreviousTag {
                        requested: inputs.level,
                    });
                    (Version::new(0, 0, 0), BumpLevel::Major)
                }
            };
            tracing::debug!(latest = ?latest, current = %current, level = %level, "bumping");
            let next = current.bump(level)?;
            let last = (!current.is_unset()).then_some(current);
            (last, level, next, true)
        } else {
            (None, inputs.level, inputs.version.clone(), false)
        };

        if next.is_unset() {
            return Err(ReleaseError::UnresolvedVersion);
        }

        let tag = self.pattern.format(&next);
        if self.repo.tag_exists(&tag)? {
            return Err(ReleaseError::TagExists(tag));
        }

        Ok(Resolution {
            last_version,
            level,
            next,
            bumped,
            tag,
            warnings,
        })
    }
}

/// Append `key=value` to a CI step-output file such as `$GITHUB_OUTPUT`.
pub fn write_step_output(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}={}", key, value)?;
    Ok(())
}
