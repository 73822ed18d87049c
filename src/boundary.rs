use crate::domain::BumpLevel;
use std::fmt;

/// Non-fatal conditions met during a release run.
/// They are reported to the operator and the run continues.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// No release tag exists yet; the first release is forced to a major bump
    NoPreviousTag { requested: BumpLevel },
    /// Tags could not be fetched; local tags are used instead
    FetchFailed { remote: String, reason: String },
    /// Upload is turned off in configuration even though this is not a dry run
    UploadDisabled,
    /// The built documentation equals what the publish branch already holds
    DocsUnchanged { branch: String },
    /// The dependency cache could not be set up; installation runs uncached
    CacheUnavailable { reason: String },
    /// No token for pushing; git falls back to its own credential lookup
    TokenMissing { variable: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NoPreviousTag { requested } => {
                if *requested == BumpLevel::Major {
                    write!(f, "No previous release tag found, starting from 0.0.0")
                } else {
                    write!(
                        f,
                        "No previous release tag found, starting from 0.0.0 with level major instead of {}",
                        requested
                    )
                }
            }
            BoundaryWarning::FetchFailed { remote, reason } => {
                write!(
                    f,
                    "Could not fetch tags from remote '{}': {}. Using local tags.",
                    remote, reason
                )
            }
            BoundaryWarning::UploadDisabled => {
                write!(f, "Package upload is disabled in configuration, nothing was published")
            }
            BoundaryWarning::DocsUnchanged { branch } => {
                write!(f, "Documentation on '{}' is unchanged, no commit created", branch)
            }
            BoundaryWarning::CacheUnavailable { reason } => {
                write!(f, "Dependency cache unavailable ({}), installing without it", reason)
            }
            BoundaryWarning::TokenMissing { variable } => {
                write!(
                    f,
                    "{} is not set, pushing with default git credentials",
                    variable
                )
            }
        }
    }
}
