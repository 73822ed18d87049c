use crate::error::{ReleaseError, Result};
use std::fmt;
use std::str::FromStr;

/// A release version `X.Y.Z`, kept as the digits it was written with.
///
/// `01.2.4` stays `01.2.4`; numbers are only read when bumping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    text: String,
}

impl Version {
    /// Text of the "not set" sentinel: requesting it means auto-increment.
    pub const UNSET: &'static str = "0.0.0";

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            text: format!("{}.{}.{}", major, minor, patch),
        }
    }

    /// Parse a bare `X.Y.Z` string where each part is one or more ASCII digits.
    ///
    /// No prefix, pre-release or build metadata is accepted; tag prefixes are
    /// handled by [`crate::domain::TagPattern`]. Parts may be of any length.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        let well_formed = parts.len() == 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if !well_formed {
            return Err(ReleaseError::InvalidVersion(raw.to_string()));
        }

        Ok(Version {
            text: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True only for the exact text `0.0.0`.
    pub fn is_unset(&self) -> bool {
        self.text == Version::UNSET
    }

    fn numbers(&self) -> Result<[u64; 3]> {
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(self.text.split('.')) {
            *slot = part
                .parse::<u64>()
                .map_err(|_| ReleaseError::UnresolvedVersion)?;
        }
        Ok(numbers)
    }

    /// Increment the component named by `level`, resetting lower components to zero.
    ///
    /// Fails with [`ReleaseError::UnresolvedVersion`] when a component does
    /// not fit in a `u64` or the increment would overflow.
    pub fn bump(&self, level: BumpLevel) -> Result<Self> {
        let [major, minor, patch] = self.numbers()?;
        let next = |n: u64| n.checked_add(1).ok_or(ReleaseError::UnresolvedVersion);

        Ok(match level {
            BumpLevel::Major => Version::new(next(major)?, 0, 0),
            BumpLevel::Minor => Version::new(major, next(minor)?, 0),
            BumpLevel::Patch => Version::new(major, minor, next(patch)?),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

/// Which version component to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
}

impl BumpLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpLevel::Major => "major",
            BumpLevel::Minor => "minor",
            BumpLevel::Patch => "patch",
        }
    }
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpLevel {
    type Err = ReleaseError;

    /// Accepts the exact lowercase literals only.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "major" => Ok(BumpLevel::Major),
            "minor" => Ok(BumpLevel::Minor),
            "patch" => Ok(BumpLevel::Patch),
            other => Err(ReleaseError::InvalidLevel(other.to_string())),
        }
    }
}
