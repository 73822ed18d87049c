use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};

/// Tag naming pattern: a fixed prefix followed by `X.Y.Z` (e.g. "v1.2.3").
#[derive(Debug, Clone)]
pub struct TagPattern {
    prefix: String,
    matcher: regex::Regex,
}

impl TagPattern {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let matcher = regex::Regex::new(&format!(
            r"^{}([0-9]+\.[0-9]+\.[0-9]+)$",
            regex::escape(&prefix)
        ))
        .map_err(|e| ReleaseError::config(format!("Invalid tag prefix '{}': {}", prefix, e)))?;

        Ok(TagPattern { prefix, matcher })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Example: prefix="v", version=1.2.3 -> "v1.2.3"
    pub fn format(&self, version: &Version) -> String {
        format!("{}{}", self.prefix, version)
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.matcher.is_match(tag)
    }

    /// Version carried by a matching tag, prefix stripped.
    pub fn parse(&self, tag: &str) -> Option<Version> {
        let captures = self.matcher.captures(tag)?;
        Version::parse(captures.get(1)?.as_str()).ok()
    }
}

/// How the most recent release tag is chosen among matching tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrder {
    /// Last tag name in byte-wise string order ("v0.9.0" sorts after "v0.10.0").
    #[default]
    Lexical,
    /// Highest semantic version.
    Version,
}

impl TagOrder {
    /// Pick the latest tag matching `pattern`, ignoring everything else.
    pub fn latest<'a>(&self, pattern: &TagPattern, tags: &'a [String]) -> Option<&'a str> {
        let candidates = tags.iter().map(String::as_str).filter(|t| pattern.matches(t));

        match self {
            TagOrder::Lexical => candidates.max(),
            TagOrder::Version => candidates.max_by_key(|tag| {
                let bare = &tag[pattern.prefix().len()..];
                semver::Version::parse(bare).unwrap_or_else(|_| semver::Version::new(0, 0, 0))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pattern_format() {
        let pattern = TagPattern::new("v").unwrap();
        assert_eq!(pattern.format(&Version::new(1, 2, 3)), "v1.2.3");
    }

    #[test]
    fn test_pattern_format_with_custom_prefix() {
        let pattern = TagPattern::new("release-").unwrap();
        assert_eq!(pattern.format(&Version::new(1, 2, 3)), "release-1.2.3");
    }

    #[test]
    fn test_pattern_matches() {
        let pattern = TagPattern::new("v").unwrap();
        assert!(pattern.matches("v1.2.3"));
        assert!(!pattern.matches("release-1.2.3"));
        assert!(!pattern.matches("v1.2.3-rc1"));
        assert!(!pattern.matches("v1.2"));
        assert!(!pattern.matches("1.2.3"));
    }

    #[test]
    fn test_pattern_prefix_is_literal() {
        let pattern = TagPattern::new("v.").unwrap();
        assert!(pattern.matches("v.1.2.3"));
        assert!(!pattern.matches("vx1.2.3"));
    }

    #[test]
    fn test_pattern_parse() {
        let pattern = TagPattern::new("v").unwrap();
        assert_eq!(pattern.parse("v0.4.1"), Some(Version::new(0, 4, 1)));
        assert_eq!(pattern.parse("foo"), None);
    }

    #[test]
    fn test_lexical_order_takes_last_name() {
        let pattern = TagPattern::new("v").unwrap();
        let all = tags(&["v0.10.0", "v0.9.0", "nightly", "v0.2.0"]);
        assert_eq!(TagOrder::Lexical.latest(&pattern, &all), Some("v0.9.0"));
    }

    #[test]
    fn test_version_order_takes_highest_version() {
        let pattern = TagPattern::new("v").unwrap();
        let all = tags(&["v0.10.0", "v0.9.0", "nightly", "v0.2.0"]);
        assert_eq!(TagOrder::Version.latest(&pattern, &all), Some("v0.10.0"));
    }

    #[test]
    fn test_latest_ignores_non_matching_tags() {
        let pattern = TagPattern::new("v").unwrap();
        let all = tags(&["zzz", "v2.0.0-beta", "release-9.9.9"]);
        assert_eq!(TagOrder::Lexical.latest(&pattern, &all), None);
        assert_eq!(TagOrder::Version.latest(&pattern, &all), None);
    }
}
