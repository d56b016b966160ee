//! Glob matching of candidate paths against rule patterns.
//!
//! `*` stays within one path segment, `**` spans segments. A pattern of
//! exactly `**` matches every path and an empty pattern matches nothing.

use crate::error::{Result, TiermarkError};
use globset::{GlobBuilder, GlobMatcher};

const MATCH_ALL: &str = "**";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOptions {
    pub case_insensitive: bool,
}

#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    matcher: Option<GlobMatcher>,
}

impl PathPattern {
    pub fn compile(pattern: &str, options: MatchOptions) -> Result<Self> {
        if pattern.is_empty() {
            return Err(TiermarkError::InvalidPattern {
                pattern: pattern.to_string(),
                message: "pattern is empty".to_string(),
            });
        }

        if pattern == MATCH_ALL {
            return Ok(Self {
                raw: pattern.to_string(),
                matcher: None,
            });
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(options.case_insensitive)
            .build()
            .map_err(|e| TiermarkError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.kind().to_string(),
            })?;

        Ok(Self {
            raw: pattern.to_string(),
            matcher: Some(glob.compile_matcher()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        match &self.matcher {
            Some(matcher) => matcher.is_match(path),
            None => true,
        }
    }
}

/// Rejects patterns that can never match; used on the rule write path.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    PathPattern::compile(pattern, MatchOptions::default()).map(|_| ())
}

/// One-off match. Malformed patterns never match.
pub fn matches(pattern: &str, path: &str, options: MatchOptions) -> bool {
    match PathPattern::compile(pattern, options) {
        Ok(compiled) => compiled.is_match(path),
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}
