//! The banned-rule set: parsing, serialization, and rule matching.
//!
//! Rules are authored as free text, one rule per line. The parsed form is
//! derived fresh from that text on every request; the text is the source of
//! truth. A rule matches a tag occurrence either against the bare tag text or
//! against its `namespace:tag` full key. Rules containing `*` are treated as
//! glob patterns; everything else is an exact string comparison under the
//! active case sensitivity.

use std::collections::HashSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::error::CoreError;
use super::tags::full_key;

/// Splits rule text into an ordered rule list.
///
/// Lines are trimmed and empty lines dropped. Order and duplicates are
/// preserved; removal tolerates duplicate rules so deduplication is not
/// this layer's job.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins rules back into the persisted text form. Inverse of [`parse`] modulo
/// blank-line and whitespace normalization.
pub fn serialize(rules: &[String]) -> String {
    rules.join("\n")
}

/// A compiled banned-rule set, ready for per-occurrence matching.
#[derive(Debug)]
pub struct RuleMatcher {
    exact: HashSet<String>,
    globs: GlobSet,
    case_insensitive: bool,
}

impl RuleMatcher {
    /// Compiles a rule list. Wildcard rules that fail to compile surface as
    /// [`CoreError::RulePattern`].
    pub fn new(rules: &[String], case_insensitive: bool) -> Result<Self, CoreError> {
        let mut exact = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        for rule in rules.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            if rule.contains('*') {
                let glob = GlobBuilder::new(rule)
                    .case_insensitive(case_insensitive)
                    .literal_separator(false)
                    .build()?;
                builder.add(glob);
            } else if case_insensitive {
                exact.insert(rule.to_lowercase());
            } else {
                exact.insert(rule.to_string());
            }
        }
        Ok(Self {
            exact,
            globs: builder.build()?,
            case_insensitive,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.globs.is_empty()
    }

    /// Checks whether any rule bans the given tag occurrence.
    ///
    /// Both the bare tag text and the `namespace:tag` full key are probed, so
    /// `water` and `general:water` ban the same occurrence.
    pub fn matches(&self, namespace: &str, tag: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let key = full_key(namespace, tag);
        for candidate in [tag, key.as_str()] {
            let probe = if self.case_insensitive {
                candidate.to_lowercase()
            } else {
                candidate.to_string()
            };
            if self.exact.contains(&probe) || self.globs.is_match(probe.as_str()) {
                return true;
            }
        }
        false
    }
}
