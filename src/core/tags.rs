//! Parsing of individual tag log lines.
//!
//! A tag line is either `namespace:tag` or a bare tag. Bare tags belong to the
//! implicit `general` namespace. Whitespace is normalized aggressively so that
//! `" artist :  a la carte "` and `"artist:a la carte"` denote the same tag.

/// Namespace assigned to tag lines that carry no explicit `ns:` prefix.
pub const DEFAULT_NAMESPACE: &str = "general";

/// A single parsed tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLine {
    pub namespace: String,
    pub tag: String,
    /// `true` if the source line carried an explicit `namespace:` prefix.
    pub explicit_namespace: bool,
}

impl TagLine {
    /// Renders the normalized output form of this tag line.
    pub fn render(&self) -> String {
        if self.explicit_namespace && !self.namespace.is_empty() {
            format!("{}:{}", self.namespace, self.tag)
        } else {
            self.tag.clone()
        }
    }
}

/// Collapses all interior whitespace runs to single spaces and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses one line of a tag log file.
///
/// Returns `None` for blank lines and lines whose tag part is empty after
/// normalization (e.g. `"meta:"`). Such lines carry no tag occurrence and are
/// dropped on rewrite.
pub fn parse_tag_line(line: &str) -> Option<TagLine> {
    let cleaned = normalize_whitespace(line);
    if cleaned.is_empty() {
        return None;
    }
    let parsed = match cleaned.split_once(':') {
        Some((ns, tag)) => TagLine {
            namespace: ns.trim().to_string(),
            tag: tag.trim().to_string(),
            explicit_namespace: true,
        },
        None => TagLine {
            namespace: DEFAULT_NAMESPACE.to_string(),
            tag: cleaned,
            explicit_namespace: false,
        },
    };
    if parsed.tag.is_empty() {
        return None;
    }
    Some(parsed)
}

/// Builds the canonical `namespace:tag` key used for rule matching.
///
/// An empty namespace falls back to [`DEFAULT_NAMESPACE`].
pub fn full_key(namespace: &str, tag: &str) -> String {
    let ns = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    format!("{ns}:{tag}")
}
