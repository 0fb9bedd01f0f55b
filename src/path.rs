//! Field paths
//!
//! A field path addresses a value inside a record: key segments joined by
//! `.`, with `[]` appended for every array level (`user.addresses[].city`).
//! Key characters that would make a path ambiguous (`\`, `.`, `[`, `]`) are
//! escaped with a backslash, so paths always parse back into the keys they
//! were built from.

use std::borrow::Cow;

/// Separator between key segments
pub const PATH_SEPARATOR: char = '.';

/// Suffix marking "an item of the array at this path"
pub const ARRAY_SUFFIX: &str = "[]";

const ESCAPE: char = '\\';

fn needs_escape(c: char) -> bool {
    matches!(c, '\\' | '.' | '[' | ']')
}

/// Escape a raw key for use as a path segment
pub fn escape_segment(key: &str) -> Cow<'_, str> {
    if !key.chars().any(needs_escape) {
        return Cow::Borrowed(key);
    }
    let mut escaped = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if needs_escape(c) {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Reverse [`escape_segment`]
pub fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Path of the member `key` inside the container at `parent`
///
/// An empty `parent` denotes the record root.
pub fn child_path(parent: &str, key: &str) -> String {
    let key = escape_segment(key);
    if parent.is_empty() {
        key.into_owned()
    } else {
        let mut path = String::with_capacity(parent.len() + 1 + key.len());
        path.push_str(parent);
        path.push(PATH_SEPARATOR);
        path.push_str(&key);
        path
    }
}

/// Path of the items of the array at `parent`
pub fn item_path(parent: &str) -> String {
    let mut path = String::with_capacity(parent.len() + ARRAY_SUFFIX.len());
    path.push_str(parent);
    path.push_str(ARRAY_SUFFIX);
    path
}

/// One parsed path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Unescaped key
    pub key: String,
    /// Number of `[]` suffixes
    pub array_depth: usize,
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            array_depth: 0,
        }
    }

    pub fn array(key: impl Into<String>, array_depth: usize) -> Self {
        Self {
            key: key.into(),
            array_depth,
        }
    }
}

/// Split a path on unescaped separators, leaving segments escaped
fn raw_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in path.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == PATH_SEPARATOR {
            segments.push(&path[start..i]);
            start = i + c.len_utf8();
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Strip trailing unescaped `[]` pairs, returning the key part and the count
fn strip_array_suffixes(segment: &str) -> (&str, usize) {
    let mut rest = segment;
    let mut depth = 0;
    // An escaped key never ends in an unescaped `]`, so a trailing `[]` is
    // always an array marker.
    while let Some(stripped) = rest.strip_suffix(ARRAY_SUFFIX) {
        rest = stripped;
        depth += 1;
    }
    (rest, depth)
}

/// Parse a path into its segments
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    if path.is_empty() {
        return Vec::new();
    }
    raw_segments(path)
        .into_iter()
        .map(|raw| {
            let (key, array_depth) = strip_array_suffixes(raw);
            PathSegment {
                key: unescape_segment(key),
                array_depth,
            }
        })
        .collect()
}

/// Build a path from segments
pub fn join_path(segments: &[PathSegment]) -> String {
    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(&escape_segment(&segment.key));
        for _ in 0..segment.array_depth {
            path.push_str(ARRAY_SUFFIX);
        }
    }
    path
}

/// The field name: last key, unescaped, without array suffixes
pub fn field_name(path: &str) -> String {
    let segments = raw_segments(path);
    let last = segments.last().copied().unwrap_or_default();
    let (key, _) = strip_array_suffixes(last);
    unescape_segment(key)
}

/// The containing field's path, if any
///
/// `a[]` is contained by `a`; `a.b` by `a`; a root-level key has no parent.
pub fn parent_path(path: &str) -> Option<&str> {
    if let Some(container) = path.strip_suffix(ARRAY_SUFFIX) {
        return if container.is_empty() { None } else { Some(container) };
    }
    let segments = raw_segments(path);
    if segments.len() < 2 {
        return None;
    }
    let last = segments[segments.len() - 1];
    let cut = path.len() - last.len() - PATH_SEPARATOR.len_utf8();
    Some(&path[..cut])
}

/// Whether the path addresses array items
pub fn is_item_path(path: &str) -> bool {
    path.ends_with(ARRAY_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_item_paths() {
        let user = child_path("", "user");
        let addresses = child_path(&user, "addresses");
        let city = child_path(&item_path(&addresses), "city");
        assert_eq!(city, "user.addresses[].city");
    }

    #[test]
    fn test_escaping_round_trip() {
        let keys = ["a.b", "x[]", "back\\slash", "plain", ""];
        for key in keys {
            let escaped = escape_segment(key);
            assert_eq!(unescape_segment(&escaped), key);
        }
        assert_eq!(escape_segment("a.b"), "a\\.b");
        assert_eq!(escape_segment("plain"), "plain");
    }

    #[test]
    fn test_parse_join_round_trip() {
        let segments = vec![
            PathSegment::key("config.v2"),
            PathSegment::array("items", 2),
            PathSegment::key("odd]key["),
        ];
        let path = join_path(&segments);
        assert_eq!(path, "config\\.v2.items[][].odd\\]key\\[");
        assert_eq!(parse_path(&path), segments);
    }

    #[test]
    fn test_dotted_key_is_one_segment() {
        let path = child_path(&child_path("", "meta"), "a.b");
        assert_eq!(parse_path(&path).len(), 2);
        assert_eq!(field_name(&path), "a.b");
        assert_eq!(parent_path(&path), Some("meta"));
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("user"), None);
        assert_eq!(parent_path("user.email"), Some("user"));
        assert_eq!(parent_path("tags[]"), Some("tags"));
        assert_eq!(parent_path("a[].b"), Some("a[]"));
        assert_eq!(parent_path("[]"), None);
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("user.email"), "email");
        assert_eq!(field_name("tags[]"), "tags");
        assert_eq!(field_name("a[].b[][]"), "b");
        assert_eq!(field_name("key\\[\\]"), "key[]");
    }

    #[test]
    fn test_escaped_bracket_is_not_item() {
        let path = child_path("", "x[]");
        assert!(!is_item_path(&path));
        assert!(is_item_path(&item_path(&path)));
    }
}
