//! Query scope: the set of selected locations a query may return items from.
//!
//! A [`Scope`] is built once per query from caller-supplied directory strings
//! and never changes afterwards. Every entry is normalized to a prefix that
//! ends with `/`, which turns "starts with" into a directory containment
//! test: scope `/a` matches `/a/x.png` but not `/ab/x.png`.

use std::collections::BTreeSet;
use std::fmt;

/// Normalize a location string.
///
/// - Backslashes become `/` and repeated separators collapse
/// - `.` segments are dropped and `..` removes the previous segment
/// - Optionally lowercased
///
/// This is purely lexical; the filesystem is never consulted. Blank input
/// normalizes to an empty string.
pub fn normalize_location(raw: &str, case_insensitive: bool) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let unified = trimmed.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // Can't climb above the root of an absolute path
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(unified.len());
    if absolute {
        normalized.push('/');
    }
    normalized.push_str(&segments.join("/"));

    if case_insensitive {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

/// Normalize a directory into a containment prefix ending with `/`.
///
/// Returns `None` for blank input.
pub fn normalize_prefix(raw: &str, case_insensitive: bool) -> Option<String> {
    let mut prefix = normalize_location(raw, case_insensitive);
    if prefix.is_empty() {
        return None;
    }
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    Some(prefix)
}

/// An immutable snapshot of the selected locations for one query.
///
/// Prefixes are deduplicated and kept sorted. A prefix nested inside another
/// selected prefix is dropped since the outer one already covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    prefixes: BTreeSet<String>,
    case_insensitive: bool,
}

impl Default for Scope {
    fn default() -> Self {
        Self::empty()
    }
}

impl Scope {
    /// Build a case-insensitive scope from directory strings.
    pub fn new<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_case_sensitivity(dirs, true)
    }

    /// Build a scope, choosing whether locations compare case-insensitively.
    ///
    /// A store that folds locations also folds the prefixes of a
    /// case-sensitive scope before comparing.
    pub fn with_case_sensitivity<I, S>(dirs: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates: BTreeSet<String> = dirs
            .into_iter()
            .filter_map(|d| normalize_prefix(d.as_ref(), case_insensitive))
            .collect();

        let mut prefixes = BTreeSet::new();
        for candidate in &candidates {
            let covered = candidates
                .iter()
                .any(|other| other != candidate && candidate.starts_with(other.as_str()));
            if !covered {
                prefixes.insert(candidate.clone());
            }
        }

        Scope {
            prefixes,
            case_insensitive,
        }
    }

    /// A scope that selects nothing.
    pub fn empty() -> Self {
        Scope {
            prefixes: BTreeSet::new(),
            case_insensitive: true,
        }
    }

    /// True if nothing is selected; every query over this scope is empty.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Number of distinct prefixes after normalization.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// The normalized prefixes, in sorted order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.prefixes.iter().map(String::as_str)
    }

    /// Whether locations compare case-insensitively.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Check whether an already-normalized location falls under this scope.
    pub fn contains(&self, location: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| location.starts_with(prefix.as_str()))
    }

    /// Normalize a raw location the way this scope compares them.
    pub fn normalize(&self, location: &str) -> String {
        normalize_location(location, self.case_insensitive)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.prefixes().collect();
        write!(f, "{{{}}}", joined.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("/Photos/2024", true), "/photos/2024");
        assert_eq!(normalize_location("/Photos/2024", false), "/Photos/2024");
        assert_eq!(normalize_location("C:\\Users\\Me\\Pics", true), "c:/users/me/pics");
        assert_eq!(normalize_location("/a//b/./c/", true), "/a/b/c");
        assert_eq!(normalize_location("/a/b/../c", true), "/a/c");
        assert_eq!(normalize_location("/../a", true), "/a");
        assert_eq!(normalize_location("../a/../../b", true), "../../b");
        assert_eq!(normalize_location("   ", true), "");
        assert_eq!(normalize_location("/", true), "/");
    }

    #[test]
    fn test_normalize_prefix_appends_separator() {
        assert_eq!(normalize_prefix("/a", true).as_deref(), Some("/a/"));
        assert_eq!(normalize_prefix("/a/", true).as_deref(), Some("/a/"));
        assert_eq!(normalize_prefix("/", true).as_deref(), Some("/"));
        assert_eq!(normalize_prefix("", true), None);
    }

    #[test]
    fn test_scope_is_directory_containment() {
        let scope = Scope::new(["/a"]);
        assert!(scope.contains("/a/x.png"));
        assert!(scope.contains("/a/deep/er/x.png"));
        assert!(!scope.contains("/ab/x.png"));
        assert!(!scope.contains("/a"));
        assert!(!scope.contains("/b/a/x.png"));
    }

    #[test]
    fn test_scope_deduplicates() {
        let scope = Scope::new(["/a", "/a/", "/A", "\\a\\", "/a/./"]);
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.prefixes().collect::<Vec<_>>(), vec!["/a/"]);
    }

    #[test]
    fn test_scope_drops_nested_prefixes() {
        let scope = Scope::new(["/a/b", "/a", "/c/d", "/ab"]);
        assert_eq!(
            scope.prefixes().collect::<Vec<_>>(),
            vec!["/a/", "/ab/", "/c/d/"]
        );
    }

    #[test]
    fn test_scope_ignores_blank_entries() {
        let scope = Scope::new(["", "  "]);
        assert!(scope.is_empty());
        assert!(!scope.contains("/a/x.png"));
    }

    #[test]
    fn test_case_sensitive_scope() {
        let scope = Scope::with_case_sensitivity(["/Photos"], false);
        assert!(scope.contains("/Photos/x.png"));
        assert!(!scope.contains("/photos/x.png"));
        assert_eq!(scope.normalize("/Photos//x.png"), "/Photos/x.png");
    }

    #[test]
    fn test_display() {
        let scope = Scope::new(["/b", "/a"]);
        assert_eq!(scope.to_string(), "{/a/, /b/}");
    }
}
