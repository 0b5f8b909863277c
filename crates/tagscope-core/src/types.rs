//! Core data types for Tagscope.
//!
//! This module defines the fundamental data structures shared by the parser,
//! the evaluator and the tag stores. These types are designed to be:
//!
//! - **Serializable**: For config files and JSON output
//! - **Storage-agnostic**: No SQL or lock details leak into these types
//! - **Cheap to compare**: Tag names are folded once, on construction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Opaque unique identifier for an indexed item.
///
/// The external indexer assigns these; Tagscope never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new item ID
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    /// Get the item ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

/// An unordered, deduplicated set of matching items.
pub type ItemSet = HashSet<ItemId>;

/// A tag name with case-insensitive identity.
///
/// `Cat`, `CAT` and `cat` are the same tag. The folded form is what stores
/// index and compare on; the original spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagName {
    name: String,
    folded: String,
}

impl TagName {
    /// Create a tag name, computing its folded form
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let folded = fold_tag(&name);
        TagName { name, folded }
    }

    /// The name as originally spelled
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The case-folded name used for matching
    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for TagName {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for TagName {}

impl std::hash::Hash for TagName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for TagName {
    fn from(s: &str) -> Self {
        TagName::new(s)
    }
}

impl From<String> for TagName {
    fn from(s: String) -> Self {
        TagName::new(s)
    }
}

/// Fold a tag name for case-insensitive comparison.
pub fn fold_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An indexed item: an identifier, where it lives, and its tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,

    /// Normalized storage location (e.g., "/photos/2024/cat.png")
    pub location: String,

    /// Tags attached to this item (may be empty)
    pub tags: Vec<TagName>,
}

impl Item {
    /// Create an untagged item
    pub fn new(id: impl Into<ItemId>, location: impl Into<String>) -> Self {
        Item {
            id: id.into(),
            location: location.into(),
            tags: Vec::new(),
        }
    }

    /// Attach tags
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagName>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Check if this item carries the given tag (case-insensitive)
    pub fn has_tag(&self, tag: &str) -> bool {
        let folded = fold_tag(tag);
        self.tags.iter().any(|t| t.folded() == folded)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

/// Statistics about a tag store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of items
    pub total_items: u64,

    /// Number of distinct tags
    pub total_tags: u64,

    /// Number of item/tag associations
    pub total_associations: u64,

    /// When the store was last written
    pub last_updated: Option<DateTime<Utc>>,
}

/// A tag together with how many in-scope items carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_name_case_insensitive() {
        let a = TagName::new("Long Hair");
        let b = TagName::new("long hair");
        assert_eq!(a, b);
        assert_eq!(a.folded(), "long hair");
        assert_eq!(a.as_str(), "Long Hair");

        let set: HashSet<TagName> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_item_has_tag() {
        let item = Item::new("1", "/a/1.png").with_tags(["Cat", "outdoors"]);
        assert!(item.has_tag("cat"));
        assert!(item.has_tag("OUTDOORS"));
        assert!(!item.has_tag("dog"));
    }

    #[test]
    fn test_item_id() {
        let id = ItemId::new("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(format!("{}", id), "abc-123");
        assert_eq!(ItemId::from("abc-123"), id);
    }
}
