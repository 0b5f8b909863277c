//! In-memory tag index.
//!
//! The `TagIndex` keeps every item and a posting list per tag in memory and
//! answers the [`TagStore`] lookups directly. It supports:
//!
//! - Bulk loading from an external indexer (`from_items`)
//! - Incremental insert/remove of single items
//! - Parallel scope scans using Rayon for large libraries
//!
//! ## Architecture
//!
//! - A `HashMap<ItemId, Entry>` holds each item's location and tags
//! - A `HashMap<folded tag, HashSet<ItemId>>` is the posting list index
//!
//! Both maps live behind one `RwLock`, so any number of lookups run in
//! parallel while writers are serialized, and a lookup never observes an
//! item and its postings out of sync.

use crate::config::Config;
use crate::error::Result;
use crate::scope::{normalize_location, Scope};
use crate::store::{rank_tag_counts, TagStore};
use crate::types::{fold_tag, IndexStats, Item, ItemId, ItemSet, TagCount, TagName};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Scans over more items than this run on the Rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// An in-memory [`TagStore`].
///
/// ## Example
///
/// ```rust
/// use tagscope_core::{Item, Scope, TagIndex, TagStore};
///
/// let index = TagIndex::from_items(vec![
///     Item::new("1", "/a/1.png").with_tags(["cat"]),
///     Item::new("2", "/b/2.png").with_tags(["cat"]),
/// ]);
///
/// let cats = index.items_with_tag("Cat", &Scope::new(["/a"])).unwrap();
/// assert_eq!(cats.len(), 1);
/// ```
pub struct TagIndex {
    inner: RwLock<IndexInner>,

    /// Fold item locations to lowercase on insert
    case_insensitive: bool,

    /// Item count above which scans go parallel
    parallel_threshold: usize,
}

#[derive(Default)]
struct IndexInner {
    items: HashMap<ItemId, Entry>,
    postings: HashMap<String, HashSet<ItemId>>,
    /// First spelling seen for each folded tag, used for display
    spellings: HashMap<String, String>,
    last_updated: Option<DateTime<Utc>>,
}

struct Entry {
    location: String,
    tags: Vec<TagName>,
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TagIndex {
    /// Create a new empty index with case-insensitive locations.
    pub fn new() -> Self {
        Self::with_options(true, DEFAULT_PARALLEL_THRESHOLD)
    }

    /// Create an empty index with explicit location folding and scan
    /// threshold.
    pub fn with_options(case_insensitive: bool, parallel_threshold: usize) -> Self {
        TagIndex {
            inner: RwLock::new(IndexInner::default()),
            case_insensitive,
            parallel_threshold,
        }
    }

    /// Create an empty index using the `[scope]` and `[performance]`
    /// settings of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(
            config.scope.case_insensitive,
            config.performance.parallel_threshold,
        )
    }

    /// Build an index from a batch of items.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let index = Self::new();
        index.insert_items(items);
        index
    }

    /// Get the number of items in the index.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Insert or replace a batch of items under one write lock.
    #[instrument(skip(self, items))]
    pub fn insert_items(&self, items: impl IntoIterator<Item = Item>) {
        let mut inner = self.inner.write();
        let mut count = 0usize;
        for item in items {
            self.insert_locked(&mut inner, item);
            count += 1;
        }
        inner.last_updated = Some(Utc::now());
        drop(inner);

        info!(items = count, "Loaded items into tag index");
    }

    /// Insert an item, replacing any existing item with the same ID.
    pub fn insert_item(&self, item: Item) {
        let mut inner = self.inner.write();
        self.insert_locked(&mut inner, item);
        inner.last_updated = Some(Utc::now());
    }

    fn insert_locked(&self, inner: &mut IndexInner, mut item: Item) {
        Self::unlink(inner, &item.id);

        // Blank tags can never be queried
        item.tags.retain(|tag| !tag.folded().is_empty());

        for tag in &item.tags {
            inner
                .postings
                .entry(tag.folded().to_string())
                .or_default()
                .insert(item.id.clone());
            inner
                .spellings
                .entry(tag.folded().to_string())
                .or_insert_with(|| tag.as_str().to_string());
        }

        let location = normalize_location(&item.location, self.case_insensitive);
        inner.items.insert(
            item.id,
            Entry {
                location,
                tags: item.tags,
            },
        );
    }

    /// Remove an item. Returns false if it was not indexed.
    pub fn remove_item(&self, id: &ItemId) -> bool {
        let mut inner = self.inner.write();
        let removed = Self::unlink(&mut inner, id);
        if removed {
            inner.last_updated = Some(Utc::now());
        }
        removed
    }

    /// Drop an item and its postings; tags left with no items disappear.
    fn unlink(inner: &mut IndexInner, id: &ItemId) -> bool {
        let Some(entry) = inner.items.remove(id) else {
            return false;
        };
        for tag in &entry.tags {
            let folded = tag.folded();
            let now_empty = match inner.postings.get_mut(folded) {
                Some(ids) => {
                    ids.remove(id);
                    ids.is_empty()
                }
                None => false,
            };
            if now_empty {
                inner.postings.remove(folded);
                inner.spellings.remove(folded);
            }
        }
        true
    }

    /// Get an item by its ID, with its normalized location.
    pub fn get(&self, id: &ItemId) -> Option<Item> {
        let inner = self.inner.read();
        inner.items.get(id).map(|entry| Item {
            id: id.clone(),
            location: entry.location.clone(),
            tags: entry.tags.clone(),
        })
    }

    /// Clear the entire index.
    pub fn clear(&self) {
        *self.inner.write() = IndexInner::default();
    }

    /// Match `scope` to the stored locations: a case-sensitive scope over
    /// a folded index compares with folded prefixes.
    fn fold_scope<'s>(&self, scope: &'s Scope) -> Cow<'s, Scope> {
        if self.case_insensitive && !scope.is_case_insensitive() {
            Cow::Owned(Scope::with_case_sensitivity(scope.prefixes(), true))
        } else {
            Cow::Borrowed(scope)
        }
    }
}

impl TagStore for TagIndex {
    #[instrument(level = "debug", skip(self, scope))]
    fn items_with_tag(&self, tag: &str, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() {
            return Ok(ItemSet::new());
        }

        let scope = self.fold_scope(scope);
        let inner = self.inner.read();
        let Some(ids) = inner.postings.get(&fold_tag(tag)) else {
            debug!(tag, "Tag not in index");
            return Ok(ItemSet::new());
        };

        Ok(ids
            .iter()
            .filter(|id| {
                inner
                    .items
                    .get(*id)
                    .map_or(false, |entry| scope.contains(&entry.location))
            })
            .cloned()
            .collect())
    }

    #[instrument(level = "debug", skip(self, scope))]
    fn all_items_in_scope(&self, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() {
            return Ok(ItemSet::new());
        }

        let scope = self.fold_scope(scope);
        let inner = self.inner.read();

        // Use parallel filtering for large indices
        let result: ItemSet = if inner.items.len() > self.parallel_threshold {
            inner
                .items
                .par_iter()
                .filter(|(_, entry)| scope.contains(&entry.location))
                .map(|(id, _)| id.clone())
                .collect()
        } else {
            inner
                .items
                .iter()
                .filter(|(_, entry)| scope.contains(&entry.location))
                .map(|(id, _)| id.clone())
                .collect()
        };

        Ok(result)
    }

    fn filter_to_scope(&self, ids: &ItemSet, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() || ids.is_empty() {
            return Ok(ItemSet::new());
        }

        let scope = self.fold_scope(scope);
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter(|id| {
                inner
                    .items
                    .get(*id)
                    .map_or(false, |entry| scope.contains(&entry.location))
            })
            .cloned()
            .collect())
    }

    fn tag_counts(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let scope = self.fold_scope(scope);
        let prefix = fold_tag(prefix);
        let inner = self.inner.read();

        let counts = inner
            .postings
            .iter()
            .filter(|(folded, _)| folded.starts_with(&prefix))
            .filter_map(|(folded, ids)| {
                let count = ids
                    .iter()
                    .filter(|id| {
                        inner
                            .items
                            .get(*id)
                            .map_or(false, |entry| scope.contains(&entry.location))
                    })
                    .count() as u64;
                (count > 0).then(|| TagCount {
                    name: inner
                        .spellings
                        .get(folded)
                        .cloned()
                        .unwrap_or_else(|| folded.clone()),
                    count,
                })
            })
            .collect();

        Ok(rank_tag_counts(counts, limit))
    }

    fn stats(&self) -> Result<IndexStats> {
        let inner = self.inner.read();
        Ok(IndexStats {
            total_items: inner.items.len() as u64,
            total_tags: inner.postings.len() as u64,
            total_associations: inner.postings.values().map(|ids| ids.len() as u64).sum(),
            last_updated: inner.last_updated,
        })
    }
}

impl std::fmt::Debug for TagIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagIndex")
            .field("item_count", &self.len())
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}
