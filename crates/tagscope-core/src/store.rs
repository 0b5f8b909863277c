//! Tag store traits.
//!
//! This module defines the interface the evaluator consumes. A store holds
//! items, tags and the item/tag association; the evaluator reaches it only
//! through these lookups. Storage-specific code (locks, SQL, connection
//! handling) stays inside each implementation.
//!
//! ## Implementing a New Store
//!
//! 1. Fold tag names with [`fold_tag`](crate::types::fold_tag) on both the
//!    write and the read side, so `Cat` and `cat` are one tag
//! 2. Normalize item locations with
//!    [`normalize_location`](crate::scope::normalize_location) using the same
//!    case setting the caller's [`Scope`] uses
//! 3. Answer each lookup with one round trip that combines the scope prefix
//!    test with the lookup predicate
//! 4. Make concurrent reads safe without help from the caller

use crate::error::Result;
use crate::scope::Scope;
use crate::types::{IndexStats, ItemSet, TagCount};

/// Scoped, indexed set lookups over tagged items.
///
/// Every method receives the scope explicitly; a store never remembers a
/// scope between calls. Implementations must return only items whose
/// location falls under `scope`.
pub trait TagStore: Send + Sync {
    /// Items in scope carrying `tag` (case-insensitive). Unknown tags yield
    /// an empty set.
    fn items_with_tag(&self, tag: &str, scope: &Scope) -> Result<ItemSet>;

    /// Every item in scope.
    fn all_items_in_scope(&self, scope: &Scope) -> Result<ItemSet>;

    /// Intersect an arbitrary ID set with the scope.
    ///
    /// Only needed when a lookup could not be scoped at query time.
    fn filter_to_scope(&self, ids: &ItemSet, scope: &Scope) -> Result<ItemSet>;

    /// Tags used by in-scope items whose folded name starts with `prefix`,
    /// with distinct item counts, most used first. An empty prefix lists all
    /// tags. `limit` of zero means no limit.
    fn tag_counts(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>>;

    /// Item, tag and association totals.
    fn stats(&self) -> Result<IndexStats>;
}

impl<S: TagStore + ?Sized> TagStore for &S {
    fn items_with_tag(&self, tag: &str, scope: &Scope) -> Result<ItemSet> {
        (**self).items_with_tag(tag, scope)
    }

    fn all_items_in_scope(&self, scope: &Scope) -> Result<ItemSet> {
        (**self).all_items_in_scope(scope)
    }

    fn filter_to_scope(&self, ids: &ItemSet, scope: &Scope) -> Result<ItemSet> {
        (**self).filter_to_scope(ids, scope)
    }

    fn tag_counts(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>> {
        (**self).tag_counts(scope, prefix, limit)
    }

    fn stats(&self) -> Result<IndexStats> {
        (**self).stats()
    }
}

impl<S: TagStore + ?Sized> TagStore for std::sync::Arc<S> {
    fn items_with_tag(&self, tag: &str, scope: &Scope) -> Result<ItemSet> {
        (**self).items_with_tag(tag, scope)
    }

    fn all_items_in_scope(&self, scope: &Scope) -> Result<ItemSet> {
        (**self).all_items_in_scope(scope)
    }

    fn filter_to_scope(&self, ids: &ItemSet, scope: &Scope) -> Result<ItemSet> {
        (**self).filter_to_scope(ids, scope)
    }

    fn tag_counts(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>> {
        (**self).tag_counts(scope, prefix, limit)
    }

    fn stats(&self) -> Result<IndexStats> {
        (**self).stats()
    }
}

/// Sort tag counts by count descending, then name ascending, and truncate.
pub(crate) fn rank_tag_counts(mut counts: Vec<TagCount>, limit: usize) -> Vec<TagCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    if limit > 0 {
        counts.truncate(limit);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_tag_counts() {
        let counts = vec![
            TagCount { name: "dog".to_string(), count: 2 },
            TagCount { name: "cat".to_string(), count: 2 },
            TagCount { name: "bird".to_string(), count: 5 },
            TagCount { name: "ant".to_string(), count: 1 },
        ];

        let ranked = rank_tag_counts(counts.clone(), 0);
        let names: Vec<_> = ranked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["bird", "cat", "dog", "ant"]);

        let ranked = rank_tag_counts(counts, 2);
        assert_eq!(ranked.len(), 2);
    }
}
