//! SQLite-backed tag store.
//!
//! Items, tags and their association live in three tables:
//!
//! ```text
//! items(id, location)
//! tags(id, name, name_folded)
//! item_tags(item_id, tag_id)
//! ```
//!
//! Every lookup is a single statement that joins the tag predicate with the
//! scope test, so scoping happens inside the database rather than on a
//! materialized result. The scope test is a disjunction of
//! `location LIKE '<prefix>%'` clauses with LIKE metacharacters escaped and
//! `case_sensitive_like` enabled, so a prefix only ever matches literally.

use crate::error::{Result, TagScopeError};
use crate::scope::{normalize_location, Scope};
use crate::store::{rank_tag_counts, TagStore};
use crate::types::{fold_tag, IndexStats, Item, ItemId, ItemSet, TagCount, TagName};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Largest number of IDs bound into a single `IN (...)` list.
const ID_CHUNK: usize = 500;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    location TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_location ON items(location);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_folded TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS item_tags (
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, tag_id)
);
CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);

CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// A [`TagStore`] over a SQLite database file.
///
/// The connection sits behind a mutex, so the store can be shared across
/// threads; lookups from parallel OR branches take turns on it.
#[derive(Clone)]
pub struct SqliteTagStore {
    conn: Arc<Mutex<Connection>>,
    case_insensitive: bool,
}

impl std::fmt::Debug for SqliteTagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTagStore")
            .field("case_insensitive", &self.case_insensitive)
            .finish_non_exhaustive()
    }
}

impl SqliteTagStore {
    /// Open (or create) a store with case-insensitive locations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Open (or create) a store, choosing whether locations fold to
    /// lowercase. Reopening a database with a different setting leaves
    /// existing locations as they were written.
    pub fn open_with(path: impl AsRef<Path>, case_insensitive: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!(path = %path.display(), "Opening tag database");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, case_insensitive)
    }

    /// A private in-memory database, mostly for tests and one-off tools.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, true)
    }

    fn from_connection(conn: Connection, case_insensitive: bool) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update(None, "case_sensitive_like", true)?;

        let store = SqliteTagStore {
            conn: Arc::new(Mutex::new(conn)),
            case_insensitive,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Whether locations are folded to lowercase on insert.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Insert or replace a batch of items in one transaction.
    #[instrument(skip(self, items))]
    pub fn insert_items(&self, items: impl IntoIterator<Item = Item>) -> Result<usize> {
        let count = self.with_tx(|tx| {
            let mut count = 0usize;
            for item in items {
                self.insert_in(tx, &item)?;
                count += 1;
            }
            touch(tx)?;
            Ok(count)
        })?;

        info!(items = count, "Stored items");
        Ok(count)
    }

    /// Insert an item, replacing any existing item with the same ID.
    pub fn insert_item(&self, item: &Item) -> Result<()> {
        self.with_tx(|tx| {
            self.insert_in(tx, item)?;
            touch(tx)
        })
    }

    fn insert_in(&self, tx: &Transaction<'_>, item: &Item) -> Result<()> {
        let location = normalize_location(&item.location, self.case_insensitive);
        tx.execute(
            r"
            INSERT INTO items(id, location) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET location = excluded.location
            ",
            params![item.id.as_str(), location],
        )?;
        tx.execute(
            "DELETE FROM item_tags WHERE item_id = ?1",
            params![item.id.as_str()],
        )?;

        for tag in &item.tags {
            if tag.folded().is_empty() {
                continue;
            }
            tx.execute(
                r"
                INSERT INTO tags(name, name_folded) VALUES (?1, ?2)
                ON CONFLICT(name_folded) DO NOTHING
                ",
                params![tag.as_str(), tag.folded()],
            )?;
            tx.execute(
                r"
                INSERT OR IGNORE INTO item_tags(item_id, tag_id)
                SELECT ?1, id FROM tags WHERE name_folded = ?2
                ",
                params![item.id.as_str(), tag.folded()],
            )?;
        }
        Ok(())
    }

    /// Remove an item. Returns false if it was not stored.
    pub fn remove_item(&self, id: &ItemId) -> Result<bool> {
        self.with_tx(|tx| {
            let removed = tx.execute("DELETE FROM items WHERE id = ?1", params![id.as_str()])?;
            if removed > 0 {
                prune_tags(tx)?;
                touch(tx)?;
            }
            Ok(removed > 0)
        })
    }

    /// Delete every item and tag.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.with_tx(|tx| {
            let removed = tx.execute("DELETE FROM items", [])?;
            tx.execute("DELETE FROM tags", [])?;
            touch(tx)?;
            Ok(removed)
        })?;
        info!(removed, "Cleared tag database");
        Ok(removed)
    }

    /// Fetch items with their locations and tags, in the order requested.
    /// Unknown IDs are skipped.
    pub fn items(&self, ids: &[ItemId]) -> Result<Vec<Item>> {
        let mut found: HashMap<String, Item> = HashMap::with_capacity(ids.len());

        self.with_conn(|conn| {
            for chunk in ids.chunks(ID_CHUNK) {
                let sql = format!(
                    r"
                    SELECT i.id, i.location, t.name
                    FROM items i
                    LEFT JOIN item_tags it ON it.item_id = i.id
                    LEFT JOIN tags t ON t.id = it.tag_id
                    WHERE i.id IN ({})
                    ORDER BY t.name_folded
                    ",
                    placeholders(1, chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(chunk.iter().map(|id| id.as_str())))?;
                while let Some(row) = rows.next()? {
                    let id: String = row.get(0)?;
                    let location: String = row.get(1)?;
                    let tag: Option<String> = row.get(2)?;
                    let item = found
                        .entry(id.clone())
                        .or_insert_with(|| Item::new(id, location));
                    if let Some(tag) = tag {
                        item.tags.push(TagName::new(tag));
                    }
                }
            }
            Ok(())
        })?;

        Ok(ids
            .iter()
            .filter_map(|id| found.remove(id.as_str()))
            .collect())
    }

    /// `(location LIKE ?n ESCAPE '\' OR ...)` for every scope prefix, with
    /// placeholders numbered from `first`, plus the bound patterns.
    fn scope_clause(&self, scope: &Scope, first: usize) -> (String, Vec<String>) {
        let patterns: Vec<String> = scope
            .prefixes()
            .map(|prefix| {
                let prefix = if self.case_insensitive {
                    prefix.to_lowercase()
                } else {
                    prefix.to_string()
                };
                format!("{}%", escape_like(&prefix))
            })
            .collect();

        let clause = (0..patterns.len())
            .map(|i| format!(r"i.location LIKE ?{} ESCAPE '\'", first + i))
            .collect::<Vec<_>>()
            .join(" OR ");

        (format!("({})", clause), patterns)
    }

    fn query_ids(&self, sql: &str, params: Vec<String>) -> Result<ItemSet> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            let mut ids = ItemSet::new();
            for id in rows {
                ids.insert(ItemId::new(id?));
            }
            Ok(ids)
        })
    }
}

impl TagStore for SqliteTagStore {
    #[instrument(level = "debug", skip(self, scope))]
    fn items_with_tag(&self, tag: &str, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() {
            return Ok(ItemSet::new());
        }

        let (clause, patterns) = self.scope_clause(scope, 2);
        let sql = format!(
            r"
            SELECT DISTINCT i.id
            FROM items i
            JOIN item_tags it ON it.item_id = i.id
            JOIN tags t ON t.id = it.tag_id
            WHERE t.name_folded = ?1 AND {}
            ",
            clause
        );

        let mut params = Vec::with_capacity(patterns.len() + 1);
        params.push(fold_tag(tag));
        params.extend(patterns);

        let ids = self
            .query_ids(&sql, params)
            .map_err(|e| TagScopeError::lookup(format!("tag '{}'", tag), e.to_string()))?;
        debug!(tag, matches = ids.len(), "Tag lookup");
        Ok(ids)
    }

    #[instrument(level = "debug", skip(self, scope))]
    fn all_items_in_scope(&self, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() {
            return Ok(ItemSet::new());
        }

        let (clause, patterns) = self.scope_clause(scope, 1);
        let sql = format!("SELECT i.id FROM items i WHERE {}", clause);
        self.query_ids(&sql, patterns)
            .map_err(|e| TagScopeError::lookup("all items in scope", e.to_string()))
    }

    fn filter_to_scope(&self, ids: &ItemSet, scope: &Scope) -> Result<ItemSet> {
        if scope.is_empty() || ids.is_empty() {
            return Ok(ItemSet::new());
        }

        let ids: Vec<&ItemId> = ids.iter().collect();
        let mut kept = ItemSet::new();

        for chunk in ids.chunks(ID_CHUNK) {
            let (clause, patterns) = self.scope_clause(scope, chunk.len() + 1);
            let sql = format!(
                "SELECT i.id FROM items i WHERE i.id IN ({}) AND {}",
                placeholders(1, chunk.len()),
                clause
            );
            let mut params: Vec<String> = chunk.iter().map(|id| id.as_str().to_string()).collect();
            params.extend(patterns);
            kept.extend(self.query_ids(&sql, params)?);
        }

        Ok(kept)
    }

    fn tag_counts(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let (clause, patterns) = self.scope_clause(scope, 2);
        let sql = format!(
            r"
            SELECT t.name, COUNT(DISTINCT i.id) AS n
            FROM tags t
            JOIN item_tags it ON it.tag_id = t.id
            JOIN items i ON i.id = it.item_id
            WHERE t.name_folded LIKE ?1 ESCAPE '\' AND {}
            GROUP BY t.id
            ",
            clause
        );

        let mut params = Vec::with_capacity(patterns.len() + 1);
        params.push(format!("{}%", escape_like(&fold_tag(prefix))));
        params.extend(patterns);

        let counts = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok(TagCount {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })?;

        Ok(rank_tag_counts(counts, limit))
    }

    fn stats(&self) -> Result<IndexStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64> {
                Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as u64)
            };

            let last_updated = conn
                .query_row(
                    "SELECT value FROM store_meta WHERE key = 'last_updated'",
                    [],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
                .map(|ts| ts.with_timezone(&Utc));

            Ok(IndexStats {
                total_items: count("SELECT COUNT(*) FROM items")?,
                total_tags: count("SELECT COUNT(DISTINCT tag_id) FROM item_tags")?,
                total_associations: count("SELECT COUNT(*) FROM item_tags")?,
                last_updated,
            })
        })
    }
}

fn touch(tx: &Transaction<'_>) -> Result<()> {
    tx.execute(
        r"
        INSERT INTO store_meta(key, value) VALUES ('last_updated', ?1)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        ",
        params![Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Drop tags no item carries any more.
fn prune_tags(tx: &Transaction<'_>) -> Result<()> {
    tx.execute(
        "DELETE FROM tags WHERE id NOT IN (SELECT DISTINCT tag_id FROM item_tags)",
        [],
    )?;
    Ok(())
}

/// `?first, ?first+1, ...` for `count` parameters.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| format!("?{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters for use with `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::index::TagIndex;
    use crate::parser::parse;
    use tempfile::TempDir;

    fn library() -> Vec<Item> {
        vec![
            Item::new("1", "/Photos/1.png").with_tags(["Cat", "outdoors"]),
            Item::new("2", "/photos/2.png").with_tags(["dog", "outdoors"]),
            Item::new("3", "/photos/3.png").with_tags(["cat", "dog"]),
            Item::new("4", "/photos/sub/4.png").with_tags(["bird"]),
            Item::new("5", "/photos/5.png"),
            Item::new("6", "/archive/6.png").with_tags(["cat"]),
            Item::new("7", "/photosbackup/7.png").with_tags(["cat"]),
            Item::new("8", "/odd_dir/8.png").with_tags(["cat"]),
            Item::new("9", "/oddxdir/9.png").with_tags(["cat"]),
        ]
    }

    fn store() -> SqliteTagStore {
        let store = SqliteTagStore::open_in_memory().unwrap();
        store.insert_items(library()).unwrap();
        store
    }

    fn ids(values: &[&str]) -> ItemSet {
        values.iter().map(|v| ItemId::from(*v)).collect()
    }

    #[test]
    fn test_items_with_tag_scoped() {
        let store = store();
        let scope = Scope::new(["/photos"]);

        assert_eq!(store.items_with_tag("CAT", &scope).unwrap(), ids(&["1", "3"]));
        assert_eq!(store.items_with_tag("unicorn", &scope).unwrap(), ItemSet::new());
        assert_eq!(
            store.all_items_in_scope(&scope).unwrap(),
            ids(&["1", "2", "3", "4", "5"])
        );
    }

    #[test]
    fn test_like_metacharacters_are_literal() {
        let store = store();
        let scope = Scope::new(["/odd_dir"]);
        assert_eq!(store.all_items_in_scope(&scope).unwrap(), ids(&["8"]));
    }

    #[test]
    fn test_empty_scope() {
        let store = store();
        assert!(store.all_items_in_scope(&Scope::empty()).unwrap().is_empty());
        assert!(store.items_with_tag("cat", &Scope::empty()).unwrap().is_empty());
        assert!(store.tag_counts(&Scope::empty(), "", 0).unwrap().is_empty());
    }

    #[test]
    fn test_filter_to_scope() {
        let store = store();
        let scope = Scope::new(["/photos", "/archive"]);
        let filtered = store
            .filter_to_scope(&ids(&["1", "6", "7", "missing"]), &scope)
            .unwrap();
        assert_eq!(filtered, ids(&["1", "6"]));
    }

    #[test]
    fn test_filter_to_scope_chunks_large_sets() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        store
            .insert_items((0..1200).map(|n| Item::new(n.to_string(), format!("/lib/{}.png", n))))
            .unwrap();

        let all: ItemSet = (0..1300).map(|n| ItemId::new(n.to_string())).collect();
        let filtered = store.filter_to_scope(&all, &Scope::new(["/lib"])).unwrap();
        assert_eq!(filtered.len(), 1200);
    }

    #[test]
    fn test_case_sensitive_locations() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        let store = SqliteTagStore {
            case_insensitive: false,
            ..store
        };
        store
            .insert_items(vec![
                Item::new("1", "/Photos/1.png"),
                Item::new("2", "/photos/2.png"),
            ])
            .unwrap();

        let scope = Scope::with_case_sensitivity(["/Photos"], false);
        assert_eq!(store.all_items_in_scope(&scope).unwrap(), ids(&["1"]));
    }

    #[test]
    fn test_replace_and_remove() {
        let store = store();
        let scope = Scope::new(["/"]);

        store
            .insert_item(&Item::new("3", "/photos/3.png").with_tags(["bird"]))
            .unwrap();
        assert_eq!(store.items_with_tag("dog", &scope).unwrap(), ids(&["2"]));
        assert_eq!(store.items_with_tag("bird", &scope).unwrap(), ids(&["3", "4"]));

        assert!(store.remove_item(&ItemId::from("4")).unwrap());
        assert!(!store.remove_item(&ItemId::from("4")).unwrap());
        assert_eq!(store.items_with_tag("bird", &scope).unwrap(), ids(&["3"]));
    }

    #[test]
    fn test_clear() {
        let store = store();
        assert_eq!(store.clear().unwrap(), 9);

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.total_tags, 0);
        assert!(store.tag_counts(&Scope::new(["/"]), "", 0).unwrap().is_empty());
    }

    #[test]
    fn test_tag_counts() {
        let store = store();
        let scope = Scope::new(["/photos"]);

        let counts = store.tag_counts(&scope, "", 0).unwrap();
        assert_eq!(
            counts,
            vec![
                TagCount { name: "Cat".to_string(), count: 2 },
                TagCount { name: "dog".to_string(), count: 2 },
                TagCount { name: "outdoors".to_string(), count: 2 },
                TagCount { name: "bird".to_string(), count: 1 },
            ]
        );

        let counts = store.tag_counts(&scope, "D", 0).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].name, "dog");

        assert_eq!(store.tag_counts(&scope, "", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_items_lookup() {
        let store = store();
        let items = store
            .items(&[ItemId::from("3"), ItemId::from("missing"), ItemId::from("1")])
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, ItemId::from("3"));
        assert_eq!(items[1].location, "/photos/1.png");
        assert!(items[1].has_tag("cat"));
        assert!(items[1].has_tag("OUTDOORS"));
    }

    #[test]
    fn test_stats() {
        let store = store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_items, 9);
        assert_eq!(stats.total_tags, 4);
        assert_eq!(stats.total_associations, 11);
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("images.db");

        {
            let store = SqliteTagStore::open(&path).unwrap();
            store.insert_items(library()).unwrap();
        }

        let store = SqliteTagStore::open(&path).unwrap();
        assert_eq!(
            store.items_with_tag("cat", &Scope::new(["/archive"])).unwrap(),
            ids(&["6"])
        );
    }

    #[test]
    fn test_agrees_with_in_memory_index() {
        let sqlite = store();
        let index = TagIndex::from_items(library());

        let scopes = [
            Scope::new(["/photos"]),
            Scope::new(["/archive", "/odd_dir"]),
            Scope::new(["/"]),
            Scope::with_case_sensitivity(["/Photos"], false),
        ];
        let queries = [
            "cat",
            "cat OR dog",
            "outdoors AND NOT cat",
            "NOT (cat OR bird)",
            "all",
            "[cat dog] OR bird",
        ];

        for scope in &scopes {
            for query in queries {
                let ast = parse(query).unwrap();
                assert_eq!(
                    evaluate(&sqlite, &ast, scope).items,
                    evaluate(&index, &ast, scope).items,
                    "{} over {}",
                    query,
                    scope
                );
            }
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("/a_b/"), "/a\\_b/");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("c:\\x"), "c:\\\\x");
    }
}
