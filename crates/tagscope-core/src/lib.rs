//! # Tagscope Core Library
//!
//! This crate provides the query language, scoped evaluation and tag stores
//! behind the Tagscope image tag search. A query such as
//! `cat AND (outdoors OR "long hair") AND NOT blurry` is parsed into an AST
//! and evaluated as set algebra over a tag store, always restricted to a
//! scope of location prefixes.
//!
//! ## Architecture
//!
//! - **Parser** (`parser`, `ast`): Query text to a closed `Node` tree
//! - **Scope** (`scope`): Normalized location prefixes a query is limited to
//! - **Evaluator** (`evaluator`): Scoped set algebra over a `TagStore`
//! - **Stores** (`store`, `index`, `sqlite`): The store trait, an in-memory
//!   index and a SQLite-backed store
//! - **Engine** (`engine`): Parse-then-evaluate facade
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust
//! use tagscope_core::{Item, QueryEngine, Scope, TagIndex};
//!
//! let index = TagIndex::from_items(vec![
//!     Item::new("1", "/a/1.png").with_tags(["cat"]),
//!     Item::new("2", "/a/2.png").with_tags(["dog"]),
//!     Item::new("3", "/b/3.png").with_tags(["cat", "dog"]),
//! ]);
//! let engine = QueryEngine::new(index);
//!
//! let result = engine.search("cat OR dog", &Scope::new(["/a"])).unwrap();
//! for id in result.sorted_ids() {
//!     println!("{}", id);
//! }
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod parser;
pub mod scope;
pub mod sqlite;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use ast::Node;
pub use config::Config;
pub use engine::QueryEngine;
pub use error::{Result, TagScopeError};
pub use evaluator::{evaluate, CancelToken, Evaluation, Evaluator, Lookup, LookupFailure};
pub use index::TagIndex;
pub use parser::{parse, parse_with, ParseOptions};
pub use scope::Scope;
pub use sqlite::SqliteTagStore;
pub use store::TagStore;
pub use types::{fold_tag, IndexStats, Item, ItemId, ItemSet, TagCount, TagName};
