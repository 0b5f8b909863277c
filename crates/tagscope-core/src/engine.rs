//! Parse-then-evaluate facade.

use crate::ast::Node;
use crate::config::Config;
use crate::error::Result;
use crate::evaluator::{CancelToken, Evaluation, Evaluator};
use crate::parser::{parse_with, ParseOptions};
use crate::scope::Scope;
use crate::store::TagStore;
use crate::types::TagCount;
use tracing::{info, instrument};

/// Runs textual queries against a store.
///
/// The engine owns its store and parse settings but no per-query state, so
/// one engine can serve concurrent callers.
///
/// ## Example
///
/// ```rust
/// use tagscope_core::{Item, QueryEngine, Scope, TagIndex};
///
/// let engine = QueryEngine::new(TagIndex::from_items(vec![
///     Item::new("1", "/a/1").with_tags(["cat"]),
///     Item::new("2", "/a/2").with_tags(["dog"]),
/// ]));
///
/// let result = engine.search("cat OR dog", &Scope::new(["/a"])).unwrap();
/// assert_eq!(result.len(), 2);
/// ```
#[derive(Debug)]
pub struct QueryEngine<S: TagStore> {
    store: S,
    options: ParseOptions,
    parallel: bool,
}

impl<S: TagStore> QueryEngine<S> {
    pub fn new(store: S) -> Self {
        QueryEngine {
            store,
            options: ParseOptions::default(),
            parallel: false,
        }
    }

    /// An engine using the `[query]` and `[performance]` settings of `config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        QueryEngine {
            store,
            options: config.parse_options(),
            parallel: config.performance.parallel_branches,
        }
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Evaluate OR branches in parallel.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a query with this engine's settings.
    pub fn parse(&self, text: &str) -> Result<Node> {
        parse_with(text, &self.options)
    }

    /// Parse and evaluate `text` over `scope`.
    ///
    /// Syntax errors are returned as errors; failed store lookups are not,
    /// see [`Evaluation::failures`].
    pub fn search(&self, text: &str, scope: &Scope) -> Result<Evaluation> {
        self.search_cancellable(text, scope, &CancelToken::new())
    }

    /// Like [`search`](Self::search), abandoning evaluation once `cancel`
    /// trips.
    #[instrument(skip(self, scope, cancel))]
    pub fn search_cancellable(
        &self,
        text: &str,
        scope: &Scope,
        cancel: &CancelToken,
    ) -> Result<Evaluation> {
        let ast = self.parse(text)?;
        let result = Evaluator::new(&self.store, scope)
            .parallel(self.parallel)
            .evaluate_cancellable(&ast, cancel)?;

        info!(
            query = %ast,
            prefixes = scope.len(),
            matches = result.len(),
            degraded = result.failures.len(),
            "Search complete"
        );
        Ok(result)
    }

    /// Tag suggestions for the text typed so far.
    pub fn suggest_tags(&self, scope: &Scope, prefix: &str, limit: usize) -> Result<Vec<TagCount>> {
        self.store.tag_counts(scope, prefix, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagScopeError;
    use crate::index::TagIndex;
    use crate::types::{Item, ItemId};

    fn engine() -> QueryEngine<TagIndex> {
        QueryEngine::new(TagIndex::from_items(vec![
            Item::new("1", "/a/1").with_tags(["cat"]),
            Item::new("2", "/a/2").with_tags(["dog"]),
            Item::new("3", "/b/3").with_tags(["cat", "dog"]),
            Item::new("4", "/a/4").with_tags(["long hair"]),
        ]))
    }

    #[test]
    fn test_search() {
        let engine = engine();
        let scope = Scope::new(["/a"]);

        let result = engine.search("cat OR dog", &scope).unwrap();
        assert_eq!(result.sorted_ids(), vec![ItemId::from("1"), ItemId::from("2")]);
        assert!(result.is_complete());
    }

    #[test]
    fn test_syntax_error_never_reaches_store() {
        let engine = engine();
        let err = engine.search("cat AND", &Scope::new(["/a"])).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.position(), Some(7));
    }

    #[test]
    fn test_deep_queries() {
        let engine = engine();
        let scope = Scope::new(["/a"]);

        let expected = engine.search("cat", &scope).unwrap().sorted_ids();
        let nested = format!("{}cat", "NOT ".repeat(200));
        assert_eq!(engine.search(&nested, &scope).unwrap().sorted_ids(), expected);

        let too_deep = format!("{}cat", "NOT ".repeat(50_000));
        assert!(engine.search(&too_deep, &scope).unwrap_err().is_syntax());
    }

    #[test]
    fn test_parse_options_apply() {
        let scope = Scope::new(["/a"]);

        let implicit = engine();
        assert!(implicit.search("long hair", &scope).unwrap().is_empty());

        let joined = engine().with_parse_options(ParseOptions {
            implicit_and: false,
            ..ParseOptions::default()
        });
        let result = joined.search("long hair", &scope).unwrap();
        assert_eq!(result.sorted_ids(), vec![ItemId::from("4")]);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.query.implicit_and = false;
        config.performance.parallel_branches = true;

        let engine = QueryEngine::from_config(TagIndex::new(), &config);
        assert!(!engine.parse_options().implicit_and);
        assert!(engine.parallel);
    }

    #[test]
    fn test_cancelled_search() {
        let engine = engine();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = engine
            .search_cancellable("cat", &Scope::new(["/a"]), &cancel)
            .unwrap_err();
        assert!(matches!(err, TagScopeError::Cancelled));
    }

    #[test]
    fn test_suggest_tags() {
        let engine = engine();
        let tags = engine.suggest_tags(&Scope::new(["/a"]), "", 0).unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["cat", "dog", "long hair"]);
    }
}
