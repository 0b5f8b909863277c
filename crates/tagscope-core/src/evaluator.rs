//! Scoped evaluation of query trees.
//!
//! The evaluator walks a [`Node`] tree and turns it into set algebra over a
//! [`TagStore`]. Every leaf lookup is scoped, and NOT complements against
//! the items in scope rather than the whole store, so no path through the
//! tree can return an item outside the scope.
//!
//! ## Failure policy
//!
//! A failed store lookup does not abort the query. The failing leaf counts
//! as an empty set, a warning is logged, and the failure is recorded in
//! [`Evaluation::failures`] so callers can tell "no matches" apart from
//! "lookup failed". Healthy branches of an OR still contribute results.
//!
//! ## Cancellation
//!
//! Evaluation checks a [`CancelToken`] at every node boundary. Results are
//! plain values merged on the way back up, so abandoning a branch leaves no
//! partial state behind.

use crate::ast::Node;
use crate::error::{Result, TagScopeError};
use crate::scope::Scope;
use crate::store::TagStore;
use crate::types::{ItemId, ItemSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The store lookup a failure happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Items carrying a tag
    Tag(String),
    /// All items in scope
    AllInScope,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Tag(tag) => write!(f, "tag '{}'", tag),
            Lookup::AllInScope => write!(f, "all items in scope"),
        }
    }
}

/// A store lookup that failed and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub lookup: Lookup,
    pub reason: String,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.lookup, self.reason)
    }
}

/// The outcome of evaluating a query.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Matching item IDs, unordered
    pub items: ItemSet,

    /// Lookups that failed and contributed nothing
    pub failures: Vec<LookupFailure>,

    /// Number of store round trips made
    pub lookups: usize,
}

impl Evaluation {
    /// True if every lookup succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of matching items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Matching IDs in sorted order, for stable display.
    pub fn sorted_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.items.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Discard diagnostics and keep the matching IDs.
    pub fn into_items(self) -> ItemSet {
        self.items
    }
}

/// Shared cancellation flag with an optional deadline.
///
/// Clones share the flag, so a caller can keep one clone and cancel an
/// evaluation running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TagScopeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Evaluates query trees against one store and one scope.
///
/// ## Example
///
/// ```rust
/// use tagscope_core::{parse, Evaluator, Item, ItemId, Scope, TagIndex};
///
/// let index = TagIndex::from_items(vec![
///     Item::new("1", "/a/1").with_tags(["cat"]),
///     Item::new("2", "/a/2").with_tags(["dog"]),
///     Item::new("3", "/b/3").with_tags(["cat", "dog"]),
/// ]);
/// let scope = Scope::new(["/a"]);
///
/// let result = Evaluator::new(&index, &scope).evaluate(&parse("NOT cat").unwrap());
/// assert_eq!(result.sorted_ids(), vec![ItemId::from("2")]);
/// ```
pub struct Evaluator<'a, S: TagStore + ?Sized> {
    store: &'a S,
    scope: &'a Scope,
    parallel: bool,
}

/// Evaluate `node` over `scope` with default settings.
pub fn evaluate<S: TagStore + ?Sized>(store: &S, node: &Node, scope: &Scope) -> Evaluation {
    Evaluator::new(store, scope).evaluate(node)
}

impl<'a, S: TagStore + ?Sized> Evaluator<'a, S> {
    pub fn new(store: &'a S, scope: &'a Scope) -> Self {
        Evaluator {
            store,
            scope,
            parallel: false,
        }
    }

    /// Evaluate the two sides of each OR on the Rayon pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Evaluate a query tree.
    pub fn evaluate(&self, node: &Node) -> Evaluation {
        // A fresh token is never cancelled, so this cannot fail.
        self.evaluate_cancellable(node, &CancelToken::new())
            .unwrap_or_default()
    }

    /// Evaluate a query tree, giving up with [`TagScopeError::Cancelled`]
    /// once `cancel` trips.
    pub fn evaluate_cancellable(&self, node: &Node, cancel: &CancelToken) -> Result<Evaluation> {
        let started = Instant::now();

        if self.scope.is_empty() {
            debug!("Empty scope, skipping evaluation");
            return Ok(Evaluation::default());
        }

        let partial = self.eval(node, cancel)?;

        debug!(
            query = %node,
            scope = %self.scope,
            matches = partial.items.len(),
            lookups = partial.lookups,
            failures = partial.failures.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Query evaluated"
        );

        Ok(Evaluation {
            items: partial.items,
            failures: partial.failures,
            lookups: partial.lookups,
        })
    }

    fn eval(&self, node: &Node, cancel: &CancelToken) -> Result<Partial> {
        cancel.check()?;

        match node {
            Node::TagTerm(tag) => Ok(self.lookup(Lookup::Tag(tag.clone()), |store, scope| {
                store.items_with_tag(tag, scope)
            })),

            Node::AllItems => Ok(self.lookup(Lookup::AllInScope, |store, scope| {
                store.all_items_in_scope(scope)
            })),

            Node::And(left, right) => {
                let left = self.eval(left, cancel)?;
                if left.items.is_empty() {
                    return Ok(left);
                }

                // left is already scoped, so `left AND NOT x` is `left - x`
                // and the in-scope universe is never fetched.
                if let Node::Not(excluded) = right.as_ref() {
                    let excluded = self.eval(excluded, cancel)?;
                    return Ok(left.combine(excluded, |l, r| {
                        l.retain(|id| !r.contains(id));
                    }));
                }

                let right = self.eval(right, cancel)?;
                Ok(left.combine(right, |l, r| l.retain(|id| r.contains(id))))
            }

            Node::Or(left, right) => {
                let (left, right) = if self.parallel {
                    rayon::join(|| self.eval(left, cancel), || self.eval(right, cancel))
                } else {
                    (self.eval(left, cancel), self.eval(right, cancel))
                };
                Ok(left?.combine(right?, |l, r| l.extend(r.iter().cloned())))
            }

            Node::Not(inner) => {
                let universe = self.lookup(Lookup::AllInScope, |store, scope| {
                    store.all_items_in_scope(scope)
                });
                if universe.items.is_empty() {
                    return Ok(universe);
                }

                let excluded = self.eval(inner, cancel)?;
                Ok(universe.combine(excluded, |l, r| l.retain(|id| !r.contains(id))))
            }

            Node::Group(inner) => self.eval(inner, cancel),
        }
    }

    /// Run one store round trip, degrading a failure to an empty set.
    fn lookup<F>(&self, lookup: Lookup, run: F) -> Partial
    where
        F: FnOnce(&S, &Scope) -> Result<ItemSet>,
    {
        match run(self.store, self.scope) {
            Ok(items) => Partial {
                items,
                failures: Vec::new(),
                lookups: 1,
            },
            Err(err) => {
                warn!(lookup = %lookup, error = %err, "Lookup failed, treating as empty");
                Partial {
                    items: ItemSet::new(),
                    failures: vec![LookupFailure {
                        lookup,
                        reason: err.to_string(),
                    }],
                    lookups: 1,
                }
            }
        }
    }
}

/// A sub-result on its way up the tree.
struct Partial {
    items: ItemSet,
    failures: Vec<LookupFailure>,
    lookups: usize,
}

impl Partial {
    /// Merge `other` into `self`: `op` combines the item sets, diagnostics
    /// are concatenated.
    fn combine(mut self, other: Partial, op: impl FnOnce(&mut ItemSet, &ItemSet)) -> Partial {
        op(&mut self.items, &other.items);
        self.failures.extend(other.failures);
        self.lookups += other.lookups;
        self
    }
}
