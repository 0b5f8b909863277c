//! Abstract syntax tree for tag queries.

use crate::types::fold_tag;
use std::fmt;

/// A parsed tag query.
///
/// The tree is immutable once built and owned entirely by its root; there
/// are no back-references. Display renders a canonical query string that
/// parses back to an equivalent tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Items carrying this tag (case-insensitive)
    TagTerm(String),

    /// Items in both operands
    And(Box<Node>, Box<Node>),

    /// Items in either operand
    Or(Box<Node>, Box<Node>),

    /// In-scope items not matched by the operand
    Not(Box<Node>),

    /// A parenthesized expression; evaluates to its contents
    Group(Box<Node>),

    /// Every item in scope
    AllItems,
}

impl Node {
    pub fn tag(name: impl Into<String>) -> Self {
        Node::TagTerm(name.into())
    }

    pub fn and(left: Node, right: Node) -> Self {
        Node::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Node, right: Node) -> Self {
        Node::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Node) -> Self {
        Node::Not(Box::new(inner))
    }

    pub fn group(inner: Node) -> Self {
        Node::Group(Box::new(inner))
    }

    /// Distinct tag names referenced anywhere in the tree, in first-seen order.
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Node::TagTerm(name) => {
                let folded = fold_tag(name);
                if !out.iter().any(|seen| fold_tag(seen) == folded) {
                    out.push(name);
                }
            }
            Node::And(l, r) | Node::Or(l, r) => {
                l.collect_tags(out);
                r.collect_tags(out);
            }
            Node::Not(inner) | Node::Group(inner) => inner.collect_tags(out),
            Node::AllItems => {}
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Node::TagTerm(_) | Node::AllItems => 1,
            Node::And(l, r) | Node::Or(l, r) => 1 + l.size() + r.size(),
            Node::Not(inner) | Node::Group(inner) => 1 + inner.size(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::TagTerm(name) => {
                if needs_quotes(name) {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "\"{}\"", escaped)
                } else {
                    write!(f, "{}", name)
                }
            }
            Node::And(l, r) => write!(
                f,
                "{} AND {}",
                Operand(l, Precedence::And),
                Operand(r, Precedence::Unary)
            ),
            Node::Or(l, r) => write!(
                f,
                "{} OR {}",
                Operand(l, Precedence::Or),
                Operand(r, Precedence::And)
            ),
            Node::Not(inner) => write!(f, "NOT {}", Operand(inner, Precedence::Unary)),
            Node::Group(inner) => write!(f, "({})", inner),
            Node::AllItems => write!(f, "ALL"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Unary,
}

impl Node {
    fn precedence(&self) -> Precedence {
        match self {
            Node::Or(..) => Precedence::Or,
            Node::And(..) => Precedence::And,
            _ => Precedence::Unary,
        }
    }
}

/// Renders an operand, adding brackets when a hand-built tree nests a
/// looser operator without an explicit `Group`.
struct Operand<'a>(&'a Node, Precedence);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.precedence() < self.1 {
            write!(f, "[{}]", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name == "*"
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"'))
        || ["and", "or", "not", "all"]
            .iter()
            .any(|kw| name.eq_ignore_ascii_case(kw))
}
