//! Query parsing for Tagscope.
//!
//! Turns query text into an [`ast::Node`](crate::ast::Node) tree. The
//! grammar, loosest binding first:
//!
//! ```text
//! Or      := And (OR And)*
//! And     := Unary (AND Unary | Unary)*
//! Unary   := NOT Unary | Primary
//! Primary := '(' Or ')' | '[' Or ']' | ALL | TAG
//! ```
//!
//! ## Query Syntax
//!
//! - `cat dog` - Items tagged both `cat` and `dog` (implicit AND)
//! - `cat AND dog` - Same, explicit
//! - `cat OR dog` - Items tagged with either
//! - `NOT cat` - Items in scope not tagged `cat`
//! - `cat AND (dog OR bird)` - Grouping, `[ ]` works too
//! - `ALL` or `*` - Every item in scope
//! - `"long hair"` - Quoted tags may contain spaces or spell a keyword
//!
//! Keywords are case-insensitive. Parsing never touches a store.

use crate::ast::Node;
use crate::error::{Result, TagScopeError};
use std::fmt;

/// Deepest tree the parser will build. Evaluation and drop both recurse
/// over the tree, so the limit keeps hostile input off the stack.
pub const MAX_DEPTH: usize = 256;

/// Knobs that change how query text is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Treat adjacent terms as AND. When disabled, adjacent bare words are
    /// joined into one multi-word tag instead.
    pub implicit_and: bool,

    /// Words that mean "every item in scope" (case-insensitive)
    pub all_keywords: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            implicit_and: true,
            all_keywords: vec!["all".to_string(), "*".to_string()],
        }
    }
}

/// Parse a query with default options.
///
/// # Example
/// ```
/// use tagscope_core::{parse, Node};
///
/// let ast = parse("a AND b OR c").unwrap();
/// assert_eq!(
///     ast,
///     Node::or(Node::and(Node::tag("a"), Node::tag("b")), Node::tag("c"))
/// );
/// ```
pub fn parse(input: &str) -> Result<Node> {
    parse_with(input, &ParseOptions::default())
}

/// Parse a query with explicit options.
pub fn parse_with(input: &str, options: &ParseOptions) -> Result<Node> {
    let tokens = tokenize(input, options)?;
    Parser {
        tokens,
        pos: 0,
        input_len: input.len(),
        implicit_and: options.implicit_and,
        nesting: 0,
    }
    .parse()
}

// === Tokens ===

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Quoted(String),
    And,
    Or,
    Not,
    All,
    Open(char),
    Close(char),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "'{}'", w),
            TokenKind::Quoted(q) => write!(f, "\"{}\"", q),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::Not => write!(f, "NOT"),
            TokenKind::All => write!(f, "ALL"),
            TokenKind::Open(c) | TokenKind::Close(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
}

fn closer_for(open: char) -> char {
    if open == '[' {
        ']'
    } else {
        ')'
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '"')
}

fn tokenize(input: &str, options: &ParseOptions) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | '[' => {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Open(ch),
                    start,
                });
            }
            ')' | ']' => {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Close(ch),
                    start,
                });
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(TagScopeError::syntax("missing closing quote", start));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    start,
                });
            }
            _ => {
                let mut end = input.len();
                while let Some(&(idx, c)) = chars.peek() {
                    if is_delimiter(c) {
                        end = idx;
                        break;
                    }
                    chars.next();
                }
                let word = &input[start..end];
                tokens.push(Token {
                    kind: classify_word(word, options),
                    start,
                });
            }
        }
    }

    Ok(tokens)
}

fn classify_word(word: &str, options: &ParseOptions) -> TokenKind {
    if word.eq_ignore_ascii_case("and") {
        TokenKind::And
    } else if word.eq_ignore_ascii_case("or") {
        TokenKind::Or
    } else if word.eq_ignore_ascii_case("not") {
        TokenKind::Not
    } else if options
        .all_keywords
        .iter()
        .any(|kw| word.eq_ignore_ascii_case(kw))
    {
        TokenKind::All
    } else {
        TokenKind::Word(word.to_string())
    }
}

// === Parser ===

fn too_deep(position: usize) -> TagScopeError {
    TagScopeError::syntax(
        format!("query nested too deeply (limit {})", MAX_DEPTH),
        position,
    )
}

/// Recursive-descent parser over the token list. Each grammar rule is one
/// method returning the node and its height; binary operators fold left so
/// `a AND b AND c` is `And(And(a, b), c)`.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    input_len: usize,
    implicit_and: bool,
    /// Open NOTs and groups on the call stack
    nesting: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Err(TagScopeError::syntax("empty query", 0));
        }

        let (expr, _) = self.parse_or()?;

        if let Some(token) = self.peek() {
            let message = match &token.kind {
                TokenKind::Close(c) => format!("unmatched '{}'", c),
                other => format!("unexpected {}", other),
            };
            return Err(TagScopeError::syntax(message, token.start));
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<(Node, usize)> {
        let (mut left, mut depth) = self.parse_and()?;
        while self.consume(&TokenKind::Or) {
            self.expect_operand("OR")?;
            let start = self.position();
            let (right, right_depth) = self.parse_and()?;
            depth = self.check_depth(1 + depth.max(right_depth), start)?;
            left = Node::or(left, right);
        }
        Ok((left, depth))
    }

    fn parse_and(&mut self) -> Result<(Node, usize)> {
        let (mut left, mut depth) = self.parse_unary()?;
        loop {
            if self.consume(&TokenKind::And) {
                self.expect_operand("AND")?;
            } else if !(self.implicit_and && self.at_operand()) {
                break;
            }
            let start = self.position();
            let (right, right_depth) = self.parse_unary()?;
            depth = self.check_depth(1 + depth.max(right_depth), start)?;
            left = Node::and(left, right);
        }
        Ok((left, depth))
    }

    fn parse_unary(&mut self) -> Result<(Node, usize)> {
        let start = self.position();
        if self.consume(&TokenKind::Not) {
            self.expect_operand("NOT")?;
            self.enter(start)?;
            let (inner, depth) = self.parse_unary()?;
            self.nesting -= 1;
            let depth = self.check_depth(depth + 1, start)?;
            return Ok((Node::not(inner), depth));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<(Node, usize)> {
        let Some(token) = self.advance() else {
            return Err(TagScopeError::syntax(
                "unexpected end of query",
                self.input_len,
            ));
        };

        match token.kind {
            TokenKind::Open(open) => self.parse_group(open, token.start),
            TokenKind::All => Ok((Node::AllItems, 1)),
            TokenKind::Word(word) => {
                if self.implicit_and {
                    return Ok((Node::TagTerm(word), 1));
                }
                let mut phrase = word;
                while let Some(TokenKind::Word(next)) = self.peek().map(|t| &t.kind) {
                    phrase.push(' ');
                    phrase.push_str(next);
                    self.pos += 1;
                }
                Ok((Node::TagTerm(phrase), 1))
            }
            TokenKind::Quoted(text) => {
                if text.trim().is_empty() {
                    return Err(TagScopeError::syntax("empty quoted tag", token.start));
                }
                Ok((Node::TagTerm(text), 1))
            }
            TokenKind::Close(c) => Err(TagScopeError::syntax(
                format!("unmatched '{}'", c),
                token.start,
            )),
            op @ (TokenKind::And | TokenKind::Or) => Err(TagScopeError::syntax(
                format!("expected operand before {}", op),
                token.start,
            )),
            // parse_unary consumes NOT before reaching here
            TokenKind::Not => Err(TagScopeError::syntax(
                "unexpected NOT",
                token.start,
            )),
        }
    }

    fn parse_group(&mut self, open: char, open_pos: usize) -> Result<(Node, usize)> {
        let close = closer_for(open);

        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Close(close) {
                return Err(TagScopeError::syntax(
                    format!("empty group '{}{}'", open, close),
                    open_pos,
                ));
            }
        }

        self.enter(open_pos)?;
        let (inner, depth) = self.parse_or()?;
        self.nesting -= 1;

        match self.peek() {
            Some(token) if token.kind == TokenKind::Close(close) => {
                self.pos += 1;
                let depth = self.check_depth(depth + 1, open_pos)?;
                Ok((Node::group(inner), depth))
            }
            other => {
                let position = other.map_or(self.input_len, |t| t.start);
                Err(TagScopeError::syntax(
                    format!(
                        "expected '{}' to close '{}' at byte {}",
                        close, open, open_pos
                    ),
                    position,
                ))
            }
        }
    }

    /// Descend into a NOT or group opened at `start`.
    fn enter(&mut self, start: usize) -> Result<()> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(too_deep(start));
        }
        Ok(())
    }

    fn check_depth(&self, depth: usize, start: usize) -> Result<usize> {
        if depth > MAX_DEPTH {
            return Err(too_deep(start));
        }
        Ok(depth)
    }

    /// Byte offset of the next token, or the end of input.
    fn position(&self) -> usize {
        self.peek().map_or(self.input_len, |t| t.start)
    }

    /// Fail unless the next token can begin a Unary.
    fn expect_operand(&self, after: &str) -> Result<()> {
        if self.at_operand() {
            return Ok(());
        }
        Err(TagScopeError::syntax(
            format!("expected operand after {}", after),
            self.position(),
        ))
    }

    fn at_operand(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(
                TokenKind::Word(_)
                    | TokenKind::Quoted(_)
                    | TokenKind::Not
                    | TokenKind::All
                    | TokenKind::Open(_)
            )
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
