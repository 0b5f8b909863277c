//! Subcommand implementations.

pub mod import;
pub mod parse;
pub mod query;
pub mod status;
pub mod tags;

use tagscope_core::{Scope, TagScopeError};

/// Point at the offending byte of a query that failed to parse.
pub fn syntax_caret(query: &str, err: &TagScopeError) -> Option<String> {
    let position = err.position()?;
    let column = query
        .char_indices()
        .take_while(|(offset, _)| *offset < position)
        .count();
    Some(format!("  {}\n  {}^", query, " ".repeat(column)))
}

/// Tell the user how to pick a scope when none was given.
pub fn warn_empty_scope(scope: &Scope) -> bool {
    if scope.is_empty() {
        eprintln!("No directories to search. Pass --scope DIR or set [scope] directories in the config.");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_caret() {
        let err = TagScopeError::syntax("expected operand after AND", 7);
        assert_eq!(
            syntax_caret("cat AND", &err).unwrap(),
            "  cat AND\n         ^"
        );

        // Counts characters, not bytes
        let err = TagScopeError::syntax("unmatched ')'", 4);
        assert_eq!(syntax_caret("né )", &err).unwrap(), "  né )\n     ^");

        assert!(syntax_caret("cat", &TagScopeError::Cancelled).is_none());
    }
}
