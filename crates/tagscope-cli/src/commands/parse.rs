//! Parse command - show how a query is read.

use crate::commands::syntax_caret;
use tagscope_core::{parse_with, Config};

/// Run the parse command. Needs no database.
pub fn run(config: Config, query: &str) -> anyhow::Result<()> {
    let ast = match parse_with(query, &config.parse_options()) {
        Ok(ast) => ast,
        Err(err) => {
            if let Some(caret) = syntax_caret(query, &err) {
                eprintln!("{}", caret);
            }
            return Err(err.into());
        }
    };

    println!("{}", ast);
    println!();
    println!("Tags:  {}", ast.tags().join(", "));
    println!("Nodes: {}", ast.size());

    Ok(())
}
