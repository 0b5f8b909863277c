//! Tags command - list tags in scope with usage counts.

use crate::app::App;
use crate::commands::warn_empty_scope;
use tagscope_core::Config;

/// Run the tags command.
pub fn run(config: Config, prefix: &str, dirs: &[String], limit: usize) -> anyhow::Result<()> {
    let app = App::new(config)?;

    let scope = app.scope(dirs);
    if warn_empty_scope(&scope) {
        return Ok(());
    }

    let tags = app.engine.suggest_tags(&scope, prefix, limit)?;
    if tags.is_empty() {
        eprintln!("No tags found in {}", scope);
        return Ok(());
    }

    let width = tags
        .iter()
        .map(|t| t.count.to_string().len())
        .max()
        .unwrap_or(1);
    for tag in &tags {
        println!("{:>width$}  {}", tag.count, tag.name, width = width);
    }

    Ok(())
}
