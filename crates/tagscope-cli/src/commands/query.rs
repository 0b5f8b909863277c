//! Query command - find items matching a tag query.

use crate::app::App;
use crate::commands::{syntax_caret, warn_empty_scope};
use crate::OutputFormat;
use std::time::Instant;
use tagscope_core::Config;

/// Run the query command.
pub fn run(
    config: Config,
    query: &str,
    dirs: &[String],
    limit: Option<usize>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::new(config)?;

    let scope = app.scope(dirs);
    if warn_empty_scope(&scope) {
        return Ok(());
    }

    let start = Instant::now();
    let result = match app.engine.search(query, &scope) {
        Ok(result) => result,
        Err(err) => {
            if let Some(caret) = syntax_caret(query, &err) {
                eprintln!("{}", caret);
            }
            return Err(err.into());
        }
    };
    let elapsed = start.elapsed();

    let limit = limit.unwrap_or(app.config.general.max_results);
    let mut ids = result.sorted_ids();
    if limit > 0 {
        ids.truncate(limit);
    }
    let items = app.store().items(&ids)?;

    match output {
        OutputFormat::Text => {
            for item in &items {
                println!("{}", item.location);
            }

            eprintln!();
            eprintln!(
                "Found {} results in {:.3}ms ({} lookups)",
                result.len(),
                elapsed.as_secs_f64() * 1000.0,
                result.lookups
            );
            if items.len() < result.len() {
                eprintln!("Showing the first {}; use --limit 0 to show all.", items.len());
            }
            for failure in &result.failures {
                eprintln!("⚠ Lookup failed, results may be incomplete: {}", failure);
            }
        }
        OutputFormat::Json => {
            let json_items: Vec<serde_json::Value> = items
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "id": item.id,
                        "location": item.location,
                        "tags": item.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect();

            let report = serde_json::json!({
                "query": query,
                "scope": scope.prefixes().collect::<Vec<_>>(),
                "total": result.len(),
                "items": json_items,
                "failures": result.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
