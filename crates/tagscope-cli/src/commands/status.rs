//! Status command - show database status and statistics.

use crate::app::App;
use tagscope_core::{Config, TagStore};

/// Run the status command.
pub fn run(config: Config) -> anyhow::Result<()> {
    let app = App::new(config)?;

    let stats = app.store().stats()?;

    println!("Tagscope Status");
    println!("===============");
    println!();

    if stats.total_items == 0 {
        println!("Database is empty. Run 'tagscope import <file>' to load items.");
    } else {
        println!("Summary:");
        println!("  Items:        {}", stats.total_items);
        println!("  Tags:         {}", stats.total_tags);
        println!("  Associations: {}", stats.total_associations);

        if let Some(updated) = stats.last_updated {
            println!(
                "  Last updated: {}",
                updated.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    println!();
    println!("Query settings:");
    println!("  Implicit AND:     {}", app.config.query.implicit_and);
    println!("  ALL keywords:     {}", app.config.query.all_keywords.join(", "));
    println!(
        "  Case-insensitive: {}",
        app.config.scope.case_insensitive
    );

    let default_scope = app.scope(&[]);
    if default_scope.is_empty() {
        println!("  Default scope:    (none)");
    } else {
        println!("  Default scope:    {}", default_scope);
    }

    println!();
    println!("Database: {}", app.db_path.display());

    Ok(())
}
