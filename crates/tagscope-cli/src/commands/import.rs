//! Import command - load tagged items into the tag database.
//!
//! Tagging happens elsewhere; this reads its output, a JSON array of
//! records such as:
//!
//! ```json
//! [{"id": "42", "location": "/photos/cat.png", "tags": ["cat", "outdoors"]}]
//! ```

use crate::app::App;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Instant;
use tagscope_core::{Config, Item, TagStore};
use tracing::info;

#[derive(Debug, Deserialize)]
struct ImportRecord {
    id: String,
    location: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<ImportRecord> for Item {
    fn from(record: ImportRecord) -> Self {
        Item::new(record.id, record.location).with_tags(record.tags)
    }
}

/// Read records from `path`, or stdin when `path` is `-`.
fn read_records(path: &Path) -> anyhow::Result<Vec<Item>> {
    let reader: Box<dyn Read> = if path.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(path)?)
    };

    let records: Vec<ImportRecord> = serde_json::from_reader(BufReader::new(reader))?;
    Ok(records.into_iter().map(Item::from).collect())
}

/// Run the import command.
pub fn run(config: Config, path: &Path, replace: bool) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let items = read_records(path)?;

    let start = Instant::now();

    if replace {
        let removed = app.store().clear()?;
        info!(removed, "Replacing stored items");
    }

    let stored = app.store().insert_items(items)?;
    let elapsed = start.elapsed();
    let stats = app.store().stats()?;

    println!("Import complete!");
    println!("  Imported:     {}", stored);
    println!("  Items:        {}", stats.total_items);
    println!("  Tags:         {}", stats.total_tags);
    println!("  Time:         {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscope_core::ItemId;
    use tempfile::TempDir;

    fn ids_of(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn test_read_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "1", "location": "/photos/1.png", "tags": ["Cat", "outdoors"]},
                {"id": "2", "location": "/photos/2.png"}
            ]"#,
        )
        .unwrap();

        let items = read_records(&path).unwrap();
        assert_eq!(ids_of(&items), vec![ItemId::from("1"), ItemId::from("2")]);
        assert!(items[0].has_tag("cat"));
        assert!(items[1].tags.is_empty());
    }

    #[test]
    fn test_read_records_rejects_bad_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        std::fs::write(&path, r#"[{"id": "1"}]"#).unwrap();

        assert!(read_records(&path).is_err());
    }
}
