//! Export JSON Schemas for the order and notification records shared with
//! the forms and backup tooling.
//!
//! Usage: cargo run --bin export-schema [output_dir]

use std::path::PathBuf;

use anyhow::{Context, Result};
use schemars::schema_for;

use bakery_common::{Notification, Order};

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("schema"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let schemas = [
        ("order.json", serde_json::to_string_pretty(&schema_for!(Order))?),
        ("notification.json", serde_json::to_string_pretty(&schema_for!(Notification))?),
    ];
    for (name, json) in schemas {
        let path = out_dir.join(name);
        std::fs::write(&path, &json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Schema exported to {} ({} bytes)", path.display(), json.len());
    }

    Ok(())
}
