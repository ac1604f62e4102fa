//! Inspect command implementation.

use super::read_tree;
use serde::Serialize;
use std::path::Path;
use vault_core::{EntityType, Vault, VaultConfig};

/// Tree inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Tree path.
    pub path: String,
    /// Root entity id.
    pub root: Option<String>,
    /// Number of entities read.
    pub entity_count: usize,
    /// Entities per type, in type order.
    pub types: Vec<TypeCount>,
    /// Records and groupings with no grouping.
    pub orphans: usize,
    /// Number of ownership edges.
    pub ownership_edges: usize,
    /// Number of membership edges.
    pub membership_edges: usize,
    /// Nodes the normalizer left out.
    pub skipped: Vec<String>,
}

/// Entity count for one type.
#[derive(Debug, Serialize)]
pub struct TypeCount {
    /// Wire type name.
    pub kind: &'static str,
    /// Number of entities.
    pub count: usize,
}

/// Loads `path` and collects its statistics.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let tree = read_tree(path)?;
    let mut vault = Vault::new(VaultConfig::default());
    let report = vault.load(&tree);
    let stats = vault.stats();

    Ok(InspectResult {
        path: path.display().to_string(),
        root: vault.state().root().map(ToString::to_string),
        entity_count: stats.total(),
        types: EntityType::ALL
            .into_iter()
            .map(|kind| TypeCount {
                kind: kind.as_str(),
                count: stats.count(kind),
            })
            .collect(),
        orphans: stats.orphans,
        ownership_edges: stats.ownership_edges,
        membership_edges: stats.membership_edges,
        skipped: report.skipped.iter().map(ToString::to_string).collect(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Vault Tree Inspection");
    println!("=====================");
    println!();
    println!("Path: {}", result.path);
    println!("Root: {}", result.root.as_deref().unwrap_or("(none)"));
    println!();
    println!("Entities: {}", result.entity_count);
    for count in &result.types {
        println!("  {:<16} {}", count.kind, count.count);
    }
    println!();
    println!("Edges:");
    println!("  Ownership:  {}", result.ownership_edges);
    println!("  Membership: {}", result.membership_edges);
    println!("  Orphans:    {}", result.orphans);

    if !result.skipped.is_empty() {
        println!();
        println!("Skipped nodes:");
        for skipped in &result.skipped {
            println!("  {skipped}");
        }
    }
}
