//! Trash command implementation.
//!
//! Trashes one entity, restores it, and checks that nothing was lost.

use super::read_tree;
use serde::Serialize;
use std::path::Path;
use vault_core::{RestoreOptions, RestoreOutcome, Vault, VaultConfig};

/// Trash round-trip result.
#[derive(Debug, Serialize)]
pub struct TrashResult {
    /// The trashed entity.
    pub id: String,
    /// Every id the trash entry captured.
    pub captured: Vec<String>,
    /// The owner recorded in the trash entry.
    pub original_parent: Option<String>,
    /// The position recorded in the trash entry.
    pub original_index: Option<usize>,
    /// Groupings the entity was a member of.
    pub memberships: Vec<String>,
    /// How the restore went.
    pub outcome: String,
    /// Whether the restored state equals the loaded one.
    pub lossless: bool,
}

/// Loads `path` and runs the trash round-trip on `id`.
pub fn simulate(path: &Path, id: &str) -> Result<TrashResult, Box<dyn std::error::Error>> {
    let tree = read_tree(path)?;
    let mut vault = Vault::new(VaultConfig::default());
    vault.load(&tree);
    let before = vault.snapshot();

    let captured = vault.move_to_trash(id)?;
    let entry = vault
        .trash_entry(id)
        .ok_or_else(|| format!("No trash entry for {id:?}"))?;
    let original_parent = entry.original_parent_id().map(ToString::to_string);
    let original_index = entry.original_index;
    let memberships = entry
        .memberships
        .iter()
        .map(|position| format!("{}@{}", position.collection, position.index))
        .collect();

    let outcome = match vault.restore_from_trash(id, RestoreOptions::default())? {
        RestoreOutcome::Restored { parent: Some(parent) } => format!("restored under {parent}"),
        RestoreOutcome::Restored { parent: None } => "restored standalone".to_string(),
        RestoreOutcome::Detached { missing_parent } => {
            format!("restored detached, {missing_parent} is missing")
        }
    };

    Ok(TrashResult {
        id: id.to_string(),
        captured: captured.iter().map(ToString::to_string).collect(),
        original_parent,
        original_index,
        memberships,
        outcome,
        lossless: vault.state() == before.state(),
    })
}

/// Runs the trash command.
pub fn run(path: &Path, id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = simulate(path, id)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Trashing {}", result.id);
            println!("  Captured:   {}", result.captured.join(", "));
            println!(
                "  Parent:     {}",
                result.original_parent.as_deref().unwrap_or("(none)")
            );
            if let Some(index) = result.original_index {
                println!("  Position:   {index}");
            }
            if !result.memberships.is_empty() {
                println!("  Member of:  {}", result.memberships.join(", "));
            }
            println!("  Outcome:    {}", result.outcome);
            println!();
        }
    }

    if result.lossless {
        if format != "json" {
            println!("✓ Trash round-trip was lossless");
        }
        Ok(())
    } else {
        if format != "json" {
            println!("✗ Trash round-trip changed the state");
        }
        Err("Trash round-trip was lossy".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;

    #[test]
    fn page_round_trip_is_lossless() {
        let (_dir, path) = write_tree(SCENARIO);
        let result = simulate(&path, "p1").unwrap();
        assert_eq!(result.captured, ["p1", "l1", "a1"]);
        assert_eq!(result.original_parent.as_deref(), Some("r1"));
        assert_eq!(result.original_index, Some(0));
        assert_eq!(result.outcome, "restored under r1");
        assert!(result.lossless);
    }

    #[test]
    fn record_keeps_membership() {
        let (_dir, path) = write_tree(SCENARIO);
        let result = simulate(&path, "r1").unwrap();
        assert_eq!(result.memberships, ["g1@0"]);
        assert_eq!(result.outcome, "restored standalone");
        assert!(result.lossless);
    }

    #[test]
    fn missing_id_is_an_error() {
        let (_dir, path) = write_tree(SCENARIO);
        assert!(simulate(&path, "nope").is_err());
    }
}
