//! Fixture trees and vault helpers.
//!
//! Provides the trees most tests start from and a temporary file wrapper
//! for code that reads trees from disk.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vault_core::{Vault, VaultConfig};
use vault_value::Value;

/// Converts a `json!` literal into a tree value.
pub fn tree(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// The five-level chain `g1 → r1 → p1 → l1 → a1`.
pub fn scenario_tree() -> Value {
    tree(json!({
        "id": "g1", "type": "Grouping", "label": {"en": ["Top"]},
        "items": [{
            "id": "r1", "type": "Record", "label": {"en": ["First"]},
            "items": [{
                "id": "p1", "type": "Page", "width": 1200, "height": 1800,
                "items": [{
                    "id": "l1", "type": "AnnotationLayer",
                    "items": [{
                        "id": "a1", "type": "Annotation", "motivation": "painting",
                        "body": {"id": "https://example.org/p1.jpg", "format": "image/jpeg"},
                        "target": "p1"
                    }]
                }]
            }]
        }]
    }))
}

/// A record using every child property, with extensions and mixed numbers.
pub fn rich_tree() -> Value {
    tree(json!({
        "@context": "http://iiif.io/api/presentation/3/context.json",
        "id": "r1", "type": "Record",
        "label": {"en": ["Rich"]},
        "viewingDirection": "left-to-right",
        "x-vendor": {"mode": "proof", "weights": [1, 2.5, 3]},
        "items": [
            {
                "id": "p1", "type": "Page", "width": 1000, "height": 1500, "duration": 12.5,
                "items": [{"id": "l1", "type": "AnnotationLayer", "items": [
                    {"id": "a1", "type": "Annotation", "motivation": "painting", "target": "p1"}
                ]}],
                "annotations": [{"id": "l2", "type": "AnnotationLayer", "items": [
                    {"id": "a2", "type": "Annotation", "motivation": "commenting", "x-score": 5.0},
                    {"id": "a3", "type": "Annotation", "motivation": "tagging", "x-flag": false}
                ]}]
            },
            {"id": "p2", "type": "Page", "width": 800, "height": 600}
        ],
        "structures": [{
            "id": "s1", "type": "Substructure", "label": {"en": ["Chapter 1"]},
            "items": [{"id": "s2", "type": "Substructure", "label": {"en": ["Section 1.1"]}}]
        }]
    }))
}

/// A grouping whose two sub-groupings both list record `r1`.
pub fn shared_collections_tree() -> Value {
    tree(json!({
        "id": "g0", "type": "Grouping",
        "items": [
            {"id": "g1", "type": "Grouping", "items": [
                {"id": "r1", "type": "Record", "items": [{"id": "p1", "type": "Page"}]},
                {"id": "r2", "type": "Record"}
            ]},
            {"id": "g2", "type": "Grouping", "items": [
                {"id": "r3", "type": "Record"},
                {"id": "r1", "type": "Record"}
            ]}
        ]
    }))
}

/// A grouping of `records` records, each with `pages` pages carrying one
/// layer of two annotations.
pub fn populated_tree(records: usize, pages: usize) -> Value {
    let records: Vec<serde_json::Value> = (0..records)
        .map(|r| {
            let pages: Vec<serde_json::Value> = (0..pages)
                .map(|p| {
                    json!({
                        "id": format!("r{r}-p{p}"), "type": "Page", "width": 1000, "height": 1400,
                        "items": [{
                            "id": format!("r{r}-p{p}-l"), "type": "AnnotationLayer",
                            "items": [
                                {"id": format!("r{r}-p{p}-a0"), "type": "Annotation", "motivation": "painting"},
                                {"id": format!("r{r}-p{p}-a1"), "type": "Annotation", "motivation": "commenting"}
                            ]
                        }]
                    })
                })
                .collect();
            json!({"id": format!("r{r}"), "type": "Record", "label": {"none": [format!("Record {r}")]}, "items": pages})
        })
        .collect();
    tree(json!({"id": "root", "type": "Grouping", "items": records}))
}

/// A tree written to a temporary file, removed on drop.
pub struct TreeFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TreeFile {
    /// Writes `tree` as pretty JSON into a fresh temporary directory.
    pub fn write(tree: &Value) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("tree.json");
        let text = tree.to_json_string(true).expect("Failed to render tree");
        fs::write(&path, text).expect("Failed to write tree file");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the written file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file back.
    pub fn read(&self) -> Value {
        let text = fs::read_to_string(&self.path).expect("Failed to read tree file");
        Value::from_json_str(&text).expect("Failed to parse tree file")
    }
}

/// Runs a test against a vault loaded from `tree`.
///
/// # Example
///
/// ```rust
/// use vault_testkit::{scenario_tree, with_vault};
///
/// with_vault(&scenario_tree(), |vault| {
///     assert_eq!(vault.state().len(), 5);
/// });
/// ```
pub fn with_vault<F, R>(tree: &Value, f: F) -> R
where
    F: FnOnce(&mut Vault) -> R,
{
    let mut vault = Vault::new(VaultConfig::default());
    let report = vault.load(tree);
    assert!(report.is_clean(), "fixture tree did not load cleanly: {report:?}");
    f(&mut vault)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A vault holding [`scenario_tree`].
    pub fn loaded_scenario() -> Vault {
        Vault::from_tree(&scenario_tree())
    }

    /// A vault holding [`rich_tree`].
    pub fn loaded_rich() -> Vault {
        Vault::from_tree(&rich_tree())
    }

    /// A vault holding [`shared_collections_tree`].
    pub fn loaded_shared() -> Vault {
        Vault::from_tree(&shared_collections_tree())
    }

    /// A vault holding [`populated_tree`], with a custom configuration.
    pub fn populated_vault(records: usize, pages: usize, config: VaultConfig) -> Vault {
        let mut vault = Vault::new(config);
        vault.load(&populated_tree(records, pages));
        vault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::normalize_with_report;

    #[test]
    fn fixtures_load_cleanly() {
        for fixture in [scenario_tree(), rich_tree(), shared_collections_tree(), populated_tree(3, 2)] {
            let (_, report) = normalize_with_report(&fixture);
            assert!(report.is_clean(), "{report:?}");
        }
    }

    #[test]
    fn populated_counts() {
        let vault = scenarios::populated_vault(4, 3, VaultConfig::default());
        // root + 4 records + 12 pages + 12 layers + 24 annotations
        assert_eq!(vault.state().len(), 1 + 4 + 12 + 12 + 24);
    }

    #[test]
    fn tree_file_round_trips() {
        let file = TreeFile::write(&rich_tree());
        assert!(file.path().exists());
        assert_eq!(file.read(), rich_tree());
    }

    #[test]
    fn shared_record_has_two_containers() {
        let vault = scenarios::loaded_shared();
        let containers: Vec<&str> = vault
            .get_collections_containing("r1")
            .iter()
            .map(|id| id.as_str())
            .collect();
        assert_eq!(containers, ["g1", "g2"]);
    }
}
