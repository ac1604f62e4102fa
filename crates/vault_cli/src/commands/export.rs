//! Export command implementation.

use super::read_tree;
use std::path::Path;
use vault_core::Vault;
use vault_value::Value;

/// Normalizes the tree at `path` and rebuilds it, or one entity's subtree.
pub fn export(path: &Path, entity: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let tree = read_tree(path)?;
    let vault = Vault::from_tree(&tree);
    let exported = match entity {
        Some(id) => vault
            .export_entity(id)
            .ok_or_else(|| format!("No entity {id:?} in {}", path.display()))?,
        None => vault
            .export()
            .ok_or_else(|| format!("No usable root node in {}", path.display()))?,
    };
    Ok(exported)
}

/// Runs the export command.
pub fn run(path: &Path, pretty: bool, entity: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let exported = export(path, entity)?;
    println!("{}", exported.to_json_string(pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;

    #[test]
    fn exports_canonical_tree() {
        let (_dir, path) = write_tree(SCENARIO);
        let exported = export(&path, None).unwrap();
        assert_eq!(exported, Value::from_json_str(SCENARIO).unwrap());
    }

    #[test]
    fn exports_subtree() {
        let (_dir, path) = write_tree(SCENARIO);
        let page = export(&path, Some("l1")).unwrap();
        assert_eq!(page.get_text("type"), Some("AnnotationLayer"));
        assert!(export(&path, Some("zz")).is_err());
    }

    #[test]
    fn unusable_root_is_an_error() {
        let (_dir, path) = write_tree(r#"{"type": "Record"}"#);
        let err = export(&path, None).unwrap_err();
        assert!(err.to_string().contains("No usable root"));
    }
}
