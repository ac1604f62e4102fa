//! CLI command implementations.

pub mod export;
pub mod inspect;
pub mod trash;
pub mod verify;

use std::fs;
use std::path::Path;
use tracing::debug;
use vault_value::Value;

/// Reads and parses a JSON tree.
pub fn read_tree(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    debug!(path = %path.display(), bytes = text.len(), "read tree");
    Ok(Value::from_json_str(&text)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes `text` to `tree.json` in a fresh temporary directory.
    pub fn write_tree(text: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.json");
        fs::write(&path, text).unwrap();
        (dir, path)
    }

    pub const SCENARIO: &str = r#"{
        "id": "g1", "type": "Grouping",
        "items": [{
            "id": "r1", "type": "Record",
            "items": [{
                "id": "p1", "type": "Page", "width": 100,
                "items": [{"id": "l1", "type": "AnnotationLayer",
                    "items": [{"id": "a1", "type": "Annotation"}]}]
            }]
        }]
    }"#;
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn read_tree_parses_json() {
        let (_dir, path) = write_tree(SCENARIO);
        let tree = read_tree(&path).unwrap();
        assert_eq!(tree.get_text("id"), Some("g1"));
    }

    #[test]
    fn read_tree_reports_missing_file() {
        let err = read_tree(Path::new("/nonexistent/tree.json")).unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }

    #[test]
    fn read_tree_reports_bad_json() {
        let (_dir, path) = write_tree("{not json");
        assert!(read_tree(&path).is_err());
    }
}
