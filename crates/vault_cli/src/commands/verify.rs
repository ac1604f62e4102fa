//! Verify command implementation.
//!
//! A tree passes when its normalized form rebuilds to the input, minus what
//! the normalizer is allowed to drop (skipped nodes and `null` extensions),
//! and when the flat state passes the invariant checker.

use super::read_tree;
use std::path::Path;
use vault_core::{
    denormalize, normalize_with_report, EntityType, NormalizeReport, PropertyClass, SkipReason,
    TypeRegistry,
};
use vault_value::Value;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of entities read.
    pub entities: usize,
    /// Nodes the normalizer left out.
    pub skipped: Vec<String>,
    /// Places where the rebuilt tree differs from the input.
    pub differences: Vec<String>,
    /// Broken structural invariants.
    pub violations: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.differences.is_empty() && self.violations.is_empty()
    }
}

/// Loads `path` and runs every check.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let tree = read_tree(path)?;
    let (state, report) = normalize_with_report(&tree);

    let expected = expected_tree(&tree, &report);
    let mut differences = Vec::new();
    match (expected, denormalize(&state)) {
        (Some(expected), Some(actual)) => diff(&expected, &actual, "", &mut differences),
        (None, None) => {}
        (Some(_), None) => differences.push("/: tree did not rebuild".to_string()),
        (None, Some(_)) => differences.push("/: rebuilt a tree from an unusable root".to_string()),
    }

    Ok(VerifyResult {
        entities: state.len(),
        skipped: report.skipped.iter().map(ToString::to_string).collect(),
        differences,
        violations: vault_testkit::check(&state)
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying tree at {}", path.display());
    println!();

    let result = verify(path)?;
    println!("Entities: {}", result.entities);
    print_section("Skipped nodes", &result.skipped);
    print_section("Differences", &result.differences);
    print_section("Invariant violations", &result.violations);

    println!();
    if result.is_ok() {
        println!("✓ Tree verification passed");
        Ok(())
    } else {
        println!("✗ Tree verification failed");
        Err("Verification failed".into())
    }
}

fn print_section(title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("{title}: {}", lines.len());
    for line in lines {
        println!("  {line}");
    }
}

/// The input with every node the normalizer skipped taken out.
///
/// A conflicting duplicate stays as an `{id, type}` reference, since its
/// membership is kept.
fn expected_tree(tree: &Value, report: &NormalizeReport) -> Option<Value> {
    let mut expected = tree.clone();
    // Walk order is depth-first, so removing in reverse never shifts an
    // index that is still to be removed.
    for skipped in report.skipped.iter().rev() {
        if skipped.path.is_empty() {
            return None;
        }
        match skipped.reason {
            SkipReason::ConflictingDuplicate => reduce_to_reference(&mut expected, &skipped.path),
            SkipReason::ChildrenNotArray => remove_at(&mut expected, &skipped.path, true),
            _ => remove_at(&mut expected, &skipped.path, false),
        }
    }
    drop_null_extensions(&mut expected);
    Some(expected)
}

fn node_at_mut<'a>(tree: &'a mut Value, parts: &[&str]) -> Option<&'a mut Value> {
    let mut cursor = tree;
    for part in parts {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(*part)?,
            Value::Array(items) => items.get_mut(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn remove_at(tree: &mut Value, path: &str, keep_empty: bool) {
    let mut parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let Some(last) = parts.pop() else {
        return;
    };
    match node_at_mut(tree, &parts) {
        Some(Value::Array(items)) => {
            if let Some(i) = last.parse::<usize>().ok().filter(|i| *i < items.len()) {
                items.remove(i);
            }
        }
        Some(Value::Object(map)) if keep_empty => {
            map.insert(last.to_string(), Value::empty_array());
        }
        _ => {}
    }
}

fn reduce_to_reference(tree: &mut Value, path: &str) {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if let Some(Value::Object(map)) = node_at_mut(tree, &parts) {
        map.retain(|key, _| key == "id" || key == "type");
    }
}

fn drop_null_extensions(node: &mut Value) {
    let Some(kind) = node.get_text("type").and_then(EntityType::from_wire) else {
        return;
    };
    let Some(map) = node.as_object_mut() else {
        return;
    };
    map.retain(|key, value| {
        !(value.is_null() && matches!(TypeRegistry::classify(kind, key), PropertyClass::Extension))
    });
    for slot in TypeRegistry::child_slots(kind) {
        if let Some(children) = map.get_mut(slot.property).and_then(Value::as_array_mut) {
            children.iter_mut().for_each(drop_null_extensions);
        }
    }
}

fn is_reference(node: &Value) -> bool {
    node.as_object().is_some_and(|map| {
        map.len() == 2 && map.get("id").is_some() && map.get("type").is_some()
    })
}

/// Lists the paths where `actual` departs from `expected`.
///
/// An `{id, type}` reference in the input matches any node with the same id
/// and type, since repeated grouping members are rebuilt in full.
fn diff(expected: &Value, actual: &Value, path: &str, out: &mut Vec<String>) {
    match (expected, actual) {
        (Value::Object(left), Value::Object(right)) => {
            if is_reference(expected)
                && left.get("id") == right.get("id")
                && left.get("type") == right.get("type")
            {
                return;
            }
            for (key, value) in left {
                let child = format!("{path}/{key}");
                match right.get(key) {
                    Some(other) => diff(value, other, &child, out),
                    None => out.push(format!("{child}: missing from the rebuilt tree")),
                }
            }
            for key in right.keys().filter(|key| !left.contains_key(*key)) {
                out.push(format!("{path}/{key}: not in the input"));
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                out.push(format!(
                    "{}: {} items in the input, {} rebuilt",
                    display(path),
                    left.len(),
                    right.len()
                ));
                return;
            }
            for (i, (l, r)) in left.iter().zip(right).enumerate() {
                diff(l, r, &format!("{path}/{i}"), out);
            }
        }
        _ => {
            if expected != actual {
                out.push(format!(
                    "{}: {} in the input, {} rebuilt",
                    display(path),
                    expected.type_name(),
                    actual.type_name()
                ));
            }
        }
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;

    #[test]
    fn scenario_passes() {
        let (_dir, path) = write_tree(SCENARIO);
        let result = verify(&path).unwrap();
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(result.entities, 5);
    }

    #[test]
    fn skipped_nodes_and_null_extensions_are_allowed() {
        let (_dir, path) = write_tree(
            r#"{"id": "r1", "type": "Record", "x-gone": null, "items": [
                {"id": "p0", "type": "Page"},
                {"type": "Page"},
                {"id": "p2", "type": "Page", "items": 7},
                {"id": "x", "type": "Poster"}
            ]}"#,
        );
        let result = verify(&path).unwrap();
        assert_eq!(result.skipped.len(), 3);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn repeated_members_are_references() {
        let (_dir, path) = write_tree(
            r#"{"id": "g0", "type": "Grouping", "items": [
                {"id": "g1", "type": "Grouping", "items": [
                    {"id": "r1", "type": "Record", "items": [{"id": "p1", "type": "Page"}]}
                ]},
                {"id": "g2", "type": "Grouping", "items": [{"id": "r1", "type": "Record"}]}
            ]}"#,
        );
        let result = verify(&path).unwrap();
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn reference_before_full_member_passes() {
        let (_dir, path) = write_tree(
            r#"{"id": "g1", "type": "Grouping", "items": [
                {"id": "r1", "type": "Record"},
                {"id": "g2", "type": "Grouping", "items": [
                    {"id": "r1", "type": "Record", "label": "full", "items": [{"id": "p1", "type": "Page"}]}
                ]}
            ]}"#,
        );
        let result = verify(&path).unwrap();
        assert!(result.skipped.is_empty(), "{result:?}");
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(result.entities, 4);
    }

    #[test]
    fn repeated_and_conflicting_members_are_explained() {
        let (_dir, path) = write_tree(
            r#"{"id": "g0", "type": "Grouping", "items": [
                {"id": "g1", "type": "Grouping", "items": [
                    {"id": "r1", "type": "Record", "label": "first"},
                    {"id": "r2", "type": "Record"},
                    {"id": "r1", "type": "Record"}
                ]},
                {"id": "g2", "type": "Grouping", "items": [{"id": "r1", "type": "Record", "label": "second"}]}
            ]}"#,
        );
        let result = verify(&path).unwrap();
        assert_eq!(result.skipped.len(), 2, "{result:?}");
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn diff_reports_paths() {
        let expected = Value::from_json_str(r#"{"a": [1, 2], "b": "x"}"#).unwrap();
        let actual = Value::from_json_str(r#"{"a": [1, 3.5], "c": true}"#).unwrap();
        let mut out = Vec::new();
        diff(&expected, &actual, "", &mut out);
        assert_eq!(
            out,
            [
                "/a/1: integer in the input, float rebuilt",
                "/b: missing from the rebuilt tree",
                "/c: not in the input",
            ]
        );
    }
}
