//! Idempotent merge of two cache documents.
//!
//! The merge works on raw JSON values: unknown fields, historical alias keys
//! and either container shape survive untouched, and the base document keeps
//! its own shape on write-back. Objects union by id (first wins), table-level
//! edges by `(source, target)`, column-level edges by the full 4-tuple.

use serde_json::{Map, Value};

use crate::error::LineageError;

/// Outcome counters and diagnostics of a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    pub objects_added: usize,
    pub dependencies_added: usize,
    pub column_dependencies_added: usize,
    pub warnings: Vec<String>,
}

/// Merge `new` into `base` in place, preserving the base's container shapes.
pub fn merge_caches(base: &mut Value, new: &Value) -> Result<MergeStats, LineageError> {
    let mut stats = MergeStats::default();

    if !base.is_object() || !new.is_object() {
        return Err(LineageError::invalid_cache("merge inputs must be objects"));
    }

    merge_objects(base, new, &mut stats);
    merge_table_dependencies(base, new, &mut stats);
    merge_column_dependencies(base, new, &mut stats);
    update_metadata(base, new);

    Ok(stats)
}

/// Convert an objects container to a map keyed by id.
fn normalize_objects(objects: Option<&Value>) -> Map<String, Value> {
    match objects {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Array(list)) => {
            let mut map = Map::new();
            for obj in list {
                if let Some(key) = object_key(obj) {
                    map.entry(key).or_insert_with(|| obj.clone());
                }
            }
            map
        }
        _ => Map::new(),
    }
}

fn object_key(obj: &Value) -> Option<String> {
    obj.get("id")
        .and_then(Value::as_str)
        .or_else(|| obj.get("object_id").and_then(Value::as_str))
        .map(|s| s.to_string())
}

fn numeric_tag(obj: &Value) -> Option<i64> {
    obj.get("object_id").and_then(Value::as_i64)
}

fn merge_objects(base: &mut Value, new: &Value, stats: &mut MergeStats) {
    let base_was_list = matches!(base.get("objects"), Some(Value::Array(_)));
    let mut base_objects = normalize_objects(base.get("objects"));
    let new_objects = normalize_objects(new.get("objects"));

    // Tag registry for collision detection across extractor namespaces.
    let mut tags: std::collections::HashMap<i64, String> = std::collections::HashMap::new();
    for (id, obj) in &base_objects {
        if let Some(tag) = numeric_tag(obj) {
            tags.entry(tag).or_insert_with(|| id.clone());
        }
    }

    for (id, obj) in new_objects {
        if base_objects.contains_key(&id) {
            continue;
        }
        if let Some(tag) = numeric_tag(&obj) {
            if let Some(first_id) = tags.get(&tag) {
                stats.warnings.push(format!(
                    "numeric tag {tag} of '{id}' collides with '{first_id}'; keeping the first"
                ));
                continue;
            }
            tags.insert(tag, id.clone());
        }
        base_objects.insert(id, obj);
        stats.objects_added += 1;
    }

    base["objects"] = if base_was_list {
        Value::Array(base_objects.into_iter().map(|(_, obj)| obj).collect())
    } else {
        Value::Object(base_objects)
    };
}

/// Extract table-level dependencies as a flat list, whatever the container.
fn deps_list(deps: Option<&Value>) -> Vec<Value> {
    match deps {
        Some(Value::Array(list)) => list.clone(),
        Some(Value::Object(map)) => {
            if let Some(Value::Array(list)) = map.get("table_level") {
                list.clone()
            } else {
                map.values().cloned().collect()
            }
        }
        _ => Vec::new(),
    }
}

/// `(source, target)` under any of the historical key spellings.
fn dep_key(dep: &Value) -> Option<(String, String)> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| dep.get(*n).and_then(Value::as_str))
            .map(|s| s.to_string())
    };
    let source = field(&["source_id", "source_object_id", "source"])?;
    let target = field(&["target_id", "target_object_id", "target"])?;
    Some((source, target))
}

fn merge_table_dependencies(base: &mut Value, new: &Value, stats: &mut MergeStats) {
    let mut merged = deps_list(base.get("dependencies"));
    let new_deps = deps_list(new.get("dependencies"));

    let mut existing: std::collections::HashSet<(String, String)> =
        merged.iter().filter_map(dep_key).collect();

    for dep in new_deps {
        if let Some(key) = dep_key(&dep) {
            if existing.insert(key) {
                merged.push(dep);
                stats.dependencies_added += 1;
            }
        }
    }

    // Preserve the base's container shape.
    match base.get_mut("dependencies") {
        Some(Value::Object(map)) if map.contains_key("table_level") => {
            map.insert("table_level".to_string(), Value::Array(merged));
        }
        _ => {
            base["dependencies"] = Value::Array(merged);
        }
    }
}

fn column_deps_list(deps: Option<&Value>) -> Vec<Value> {
    match deps {
        Some(Value::Object(map)) => match map.get("column_level") {
            Some(Value::Array(list)) => list.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn column_dep_key(dep: &Value) -> Option<(String, String, String, String)> {
    Some((
        dep.get("source_object_id")?.as_str()?.to_string(),
        dep.get("source_column")?.as_str()?.to_string(),
        dep.get("target_object_id")?.as_str()?.to_string(),
        dep.get("target_column")?.as_str()?.to_string(),
    ))
}

fn merge_column_dependencies(base: &mut Value, new: &Value, stats: &mut MergeStats) {
    let new_deps = column_deps_list(new.get("dependencies"));
    if new_deps.is_empty() {
        return;
    }

    let base_sectioned = matches!(
        base.get("dependencies"),
        Some(Value::Object(map)) if map.contains_key("table_level")
    );
    if !base_sectioned {
        // A flat base has no column section to write into; inventing one
        // would change the base's shape.
        stats.warnings.push(format!(
            "{} column-level dependencies dropped: base cache has no column_level section",
            new_deps.len()
        ));
        return;
    }

    let mut merged = column_deps_list(base.get("dependencies"));
    let mut existing: std::collections::HashSet<_> =
        merged.iter().filter_map(column_dep_key).collect();

    for dep in new_deps {
        if let Some(key) = column_dep_key(&dep) {
            if existing.insert(key) {
                merged.push(dep);
                stats.column_dependencies_added += 1;
            }
        }
    }

    if let Some(Value::Object(map)) = base.get_mut("dependencies") {
        map.insert("column_level".to_string(), Value::Array(merged));
    }
}

fn update_metadata(base: &mut Value, new: &Value) {
    if !base.get("metadata").map(Value::is_object).unwrap_or(false) {
        base["metadata"] = Value::Object(Map::new());
    }

    let merged_at = chrono::Utc::now().to_rfc3339();
    base["metadata"]["merged_at"] = Value::String(merged_at);

    // Attach the new side's extractor stats under a namespaced key.
    if let Some(stats) = new.get("metadata").and_then(|m| m.get("stats")) {
        let source = new
            .get("metadata")
            .and_then(|m| m.get("source"))
            .and_then(Value::as_str)
            .unwrap_or("merged");
        base["metadata"][format!("{source}_stats")] = stats.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(id: &str, tag: i64) -> Value {
        let (schema, name) = id.rsplit_once('.').unwrap_or(("", id));
        json!({
            "id": id, "schema": schema, "name": name, "type": "TABLE",
            "owner": "SYS", "object_id": tag
        })
    }

    fn sectioned_cache(ids: &[(&str, i64)], deps: &[(&str, &str)]) -> Value {
        let objects: Map<String, Value> = ids
            .iter()
            .map(|(id, tag)| (id.to_string(), object(id, *tag)))
            .collect();
        let table_level: Vec<Value> = deps
            .iter()
            .map(|(s, t)| json!({ "source_id": s, "target_id": t }))
            .collect();
        json!({
            "metadata": { "version": "1.0.0" },
            "objects": objects,
            "dependencies": { "table_level": table_level, "column_level": [] }
        })
    }

    fn flat_cache(ids: &[(&str, i64)], deps: &[(&str, &str)]) -> Value {
        let objects: Vec<Value> = ids.iter().map(|(id, tag)| object(id, *tag)).collect();
        let dependencies: Vec<Value> = deps
            .iter()
            .map(|(s, t)| json!({ "source_object_id": s, "target_object_id": t }))
            .collect();
        json!({
            "metadata": { "source": "github" },
            "objects": objects,
            "dependencies": dependencies
        })
    }

    #[test]
    fn test_merge_adds_new_objects_and_deps() {
        let mut base = sectioned_cache(&[("A.T1", 1)], &[]);
        let new = sectioned_cache(&[("A.T2", 2)], &[("A.T1", "A.T2")]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.objects_added, 1);
        assert_eq!(stats.dependencies_added, 1);
        assert_eq!(base["objects"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_merge_first_wins_on_repeated_id() {
        let mut base = sectioned_cache(&[("A.T1", 1)], &[]);
        base["objects"]["A.T1"]["owner"] = json!("ORIGINAL");
        let mut new = sectioned_cache(&[("A.T1", 9)], &[]);
        new["objects"]["A.T1"]["owner"] = json!("REPLACEMENT");

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.objects_added, 0);
        assert_eq!(base["objects"]["A.T1"]["owner"], json!("ORIGINAL"));
    }

    #[test]
    fn test_merge_idempotent() {
        let a = sectioned_cache(&[("A.T1", 1), ("A.T2", 2)], &[("A.T1", "A.T2")]);
        let b = sectioned_cache(&[("A.T3", 3)], &[("A.T2", "A.T3")]);

        let mut c = a.clone();
        merge_caches(&mut c, &b).unwrap();

        let mut again = c.clone();
        let stats = merge_caches(&mut again, &b).unwrap();
        assert_eq!(stats.objects_added, 0);
        assert_eq!(stats.dependencies_added, 0);
        assert_eq!(again["objects"], c["objects"]);
        assert_eq!(again["dependencies"], c["dependencies"]);

        let mut again = c.clone();
        let stats = merge_caches(&mut again, &a).unwrap();
        assert_eq!(stats.objects_added, 0);
        assert_eq!(stats.dependencies_added, 0);
        assert_eq!(again["objects"], c["objects"]);
        assert_eq!(again["dependencies"], c["dependencies"]);
    }

    #[test]
    fn test_merge_flat_base_preserves_shape() {
        let mut base = flat_cache(&[("bigquery:p.d.t", 10)], &[]);
        let new = flat_cache(
            &[("bigquery:p.d.v", 11)],
            &[("bigquery:p.d.t", "bigquery:p.d.v")],
        );

        merge_caches(&mut base, &new).unwrap();
        assert!(base["objects"].is_array());
        assert!(base["dependencies"].is_array());
        assert_eq!(base["dependencies"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_sectioned_base_accepts_flat_new() {
        let mut base = sectioned_cache(&[("A.T1", 1)], &[]);
        let new = flat_cache(&[("A.T2", 2)], &[("A.T1", "A.T2")]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.dependencies_added, 1);
        assert!(base["dependencies"]["table_level"].is_array());
        assert_eq!(
            base["dependencies"]["table_level"].as_array().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_merge_dedupes_alias_keyed_dependencies() {
        let mut base = sectioned_cache(&[("A.T1", 1), ("A.T2", 2)], &[("A.T1", "A.T2")]);
        // Same edge under alias keys must not duplicate.
        let new = flat_cache(&[], &[("A.T1", "A.T2")]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.dependencies_added, 0);
    }

    #[test]
    fn test_numeric_tag_collision_warns_and_keeps_first() {
        let mut base = sectioned_cache(&[("A.T1", 100001)], &[]);
        let new = sectioned_cache(&[("B.OTHER", 100001)], &[]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.objects_added, 0);
        assert_eq!(stats.warnings.len(), 1);
        assert!(stats.warnings[0].contains("100001"));
        assert!(base["objects"].get("B.OTHER").is_none());
    }

    #[test]
    fn test_column_deps_merge_by_full_key() {
        let mut base = sectioned_cache(&[("A.T", 1), ("A.V", 2)], &[]);
        let mut new = sectioned_cache(&[], &[]);
        new["dependencies"]["column_level"] = json!([
            { "source_object_id": "A.T", "source_column": "ID",
              "target_object_id": "A.V", "target_column": "ID" },
            { "source_object_id": "A.T", "source_column": "ID",
              "target_object_id": "A.V", "target_column": "ID" }
        ]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.column_dependencies_added, 1);
    }

    #[test]
    fn test_column_deps_dropped_for_flat_base_with_warning() {
        let mut base = flat_cache(&[("A.T", 1)], &[]);
        let mut new = sectioned_cache(&[], &[]);
        new["dependencies"]["column_level"] = json!([
            { "source_object_id": "A.T", "source_column": "ID",
              "target_object_id": "A.V", "target_column": "ID" }
        ]);

        let stats = merge_caches(&mut base, &new).unwrap();
        assert_eq!(stats.column_dependencies_added, 0);
        assert!(!stats.warnings.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arbitrary_cache() -> impl Strategy<Value = Value> {
            // Small graphs over a fixed id universe exercise every overlap case.
            let ids = prop::collection::btree_set(0u8..8, 1..6);
            let edges = prop::collection::vec((0u8..8, 0u8..8), 0..10);
            (ids, edges).prop_map(|(ids, edges)| {
                let id_name = |n: u8| format!("S.T{n}");
                let object_entries: Map<String, Value> = ids
                    .iter()
                    .map(|n| (id_name(*n), object(&id_name(*n), i64::from(*n) + 1)))
                    .collect();
                let table_level: Vec<Value> = edges
                    .iter()
                    .map(|(s, t)| json!({ "source_id": id_name(*s), "target_id": id_name(*t) }))
                    .collect();
                json!({
                    "metadata": { "version": "1.0.0" },
                    "objects": object_entries,
                    "dependencies": { "table_level": table_level, "column_level": [] }
                })
            })
        }

        proptest! {
            #[test]
            fn merge_is_idempotent(a in arbitrary_cache(), b in arbitrary_cache()) {
                let mut c = a.clone();
                merge_caches(&mut c, &b).unwrap();

                let mut again = c.clone();
                let stats = merge_caches(&mut again, &b).unwrap();
                prop_assert_eq!(stats.objects_added, 0);
                prop_assert_eq!(stats.dependencies_added, 0);
                prop_assert_eq!(&again["objects"], &c["objects"]);
                prop_assert_eq!(&again["dependencies"], &c["dependencies"]);
            }

            #[test]
            fn merge_objects_is_superset(a in arbitrary_cache(), b in arbitrary_cache()) {
                let mut c = a.clone();
                merge_caches(&mut c, &b).unwrap();

                let merged = c["objects"].as_object().unwrap();
                for id in a["objects"].as_object().unwrap().keys() {
                    prop_assert!(merged.contains_key(id));
                }
                for id in b["objects"].as_object().unwrap().keys() {
                    prop_assert!(merged.contains_key(id));
                }
            }
        }
    }

    #[test]
    fn test_metadata_merged_at_and_stats_namespace() {
        let mut base = sectioned_cache(&[("A.T", 1)], &[]);
        let mut new = flat_cache(&[], &[]);
        new["metadata"]["stats"] = json!({ "sql_files_parsed": 7 });

        merge_caches(&mut base, &new).unwrap();
        assert!(base["metadata"]["merged_at"].is_string());
        assert_eq!(base["metadata"]["github_stats"]["sql_files_parsed"], json!(7));
    }
}
