//! Unified lineage cache: the on-disk contract between extractors, the
//! merger, and the graph engine.
//!
//! Two container shapes coexist in the wild and both must load: `objects` is
//! either a map keyed by id or a flat sequence, and `dependencies` is either
//! a flat sequence or `{table_level, column_level}`. The optional `indexes`
//! section is informational; the engine always rebuilds its own.

pub mod merge;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LineageError;
use crate::model::{ColumnLevelDependency, DatabaseObject, TableLevelDependency};

/// Cache-level metadata. Producers attach extra keys (stats, source ranges);
/// they round-trip untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "source_database")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A loaded, normalized lineage cache.
#[derive(Debug, Clone, Default)]
pub struct LineageCache {
    pub metadata: CacheMetadata,
    pub objects: BTreeMap<String, DatabaseObject>,
    pub table_deps: Vec<TableLevelDependency>,
    pub column_deps: Vec<ColumnLevelDependency>,
}

#[derive(Deserialize)]
struct RawCache {
    metadata: CacheMetadata,
    objects: ObjectsShape,
    dependencies: DependenciesShape,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ObjectsShape {
    Map(BTreeMap<String, DatabaseObject>),
    List(Vec<DatabaseObject>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DependenciesShape {
    Sectioned {
        #[serde(default)]
        table_level: Vec<TableLevelDependency>,
        #[serde(default)]
        column_level: Vec<ColumnLevelDependency>,
    },
    Flat(Vec<TableLevelDependency>),
}

impl LineageCache {
    /// Decode a cache document, accepting both object-container shapes and
    /// both dependency-container shapes.
    pub fn from_value(value: Value) -> Result<Self, LineageError> {
        validate_cache_value(&value)?;

        let raw: RawCache = serde_json::from_value(value)
            .map_err(|e| LineageError::invalid_cache(e.to_string()))?;

        let objects = match raw.objects {
            ObjectsShape::Map(map) => map
                .into_values()
                .map(|obj| (obj.id.clone(), obj))
                .collect(),
            ObjectsShape::List(list) => list
                .into_iter()
                .map(|obj| (obj.id.clone(), obj))
                .collect(),
        };

        let (table_deps, column_deps) = match raw.dependencies {
            DependenciesShape::Sectioned {
                table_level,
                column_level,
            } => (table_level, column_level),
            DependenciesShape::Flat(deps) => (deps, Vec::new()),
        };

        Ok(Self {
            metadata: raw.metadata,
            objects,
            table_deps,
            column_deps,
        })
    }

    /// Serialize to the canonical shape: objects as a map, dependencies
    /// sectioned, plus the informational adjacency indexes.
    pub fn to_value(&self) -> Value {
        let mut by_schema: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut by_kind: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut forward_edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut backward_edges: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (id, obj) in &self.objects {
            by_schema
                .entry(obj.schema_name.clone())
                .or_default()
                .push(id.clone());
            by_kind
                .entry(obj.kind.as_str().to_string())
                .or_default()
                .push(id.clone());
        }

        for dep in &self.table_deps {
            let forward = forward_edges.entry(dep.source_id.clone()).or_default();
            if !forward.contains(&dep.target_id) {
                forward.push(dep.target_id.clone());
            }
            let backward = backward_edges.entry(dep.target_id.clone()).or_default();
            if !backward.contains(&dep.source_id) {
                backward.push(dep.source_id.clone());
            }
        }

        serde_json::json!({
            "metadata": self.metadata,
            "objects": self.objects,
            "dependencies": {
                "table_level": self.table_deps,
                "column_level": self.column_deps,
            },
            "indexes": {
                "by_schema": by_schema,
                "by_kind": by_kind,
                "forward_edges": forward_edges,
                "backward_edges": backward_edges,
            },
        })
    }
}

/// Structural validation before decoding: required sections present and a
/// non-empty object set.
fn validate_cache_value(value: &Value) -> Result<(), LineageError> {
    let Some(map) = value.as_object() else {
        return Err(LineageError::invalid_cache("cache document is not an object"));
    };

    for key in ["metadata", "objects", "dependencies"] {
        if !map.contains_key(key) {
            return Err(LineageError::invalid_cache(format!(
                "missing '{key}' section"
            )));
        }
    }

    let empty = match &map["objects"] {
        Value::Object(objects) => objects.is_empty(),
        Value::Array(objects) => objects.is_empty(),
        _ => true,
    };
    if empty {
        return Err(LineageError::invalid_cache("no objects found"));
    }

    Ok(())
}

/// Load and validate a cache file.
pub fn load_cache_file(path: &Path) -> Result<LineageCache, LineageError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LineageError::invalid_cache(format!("cannot read {}: {e}", path.display()))
    })?;
    let value: Value = serde_json::from_str(&content)?;
    LineageCache::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectKind;
    use serde_json::json;

    fn object(id: &str, schema: &str, name: &str, kind: &str) -> Value {
        json!({
            "id": id,
            "schema": schema,
            "name": name,
            "type": kind,
            "owner": "SYS",
            "object_id": 1
        })
    }

    #[test]
    fn test_load_map_objects_sectioned_deps() {
        let value = json!({
            "metadata": { "version": "1.0.0", "source_database": "exa-prod" },
            "objects": {
                "DWH.T": object("DWH.T", "DWH", "T", "TABLE"),
                "DWH.V": object("DWH.V", "DWH", "V", "VIEW"),
            },
            "dependencies": {
                "table_level": [
                    { "source_id": "DWH.T", "target_id": "DWH.V", "dependency_type": "VIEW", "reference_type": "SELECT" }
                ],
                "column_level": [
                    { "source_object_id": "DWH.T", "source_column": "ID",
                      "target_object_id": "DWH.V", "target_column": "ID" }
                ]
            }
        });

        let cache = LineageCache::from_value(value).unwrap();
        assert_eq!(cache.objects.len(), 2);
        assert_eq!(cache.table_deps.len(), 1);
        assert_eq!(cache.column_deps.len(), 1);
        assert_eq!(cache.metadata.source.as_deref(), Some("exa-prod"));
        assert_eq!(cache.objects["DWH.V"].kind, ObjectKind::View);
    }

    #[test]
    fn test_load_list_objects_flat_deps() {
        let value = json!({
            "metadata": { "source": "github" },
            "objects": [ object("bigquery:p.d.t", "d", "t", "BIGQUERY_TABLE") ],
            "dependencies": [
                { "source_object_id": "bigquery:p.d.t", "target_object_id": "bigquery:p.d.v" }
            ]
        });

        let cache = LineageCache::from_value(value).unwrap();
        assert_eq!(cache.objects.len(), 1);
        assert_eq!(cache.table_deps.len(), 1);
        assert!(cache.column_deps.is_empty());
        // Platform-qualified ids are preserved verbatim.
        assert!(cache.objects.contains_key("bigquery:p.d.t"));
    }

    #[test]
    fn test_missing_section_rejected() {
        let value = json!({ "metadata": {}, "objects": { "A.B": object("A.B", "A", "B", "TABLE") } });
        let err = LineageCache::from_value(value).unwrap_err();
        assert!(err.to_string().contains("dependencies"));
    }

    #[test]
    fn test_empty_objects_rejected() {
        let value = json!({ "metadata": {}, "objects": {}, "dependencies": [] });
        let err = LineageCache::from_value(value).unwrap_err();
        assert!(err.to_string().contains("no objects"));
    }

    #[test]
    fn test_metadata_extra_keys_roundtrip() {
        let value = json!({
            "metadata": { "version": "1", "github_stats": { "repos_scanned": 12 } },
            "objects": { "A.B": object("A.B", "A", "B", "TABLE") },
            "dependencies": []
        });

        let cache = LineageCache::from_value(value).unwrap();
        assert_eq!(
            cache.metadata.extra["github_stats"]["repos_scanned"],
            json!(12)
        );

        let out = cache.to_value();
        assert_eq!(out["metadata"]["github_stats"]["repos_scanned"], json!(12));
    }

    #[test]
    fn test_to_value_emits_canonical_shape() {
        let value = json!({
            "metadata": {},
            "objects": [
                object("DWH.T", "DWH", "T", "TABLE"),
                object("DWH.V", "DWH", "V", "VIEW"),
            ],
            "dependencies": [
                { "source_id": "DWH.T", "target_id": "DWH.V" }
            ]
        });

        let out = LineageCache::from_value(value).unwrap().to_value();
        assert!(out["objects"].is_object());
        assert!(out["dependencies"]["table_level"].is_array());
        assert_eq!(out["indexes"]["forward_edges"]["DWH.T"], json!(["DWH.V"]));
        assert_eq!(out["indexes"]["backward_edges"]["DWH.V"], json!(["DWH.T"]));
        assert_eq!(out["indexes"]["by_kind"]["VIEW"], json!(["DWH.V"]));
    }
}
