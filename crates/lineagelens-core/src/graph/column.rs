//! Column-level lineage indices layered on top of the table-level graph.
//!
//! Column keys are `"{object_id}:{column_name}"`. Traversal mirrors the
//! table-level BFS; when the caller asks for both directions the upstream and
//! downstream walks use independent visited sets.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::Direction;
use crate::model::{ColumnLevelDependency, TransformationKind};

/// A column upstream of the queried one, with its transformation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSourceInfo {
    pub object_id: String,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
    pub transformation_type: TransformationKind,
}

/// A column downstream of the queried one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnTargetInfo {
    pub object_id: String,
    pub column: String,
}

/// Result of a column-level traversal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnLineageResult {
    pub object_id: String,
    pub column_name: String,
    pub dependencies: Vec<ColumnLevelDependency>,
    pub source_columns: Vec<ColumnSourceInfo>,
    pub target_columns: Vec<ColumnTargetInfo>,
}

/// Per-column lineage for every traced column of one object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectColumnLineage {
    pub object_id: String,
    pub columns_with_lineage: Vec<String>,
    pub column_lineage: BTreeMap<String, ColumnLineageResult>,
    pub has_column_lineage: bool,
}

fn column_key(object_id: &str, column_name: &str) -> String {
    format!("{object_id}:{column_name}")
}

/// Split a column key back into `(object_id, column_name)`. Object ids may
/// contain `:` (platform-qualified form), so split at the last separator.
#[cfg(test)]
fn split_column_key(key: &str) -> (String, String) {
    match key.rsplit_once(':') {
        Some((object_id, column)) => (object_id.to_string(), column.to_string()),
        None => (key.to_string(), String::new()),
    }
}

#[derive(Debug, Default)]
pub(crate) struct ColumnIndex {
    forward: HashMap<String, HashSet<String>>,
    backward: HashMap<String, HashSet<String>>,
    edge_index: HashMap<(String, String), ColumnLevelDependency>,
    columns_with_lineage: HashMap<String, BTreeSet<String>>,
    dep_count: usize,
}

impl ColumnIndex {
    pub(crate) fn build(deps: Vec<ColumnLevelDependency>) -> Self {
        let mut index = Self::default();

        for dep in deps {
            let source_key = column_key(&dep.source_object_id, &dep.source_column);
            let target_key = column_key(&dep.target_object_id, &dep.target_column);

            index
                .forward
                .entry(source_key.clone())
                .or_default()
                .insert(target_key.clone());
            index
                .backward
                .entry(target_key.clone())
                .or_default()
                .insert(source_key.clone());

            index
                .columns_with_lineage
                .entry(dep.source_object_id.clone())
                .or_default()
                .insert(dep.source_column.clone());
            index
                .columns_with_lineage
                .entry(dep.target_object_id.clone())
                .or_default()
                .insert(dep.target_column.clone());

            // First annotation wins, mirroring table-level edge de-dup.
            let key = (source_key, target_key);
            if !index.edge_index.contains_key(&key) {
                index.edge_index.insert(key, dep);
                index.dep_count += 1;
            }
        }

        index
    }

    pub(crate) fn dep_count(&self) -> usize {
        self.dep_count
    }

    pub(crate) fn object_count(&self) -> usize {
        self.columns_with_lineage.len()
    }

    pub(crate) fn has_column_lineage(&self, object_id: &str) -> bool {
        self.columns_with_lineage.contains_key(object_id)
    }

    pub(crate) fn columns_for(&self, object_id: &str) -> Vec<String> {
        self.columns_with_lineage
            .get(object_id)
            .map(|columns| columns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn column_lineage(
        &self,
        object_id: &str,
        column_name: &str,
        direction: Direction,
        depth: usize,
    ) -> ColumnLineageResult {
        let start = column_key(object_id, column_name);

        let upstream_deps = if matches!(direction, Direction::Upstream | Direction::Both) {
            self.collect(&start, depth, true)
        } else {
            Vec::new()
        };
        let downstream_deps = if matches!(direction, Direction::Downstream | Direction::Both) {
            self.collect(&start, depth, false)
        } else {
            Vec::new()
        };

        let mut source_columns = Vec::new();
        let mut seen_sources = HashSet::new();
        for dep in &upstream_deps {
            if seen_sources.insert((dep.source_object_id.clone(), dep.source_column.clone())) {
                source_columns.push(ColumnSourceInfo {
                    object_id: dep.source_object_id.clone(),
                    column: dep.source_column.clone(),
                    transformation: dep.transformation.clone(),
                    transformation_type: dep.transformation_type,
                });
            }
        }

        let mut target_columns = Vec::new();
        let mut seen_targets = HashSet::new();
        for dep in &downstream_deps {
            if seen_targets.insert((dep.target_object_id.clone(), dep.target_column.clone())) {
                target_columns.push(ColumnTargetInfo {
                    object_id: dep.target_object_id.clone(),
                    column: dep.target_column.clone(),
                });
            }
        }

        let mut dependencies = Vec::new();
        let mut seen_deps = HashSet::new();
        for dep in upstream_deps.into_iter().chain(downstream_deps) {
            if seen_deps.insert(dep.key()) {
                dependencies.push(dep);
            }
        }

        ColumnLineageResult {
            object_id: object_id.to_string(),
            column_name: column_name.to_string(),
            dependencies,
            source_columns,
            target_columns,
        }
    }

    /// BFS in one direction, returning the traversed dependencies.
    fn collect(&self, start: &str, depth: usize, upstream: bool) -> Vec<ColumnLevelDependency> {
        let adjacency = if upstream { &self.backward } else { &self.forward };

        let mut deps = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        visited.insert(start.to_string());
        queue.push_back((start.to_string(), 0));

        while let Some((current, current_depth)) = queue.pop_front() {
            if current_depth >= depth {
                continue;
            }
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };

            for neighbor in neighbors {
                let key = if upstream {
                    (neighbor.clone(), current.clone())
                } else {
                    (current.clone(), neighbor.clone())
                };
                if let Some(dep) = self.edge_index.get(&key) {
                    deps.push(dep.clone());
                }

                if !visited.contains(neighbor) {
                    visited.insert(neighbor.clone());
                    queue.push_back((neighbor.clone(), current_depth + 1));
                }
            }
        }

        deps
    }

    pub(crate) fn object_column_lineage(&self, object_id: &str) -> ObjectColumnLineage {
        let columns = self.columns_for(object_id);
        let mut column_lineage = BTreeMap::new();

        for column in &columns {
            column_lineage.insert(
                column.clone(),
                self.column_lineage(object_id, column, Direction::Both, 1),
            );
        }

        ObjectColumnLineage {
            object_id: object_id.to_string(),
            has_column_lineage: !columns.is_empty(),
            columns_with_lineage: columns,
            column_lineage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(
        source: (&str, &str),
        target: (&str, &str),
        kind: TransformationKind,
    ) -> ColumnLevelDependency {
        ColumnLevelDependency {
            source_object_id: source.0.to_string(),
            source_column: source.1.to_string(),
            target_object_id: target.0.to_string(),
            target_column: target.1.to_string(),
            transformation: match kind {
                TransformationKind::Direct => None,
                _ => Some("SUM(x)".to_string()),
            },
            transformation_type: kind,
        }
    }

    fn chain_index() -> ColumnIndex {
        // T.ID -> V1.ID -> V2.ID
        ColumnIndex::build(vec![
            dep(("S.T", "ID"), ("S.V1", "ID"), TransformationKind::Direct),
            dep(("S.V1", "ID"), ("S.V2", "ID"), TransformationKind::Aggregate),
        ])
    }

    #[test]
    fn test_upstream_traversal() {
        let index = chain_index();
        let result = index.column_lineage("S.V2", "ID", Direction::Upstream, 5);

        assert_eq!(result.dependencies.len(), 2);
        assert_eq!(result.source_columns.len(), 2);
        assert!(result.target_columns.is_empty());
        assert!(result
            .source_columns
            .iter()
            .any(|s| s.object_id == "S.T" && s.column == "ID"));
    }

    #[test]
    fn test_downstream_traversal() {
        let index = chain_index();
        let result = index.column_lineage("S.T", "ID", Direction::Downstream, 5);

        assert_eq!(result.dependencies.len(), 2);
        assert_eq!(result.target_columns.len(), 2);
        assert!(result.source_columns.is_empty());
    }

    #[test]
    fn test_depth_limits_hops() {
        let index = chain_index();
        let result = index.column_lineage("S.T", "ID", Direction::Downstream, 1);
        assert_eq!(result.dependencies.len(), 1);
        assert_eq!(result.target_columns.len(), 1);
        assert_eq!(result.target_columns[0].object_id, "S.V1");
    }

    #[test]
    fn test_both_directions_use_independent_visited_sets() {
        let index = chain_index();
        let result = index.column_lineage("S.V1", "ID", Direction::Both, 5);

        assert!(result.source_columns.iter().any(|s| s.object_id == "S.T"));
        assert!(result.target_columns.iter().any(|t| t.object_id == "S.V2"));
        assert_eq!(result.dependencies.len(), 2);
    }

    #[test]
    fn test_cycle_safe() {
        let index = ColumnIndex::build(vec![
            dep(("S.A", "X"), ("S.B", "X"), TransformationKind::Direct),
            dep(("S.B", "X"), ("S.A", "X"), TransformationKind::Direct),
        ]);
        let result = index.column_lineage("S.A", "X", Direction::Both, 10);
        assert_eq!(result.dependencies.len(), 2);
    }

    #[test]
    fn test_column_key_split_with_platform_qualified_id() {
        let key = column_key("bigquery:p.d.t", "ID");
        assert_eq!(key, "bigquery:p.d.t:ID");
        let (object_id, column) = split_column_key(&key);
        assert_eq!(object_id, "bigquery:p.d.t");
        assert_eq!(column, "ID");
    }

    #[test]
    fn test_object_column_lineage() {
        let index = chain_index();
        let result = index.object_column_lineage("S.V1");

        assert!(result.has_column_lineage);
        assert_eq!(result.columns_with_lineage, vec!["ID".to_string()]);
        let id_lineage = &result.column_lineage["ID"];
        assert!(id_lineage.source_columns.iter().any(|s| s.object_id == "S.T"));
        assert!(id_lineage
            .target_columns
            .iter()
            .any(|t| t.object_id == "S.V2"));
    }

    #[test]
    fn test_has_column_lineage() {
        let index = chain_index();
        assert!(index.has_column_lineage("S.T"));
        assert!(!index.has_column_lineage("S.NOPE"));
    }

    #[test]
    fn test_duplicate_column_edge_counted_once() {
        let index = ColumnIndex::build(vec![
            dep(("S.T", "ID"), ("S.V", "ID"), TransformationKind::Direct),
            dep(("S.T", "ID"), ("S.V", "ID"), TransformationKind::Cast),
        ]);
        assert_eq!(index.dep_count(), 1);
        let result = index.column_lineage("S.V", "ID", Direction::Upstream, 1);
        assert_eq!(result.dependencies.len(), 1);
        assert_eq!(
            result.dependencies[0].transformation_type,
            TransformationKind::Direct
        );
    }
}
