//! In-memory lineage graph engine.
//!
//! Built once from a loaded cache, read-only afterwards: pre-computed
//! bidirectional adjacency gives O(1) neighbor lookups, traversal is a
//! cycle-safe BFS bounded by the caller's depth, and per-node has-more flags
//! tell clients that neighbors exist beyond the cut without materializing
//! them.

pub mod column;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::cache::LineageCache;
use crate::model::{DatabaseObject, TableLevelDependency};

pub use column::{ColumnLineageResult, ColumnSourceInfo, ColumnTargetInfo, ObjectColumnLineage};

/// Traversal direction for column lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
    Both,
}

/// Result of a table-level traversal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LineageResult {
    pub nodes: HashMap<String, DatabaseObject>,
    pub edges: Vec<TableLevelDependency>,
    pub has_more_upstream: HashMap<String, bool>,
    pub has_more_downstream: HashMap<String, bool>,
}

/// Cache statistics computed from the built indices.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_objects: usize,
    pub total_dependencies: usize,
    pub total_column_dependencies: usize,
    pub objects_with_column_lineage: usize,
    pub schemas: usize,
    pub by_kind: BTreeMap<String, usize>,
}

enum TraverseDirection {
    Forward,
    Backward,
}

/// Read-only lineage graph with bidirectional adjacency indices.
#[derive(Debug, Default)]
pub struct LineageGraph {
    objects: HashMap<String, DatabaseObject>,
    forward: HashMap<String, HashSet<String>>,
    backward: HashMap<String, HashSet<String>>,
    edge_index: HashMap<(String, String), TableLevelDependency>,
    by_schema: HashMap<String, HashSet<String>>,
    by_kind: HashMap<String, HashSet<String>>,
    table_dep_count: usize,
    columns: column::ColumnIndex,
}

impl LineageGraph {
    /// Build all indices from a loaded cache. O(V + E).
    pub fn from_cache(cache: LineageCache) -> Self {
        let mut graph = Self {
            table_dep_count: cache.table_deps.len(),
            ..Self::default()
        };

        for (id, obj) in cache.objects {
            graph
                .by_schema
                .entry(obj.schema_name.clone())
                .or_default()
                .insert(id.clone());
            graph
                .by_kind
                .entry(obj.kind.as_str().to_string())
                .or_default()
                .insert(id.clone());
            graph.objects.insert(id, obj);
        }

        for dep in cache.table_deps {
            graph
                .forward
                .entry(dep.source_id.clone())
                .or_default()
                .insert(dep.target_id.clone());
            graph
                .backward
                .entry(dep.target_id.clone())
                .or_default()
                .insert(dep.source_id.clone());
            graph
                .edge_index
                .entry((dep.source_id.clone(), dep.target_id.clone()))
                .or_insert(dep);
        }

        graph.columns = column::ColumnIndex::build(cache.column_deps);
        graph
    }

    pub fn get(&self, id: &str) -> Option<&DatabaseObject> {
        self.objects.get(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Downstream objects that consume `id`, up to `depth` hops.
    pub fn forward_lineage(&self, id: &str, depth: usize) -> LineageResult {
        self.traverse(id, depth, TraverseDirection::Forward)
    }

    /// Upstream objects that `id` depends on, up to `depth` hops.
    pub fn backward_lineage(&self, id: &str, depth: usize) -> LineageResult {
        self.traverse(id, depth, TraverseDirection::Backward)
    }

    /// Union of both directed traversals rooted at `id`, edges de-duplicated
    /// by `(source, target)`.
    pub fn full_lineage(&self, id: &str, upstream_depth: usize, downstream_depth: usize) -> LineageResult {
        let upstream = self.backward_lineage(id, upstream_depth);
        let downstream = self.forward_lineage(id, downstream_depth);

        let mut nodes = upstream.nodes;
        nodes.extend(downstream.nodes);
        if let Some(obj) = self.objects.get(id) {
            nodes.insert(id.to_string(), obj.clone());
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut edges = Vec::new();
        for edge in upstream.edges.into_iter().chain(downstream.edges) {
            if seen.insert(edge.key()) {
                edges.push(edge);
            }
        }

        // Flags from one directed traversal would claim unexpanded neighbors
        // the other direction already materialized; recompute against the
        // union instead.
        let mut has_more_upstream = HashMap::new();
        let mut has_more_downstream = HashMap::new();
        for id in nodes.keys() {
            let unexpanded = |neighbors: Option<&HashSet<String>>| {
                neighbors
                    .map(|n| n.iter().any(|m| !nodes.contains_key(m)))
                    .unwrap_or(false)
            };
            has_more_downstream.insert(id.clone(), unexpanded(self.forward.get(id)));
            has_more_upstream.insert(id.clone(), unexpanded(self.backward.get(id)));
        }

        LineageResult {
            nodes,
            edges,
            has_more_upstream,
            has_more_downstream,
        }
    }

    fn traverse(&self, start_id: &str, depth: usize, direction: TraverseDirection) -> LineageResult {
        let adjacency = match direction {
            TraverseDirection::Forward => &self.forward,
            TraverseDirection::Backward => &self.backward,
        };

        let mut result = LineageResult::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        visited.insert(start_id.to_string());
        queue.push_back((start_id.to_string(), 0));

        while let Some((current_id, current_depth)) = queue.pop_front() {
            let Some(current) = self.objects.get(&current_id) else {
                continue;
            };
            result.nodes.insert(current_id.clone(), current.clone());

            if current_depth >= depth {
                continue;
            }

            let Some(neighbors) = adjacency.get(&current_id) else {
                continue;
            };
            for neighbor_id in neighbors {
                if !visited.contains(neighbor_id) {
                    visited.insert(neighbor_id.clone());
                    queue.push_back((neighbor_id.clone(), current_depth + 1));
                }
            }
        }

        // Edges: every indexed edge with both endpoints in the node set,
        // including edges between two frontier nodes the BFS never expanded.
        for source_id in result.nodes.keys() {
            let Some(targets) = self.forward.get(source_id) else {
                continue;
            };
            for target_id in targets {
                if !result.nodes.contains_key(target_id) {
                    continue;
                }
                if let Some(edge) = self
                    .edge_index
                    .get(&(source_id.clone(), target_id.clone()))
                {
                    result.edges.push(edge.clone());
                }
            }
        }

        // Flags are computed against the completed visited set so clients
        // know whether expanding a node would surface anything new.
        for id in result.nodes.keys() {
            let unexpanded = |neighbors: Option<&HashSet<String>>| {
                neighbors
                    .map(|n| n.iter().any(|m| !visited.contains(m)))
                    .unwrap_or(false)
            };
            result
                .has_more_downstream
                .insert(id.clone(), unexpanded(self.forward.get(id)));
            result
                .has_more_upstream
                .insert(id.clone(), unexpanded(self.backward.get(id)));
        }

        result
    }

    /// Case-insensitive substring search over name, schema and id on the
    /// filter-derived candidate set. Enumeration order is not stable; callers
    /// needing stability use pagination.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        schema_filter: Option<&str>,
        kind_filter: Option<&str>,
    ) -> Vec<&DatabaseObject> {
        let query_lower = query.to_lowercase();
        let mut results = Vec::new();

        for id in self.candidates(schema_filter, kind_filter) {
            let Some(obj) = self.objects.get(&id) else { continue };
            if obj.name.to_lowercase().contains(&query_lower)
                || obj.schema_name.to_lowercase().contains(&query_lower)
                || id.to_lowercase().contains(&query_lower)
            {
                results.push(obj);
                if results.len() >= limit {
                    break;
                }
            }
        }

        results
    }

    /// Page of objects sorted lexicographically by id; `total` is the full
    /// filtered count.
    pub fn objects_paginated(
        &self,
        page: usize,
        page_size: usize,
        schema_filter: Option<&str>,
        kind_filter: Option<&str>,
    ) -> (Vec<&DatabaseObject>, usize) {
        let mut candidates: Vec<String> = self.candidates(schema_filter, kind_filter).collect();
        candidates.sort();

        let total = candidates.len();
        let start = (page.saturating_sub(1)) * page_size;
        let items = candidates
            .iter()
            .skip(start)
            .take(page_size)
            .filter_map(|id| self.objects.get(id))
            .collect();

        (items, total)
    }

    fn candidates<'a>(
        &'a self,
        schema_filter: Option<&str>,
        kind_filter: Option<&str>,
    ) -> Box<dyn Iterator<Item = String> + 'a> {
        match (schema_filter, kind_filter) {
            (Some(schema), Some(kind)) => {
                let by_schema = self.by_schema.get(schema);
                let by_kind = self.by_kind.get(kind);
                match (by_schema, by_kind) {
                    (Some(s), Some(k)) => {
                        Box::new(s.intersection(k).cloned().collect::<Vec<_>>().into_iter())
                    }
                    _ => Box::new(std::iter::empty()),
                }
            }
            (Some(schema), None) => match self.by_schema.get(schema) {
                Some(s) => Box::new(s.iter().cloned()),
                None => Box::new(std::iter::empty()),
            },
            (None, Some(kind)) => match self.by_kind.get(kind) {
                Some(k) => Box::new(k.iter().cloned()),
                None => Box::new(std::iter::empty()),
            },
            (None, None) => Box::new(self.objects.keys().cloned()),
        }
    }

    pub fn schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self.by_schema.keys().cloned().collect();
        schemas.sort();
        schemas
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.by_kind.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn statistics(&self) -> Statistics {
        let by_kind: BTreeMap<String, usize> = self
            .by_kind
            .iter()
            .map(|(kind, ids)| (kind.clone(), ids.len()))
            .collect();

        Statistics {
            total_objects: self.objects.len(),
            total_dependencies: self.table_dep_count,
            total_column_dependencies: self.columns.dep_count(),
            objects_with_column_lineage: self.columns.object_count(),
            schemas: self.by_schema.len(),
            by_kind,
        }
    }

    // === Column-level operations (§ graph::column) ===

    pub fn column_lineage(
        &self,
        object_id: &str,
        column_name: &str,
        direction: Direction,
        depth: usize,
    ) -> ColumnLineageResult {
        self.columns
            .column_lineage(object_id, column_name, direction, depth)
    }

    pub fn object_column_lineage(&self, object_id: &str) -> ObjectColumnLineage {
        self.columns.object_column_lineage(object_id)
    }

    pub fn has_column_lineage(&self, object_id: &str) -> bool {
        self.columns.has_column_lineage(object_id)
    }

    pub fn columns_with_lineage(&self, object_id: &str) -> Vec<String> {
        self.columns.columns_for(object_id)
    }

    /// Structural consistency check used by tests: every adjacency entry has
    /// a matching edge-index entry and a mirrored reverse entry.
    #[cfg(test)]
    fn check_index_consistency(&self) -> bool {
        self.forward.iter().all(|(source, targets)| {
            targets.iter().all(|target| {
                self.edge_index
                    .contains_key(&(source.clone(), target.clone()))
                    && self
                        .backward
                        .get(target)
                        .is_some_and(|sources| sources.contains(source))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyKind, ObjectKind};

    fn cache_with_edges(edges: &[(&str, &str)]) -> LineageCache {
        let mut cache = LineageCache::default();
        for (source, target) in edges {
            for id in [source, target] {
                cache
                    .objects
                    .entry(id.to_string())
                    .or_insert_with(|| {
                        let (schema, name) = id.rsplit_once('.').unwrap_or(("", id));
                        DatabaseObject::new(*id, schema, name, ObjectKind::Table)
                    });
            }
            cache.table_deps.push(TableLevelDependency::new(
                *source,
                *target,
                DependencyKind::Data,
                "SELECT",
            ));
        }
        cache
    }

    #[test]
    fn test_has_more_surfacing_on_chain() {
        // A -> B -> C -> D, depth 1 from A.
        let graph =
            LineageGraph::from_cache(cache_with_edges(&[("S.A", "S.B"), ("S.B", "S.C"), ("S.C", "S.D")]));
        let result = graph.forward_lineage("S.A", 1);

        assert_eq!(result.nodes.len(), 2);
        assert!(result.nodes.contains_key("S.A"));
        assert!(result.nodes.contains_key("S.B"));
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].key(), ("S.A".to_string(), "S.B".to_string()));
        assert_eq!(result.has_more_downstream["S.B"], true);
        assert_eq!(result.has_more_downstream["S.A"], false);
    }

    #[test]
    fn test_cycle_safety() {
        // A -> B, B -> A.
        let graph = LineageGraph::from_cache(cache_with_edges(&[("S.A", "S.B"), ("S.B", "S.A")]));
        let result = graph.forward_lineage("S.A", 5);

        assert_eq!(result.nodes.len(), 2);
        let mut keys: Vec<_> = result.edges.iter().map(|e| e.key()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("S.A".to_string(), "S.B".to_string()),
                ("S.B".to_string(), "S.A".to_string()),
            ]
        );
    }

    #[test]
    fn test_frontier_edge_included_at_depth_cut() {
        // A -> B, A -> C, B -> C: depth 1 from A reaches B and C; the B -> C
        // edge connects two frontier nodes and must still be returned.
        let graph = LineageGraph::from_cache(cache_with_edges(&[
            ("S.A", "S.B"),
            ("S.A", "S.C"),
            ("S.B", "S.C"),
        ]));
        let result = graph.forward_lineage("S.A", 1);

        assert_eq!(result.nodes.len(), 3);
        let mut keys: Vec<_> = result.edges.iter().map(|e| e.key()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("S.A".to_string(), "S.B".to_string()),
                ("S.A".to_string(), "S.C".to_string()),
                ("S.B".to_string(), "S.C".to_string()),
            ]
        );
        // C was reached, so nothing more is downstream of B.
        assert_eq!(result.has_more_downstream["S.B"], false);
    }

    #[test]
    fn test_full_lineage_flags_account_for_both_directions() {
        // X -> B -> C: full lineage from B materializes both neighbors, so
        // neither direction has more to expand at B.
        let graph =
            LineageGraph::from_cache(cache_with_edges(&[("S.X", "S.B"), ("S.B", "S.C")]));
        let result = graph.full_lineage("S.B", 1, 1);

        assert_eq!(result.has_more_upstream["S.B"], false);
        assert_eq!(result.has_more_downstream["S.B"], false);
        assert_eq!(result.has_more_upstream["S.C"], false);
        assert_eq!(result.has_more_downstream["S.X"], false);
    }

    #[test]
    fn test_edges_endpoints_always_in_nodes() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[
            ("S.A", "S.B"),
            ("S.B", "S.C"),
            ("S.X", "S.B"),
        ]));
        for depth in 0..4 {
            let result = graph.full_lineage("S.B", depth, depth);
            for edge in &result.edges {
                assert!(result.nodes.contains_key(&edge.source_id));
                assert!(result.nodes.contains_key(&edge.target_id));
            }
        }
    }

    #[test]
    fn test_full_lineage_equals_union_of_directed() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[
            ("S.A", "S.B"),
            ("S.B", "S.C"),
            ("S.X", "S.B"),
            ("S.C", "S.D"),
        ]));

        let full = graph.full_lineage("S.B", 2, 2);
        let up = graph.backward_lineage("S.B", 2);
        let down = graph.forward_lineage("S.B", 2);

        let mut expected_nodes: HashSet<String> = up.nodes.keys().cloned().collect();
        expected_nodes.extend(down.nodes.keys().cloned());
        expected_nodes.insert("S.B".to_string());
        let actual_nodes: HashSet<String> = full.nodes.keys().cloned().collect();
        assert_eq!(actual_nodes, expected_nodes);

        let mut expected_edges: HashSet<(String, String)> =
            up.edges.iter().map(|e| e.key()).collect();
        expected_edges.extend(down.edges.iter().map(|e| e.key()));
        let actual_edges: HashSet<(String, String)> =
            full.edges.iter().map(|e| e.key()).collect();
        assert_eq!(actual_edges, expected_edges);

        // De-duplicated: no key appears twice.
        assert_eq!(full.edges.len(), actual_edges.len());
    }

    #[test]
    fn test_depth_zero_returns_start_only() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[("S.A", "S.B")]));
        let result = graph.forward_lineage("S.A", 0);
        assert_eq!(result.nodes.len(), 1);
        assert!(result.edges.is_empty());
        assert_eq!(result.has_more_downstream["S.A"], true);
    }

    #[test]
    fn test_missing_start_yields_empty_result() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[("S.A", "S.B")]));
        let result = graph.forward_lineage("S.NOPE", 3);
        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_adjacency_edge_index_consistency() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[
            ("S.A", "S.B"),
            ("S.B", "S.C"),
            ("S.A", "S.C"),
        ]));
        assert!(graph.check_index_consistency());
    }

    #[test]
    fn test_duplicate_edge_keeps_first_annotation() {
        let mut cache = cache_with_edges(&[("S.A", "S.B")]);
        cache.table_deps.push(TableLevelDependency::new(
            "S.A",
            "S.B",
            DependencyKind::Etl,
            "INSERT",
        ));

        let graph = LineageGraph::from_cache(cache);
        let result = graph.forward_lineage("S.A", 1);
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].dependency_type, DependencyKind::Data);
    }

    #[test]
    fn test_search_filters_and_limit() {
        let mut cache = cache_with_edges(&[("DWH.FACT_SALES", "MART.VW_SALES")]);
        cache.objects.get_mut("MART.VW_SALES").unwrap().kind = ObjectKind::View;

        let graph = LineageGraph::from_cache(cache);

        let hits = graph.search("sales", 10, None, None);
        assert_eq!(hits.len(), 2);

        let hits = graph.search("sales", 10, Some("DWH"), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "DWH.FACT_SALES");

        let hits = graph.search("sales", 10, None, Some("VIEW"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "MART.VW_SALES");

        let hits = graph.search("sales", 1, None, None);
        assert_eq!(hits.len(), 1);

        let hits = graph.search("nothing-matches", 10, None, None);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_pagination_sorted_and_totals() {
        let graph = LineageGraph::from_cache(cache_with_edges(&[
            ("S.A", "S.B"),
            ("S.C", "S.D"),
            ("S.E", "S.F"),
        ]));

        let (page1, total) = graph.objects_paginated(1, 4, None, None);
        assert_eq!(total, 6);
        assert_eq!(page1.len(), 4);
        assert_eq!(page1[0].id, "S.A");

        let (page2, _) = graph.objects_paginated(2, 4, None, None);
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].id, "S.E");

        let (beyond, total) = graph.objects_paginated(9, 4, None, None);
        assert_eq!(total, 6);
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_schemas_kinds_statistics() {
        let mut cache = cache_with_edges(&[("DWH.T", "MART.V")]);
        cache.objects.get_mut("MART.V").unwrap().kind = ObjectKind::View;
        let graph = LineageGraph::from_cache(cache);

        assert_eq!(graph.schemas(), vec!["DWH".to_string(), "MART".to_string()]);
        assert_eq!(graph.kinds(), vec!["TABLE".to_string(), "VIEW".to_string()]);

        let stats = graph.statistics();
        assert_eq!(stats.total_objects, 2);
        assert_eq!(stats.total_dependencies, 1);
        assert_eq!(stats.schemas, 2);
        assert_eq!(stats.by_kind["TABLE"], 1);
        assert_eq!(stats.by_kind["VIEW"], 1);
    }
}
