//! Extractor orchestration: drive a metadata source, run the analyzers over
//! everything it produced, and emit a cache fragment.
//!
//! Sources are abstracted behind [`MetadataSource`]; the orchestrator only
//! sees raw objects (with definitions, script bodies, declared DAG edges and
//! sync mappings). Per-object analyzer failures are isolated: the object is
//! skipped with a warning, extraction continues.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::cache::{CacheMetadata, LineageCache};
use crate::error::LineageError;
use crate::lineage::{ColumnLineageExtractor, SchemaContext};
use crate::model::{
    reference_kinds, ColumnLevelDependency, DatabaseObject, DependencyKind, ObjectDetail,
    TableLevelDependency,
};
use crate::parser::Dialect;
use crate::script::{parse_script, ScriptLanguage};

/// A source of raw lineage metadata: a database catalog dump, a tree of SQL
/// files, a sync-metadata table. Retryable failures surface as
/// [`LineageError::SourceUnavailable`].
pub trait MetadataSource {
    /// Short name used in cache metadata and warnings.
    fn name(&self) -> &str;

    /// SQL dialect of the definitions this source produces.
    fn dialect(&self) -> Dialect;

    /// Base offset for minted numeric tags; sources partition the integer
    /// space (one uses 100000, the next 200000, ...).
    fn tag_base(&self) -> i64;

    fn fetch(&mut self) -> Result<SourceSnapshot, LineageError>;
}

/// Everything a source produced, in the flat object schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSnapshot {
    pub objects: Vec<DatabaseObject>,
    /// Raw SQL attributed to a target object (one unit per definition file).
    #[serde(default)]
    pub sql_units: Vec<SqlUnit>,
}

/// A raw SQL text whose references feed the given target object.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlUnit {
    pub target_id: String,
    pub sql: String,
    /// When set, references that resolve to no extracted object are minted
    /// as `{namespace}:{schema.name}` (lowercase), the platform-qualified
    /// id convention.
    #[serde(default)]
    pub reference_namespace: Option<String>,
}

/// Outcome of one extraction run.
#[derive(Debug)]
pub struct ExtractionResult {
    pub cache: LineageCache,
    pub warnings: Vec<String>,
}

/// Drive `source` through the full extraction pipeline.
pub fn run_extraction(source: &mut dyn MetadataSource) -> Result<ExtractionResult, LineageError> {
    let snapshot = source.fetch()?;

    let mut extractor = Extractor::new(source.name(), source.dialect(), source.tag_base());
    extractor.ingest(snapshot.objects);
    extractor.view_pass();
    extractor.script_pass();
    extractor.sql_pass(snapshot.sql_units);
    extractor.virtual_schema_pass();
    extractor.dag_pass();
    extractor.sync_pass();
    extractor.insert_placeholders();

    Ok(extractor.finish())
}

struct Extractor {
    source_name: String,
    dialect: Dialect,
    objects: BTreeMap<String, DatabaseObject>,
    table_deps: Vec<TableLevelDependency>,
    edge_keys: HashSet<(String, String)>,
    column_deps: Vec<ColumnLevelDependency>,
    column_keys: HashSet<(String, String, String, String)>,
    warnings: Vec<String>,
    next_tag: i64,
}

impl Extractor {
    fn new(source_name: &str, dialect: Dialect, tag_base: i64) -> Self {
        Self {
            source_name: source_name.to_string(),
            dialect,
            objects: BTreeMap::new(),
            table_deps: Vec::new(),
            edge_keys: HashSet::new(),
            column_deps: Vec::new(),
            column_keys: HashSet::new(),
            warnings: Vec::new(),
            next_tag: tag_base,
        }
    }

    fn warn(&mut self, message: String) {
        #[cfg(feature = "tracing")]
        tracing::warn!(source = %self.source_name, "{message}");
        self.warnings.push(message);
    }

    fn mint_tag(&mut self) -> i64 {
        self.next_tag += 1;
        self.next_tag
    }

    fn ingest(&mut self, objects: Vec<DatabaseObject>) {
        for mut obj in objects {
            if self.objects.contains_key(&obj.id) {
                self.warn(format!("duplicate object id '{}' skipped", obj.id));
                continue;
            }
            if obj.numeric_tag == 0 {
                obj.numeric_tag = self.mint_tag();
            }
            self.objects.insert(obj.id.clone(), obj);
        }
    }

    fn known_ids(&self) -> HashSet<String> {
        self.objects.keys().cloned().collect()
    }

    fn add_edge(&mut self, dep: TableLevelDependency) {
        if self.edge_keys.insert(dep.key()) {
            self.table_deps.push(dep);
        }
    }

    fn add_column_dep(&mut self, dep: ColumnLevelDependency) {
        if self.column_keys.insert(dep.key()) {
            self.column_deps.push(dep);
        }
    }

    /// Resolve an analyzer reference against the extracted objects: exact id
    /// first, then a `.NAME` suffix match; DDL references pass through so
    /// the placeholder pass can materialize them.
    fn resolve_ref_id(&self, full_id: &str, name: &str, reference_type: &str) -> Option<String> {
        if self.objects.contains_key(full_id) {
            return Some(full_id.to_string());
        }
        let suffix = format!(".{name}");
        if let Some(id) = self.objects.keys().find(|id| id.ends_with(&suffix)) {
            return Some(id.clone());
        }
        if reference_type == reference_kinds::DDL {
            Some(full_id.to_string())
        } else {
            None
        }
    }

    /// Table dependencies and column lineage from view definitions.
    fn view_pass(&mut self) {
        let views: Vec<(String, String)> = self
            .objects
            .values()
            .filter(|obj| obj.kind.is_view())
            .filter_map(|obj| {
                obj.definition()
                    .map(|def| (obj.id.clone(), def.to_string()))
            })
            .collect();

        let known = self.known_ids();
        let column_extractor = ColumnLineageExtractor::new(self.dialect);
        let schema_context = self.schema_context();

        for (view_id, definition) in views {
            let refs = parse_script(&definition, ScriptLanguage::Sql, Some(&known));

            for r in &refs {
                // The definition's own CREATE target is the view itself.
                if r.reference_type == reference_kinds::DDL {
                    continue;
                }
                let Some(table_id) = self.resolve_ref_id(&r.full_id(), &r.name, &r.reference_type)
                else {
                    continue;
                };
                if table_id == view_id {
                    continue;
                }
                self.add_edge(TableLevelDependency::new(
                    table_id,
                    view_id.clone(),
                    DependencyKind::View,
                    r.reference_type.clone(),
                ));
            }

            for dep in column_extractor.extract(&definition, &view_id, Some(&schema_context)) {
                // Only attribute columns to objects this run actually saw.
                if self.objects.contains_key(&dep.source_object_id) {
                    self.add_column_dep(dep);
                }
            }
        }
    }

    fn schema_context(&self) -> SchemaContext {
        let mut ctx = SchemaContext::default();
        for (id, obj) in &self.objects {
            let columns = obj.column_names();
            if !columns.is_empty() {
                ctx.object_columns.insert(id.clone(), columns);
            }
        }
        ctx
    }

    /// Embedded-SQL dependencies from scripted UDFs and procedures.
    ///
    /// Write references make the script the producer (script -> table);
    /// read references make the table the producer (table -> script).
    fn script_pass(&mut self) {
        let scripts: Vec<(String, String, ScriptLanguage)> = self
            .objects
            .values()
            .filter(|obj| obj.kind.is_scripted())
            .filter_map(|obj| {
                obj.script().map(|(text, language)| {
                    (
                        obj.id.clone(),
                        text.to_string(),
                        language.map(ScriptLanguage::parse).unwrap_or(ScriptLanguage::Lua),
                    )
                })
            })
            .collect();

        let known = self.known_ids();

        for (script_id, script_text, language) in scripts {
            let refs = parse_script(&script_text, language, Some(&known));

            for r in &refs {
                let Some(table_id) = self.resolve_ref_id(&r.full_id(), &r.name, &r.reference_type)
                else {
                    continue;
                };
                if table_id == script_id {
                    continue;
                }

                let writes = reference_kinds::is_write(&r.reference_type)
                    || r.reference_type == reference_kinds::DDL;
                let dep = if writes {
                    TableLevelDependency::new(
                        script_id.clone(),
                        table_id,
                        DependencyKind::UdfOutput,
                        r.reference_type.clone(),
                    )
                } else {
                    TableLevelDependency::new(
                        table_id,
                        script_id.clone(),
                        DependencyKind::UdfInput,
                        r.reference_type.clone(),
                    )
                };
                self.add_edge(dep);
            }
        }
    }

    /// Dependencies from raw SQL attributed to a target object, e.g. one
    /// CREATE statement per repository file. The extractor only knows the
    /// target; everything the statement reads becomes an upstream edge with
    /// the conservative DATA kind.
    fn sql_pass(&mut self, units: Vec<SqlUnit>) {
        let analyzer = crate::analyzer::SqlAnalyzer::new(self.dialect);

        for unit in units {
            for r in analyzer.analyze(&unit.sql) {
                if r.reference_type == reference_kinds::DDL {
                    // The CREATE target itself.
                    continue;
                }

                let full = r.full_id();
                let source_id = if self.objects.contains_key(&full) {
                    full
                } else {
                    let suffix = format!(".{}", r.name);
                    match self.objects.keys().find(|id| id.ends_with(&suffix)) {
                        Some(id) => id.clone(),
                        None => match &unit.reference_namespace {
                            Some(namespace) => {
                                format!("{namespace}:{}", full.to_lowercase())
                            }
                            None => full,
                        },
                    }
                };

                if source_id == unit.target_id {
                    continue;
                }
                self.add_edge(TableLevelDependency::new(
                    source_id,
                    unit.target_id.clone(),
                    DependencyKind::Data,
                    r.reference_type.clone(),
                ));
            }
        }
    }

    /// Virtual schemas use their adapter connection.
    fn virtual_schema_pass(&mut self) {
        let mut edges = Vec::new();

        for obj in self.objects.values() {
            let ObjectDetail::VirtualSchema {
                connection_name: Some(connection_name),
                ..
            } = &obj.detail
            else {
                continue;
            };

            let connection_id = self
                .objects
                .values()
                .find(|candidate| {
                    candidate.kind == crate::model::ObjectKind::Connection
                        && candidate.name.eq_ignore_ascii_case(connection_name)
                })
                .map(|c| c.id.clone());

            if let Some(connection_id) = connection_id {
                edges.push(TableLevelDependency::new(
                    connection_id,
                    obj.id.clone(),
                    DependencyKind::Connection,
                    reference_kinds::USES,
                ));
            }
        }

        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Declared DAG inputs and outputs.
    fn dag_pass(&mut self) {
        let mut edges = Vec::new();

        for obj in self.objects.values() {
            let ObjectDetail::Dag {
                inputs, outputs, ..
            } = &obj.detail
            else {
                continue;
            };

            for input in inputs {
                edges.push(TableLevelDependency::new(
                    input.clone(),
                    obj.id.clone(),
                    DependencyKind::Reads,
                    reference_kinds::DAG_INPUT,
                ));
            }
            for output in outputs {
                edges.push(TableLevelDependency::new(
                    obj.id.clone(),
                    output.clone(),
                    DependencyKind::Writes,
                    reference_kinds::DAG_OUTPUT,
                ));
            }
        }

        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Cross-warehouse sync mappings: warehouse -> staging -> mart.
    fn sync_pass(&mut self) {
        let mut edges = Vec::new();

        for obj in self.objects.values() {
            let ObjectDetail::SyncJob {
                bq_table,
                stg_table,
                dm_table,
                ..
            } = &obj.detail
            else {
                continue;
            };

            match (bq_table, stg_table, dm_table) {
                (Some(bq), Some(stg), Some(dm)) => {
                    edges.push(TableLevelDependency::new(
                        bq.clone(),
                        stg.clone(),
                        DependencyKind::Sync,
                        reference_kinds::BQ_TO_EXASOL,
                    ));
                    edges.push(TableLevelDependency::new(
                        stg.clone(),
                        dm.clone(),
                        DependencyKind::Etl,
                        reference_kinds::STG_TO_DM,
                    ));
                }
                (Some(bq), Some(stg), None) => {
                    edges.push(TableLevelDependency::new(
                        bq.clone(),
                        stg.clone(),
                        DependencyKind::Sync,
                        reference_kinds::BQ_TO_EXASOL,
                    ));
                }
                (Some(bq), None, Some(dm)) => {
                    edges.push(TableLevelDependency::new(
                        bq.clone(),
                        dm.clone(),
                        DependencyKind::Sync,
                        reference_kinds::BQ_TO_EXASOL,
                    ));
                }
                _ => {}
            }
        }

        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Every dependency endpoint must resolve to an object; anything the
    /// source never produced becomes an EXTERNAL placeholder.
    fn insert_placeholders(&mut self) {
        let mut missing: Vec<String> = Vec::new();
        for dep in &self.table_deps {
            for id in [&dep.source_id, &dep.target_id] {
                if !self.objects.contains_key(id.as_str()) && !missing.contains(id) {
                    missing.push(id.clone());
                }
            }
        }

        for id in missing {
            let mut placeholder = DatabaseObject::external(&id);
            placeholder.numeric_tag = self.mint_tag();
            self.objects.insert(id, placeholder);
        }
    }

    fn finish(self) -> ExtractionResult {
        let column_count: usize = self
            .objects
            .values()
            .map(|obj| obj.columns.as_ref().map(Vec::len).unwrap_or(0))
            .sum();

        let metadata = CacheMetadata {
            version: Some("1.0.0".to_string()),
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            source: Some(self.source_name),
            object_count: Some(self.objects.len()),
            dependency_count: Some(self.table_deps.len()),
            column_count: Some(column_count),
            ..CacheMetadata::default()
        };

        ExtractionResult {
            cache: LineageCache {
                metadata,
                objects: self.objects,
                table_deps: self.table_deps,
                column_deps: self.column_deps,
            },
            warnings: self.warnings,
        }
    }
}
