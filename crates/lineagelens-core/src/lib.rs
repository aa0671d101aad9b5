pub mod analyzer;
pub mod cache;
pub mod error;
pub mod extract;
pub mod graph;
pub mod lineage;
pub mod model;
pub mod parser;
pub mod script;

// Re-export main types and functions
pub use analyzer::{SqlAnalyzer, TableReference};
pub use cache::{load_cache_file, merge::merge_caches, merge::MergeStats, CacheMetadata, LineageCache};
pub use error::LineageError;
pub use extract::{run_extraction, ExtractionResult, MetadataSource, SourceSnapshot, SqlUnit};
pub use graph::{
    ColumnLineageResult, ColumnSourceInfo, ColumnTargetInfo, Direction, LineageGraph,
    LineageResult, ObjectColumnLineage, Statistics,
};
pub use lineage::{ColumnLineageExtractor, SchemaContext};
pub use model::{
    reference_kinds, ColumnInfo, ColumnLevelDependency, DatabaseObject, DependencyKind,
    ObjectDetail, ObjectKind, Platform, TableLevelDependency, TransformationKind, UdfParameter,
};
pub use parser::{parse_sql, parse_sql_with_dialect, Dialect};
pub use script::{parse_script, ScriptLanguage};
