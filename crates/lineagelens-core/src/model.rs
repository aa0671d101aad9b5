//! Domain model for cross-platform lineage objects and dependencies.
//!
//! The on-disk cache uses one flat record for every object kind, with the
//! historical `schema` / `object_id` field names. Internally an object is a
//! tagged variant ([`ObjectDetail`]) so view definitions, script bodies and
//! sync mappings cannot be confused; [`RawObject`] bridges the two shapes at
//! the serde boundary.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source platform of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Exasol,
    Bigquery,
    Composer,
    Bridge,
}

/// Every lineage-visible object kind across the supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Table,
    View,
    LuaUdf,
    VirtualSchema,
    Connection,
    BigqueryTable,
    BigqueryView,
    BigqueryUdf,
    BigqueryProcedure,
    Procedure,
    Function,
    ComposerDag,
    SyncJob,
    /// Placeholder for a referenced object the extractor never saw.
    ExternalTable,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::LuaUdf => "LUA_UDF",
            Self::VirtualSchema => "VIRTUAL_SCHEMA",
            Self::Connection => "CONNECTION",
            Self::BigqueryTable => "BIGQUERY_TABLE",
            Self::BigqueryView => "BIGQUERY_VIEW",
            Self::BigqueryUdf => "BIGQUERY_UDF",
            Self::BigqueryProcedure => "BIGQUERY_PROCEDURE",
            Self::Procedure => "PROCEDURE",
            Self::Function => "FUNCTION",
            Self::ComposerDag => "COMPOSER_DAG",
            Self::SyncJob => "SYNC_JOB",
            Self::ExternalTable => "EXTERNAL_TABLE",
        }
    }

    /// Kinds whose definition is a SELECT-producing SQL statement.
    pub fn is_view(&self) -> bool {
        matches!(self, Self::View | Self::BigqueryView)
    }

    /// Kinds whose body is a script in a host language.
    pub fn is_scripted(&self) -> bool {
        matches!(
            self,
            Self::LuaUdf
                | Self::BigqueryUdf
                | Self::BigqueryProcedure
                | Self::Procedure
                | Self::Function
        )
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column metadata attached to a table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared parameter or result column of a scripted UDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UdfParameter {
    pub name: String,
    pub data_type: String,
}

/// Kind-specific payload of a [`DatabaseObject`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObjectDetail {
    #[default]
    None,
    View {
        definition: Option<String>,
    },
    Udf {
        udf_type: Option<String>,
        script_language: Option<String>,
        script_text: Option<String>,
        input_parameters: Option<Vec<UdfParameter>>,
        output_columns: Option<Vec<UdfParameter>>,
    },
    VirtualSchema {
        adapter_name: Option<String>,
        connection_name: Option<String>,
        remote_schema: Option<String>,
        properties: Option<BTreeMap<String, String>>,
    },
    Connection {
        connection_string: Option<String>,
        user: Option<String>,
    },
    Dag {
        schedule: Option<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
    },
    SyncJob {
        bq_table: Option<String>,
        stg_table: Option<String>,
        dm_table: Option<String>,
        batch_name: Option<String>,
        task_name: Option<String>,
    },
}

/// Any lineage-visible entity: table, view, UDF, virtual schema, connection,
/// orchestration DAG or sync job.
///
/// Ids follow one of two conventions, both preserved verbatim through merge:
/// `SCHEMA.NAME` (uppercase) or `platform:project.dataset.name` (lowercase
/// platform prefix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObject", into = "RawObject")]
pub struct DatabaseObject {
    pub id: String,
    pub schema_name: String,
    pub name: String,
    pub kind: ObjectKind,
    pub platform: Option<Platform>,
    pub owner: String,
    /// Compact integer key; extractors partition the integer space.
    pub numeric_tag: i64,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub description: Option<String>,
    pub row_count: Option<u64>,
    pub size_bytes: Option<u64>,
    pub columns: Option<Vec<ColumnInfo>>,
    pub detail: ObjectDetail,
}

impl DatabaseObject {
    /// Minimal object constructor used by extractors and tests.
    pub fn new(id: impl Into<String>, schema: impl Into<String>, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            schema_name: schema.into(),
            name: name.into(),
            kind,
            platform: None,
            owner: String::new(),
            numeric_tag: 0,
            created_at: None,
            modified_at: None,
            description: None,
            row_count: None,
            size_bytes: None,
            columns: None,
            detail: ObjectDetail::None,
        }
    }

    /// Placeholder for an object referenced by a dependency but never
    /// extracted. Traversal must not see dangling endpoints.
    pub fn external(id: &str) -> Self {
        let (schema, name) = match id.rsplit_once('.') {
            Some((schema, name)) => (schema.to_string(), name.to_string()),
            None => (String::new(), id.to_string()),
        };
        let mut obj = Self::new(id, schema, name, ObjectKind::ExternalTable);
        obj.owner = "EXTERNAL".to_string();
        obj
    }

    /// SQL definition text, when the object is a view.
    pub fn definition(&self) -> Option<&str> {
        match &self.detail {
            ObjectDetail::View { definition } => definition.as_deref(),
            _ => None,
        }
    }

    /// Script body and language, when the object is a scripted UDF.
    pub fn script(&self) -> Option<(&str, Option<&str>)> {
        match &self.detail {
            ObjectDetail::Udf {
                script_text,
                script_language,
                ..
            } => script_text
                .as_deref()
                .map(|text| (text, script_language.as_deref())),
            _ => None,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .as_ref()
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}

/// The flat on-disk record every object kind serializes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObject {
    id: String,
    #[serde(rename = "schema", alias = "schema_name")]
    schema_name: String,
    name: String,
    #[serde(rename = "type")]
    kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    platform: Option<Platform>,
    #[serde(default)]
    owner: String,
    #[serde(default, rename = "object_id")]
    numeric_tag: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<ColumnInfo>>,
    // View
    #[serde(default, skip_serializing_if = "Option::is_none")]
    definition: Option<String>,
    // UDF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    udf_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_parameters: Option<Vec<UdfParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_columns: Option<Vec<UdfParameter>>,
    // Virtual schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    adapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, String>>,
    // Connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    // Orchestration DAG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inputs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outputs: Option<Vec<String>>,
    // Sync job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bq_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stg_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dm_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_name: Option<String>,
}

impl TryFrom<RawObject> for DatabaseObject {
    type Error = String;

    fn try_from(raw: RawObject) -> Result<Self, Self::Error> {
        if raw.id.is_empty() {
            return Err("object with empty id".to_string());
        }

        let detail = match raw.kind {
            ObjectKind::View | ObjectKind::BigqueryView => ObjectDetail::View {
                definition: raw.definition,
            },
            kind if kind.is_scripted() => ObjectDetail::Udf {
                udf_type: raw.udf_type,
                script_language: raw.script_language,
                script_text: raw.script_text,
                input_parameters: raw.input_parameters,
                output_columns: raw.output_columns,
            },
            ObjectKind::VirtualSchema => ObjectDetail::VirtualSchema {
                adapter_name: raw.adapter_name,
                connection_name: raw.connection_name,
                remote_schema: raw.remote_schema,
                properties: raw.properties,
            },
            ObjectKind::Connection => ObjectDetail::Connection {
                connection_string: raw.connection_string,
                user: raw.user,
            },
            ObjectKind::ComposerDag => ObjectDetail::Dag {
                schedule: raw.schedule,
                inputs: raw.inputs.unwrap_or_default(),
                outputs: raw.outputs.unwrap_or_default(),
            },
            ObjectKind::SyncJob => ObjectDetail::SyncJob {
                bq_table: raw.bq_table,
                stg_table: raw.stg_table,
                dm_table: raw.dm_table,
                batch_name: raw.batch_name,
                task_name: raw.task_name,
            },
            _ => ObjectDetail::None,
        };

        // Historical caches carry the numeric tag as either a number or a
        // stringified id; only the numeric form is meaningful.
        let numeric_tag = match &raw.numeric_tag {
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
            serde_json::Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        };

        Ok(Self {
            id: raw.id,
            schema_name: raw.schema_name,
            name: raw.name,
            kind: raw.kind,
            platform: raw.platform,
            owner: raw.owner,
            numeric_tag,
            created_at: raw.created_at,
            modified_at: raw.modified_at,
            description: raw.description,
            row_count: raw.row_count,
            size_bytes: raw.size_bytes,
            columns: raw.columns,
            detail,
        })
    }
}

impl From<DatabaseObject> for RawObject {
    fn from(obj: DatabaseObject) -> Self {
        let mut raw = RawObject {
            id: obj.id,
            schema_name: obj.schema_name,
            name: obj.name,
            kind: obj.kind,
            platform: obj.platform,
            owner: obj.owner,
            numeric_tag: serde_json::Value::from(obj.numeric_tag),
            created_at: obj.created_at,
            modified_at: obj.modified_at,
            description: obj.description,
            row_count: obj.row_count,
            size_bytes: obj.size_bytes,
            columns: obj.columns,
            definition: None,
            udf_type: None,
            script_language: None,
            script_text: None,
            input_parameters: None,
            output_columns: None,
            adapter_name: None,
            connection_name: None,
            remote_schema: None,
            properties: None,
            connection_string: None,
            user: None,
            schedule: None,
            inputs: None,
            outputs: None,
            bq_table: None,
            stg_table: None,
            dm_table: None,
            batch_name: None,
            task_name: None,
        };

        match obj.detail {
            ObjectDetail::None => {}
            ObjectDetail::View { definition } => raw.definition = definition,
            ObjectDetail::Udf {
                udf_type,
                script_language,
                script_text,
                input_parameters,
                output_columns,
            } => {
                raw.udf_type = udf_type;
                raw.script_language = script_language;
                raw.script_text = script_text;
                raw.input_parameters = input_parameters;
                raw.output_columns = output_columns;
            }
            ObjectDetail::VirtualSchema {
                adapter_name,
                connection_name,
                remote_schema,
                properties,
            } => {
                raw.adapter_name = adapter_name;
                raw.connection_name = connection_name;
                raw.remote_schema = remote_schema;
                raw.properties = properties;
            }
            ObjectDetail::Connection {
                connection_string,
                user,
            } => {
                raw.connection_string = connection_string;
                raw.user = user;
            }
            ObjectDetail::Dag {
                schedule,
                inputs,
                outputs,
            } => {
                raw.schedule = schedule;
                raw.inputs = Some(inputs);
                raw.outputs = Some(outputs);
            }
            ObjectDetail::SyncJob {
                bq_table,
                stg_table,
                dm_table,
                batch_name,
                task_name,
            } => {
                raw.bq_table = bq_table;
                raw.stg_table = stg_table;
                raw.dm_table = dm_table;
                raw.batch_name = batch_name;
                raw.task_name = task_name;
            }
        }

        raw
    }
}

/// How a downstream object depends on its upstream producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyKind {
    /// View derives from a table or another view.
    View,
    /// ETL write between persistent tables.
    Etl,
    /// Virtual schema or adapter uses a connection.
    Connection,
    /// A script reads from the table (table is the edge source).
    UdfInput,
    /// A script writes to the table (script is the edge source).
    UdfOutput,
    Constraint,
    /// Cross-warehouse sync.
    Sync,
    Reads,
    Writes,
    Uses,
    /// Conservative default when extractor confidence is low.
    #[default]
    Data,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Etl => "ETL",
            Self::Connection => "CONNECTION",
            Self::UdfInput => "UDF_INPUT",
            Self::UdfOutput => "UDF_OUTPUT",
            Self::Constraint => "CONSTRAINT",
            Self::Sync => "SYNC",
            Self::Reads => "READS",
            Self::Writes => "WRITES",
            Self::Uses => "USES",
            Self::Data => "DATA",
        }
    }

    /// Lenient parse for foreign caches; unknown kinds fall back to DATA.
    pub fn parse(s: &str) -> Self {
        match s {
            "VIEW" => Self::View,
            "ETL" => Self::Etl,
            "CONNECTION" => Self::Connection,
            "UDF_INPUT" => Self::UdfInput,
            "UDF_OUTPUT" => Self::UdfOutput,
            "CONSTRAINT" => Self::Constraint,
            "SYNC" => Self::Sync,
            "READS" => Self::Reads,
            "WRITES" => Self::Writes,
            "USES" => Self::Uses,
            _ => Self::Data,
        }
    }
}

/// How a statement references an object. The set is open: bridge and
/// orchestration extractors mint their own kinds.
pub mod reference_kinds {
    pub const SELECT: &str = "SELECT";
    pub const JOIN: &str = "JOIN";
    pub const INSERT: &str = "INSERT";
    pub const UPDATE: &str = "UPDATE";
    pub const DELETE: &str = "DELETE";
    pub const MERGE: &str = "MERGE";
    pub const DDL: &str = "DDL";
    pub const TRUNCATE: &str = "TRUNCATE";
    pub const USES: &str = "USES";
    pub const PARAMETER: &str = "PARAMETER";
    pub const REFERENCE: &str = "REFERENCE";
    pub const DAG_INPUT: &str = "DAG_INPUT";
    pub const DAG_OUTPUT: &str = "DAG_OUTPUT";
    pub const BQ_TO_EXASOL: &str = "BQ_TO_EXASOL";
    pub const STG_TO_DM: &str = "STG_TO_DM";

    /// Reference kinds that mean the statement writes to the object.
    pub fn is_write(kind: &str) -> bool {
        matches!(kind, INSERT | UPDATE | DELETE | MERGE | TRUNCATE)
    }
}

fn default_reference_type() -> String {
    reference_kinds::SELECT.to_string()
}

/// A directed table-level edge from an upstream producer to a downstream
/// consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTableDependency")]
pub struct TableLevelDependency {
    pub source_id: String,
    pub target_id: String,
    pub dependency_type: DependencyKind,
    pub reference_type: String,
}

impl TableLevelDependency {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        dependency_type: DependencyKind,
        reference_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            dependency_type,
            reference_type: reference_type.into(),
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.source_id.clone(), self.target_id.clone())
    }
}

/// Accepts the historical alias keys some caches use for edge endpoints
/// (`source_object_id` / `source`), including records carrying several of
/// them at once.
#[derive(Debug, Deserialize)]
struct RawTableDependency {
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    source_object_id: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    target_object_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    dependency_type: Option<String>,
    #[serde(default)]
    reference_type: Option<String>,
}

impl TryFrom<RawTableDependency> for TableLevelDependency {
    type Error = String;

    fn try_from(raw: RawTableDependency) -> Result<Self, Self::Error> {
        let source_id = raw
            .source_id
            .or(raw.source_object_id)
            .or(raw.source)
            .ok_or_else(|| "dependency without source id".to_string())?;
        let target_id = raw
            .target_id
            .or(raw.target_object_id)
            .or(raw.target)
            .ok_or_else(|| "dependency without target id".to_string())?;

        Ok(Self {
            source_id,
            target_id,
            dependency_type: raw
                .dependency_type
                .as_deref()
                .map(DependencyKind::parse)
                .unwrap_or_default(),
            reference_type: raw.reference_type.unwrap_or_else(default_reference_type),
        })
    }
}

/// How a target column is derived from its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationKind {
    /// Plain column reference; carries no transformation text.
    #[default]
    Direct,
    Aggregate,
    Expression,
    Case,
    Cast,
    Function,
    Unknown,
}

/// A directed column-level edge with its transformation classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLevelDependency {
    pub source_object_id: String,
    pub source_column: String,
    pub target_object_id: String,
    pub target_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
    #[serde(default)]
    pub transformation_type: TransformationKind,
}

impl ColumnLevelDependency {
    pub fn key(&self) -> (String, String, String, String) {
        (
            self.source_object_id.clone(),
            self.source_column.clone(),
            self.target_object_id.clone(),
            self.target_column.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_roundtrip_flat_schema() {
        let json = json!({
            "id": "DWH.VW_SALES",
            "schema": "DWH",
            "name": "VW_SALES",
            "type": "VIEW",
            "platform": "exasol",
            "owner": "SYS",
            "object_id": 100001,
            "definition": "SELECT * FROM DWH.FACT_SALES"
        });

        let obj: DatabaseObject = serde_json::from_value(json).unwrap();
        assert_eq!(obj.schema_name, "DWH");
        assert_eq!(obj.kind, ObjectKind::View);
        assert_eq!(obj.numeric_tag, 100001);
        assert_eq!(obj.definition(), Some("SELECT * FROM DWH.FACT_SALES"));

        // The flat field names survive re-serialization.
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value["schema"], "DWH");
        assert_eq!(value["object_id"], 100001);
        assert_eq!(value["definition"], "SELECT * FROM DWH.FACT_SALES");
        assert!(value.get("script_text").is_none());
    }

    #[test]
    fn test_object_udf_detail() {
        let json = json!({
            "id": "ETL.FN_PROC",
            "schema": "ETL",
            "name": "FN_PROC",
            "type": "LUA_UDF",
            "owner": "ETL",
            "object_id": 100002,
            "udf_type": "SCALAR",
            "script_language": "LUA",
            "script_text": "query([[SELECT 1]])"
        });

        let obj: DatabaseObject = serde_json::from_value(json).unwrap();
        let (text, language) = obj.script().unwrap();
        assert_eq!(text, "query([[SELECT 1]])");
        assert_eq!(language, Some("LUA"));
    }

    #[test]
    fn test_object_string_numeric_tag_tolerated() {
        let json = json!({
            "id": "STG.ORDERS",
            "schema": "STG",
            "name": "ORDERS",
            "type": "TABLE",
            "owner": "STG",
            "object_id": "STG.ORDERS"
        });

        let obj: DatabaseObject = serde_json::from_value(json).unwrap();
        assert_eq!(obj.numeric_tag, 0);
    }

    #[test]
    fn test_external_placeholder() {
        let obj = DatabaseObject::external("RAW.EVENTS");
        assert_eq!(obj.kind, ObjectKind::ExternalTable);
        assert_eq!(obj.owner, "EXTERNAL");
        assert_eq!(obj.schema_name, "RAW");
        assert_eq!(obj.name, "EVENTS");
    }

    #[test]
    fn test_dependency_alias_keys() {
        let json = json!({
            "source_object_id": "RAW.Y",
            "target_object_id": "STG.X",
            "dependency_type": "DATA"
        });
        let dep: TableLevelDependency = serde_json::from_value(json).unwrap();
        assert_eq!(dep.source_id, "RAW.Y");
        assert_eq!(dep.target_id, "STG.X");
        assert_eq!(dep.reference_type, "SELECT");
    }

    #[test]
    fn test_dependency_duplicate_alias_keys() {
        // Some caches write both the canonical and the alias key.
        let json = json!({
            "source_id": "RAW.Y",
            "source_object_id": "RAW.Y",
            "target_id": "STG.X",
            "target_object_id": "STG.X"
        });
        let dep: TableLevelDependency = serde_json::from_value(json).unwrap();
        assert_eq!(dep.key(), ("RAW.Y".to_string(), "STG.X".to_string()));
    }

    #[test]
    fn test_dependency_unknown_kind_defaults_to_data() {
        let json = json!({
            "source_id": "A.B",
            "target_id": "C.D",
            "dependency_type": "SOMETHING_NEW"
        });
        let dep: TableLevelDependency = serde_json::from_value(json).unwrap();
        assert_eq!(dep.dependency_type, DependencyKind::Data);
    }

    #[test]
    fn test_object_kind_serialization() {
        assert_eq!(
            serde_json::to_value(ObjectKind::LuaUdf).unwrap(),
            json!("LUA_UDF")
        );
        assert_eq!(
            serde_json::to_value(ObjectKind::VirtualSchema).unwrap(),
            json!("VIRTUAL_SCHEMA")
        );
        assert_eq!(ObjectKind::ExternalTable.as_str(), "EXTERNAL_TABLE");
    }

    #[test]
    fn test_write_reference_kinds() {
        assert!(reference_kinds::is_write("INSERT"));
        assert!(reference_kinds::is_write("TRUNCATE"));
        assert!(!reference_kinds::is_write("SELECT"));
        assert!(!reference_kinds::is_write("JOIN"));
    }
}
