//! File-based metadata sources.
//!
//! Remote catalogs are exported to disk by operational tooling; these sources
//! turn those exports into [`SourceSnapshot`]s. `SnapshotFileSource` reads a
//! raw JSON object dump, `SqlDirectorySource` scans a checkout of SQL
//! definition files the way a code-host extractor would.

use std::path::PathBuf;
use std::sync::OnceLock;

use lineagelens_core::{
    DatabaseObject, Dialect, LineageError, MetadataSource, ObjectDetail, ObjectKind, Platform,
    SourceSnapshot, SqlUnit,
};
use regex::Regex;

/// Reads a JSON snapshot dump: `{ "objects": [...], "sql_units": [...] }`
/// in the flat object schema.
pub struct SnapshotFileSource {
    path: PathBuf,
    name: String,
    dialect: Dialect,
    tag_base: i64,
}

impl SnapshotFileSource {
    pub fn new(path: PathBuf, name: String, dialect: Dialect, tag_base: i64) -> Self {
        Self {
            path,
            name,
            dialect,
            tag_base,
        }
    }
}

impl MetadataSource for SnapshotFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tag_base(&self) -> i64 {
        self.tag_base
    }

    fn fetch(&mut self) -> Result<SourceSnapshot, LineageError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            LineageError::source_unavailable(&self.name, format!("{}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| LineageError::source_unavailable(&self.name, e.to_string()))
    }
}

/// Scans a directory tree of `.sql` files, detecting the CREATE target of
/// each file and minting platform-qualified `bigquery:` ids.
pub struct SqlDirectorySource {
    dir: PathBuf,
    name: String,
    tag_base: i64,
}

impl SqlDirectorySource {
    pub fn new(dir: PathBuf, name: String, tag_base: i64) -> Self {
        Self {
            dir,
            name,
            tag_base,
        }
    }
}

fn create_target_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)CREATE\s+(?:OR\s+REPLACE\s+)?(?:MATERIALIZED\s+)?(VIEW|TABLE|PROCEDURE|FUNCTION)\s+(?:`?([A-Za-z0-9_-]+)`?\.)?`?([A-Za-z0-9_-]+)`?\.`?([A-Za-z0-9_-]+)`?",
        )
        .expect("invalid regex")
    })
}

/// `(full_name, kind, dataset, name)` of the first CREATE statement.
fn extract_create_target(sql: &str) -> Option<(String, ObjectKind, String, String)> {
    let captures = create_target_pattern().captures(sql)?;

    let kind = match captures[1].to_uppercase().as_str() {
        "VIEW" => ObjectKind::BigqueryView,
        "TABLE" => ObjectKind::BigqueryTable,
        "PROCEDURE" => ObjectKind::BigqueryProcedure,
        _ => ObjectKind::BigqueryUdf,
    };

    let project = captures.get(2).map(|m| m.as_str().to_lowercase());
    let dataset = captures[3].to_lowercase();
    let name = captures[4].to_lowercase();

    let full_name = match project {
        Some(project) => format!("{project}.{dataset}.{name}"),
        None => format!("{dataset}.{name}"),
    };

    Some((full_name, kind, dataset, name))
}

impl MetadataSource for SqlDirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect(&self) -> Dialect {
        Dialect::Bigquery
    }

    fn tag_base(&self) -> i64 {
        self.tag_base
    }

    fn fetch(&mut self) -> Result<SourceSnapshot, LineageError> {
        if !self.dir.is_dir() {
            return Err(LineageError::source_unavailable(
                &self.name,
                format!("not a directory: {}", self.dir.display()),
            ));
        }

        let mut snapshot = SourceSnapshot::default();

        for entry in walkdir::WalkDir::new(&self.dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !path.extension().is_some_and(|ext| ext == "sql") {
                continue;
            }

            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            let Some((full_name, kind, dataset, name)) = extract_create_target(&content) else {
                continue;
            };

            let id = format!("bigquery:{full_name}");
            let mut obj = DatabaseObject::new(&id, &dataset, &name, kind);
            obj.platform = Some(Platform::Bigquery);
            obj.owner = dataset.clone();
            obj.description = Some(format!(
                "Defined in {}",
                path.strip_prefix(&self.dir).unwrap_or(path).display()
            ));
            if kind == ObjectKind::BigqueryView {
                obj.detail = ObjectDetail::View {
                    definition: Some(content.clone()),
                };
            }
            snapshot.objects.push(obj);

            snapshot.sql_units.push(SqlUnit {
                target_id: id,
                sql: content,
                reference_namespace: Some("bigquery".to_string()),
            });
        }

        Ok(snapshot)
    }
}
