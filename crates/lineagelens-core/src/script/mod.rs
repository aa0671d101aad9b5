//! Embedded-SQL extraction from scripting-language UDF bodies.
//!
//! Each host-language analyzer produces raw SQL strings; every string is then
//! dispatched to the SQL analyzer, and the combined references are validated
//! against the caller's known-object set.

pub mod lua;
pub mod python;

use std::collections::HashSet;

use crate::analyzer::{dedup_references, SqlAnalyzer, TableReference};
use crate::model::reference_kinds;
use crate::parser::Dialect;

/// Host language of a script body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    Lua,
    Python,
    Sql,
}

impl ScriptLanguage {
    /// Languages are stored as free-text in source metadata; anything
    /// unrecognized is treated as the UDF scripting default.
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PYTHON" | "PYTHON3" => Self::Python,
            "SQL" => Self::Sql,
            _ => Self::Lua,
        }
    }
}

/// SQL statements carry literal escape sequences when scripts embed them in
/// single-line strings; convert them (and doubly-escaped forms) to real
/// whitespace before parsing.
pub(crate) fn convert_escaped_whitespace(sql: &str) -> String {
    sql.replace("\\\\n", "\n")
        .replace("\\\\t", "\t")
        .replace("\\\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}

/// True when the text plausibly contains a SQL statement.
pub(crate) fn looks_like_sql(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let upper = text.to_uppercase();
    ["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "CREATE"]
        .iter()
        .any(|kw| upper.contains(kw))
}

/// Parse a script body and return the table references of its embedded SQL.
///
/// When `known_objects` is given, references are validated against it: exact
/// `SCHEMA.NAME` matches pass, bare names matching a known `.NAME` suffix are
/// rewritten to that schema, DDL references pass unconditionally (the created
/// object may not exist yet), everything else is discarded.
pub fn parse_script(
    script_text: &str,
    language: ScriptLanguage,
    known_objects: Option<&HashSet<String>>,
) -> Vec<TableReference> {
    let analyzer = SqlAnalyzer::new(Dialect::Exasol);

    let refs = match language {
        ScriptLanguage::Sql => analyzer.analyze(script_text),
        ScriptLanguage::Lua => analyze_sql_strings(&lua::extract_sql_strings(script_text), &analyzer),
        ScriptLanguage::Python => {
            analyze_sql_strings(&python::extract_sql_strings(script_text), &analyzer)
        }
    };

    match known_objects {
        Some(known) => validate_references(refs, known),
        None => refs,
    }
}

fn analyze_sql_strings(sql_strings: &[String], analyzer: &SqlAnalyzer) -> Vec<TableReference> {
    let mut refs = Vec::new();
    for sql in sql_strings {
        let sql = convert_escaped_whitespace(sql);
        refs.extend(analyzer.analyze(&sql));
    }
    dedup_references(refs)
}

fn validate_references(
    refs: Vec<TableReference>,
    known_objects: &HashSet<String>,
) -> Vec<TableReference> {
    let mut validated = Vec::new();

    for r in refs {
        if let Some(schema) = &r.schema {
            let full_id = format!("{schema}.{}", r.name);
            if known_objects.contains(&full_id) {
                validated.push(r);
                continue;
            }
            if r.reference_type == reference_kinds::DDL {
                validated.push(r);
                continue;
            }
        }

        // Match the bare name in any known schema, taking the first hit.
        let suffix = format!(".{}", r.name);
        if let Some(obj_id) = known_objects.iter().find(|id| id.ends_with(&suffix)) {
            let matched_schema = obj_id
                .rsplit_once('.')
                .map(|(schema, _)| schema.to_string());
            validated.push(TableReference {
                schema: matched_schema,
                name: r.name,
                reference_type: r.reference_type,
                alias: r.alias,
            });
            continue;
        }

        if r.reference_type == reference_kinds::DDL {
            validated.push(r);
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lua_udf_read_and_write() {
        let script = r#"
            function run(ctx)
                query("INSERT INTO STAGING.PROCESSED_ORDERS SELECT * FROM DWH.FACT_ORDERS")
            end
        "#;
        let refs = parse_script(script, ScriptLanguage::Lua, None);
        let write = refs.iter().find(|r| r.name == "PROCESSED_ORDERS").unwrap();
        assert_eq!(write.reference_type, "INSERT");
        let read = refs.iter().find(|r| r.name == "FACT_ORDERS").unwrap();
        assert_eq!(read.reference_type, "SELECT");
    }

    #[test]
    fn test_known_objects_exact_match() {
        let script = r#"query("SELECT * FROM DWH.FACT_SALES")"#;
        let refs = parse_script(
            script,
            ScriptLanguage::Lua,
            Some(&known(&["DWH.FACT_SALES"])),
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].full_id(), "DWH.FACT_SALES");
    }

    #[test]
    fn test_known_objects_schema_rewrite() {
        let script = r#"query("SELECT * FROM FACT_SALES")"#;
        let refs = parse_script(
            script,
            ScriptLanguage::Lua,
            Some(&known(&["DWH.FACT_SALES"])),
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].schema.as_deref(), Some("DWH"));
    }

    #[test]
    fn test_known_objects_discards_unknown() {
        let script = r#"query("SELECT * FROM SOMEWHERE.ELSE")"#;
        let refs = parse_script(
            script,
            ScriptLanguage::Lua,
            Some(&known(&["DWH.FACT_SALES"])),
        );
        assert!(refs.is_empty());
    }

    #[test]
    fn test_ddl_accepted_without_known_object() {
        let script = r#"query("CREATE TABLE STG.BRAND_NEW AS SELECT * FROM DWH.FACT_SALES")"#;
        let refs = parse_script(
            script,
            ScriptLanguage::Lua,
            Some(&known(&["DWH.FACT_SALES"])),
        );
        assert!(refs.iter().any(|r| r.full_id() == "STG.BRAND_NEW"));
        assert!(refs.iter().any(|r| r.full_id() == "DWH.FACT_SALES"));
    }

    #[test]
    fn test_escaped_whitespace_converted() {
        let script = r#"query("SELECT *\n FROM\t DWH.FACT_SALES")"#;
        let refs = parse_script(script, ScriptLanguage::Lua, None);
        assert!(refs.iter().any(|r| r.name == "FACT_SALES"));
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(ScriptLanguage::parse("PYTHON3"), ScriptLanguage::Python);
        assert_eq!(ScriptLanguage::parse("lua"), ScriptLanguage::Lua);
        assert_eq!(ScriptLanguage::parse("weird"), ScriptLanguage::Lua);
    }
}
