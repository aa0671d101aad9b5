//! Keyword-anchored regex extraction for SQL the parser rejects.
//!
//! More specific patterns run first so `MERGE INTO X` classifies X as MERGE
//! before the bare `INTO` pattern sees it; order-preserving de-duplication
//! keeps the first classification.

use std::sync::OnceLock;

use regex::Regex;

use super::{dedup_references, passes_filters, TableReference};
use crate::model::reference_kinds;
use crate::parser::Dialect;

const NAME: &str = r"([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*){0,2})";

fn patterns() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table = |keyword: &str| format!(r"(?i)\b{keyword}\s+{NAME}");
        vec![
            (
                Regex::new(&table(r"MERGE\s+INTO")).expect("invalid regex"),
                reference_kinds::MERGE,
            ),
            (
                Regex::new(&table(r"DELETE\s+FROM")).expect("invalid regex"),
                reference_kinds::DELETE,
            ),
            (
                Regex::new(&table(r"TRUNCATE\s+TABLE")).expect("invalid regex"),
                reference_kinds::TRUNCATE,
            ),
            (
                Regex::new(&table(r"DROP\s+TABLE(?:\s+IF\s+EXISTS)?")).expect("invalid regex"),
                reference_kinds::DDL,
            ),
            (
                Regex::new(&table(r"CREATE\s+(?:OR\s+REPLACE\s+)?TABLE(?:\s+IF\s+NOT\s+EXISTS)?"))
                    .expect("invalid regex"),
                reference_kinds::DDL,
            ),
            (
                Regex::new(&table(r"INTO")).expect("invalid regex"),
                reference_kinds::INSERT,
            ),
            (
                Regex::new(&table(r"UPDATE")).expect("invalid regex"),
                reference_kinds::UPDATE,
            ),
            (
                Regex::new(&table(r"JOIN")).expect("invalid regex"),
                reference_kinds::JOIN,
            ),
            (
                Regex::new(&table(r"FROM")).expect("invalid regex"),
                reference_kinds::SELECT,
            ),
        ]
    })
}

/// Extract references with the keyword patterns, applying the same lexical
/// filters as the AST path.
pub fn extract_references(sql: &str, dialect: Dialect) -> Vec<TableReference> {
    let mut refs = Vec::new();

    for (pattern, reference_type) in patterns() {
        for captures in pattern.captures_iter(sql) {
            let Some(full) = captures.get(1) else { continue };
            let parts: Vec<&str> = full.as_str().split('.').collect();
            let name = parts.last().map(|s| s.to_uppercase()).unwrap_or_default();
            let schema = if parts.len() > 1 {
                Some(parts[..parts.len() - 1].join(".").to_uppercase())
            } else {
                None
            };

            if !passes_filters(&schema, &name, dialect) {
                continue;
            }

            refs.push(TableReference::new(schema, name, reference_type));
        }
    }

    dedup_references(refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(sql: &str) -> Vec<TableReference> {
        extract_references(sql, Dialect::Exasol)
    }

    fn kind_of<'a>(refs: &'a [TableReference], name: &str) -> Option<&'a str> {
        refs.iter()
            .find(|r| r.name == name)
            .map(|r| r.reference_type.as_str())
    }

    #[test]
    fn test_from_and_join() {
        let refs = extract("SELECT * FROM DWH.FACT_SALES fs JOIN DWH.DIM_CUSTOMER dc ON 1=1");
        assert_eq!(kind_of(&refs, "FACT_SALES"), Some("SELECT"));
        assert_eq!(kind_of(&refs, "DIM_CUSTOMER"), Some("JOIN"));
    }

    #[test]
    fn test_merge_into_beats_bare_into() {
        let refs = extract("MERGE INTO DWH.DIM_CUSTOMER USING STG.S ON 1=1");
        assert_eq!(kind_of(&refs, "DIM_CUSTOMER"), Some("MERGE"));
    }

    #[test]
    fn test_delete_from_beats_bare_from() {
        let refs = extract("DELETE FROM STG.STG_ORDERS WHERE 1=1");
        assert_eq!(kind_of(&refs, "STG_ORDERS"), Some("DELETE"));
    }

    #[test]
    fn test_truncate_drop_create() {
        let refs = extract("TRUNCATE TABLE STG.A; DROP TABLE STG.B; CREATE TABLE STG.C (x INT)");
        assert_eq!(kind_of(&refs, "A"), Some("TRUNCATE"));
        assert_eq!(kind_of(&refs, "B"), Some("DDL"));
        assert_eq!(kind_of(&refs, "C"), Some("DDL"));
    }

    #[test]
    fn test_keywords_and_functions_filtered() {
        // SELECT is a keyword, not a table, even if the regex catches it.
        let refs = extract("INSERT INTO SELECT");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_variable_prefix_filtered() {
        let refs = extract("SELECT * FROM V_RESULT JOIN P_CONFIG");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_require_schema_for_cloud_dialect() {
        let refs = extract_references("SELECT * FROM orders", Dialect::Bigquery);
        assert!(refs.is_empty());

        let refs = extract_references("SELECT * FROM proj.dataset.orders", Dialect::Bigquery);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].schema.as_deref(), Some("PROJ.DATASET"));
    }
}
