//! Human-readable output formatting.

use lineagelens_core::{MergeStats, TableReference};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ReferenceRow {
    #[tabled(rename = "SCHEMA")]
    schema: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "REFERENCE")]
    reference_type: String,
}

/// Render table references grouped under their source name.
pub fn format_references(source_name: &str, refs: &[TableReference]) -> String {
    if refs.is_empty() {
        return format!("{source_name}: no table references found\n");
    }

    let rows: Vec<ReferenceRow> = refs
        .iter()
        .map(|r| ReferenceRow {
            schema: r.schema.clone().unwrap_or_default(),
            name: r.name.clone(),
            reference_type: r.reference_type.clone(),
        })
        .collect();

    format!("{source_name}:\n{}\n", Table::new(rows))
}

/// One-line merge summary; warnings go to stderr separately.
pub fn format_merge_stats(stats: &MergeStats) -> String {
    format!(
        "objects +{}, dependencies +{}, column dependencies +{}",
        stats.objects_added, stats.dependencies_added, stats.column_dependencies_added
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_references_table() {
        let refs = vec![TableReference::new(
            Some("DWH".to_string()),
            "FACT_SALES",
            "SELECT",
        )];
        let out = format_references("view.sql", &refs);
        assert!(out.contains("view.sql"));
        assert!(out.contains("FACT_SALES"));
        assert!(out.contains("SELECT"));
    }

    #[test]
    fn test_format_references_empty() {
        let out = format_references("empty.sql", &[]);
        assert!(out.contains("no table references"));
    }

    #[test]
    fn test_format_merge_stats() {
        let stats = MergeStats {
            objects_added: 3,
            dependencies_added: 5,
            column_dependencies_added: 0,
            warnings: vec![],
        };
        assert_eq!(
            format_merge_stats(&stats),
            "objects +3, dependencies +5, column dependencies +0"
        );
    }
}
