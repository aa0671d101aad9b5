//! Column-level lineage extraction from SELECT-producing SQL.
//!
//! For each projection of the outermost SELECT the analyzer records which
//! source columns feed it and how the value is derived (direct copy,
//! aggregate, cast, case, function call, expression). Table aliases resolve
//! through the statement's FROM/JOIN clauses first, then through the optional
//! caller-provided schema context.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Query, Select, SelectItem, SetExpr,
    Statement, TableFactor,
};

use crate::analyzer::catalog;
use crate::model::{ColumnLevelDependency, TransformationKind};
use crate::parser::{parse_sql_with_dialect, Dialect};

/// Maximum length of recorded transformation SQL.
const TRANSFORMATION_MAX_LEN: usize = 200;

/// Column metadata and alias hints supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    /// object_id -> ordered column names
    pub object_columns: HashMap<String, Vec<String>>,
    /// alias -> object_id, for aliases the statement itself does not declare
    pub alias_map: HashMap<String, String>,
}

/// Extracts column-level dependencies from a view definition or the final
/// SELECT of a CTAS.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLineageExtractor {
    dialect: Dialect,
}

impl ColumnLineageExtractor {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn extract(
        &self,
        sql: &str,
        target_object_id: &str,
        schema_context: Option<&SchemaContext>,
    ) -> Vec<ColumnLevelDependency> {
        if sql.trim().is_empty() {
            return Vec::new();
        }

        let cleaned = strip_create_view_prefix(sql);

        match parse_sql_with_dialect(&cleaned, self.dialect) {
            Ok(statements) => {
                let Some(select) = statements.first().and_then(find_select) else {
                    return Vec::new();
                };
                self.extract_from_select(select, target_object_id, schema_context)
            }
            Err(_) => fallback_extract(&cleaned, target_object_id, schema_context),
        }
    }

    fn extract_from_select(
        &self,
        select: &Select,
        target_object_id: &str,
        schema_context: Option<&SchemaContext>,
    ) -> Vec<ColumnLevelDependency> {
        let alias_map = build_alias_map(select);
        let mut dependencies = Vec::new();

        for (target_column, expr) in projection_columns(select) {
            let transformation_type = classify_transformation(expr);
            let transformation = if transformation_type == TransformationKind::Direct {
                None
            } else {
                Some(truncate_transformation(&expr.to_string()))
            };

            let mut source_columns = Vec::new();
            collect_column_refs(expr, &mut source_columns);

            for (table_ref, column) in source_columns {
                // Unqualified columns cannot be attributed to a source object.
                let Some(table_ref) = table_ref else { continue };
                let source_object_id = resolve_table_ref(&table_ref, &alias_map, schema_context);

                dependencies.push(ColumnLevelDependency {
                    source_object_id,
                    source_column: column,
                    target_object_id: target_object_id.to_string(),
                    target_column: target_column.clone(),
                    transformation: transformation.clone(),
                    transformation_type,
                });
            }
        }

        dependencies
    }
}

/// Strip a `CREATE [OR REPLACE [FORCE]] VIEW <name> AS` prefix, keeping
/// whatever follows the first AS keyword.
fn strip_create_view_prefix(sql: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:FORCE\s+)?VIEW\s+(\S+)\s*(?:\([^)]*\)\s*)?AS\s+(.*)$")
            .expect("invalid regex")
    });

    match prefix.captures(sql) {
        Some(captures) => captures[2].trim().to_string(),
        None => sql.trim().to_string(),
    }
}

/// Locate the outermost SELECT; WITH statements recurse to the main query
/// and set operations take the left branch.
fn find_select(statement: &Statement) -> Option<&Select> {
    match statement {
        Statement::Query(query) => select_of_query(query),
        Statement::CreateView { query, .. } => select_of_query(query),
        Statement::CreateTable(create) => create.query.as_deref().and_then(select_of_query),
        _ => None,
    }
}

fn select_of_query(query: &Query) -> Option<&Select> {
    select_of_set_expr(&query.body)
}

fn select_of_set_expr(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(query) => select_of_query(query),
        SetExpr::SetOperation { left, .. } => select_of_set_expr(left),
        _ => None,
    }
}

/// `(target_column, expression)` for every named projection.
fn projection_columns(select: &Select) -> Vec<(String, &Expr)> {
    let mut columns = Vec::new();

    for item in &select.projection {
        match item {
            SelectItem::ExprWithAlias { expr, alias } => {
                columns.push((normalize_column_name(&alias.value), expr));
            }
            SelectItem::UnnamedExpr(expr) => {
                let name = match expr {
                    Expr::Identifier(ident) => ident.value.clone(),
                    Expr::CompoundIdentifier(parts) => parts
                        .last()
                        .map(|ident| ident.value.clone())
                        .unwrap_or_default(),
                    other => normalize_column_name(&other.to_string()),
                };
                columns.push((normalize_column_name(&name), expr));
            }
            // `*` projections carry no column identity to trace.
            _ => {}
        }
    }

    columns
}

fn normalize_column_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// alias -> full table name from the FROM and JOIN clauses; the bare table
/// name also maps to itself.
fn build_alias_map(select: &Select) -> HashMap<String, String> {
    let mut alias_map = HashMap::new();

    for table_with_joins in &select.from {
        record_table_alias(&table_with_joins.relation, &mut alias_map);
        for join in &table_with_joins.joins {
            record_table_alias(&join.relation, &mut alias_map);
        }
    }

    alias_map
}

fn record_table_alias(factor: &TableFactor, alias_map: &mut HashMap<String, String>) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let parts: Vec<String> = name
            .0
            .iter()
            .map(|part| match part.as_ident() {
                Some(ident) => ident.value.clone(),
                None => part.to_string(),
            })
            .collect();
        let full_name = parts.join(".").to_uppercase();

        if let Some(alias) = alias {
            alias_map.insert(alias.name.value.to_uppercase(), full_name.clone());
        }
        if let Some(short) = parts.last() {
            alias_map.insert(short.to_uppercase(), full_name);
        }
    }
}

fn resolve_table_ref(
    table_ref: &str,
    alias_map: &HashMap<String, String>,
    schema_context: Option<&SchemaContext>,
) -> String {
    let upper = table_ref.to_uppercase();

    if let Some(resolved) = alias_map.get(&upper) {
        return resolved.clone();
    }
    if let Some(ctx) = schema_context {
        if let Some(resolved) = ctx.alias_map.get(&upper) {
            return resolved.clone();
        }
    }
    upper
}

fn classify_transformation(expr: &Expr) -> TransformationKind {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => TransformationKind::Direct,
        Expr::Cast { .. } => TransformationKind::Cast,
        Expr::Case { .. } => TransformationKind::Case,
        Expr::Function(function) => {
            let name = function
                .name
                .0
                .last()
                .and_then(|part| part.as_ident())
                .map(|ident| ident.value.to_uppercase())
                .unwrap_or_default();
            if catalog::is_aggregate_function(&name) {
                TransformationKind::Aggregate
            } else {
                TransformationKind::Function
            }
        }
        Expr::BinaryOp { .. } => TransformationKind::Expression,
        Expr::Nested(inner) => classify_transformation(inner),
        _ => TransformationKind::Unknown,
    }
}

fn truncate_transformation(sql: &str) -> String {
    let normalized = normalize_column_name(sql);
    if normalized.chars().count() > TRANSFORMATION_MAX_LEN {
        let mut truncated: String = normalized.chars().take(TRANSFORMATION_MAX_LEN).collect();
        truncated.push('…');
        truncated
    } else {
        normalized
    }
}

/// Collect `(table_ref, column_name)` for every column reference in the
/// expression subtree.
fn collect_column_refs(expr: &Expr, out: &mut Vec<(Option<String>, String)>) {
    match expr {
        Expr::Identifier(ident) => out.push((None, ident.value.clone())),
        Expr::CompoundIdentifier(parts) => {
            if let Some((column, table_parts)) = parts.split_last() {
                let table = table_parts
                    .iter()
                    .map(|ident| ident.value.clone())
                    .collect::<Vec<_>>()
                    .join(".");
                out.push((Some(table), column.value.clone()));
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_column_refs(left, out);
            collect_column_refs(right, out);
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::Cast { expr: inner, .. } => collect_column_refs(inner, out),
        Expr::InList { expr, list, .. } => {
            collect_column_refs(expr, out);
            for item in list {
                collect_column_refs(item, out);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_column_refs(expr, out);
            collect_column_refs(low, out);
            collect_column_refs(high, out);
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                collect_column_refs(operand, out);
            }
            for when in conditions {
                collect_column_refs(&when.condition, out);
                collect_column_refs(&when.result, out);
            }
            if let Some(otherwise) = else_result {
                collect_column_refs(otherwise, out);
            }
        }
        Expr::Function(function) => {
            if let FunctionArguments::List(arguments) = &function.args {
                for arg in &arguments.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(expr),
                            ..
                        } => collect_column_refs(expr, out),
                        _ => {}
                    }
                }
            }
        }
        Expr::Tuple(items) => {
            for item in items {
                collect_column_refs(item, out);
            }
        }
        _ => {}
    }
}

// === Regex fallback ===

/// Recover projections and classify by substring markers when the statement
/// does not parse. Source-column matching is scoped to each projection chunk
/// so unrelated columns are not cross-linked.
fn fallback_extract(
    sql: &str,
    target_object_id: &str,
    schema_context: Option<&SchemaContext>,
) -> Vec<ColumnLevelDependency> {
    static SELECT_LIST: OnceLock<Regex> = OnceLock::new();
    static TABLE_CLAUSE: OnceLock<Regex> = OnceLock::new();
    static COLUMN_REF: OnceLock<Regex> = OnceLock::new();
    static ALIAS_TAIL: OnceLock<Regex> = OnceLock::new();
    static BARE_COLUMN: OnceLock<Regex> = OnceLock::new();

    let select_list = SELECT_LIST
        .get_or_init(|| Regex::new(r"(?is)\bSELECT\b(.*?)\bFROM\b").expect("invalid regex"));
    let table_clause = TABLE_CLAUSE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([A-Z_][A-Z0-9_]*(?:\.[A-Z_][A-Z0-9_]*)?)\s*(?:AS\s+)?([A-Z_][A-Z0-9_]*)?")
            .expect("invalid regex")
    });
    let column_ref = COLUMN_REF
        .get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)").expect("invalid regex"));
    let alias_tail = ALIAS_TAIL.get_or_init(|| {
        Regex::new(r"(?is)^(.*?)\s+(?:AS\s+)?([A-Z_][A-Z0-9_]*)\s*$").expect("invalid regex")
    });
    let bare_column = BARE_COLUMN.get_or_init(|| {
        Regex::new(r"(?i)^[A-Z_][A-Z0-9_]*(?:\.[A-Z_][A-Z0-9_]*)?$").expect("invalid regex")
    });

    let Some(list) = select_list.captures(sql).map(|c| c[1].to_string()) else {
        return Vec::new();
    };

    // Alias map over the whole statement.
    let mut alias_map: HashMap<String, String> = HashMap::new();
    const NON_ALIASES: &[&str] = &[
        "ON", "WHERE", "AND", "OR", "LEFT", "RIGHT", "INNER", "OUTER", "FULL", "CROSS", "JOIN",
        "GROUP", "ORDER", "USING",
    ];
    for captures in table_clause.captures_iter(sql) {
        let table_name = captures[1].to_uppercase();
        if let Some(alias) = captures.get(2) {
            let alias = alias.as_str().to_uppercase();
            if !NON_ALIASES.contains(&alias.as_str()) {
                alias_map.insert(alias, table_name.clone());
            }
        }
        if let Some(short) = table_name.rsplit('.').next() {
            alias_map.insert(short.to_string(), table_name.clone());
        }
    }

    let mut dependencies = Vec::new();

    for chunk in split_top_level_commas(&list) {
        let chunk = chunk.trim();
        if chunk.is_empty() || chunk == "*" {
            continue;
        }

        let upper = chunk.to_uppercase();
        let is_bare_column = bare_column.is_match(chunk);

        let (expr_text, target_column) = if is_bare_column {
            let name = chunk.rsplit('.').next().unwrap_or(chunk).to_string();
            (chunk.to_string(), name)
        } else if let Some(captures) = alias_tail.captures(chunk) {
            (captures[1].to_string(), captures[2].to_string())
        } else {
            (chunk.to_string(), normalize_column_name(chunk))
        };

        let transformation_type = if is_bare_column {
            TransformationKind::Direct
        } else if ["SUM(", "COUNT(", "AVG(", "MIN(", "MAX(", "LISTAGG("]
            .iter()
            .any(|m| upper.contains(m))
        {
            TransformationKind::Aggregate
        } else if upper.contains("CASE") {
            TransformationKind::Case
        } else if upper.contains("CAST(") || upper.contains("::") {
            TransformationKind::Cast
        } else if ["COALESCE(", "NVL(", "CONCAT("].iter().any(|m| upper.contains(m)) {
            TransformationKind::Function
        } else {
            TransformationKind::Unknown
        };

        let transformation = if transformation_type == TransformationKind::Direct {
            None
        } else {
            Some(truncate_transformation(&expr_text))
        };

        for captures in column_ref.captures_iter(&expr_text) {
            let table_ref = captures[1].to_uppercase();
            let column = captures[2].to_string();
            if NON_ALIASES.contains(&table_ref.as_str()) || catalog::is_sql_keyword(&table_ref) {
                continue;
            }
            let source_object_id = resolve_table_ref(&table_ref, &alias_map, schema_context);

            dependencies.push(ColumnLevelDependency {
                source_object_id,
                source_column: column,
                target_object_id: target_object_id.to_string(),
                target_column: target_column.clone(),
                transformation: transformation.clone(),
                transformation_type,
            });
        }
    }

    dependencies
}

fn split_top_level_commas(list: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in list.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                chunks.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(sql: &str, target: &str) -> Vec<ColumnLevelDependency> {
        ColumnLineageExtractor::new(Dialect::Exasol).extract(sql, target, None)
    }

    fn by_target<'a>(
        deps: &'a [ColumnLevelDependency],
        target_column: &str,
    ) -> Vec<&'a ColumnLevelDependency> {
        deps.iter()
            .filter(|d| d.target_column == target_column)
            .collect()
    }

    const SUMMARY_SQL: &str = "SELECT
        o.ORDER_ID,
        SUM(o.AMOUNT) AS TOTAL_AMOUNT,
        CAST(o.ORDER_DATE AS DATE) AS ORDER_DATE,
        CASE WHEN o.STATUS = 'COMPLETED' THEN 'Done' ELSE 'Pending' END AS STATUS_LABEL
    FROM SALES.ORDERS o";

    #[test]
    fn test_transformation_classification() {
        let deps = extract(SUMMARY_SQL, "DWH.SALES_SUMMARY");

        let direct = by_target(&deps, "ORDER_ID");
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].transformation_type, TransformationKind::Direct);
        assert_eq!(direct[0].transformation, None);
        assert_eq!(direct[0].source_object_id, "SALES.ORDERS");
        assert_eq!(direct[0].source_column, "ORDER_ID");

        let aggregate = by_target(&deps, "TOTAL_AMOUNT");
        assert_eq!(aggregate[0].transformation_type, TransformationKind::Aggregate);
        assert_eq!(aggregate[0].transformation.as_deref(), Some("SUM(o.AMOUNT)"));

        let cast = by_target(&deps, "ORDER_DATE");
        assert_eq!(cast[0].transformation_type, TransformationKind::Cast);

        let case = by_target(&deps, "STATUS_LABEL");
        assert_eq!(case[0].transformation_type, TransformationKind::Case);
    }

    #[test]
    fn test_alias_resolution_through_join() {
        let sql = "SELECT o.ORDER_ID, c.CUSTOMER_NAME
            FROM SALES.ORDERS o
            JOIN CUSTOMERS.CUSTOMER c ON o.CUSTOMER_ID = c.ID";
        let deps = extract(sql, "DWH.V");

        let name = by_target(&deps, "CUSTOMER_NAME");
        assert_eq!(name[0].source_object_id, "CUSTOMERS.CUSTOMER");
    }

    #[test]
    fn test_bare_table_name_maps_to_itself() {
        let sql = "SELECT ORDERS.ID FROM SALES.ORDERS";
        let deps = extract(sql, "DWH.V");
        assert_eq!(deps[0].source_object_id, "SALES.ORDERS");
    }

    #[test]
    fn test_unqualified_columns_skipped() {
        let sql = "SELECT ORDER_ID FROM SALES.ORDERS";
        let deps = extract(sql, "DWH.V");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_create_view_prefix_stripped() {
        let sql = "CREATE OR REPLACE FORCE VIEW DWH.V AS SELECT o.ID FROM SALES.ORDERS o";
        let deps = extract(sql, "DWH.V");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source_column, "ID");
    }

    #[test]
    fn test_schema_context_alias_resolution() {
        let mut ctx = SchemaContext::default();
        ctx.alias_map
            .insert("SRC".to_string(), "RAW.EVENTS".to_string());

        let sql = "SELECT src.EVENT_ID";
        let deps =
            ColumnLineageExtractor::new(Dialect::Exasol).extract(sql, "DWH.V", Some(&ctx));
        // The statement declares no alias of its own, so the context wins.
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source_object_id, "RAW.EVENTS");
    }

    #[test]
    fn test_expression_classification() {
        let sql = "SELECT o.PRICE * o.QUANTITY AS LINE_TOTAL FROM SALES.ORDERS o";
        let deps = extract(sql, "DWH.V");
        assert_eq!(deps.len(), 2);
        assert!(deps
            .iter()
            .all(|d| d.transformation_type == TransformationKind::Expression));
        assert!(deps.iter().any(|d| d.source_column == "PRICE"));
        assert!(deps.iter().any(|d| d.source_column == "QUANTITY"));
    }

    #[test]
    fn test_function_classification() {
        let sql = "SELECT COALESCE(o.NAME, 'n/a') AS DISPLAY_NAME FROM SALES.ORDERS o";
        let deps = extract(sql, "DWH.V");
        assert_eq!(deps[0].transformation_type, TransformationKind::Function);
    }

    #[test]
    fn test_transformation_truncated_to_limit() {
        let long_concat = (0..40)
            .map(|i| format!("o.COL_{i}"))
            .collect::<Vec<_>>()
            .join(" || ");
        let sql = format!("SELECT {long_concat} AS WIDE FROM SALES.ORDERS o");
        let deps = extract(&sql, "DWH.V");

        let transformation = deps[0].transformation.as_deref().unwrap();
        assert!(transformation.chars().count() <= TRANSFORMATION_MAX_LEN + 1);
        assert!(transformation.ends_with('…'));
    }

    #[test]
    fn test_with_clause_uses_main_query() {
        let sql = "WITH base AS (SELECT ID FROM RAW.EVENTS)
            SELECT b.ID FROM base b";
        let deps = extract(sql, "DWH.V");
        // The main query projects from the CTE; its alias resolves to the
        // CTE name, which has no schema of its own.
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source_object_id, "BASE");
    }

    #[test]
    fn test_fallback_on_unparseable_sql() {
        let sql = "SELECT o.ORDER_ID, SUM(o.AMOUNT) AS TOTAL FROM SALES.ORDERS o CONNECT BY PRIOR x";
        let deps = extract(sql, "DWH.V");
        assert!(!deps.is_empty());
        let total = by_target(&deps, "TOTAL");
        assert_eq!(total[0].transformation_type, TransformationKind::Aggregate);
        assert_eq!(total[0].source_object_id, "SALES.ORDERS");
    }

    #[test]
    fn test_fallback_direct_has_no_transformation() {
        let sql = "SELECT o.ORDER_ID FROM SALES.ORDERS o CONNECT BY PRIOR x";
        let deps = extract(sql, "DWH.V");
        assert_eq!(deps[0].transformation_type, TransformationKind::Direct);
        assert_eq!(deps[0].transformation, None);
    }

    #[test]
    fn test_split_top_level_commas() {
        let chunks = split_top_level_commas("a, f(x, y), CASE WHEN c THEN 1 ELSE 2 END");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].trim(), "f(x, y)");
    }
}
