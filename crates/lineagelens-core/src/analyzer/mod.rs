//! AST-based table-reference extraction with reference-kind classification.
//!
//! The analyzer walks the parsed statement carrying a classification context
//! (the nearest enclosing DML/DDL construct), excludes CTE names, and applies
//! the lexical filters from [`catalog`]. When the statement does not parse at
//! all, [`fallback`] recovers references with keyword-anchored regexes; the
//! degraded path applies the same filters.

pub mod catalog;
pub mod fallback;

use std::collections::HashSet;

use sqlparser::ast::{
    Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName, Query,
    SelectItem, SetExpr, Statement, TableFactor, TableObject, TableWithJoins,
    UpdateTableFromKind,
};

use crate::error::LineageError;
use crate::model::reference_kinds;
use crate::parser::{parse_sql_with_dialect, Dialect};

/// A reference to a persistent object found in a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TableReference {
    pub schema: Option<String>,
    pub name: String,
    pub reference_type: String,
    pub alias: Option<String>,
}

impl TableReference {
    pub fn new(schema: Option<String>, name: impl Into<String>, reference_type: &str) -> Self {
        Self {
            schema,
            name: name.into(),
            reference_type: reference_type.to_string(),
            alias: None,
        }
    }

    /// Fully qualified `SCHEMA.NAME`, or the bare name when unqualified.
    pub fn full_id(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Classification context: the nearest enclosing DML/DDL construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefContext {
    Select,
    Join,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,
    Truncate,
}

impl RefContext {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Select => reference_kinds::SELECT,
            Self::Join => reference_kinds::JOIN,
            Self::Insert => reference_kinds::INSERT,
            Self::Update => reference_kinds::UPDATE,
            Self::Delete => reference_kinds::DELETE,
            Self::Merge => reference_kinds::MERGE,
            Self::Ddl => reference_kinds::DDL,
            Self::Truncate => reference_kinds::TRUNCATE,
        }
    }
}

/// Extracts ordered, de-duplicated table references from SQL.
#[derive(Debug, Clone, Copy)]
pub struct SqlAnalyzer {
    dialect: Dialect,
}

impl SqlAnalyzer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Extract table references. Parse failures degrade to the regex
    /// fallback; the result is empty when nothing can be recovered.
    pub fn analyze(&self, sql: &str) -> Vec<TableReference> {
        match parse_sql_with_dialect(sql, self.dialect) {
            Ok(statements) => self.walk_statements(&statements),
            Err(_) => fallback::extract_references(sql, self.dialect),
        }
    }

    /// Like [`Self::analyze`], but surfaces a [`LineageError::Parse`] when
    /// the statement neither parses nor yields fallback references.
    pub fn analyze_strict(&self, sql: &str) -> Result<Vec<TableReference>, LineageError> {
        match parse_sql_with_dialect(sql, self.dialect) {
            Ok(statements) => Ok(self.walk_statements(&statements)),
            Err(err) => {
                let refs = fallback::extract_references(sql, self.dialect);
                if refs.is_empty() {
                    Err(err)
                } else {
                    Ok(refs)
                }
            }
        }
    }

    fn walk_statements(&self, statements: &[Statement]) -> Vec<TableReference> {
        let mut walker = Walker {
            dialect: self.dialect,
            cte_names: HashSet::new(),
            refs: Vec::new(),
        };

        for statement in statements {
            collect_cte_names(statement, &mut walker.cte_names);
        }
        for statement in statements {
            walker.visit_statement(statement);
        }

        dedup_references(walker.refs)
    }
}

/// Order-preserving de-duplication by `(schema, name)`; the first
/// classification wins.
pub(crate) fn dedup_references(refs: Vec<TableReference>) -> Vec<TableReference> {
    let mut seen: HashSet<(Option<String>, String)> = HashSet::new();
    let mut unique = Vec::new();
    for r in refs {
        if seen.insert((r.schema.clone(), r.name.clone())) {
            unique.push(r);
        }
    }
    unique
}

/// Lexical filter shared by the AST walk and the regex fallback.
pub(crate) fn passes_filters(schema: &Option<String>, name: &str, dialect: Dialect) -> bool {
    if name.is_empty() || catalog::is_sql_function(name) || catalog::is_sql_keyword(name) {
        return false;
    }
    if catalog::has_variable_prefix(name) {
        return false;
    }
    if dialect.requires_schema() && schema.is_none() {
        return false;
    }
    true
}

struct Walker {
    dialect: Dialect,
    cte_names: HashSet<String>,
    refs: Vec<TableReference>,
}

impl Walker {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.visit_query(query, RefContext::Select),
            Statement::Insert(insert) => {
                if let TableObject::TableName(name) = &insert.table {
                    self.record(name, RefContext::Insert, None);
                }
                if let Some(source) = &insert.source {
                    self.visit_query(source, RefContext::Select);
                }
            }
            Statement::Update { table, from, .. } => {
                self.visit_table_with_joins(table, RefContext::Update);
                if let Some(from_kind) = from {
                    match from_kind {
                        UpdateTableFromKind::BeforeSet(tables)
                        | UpdateTableFromKind::AfterSet(tables) => {
                            for t in tables {
                                self.visit_table_with_joins(t, RefContext::Select);
                            }
                        }
                    }
                }
            }
            Statement::Delete(delete) => {
                for name in &delete.tables {
                    self.record(name, RefContext::Delete, None);
                }
                let from_tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        tables
                    }
                };
                for t in from_tables {
                    self.visit_table_with_joins(t, RefContext::Delete);
                }
                if let Some(using) = &delete.using {
                    for t in using {
                        self.visit_table_with_joins(t, RefContext::Select);
                    }
                }
            }
            Statement::Merge { table, source, .. } => {
                self.visit_table_factor(table, RefContext::Merge);
                self.visit_table_factor(source, RefContext::Merge);
            }
            Statement::CreateTable(create) => {
                self.record(&create.name, RefContext::Ddl, None);
                // CREATE TABLE x AS SELECT: inner tables are reads.
                if let Some(query) = &create.query {
                    self.visit_query(query, RefContext::Select);
                }
            }
            Statement::CreateView { name, query, .. } => {
                self.record(name, RefContext::Ddl, None);
                self.visit_query(query, RefContext::Select);
            }
            Statement::Drop { names, .. } => {
                for name in names {
                    self.record(name, RefContext::Ddl, None);
                }
            }
            Statement::Truncate { table_names, .. } => {
                for target in table_names {
                    self.record(&target.name, RefContext::Truncate, None);
                }
            }
            _ => {}
        }
    }

    fn visit_query(&mut self, query: &Query, context: RefContext) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.visit_query(&cte.query, RefContext::Select);
            }
        }
        self.visit_set_expr(&query.body, context);
    }

    fn visit_set_expr(&mut self, body: &SetExpr, context: RefContext) {
        match body {
            SetExpr::Select(select) => {
                for table_with_joins in &select.from {
                    self.visit_table_with_joins(table_with_joins, context);
                }
                for item in &select.projection {
                    match item {
                        SelectItem::UnnamedExpr(expr)
                        | SelectItem::ExprWithAlias { expr, .. } => self.visit_expr(expr),
                        _ => {}
                    }
                }
                if let Some(selection) = &select.selection {
                    self.visit_expr(selection);
                }
                if let Some(having) = &select.having {
                    self.visit_expr(having);
                }
            }
            SetExpr::Query(query) => self.visit_query(query, context),
            SetExpr::SetOperation { left, right, .. } => {
                self.visit_set_expr(left, context);
                self.visit_set_expr(right, context);
            }
            SetExpr::Values(_) => {}
            SetExpr::Insert(statement)
            | SetExpr::Update(statement)
            | SetExpr::Delete(statement)
            | SetExpr::Merge(statement) => self.visit_statement(statement),
            SetExpr::Table(table) => {
                if let Some(name) = &table.table_name {
                    self.record_parts(
                        split_dotted(name),
                        context,
                        None,
                    );
                }
            }
        }
    }

    fn visit_table_with_joins(&mut self, table: &TableWithJoins, context: RefContext) {
        self.visit_table_factor(&table.relation, context);
        for join in &table.joins {
            self.visit_table_factor(&join.relation, RefContext::Join);
        }
    }

    fn visit_table_factor(&mut self, table_factor: &TableFactor, context: RefContext) {
        match table_factor {
            TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                self.record(name, context, alias);
            }
            TableFactor::Derived { subquery, .. } => {
                self.visit_query(subquery, RefContext::Select);
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.visit_table_with_joins(table_with_joins, context),
            _ => {}
        }
    }

    /// Subqueries in projections and predicates also reference tables.
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Subquery(query)
            | Expr::Exists {
                subquery: query, ..
            } => self.visit_query(query, RefContext::Select),
            Expr::InSubquery {
                expr: inner,
                subquery,
                ..
            } => {
                self.visit_expr(inner);
                self.visit_query(subquery, RefContext::Select);
            }
            Expr::BinaryOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { expr: inner, .. }
            | Expr::Nested(inner)
            | Expr::IsNull(inner)
            | Expr::IsNotNull(inner)
            | Expr::Cast { expr: inner, .. } => self.visit_expr(inner),
            Expr::InList { expr, list, .. } => {
                self.visit_expr(expr);
                for item in list {
                    self.visit_expr(item);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.visit_expr(expr);
                self.visit_expr(low);
                self.visit_expr(high);
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.visit_expr(operand);
                }
                for when in conditions {
                    self.visit_expr(&when.condition);
                    self.visit_expr(&when.result);
                }
                if let Some(otherwise) = else_result {
                    self.visit_expr(otherwise);
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
                            } => self.visit_expr(expr),
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, name: &ObjectName, context: RefContext, alias: Option<String>) {
        self.record_parts(object_name_parts(name), context, alias);
    }

    fn record_parts(&mut self, parts: Vec<String>, context: RefContext, alias: Option<String>) {
        if parts.is_empty() {
            return;
        }
        let name = parts.last().map(|s| s.to_uppercase()).unwrap_or_default();
        let schema = if parts.len() > 1 {
            Some(parts[..parts.len() - 1].join(".").to_uppercase())
        } else {
            None
        };

        if self.cte_names.contains(&name) {
            return;
        }
        if !passes_filters(&schema, &name, self.dialect) {
            return;
        }

        self.refs.push(TableReference {
            schema,
            name,
            reference_type: context.as_str().to_string(),
            alias,
        });
    }
}

/// Flatten an [`ObjectName`] into identifier parts. Quoted cloud-warehouse
/// names carry the full `project.dataset.table` path in one identifier.
fn object_name_parts(name: &ObjectName) -> Vec<String> {
    let mut parts = Vec::new();
    for part in &name.0 {
        let value = match part.as_ident() {
            Some(ident) => ident.value.clone(),
            None => part.to_string(),
        };
        if value.contains('.') {
            parts.extend(value.split('.').map(|s| s.to_string()));
        } else {
            parts.push(value);
        }
    }
    parts
}

fn split_dotted(name: &str) -> Vec<String> {
    name.split('.').map(|s| s.to_string()).collect()
}

/// Collect CTE names declared anywhere in the statement. They shadow real
/// objects for the whole statement, so this runs as a pre-pass.
fn collect_cte_names(statement: &Statement, names: &mut HashSet<String>) {
    match statement {
        Statement::Query(query) => collect_cte_names_in_query(query, names),
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                collect_cte_names_in_query(source, names);
            }
        }
        Statement::CreateTable(create) => {
            if let Some(query) = &create.query {
                collect_cte_names_in_query(query, names);
            }
        }
        Statement::CreateView { query, .. } => collect_cte_names_in_query(query, names),
        _ => {}
    }
}

fn collect_cte_names_in_query(query: &Query, names: &mut HashSet<String>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            names.insert(cte.alias.name.value.to_uppercase());
            collect_cte_names_in_query(&cte.query, names);
        }
    }
    collect_cte_names_in_set_expr(&query.body, names);
}

fn collect_cte_names_in_set_expr(body: &SetExpr, names: &mut HashSet<String>) {
    match body {
        SetExpr::Select(select) => {
            for table_with_joins in &select.from {
                collect_cte_names_in_table_factor(&table_with_joins.relation, names);
                for join in &table_with_joins.joins {
                    collect_cte_names_in_table_factor(&join.relation, names);
                }
            }
        }
        SetExpr::Query(query) => collect_cte_names_in_query(query, names),
        SetExpr::SetOperation { left, right, .. } => {
            collect_cte_names_in_set_expr(left, names);
            collect_cte_names_in_set_expr(right, names);
        }
        _ => {}
    }
}

fn collect_cte_names_in_table_factor(table_factor: &TableFactor, names: &mut HashSet<String>) {
    match table_factor {
        TableFactor::Derived { subquery, .. } => collect_cte_names_in_query(subquery, names),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_cte_names_in_table_factor(&table_with_joins.relation, names);
            for join in &table_with_joins.joins {
                collect_cte_names_in_table_factor(&join.relation, names);
            }
        }
        _ => {}
    }
}
