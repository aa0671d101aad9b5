use crate::error::LineageError;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// SQL dialect for parsing and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Analytical warehouse dialect; standards-compatible, parsed with the
    /// Postgres grammar.
    #[default]
    Exasol,
    Bigquery,
    Generic,
}

impl Dialect {
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{BigQueryDialect, GenericDialect};
        match self {
            Self::Exasol => Box::new(PostgreSqlDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            Self::Generic => Box::new(GenericDialect {}),
        }
    }

    /// Cloud-warehouse references are only meaningful when dataset-qualified;
    /// unqualified names there are almost always aliases or variables.
    pub fn requires_schema(&self) -> bool {
        matches!(self, Self::Bigquery)
    }
}

/// Parse SQL using the specified dialect.
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, LineageError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            // Parity fallback: the generic grammar frequently fails on
            // Postgres-specific operators (`::`, `->>`) common in warehouse SQL.
            if matches!(dialect, Dialect::Generic) && looks_like_postgres_syntax(sql) {
                let postgres = PostgreSqlDialect {};
                if let Ok(statements) = Parser::parse_sql(&postgres, sql) {
                    return Ok(statements);
                }
            }
            Err(primary_err.into())
        }
    }
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::") || sql.contains("->")
}

/// Parse SQL using the default warehouse dialect.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, LineageError> {
    parse_sql_with_dialect(sql, Dialect::Exasol)
}
