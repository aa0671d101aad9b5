//! Lexical catalogs used to filter false table references out of analyzer
//! output, and to classify column transformations.
//!
//! The function and keyword sets are closed by design: a name is only
//! discarded when it is an exact member, so legitimate tables that merely
//! resemble a builtin survive.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Builtin SQL functions across the supported dialects: aggregates, math,
/// string, date/time, conversion, window, JSON, array, plus the
/// platform-specific additions.
const SQL_FUNCTIONS: &[&str] = &[
    // Aggregates
    "SUM", "COUNT", "AVG", "MIN", "MAX", "STDDEV", "STDDEV_POP", "STDDEV_SAMP",
    "VARIANCE", "VAR_POP", "VAR_SAMP", "MEDIAN", "FIRST", "LAST", "FIRST_VALUE",
    "LAST_VALUE", "GROUP_CONCAT", "LISTAGG", "ARRAY_AGG", "STRING_AGG",
    "PERCENTILE", "PERCENTILE_CONT", "PERCENTILE_DISC", "ANY_VALUE",
    "APPROX_COUNT_DISTINCT", "COUNTIF", "COUNT_IF",
    // Math
    "ABS", "CEIL", "CEILING", "FLOOR", "ROUND", "TRUNC", "MOD", "POWER", "POW",
    "SQRT", "EXP", "LN", "LOG", "LOG10", "LOG2", "SIGN", "RAND", "RANDOM",
    "GREATEST", "LEAST",
    // String
    "CONCAT", "SUBSTRING", "SUBSTR", "LEFT", "RIGHT", "TRIM", "LTRIM", "RTRIM",
    "UPPER", "LOWER", "INITCAP", "REPLACE", "TRANSLATE", "LENGTH", "LEN",
    "CHAR_LENGTH", "CHARACTER_LENGTH", "CHARINDEX", "INSTR", "POSITION",
    "LPAD", "RPAD", "REVERSE", "SPLIT", "SPLIT_PART", "REGEXP_REPLACE",
    "REGEXP_EXTRACT", "REGEXP_CONTAINS", "REGEXP_SUBSTR", "REGEXP_INSTR",
    "FORMAT", "REPEAT", "ASCII", "CHR", "UNICODE", "SOUNDEX", "EDIT_DISTANCE",
    // Date/time
    "NOW", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "SYSDATE",
    "SYSTIMESTAMP", "LOCALTIMESTAMP", "DATE_TRUNC", "DATE_ADD", "DATE_SUB",
    "DATEADD", "DATEDIFF", "DATE_DIFF", "EXTRACT", "YEAR", "MONTH", "DAY",
    "HOUR", "MINUTE", "SECOND", "DAYOFWEEK", "DAYOFYEAR", "WEEK", "QUARTER",
    "LAST_DAY", "NEXT_DAY", "ADD_DAYS", "ADD_MONTHS", "ADD_YEARS", "ADD_HOURS",
    "ADD_MINUTES", "ADD_SECONDS", "DAYS_BETWEEN", "MONTHS_BETWEEN",
    "YEARS_BETWEEN", "HOURS_BETWEEN", "MINUTES_BETWEEN", "SECONDS_BETWEEN",
    "TIMESTAMP_ADD", "TIMESTAMP_SUB", "TIMESTAMP_DIFF", "TIMESTAMP_TRUNC",
    "PARSE_DATE", "PARSE_TIMESTAMP", "FORMAT_DATE", "FORMAT_TIMESTAMP",
    "UNIX_DATE", "UNIX_SECONDS", "UNIX_MILLIS", "POSIX_TIME", "FROM_POSIX_TIME",
    // Conversion
    "CAST", "SAFE_CAST", "TRY_CAST", "CONVERT", "TO_CHAR", "TO_DATE",
    "TO_TIMESTAMP", "TO_NUMBER", "TO_DSINTERVAL", "TO_YMINTERVAL", "HEX",
    "UNHEX", "TO_HEX", "FROM_HEX", "TO_BASE64", "FROM_BASE64",
    // Conditional
    "COALESCE", "NVL", "NVL2", "IFNULL", "NULLIF", "NULLIFZERO", "ZEROIFNULL",
    "IIF", "IF", "DECODE", "CASE_WHEN",
    // Window
    "ROW_NUMBER", "RANK", "DENSE_RANK", "NTILE", "LAG", "LEAD", "CUME_DIST",
    "PERCENT_RANK", "NTH_VALUE", "RATIO_TO_REPORT",
    // JSON
    "JSON_VALUE", "JSON_QUERY", "JSON_EXTRACT", "JSON_EXTRACT_SCALAR",
    "JSON_EXTRACT_ARRAY", "TO_JSON_STRING", "PARSE_JSON", "JSON_OBJECT",
    "JSON_ARRAY",
    // Array
    "ARRAY", "ARRAY_LENGTH", "ARRAY_CONCAT", "ARRAY_TO_STRING", "ARRAY_REVERSE",
    "GENERATE_ARRAY", "GENERATE_DATE_ARRAY", "UNNEST", "OFFSET", "ORDINAL",
    // Platform-specific builtins
    "HASH_MD5", "HASH_SHA1", "HASH_SHA256", "HASHTYPE_MD5", "FARM_FINGERPRINT",
    "GENERATE_UUID", "SESSION_USER", "CURRENT_USER", "CURRENT_SCHEMA",
    "CURRENT_SESSION", "CURRENT_STATEMENT", "ST_GEOGPOINT", "ST_DISTANCE",
    "SAFE_DIVIDE", "SAFE_MULTIPLY", "SAFE_ADD", "SAFE_SUBTRACT",
];

/// Reserved words that the regex fallback can mistake for table names.
const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL",
    "OUTER", "CROSS", "ON", "AND", "OR", "NOT", "IN", "EXISTS", "BETWEEN",
    "LIKE", "IS", "NULL", "AS", "DISTINCT", "GROUP", "BY", "HAVING", "ORDER",
    "ASC", "DESC", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT", "ALL",
    "ANY", "SOME", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE",
    "MERGE", "USING", "MATCHED", "CREATE", "ALTER", "DROP", "TRUNCATE",
    "TABLE", "VIEW", "INDEX", "SCHEMA", "DATABASE", "WITH", "RECURSIVE",
    "WHEN", "THEN", "ELSE", "END", "CASE", "OVER", "PARTITION", "WINDOW",
    "ROWS", "RANGE", "UNBOUNDED", "PRECEDING", "FOLLOWING", "CURRENT", "ROW",
    "FETCH", "FIRST", "NEXT", "ONLY", "DUAL", "DUMMY", "TRUE", "FALSE",
    "DEFAULT", "PRIMARY", "FOREIGN", "KEY", "REFERENCES", "CONSTRAINT",
    "UNIQUE", "CHECK", "CASCADE", "RESTRICT", "GRANT", "REVOKE", "COMMIT",
    "ROLLBACK", "BEGIN", "TRANSACTION", "EXPLAIN", "ANALYZE", "VACUUM",
];

/// Identifier prefixes that mark script variables and parameters rather than
/// persistent objects.
pub const VARIABLE_PREFIXES: &[&str] = &[
    "V_", "P_", "L_", "G_", "IN_", "OUT_", "IO_", "VAR_", "PARAM_",
];

/// Aggregate functions that classify a projection as AGGREGATE.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "SUM", "COUNT", "AVG", "MIN", "MAX", "STDDEV", "VARIANCE", "FIRST", "LAST",
    "GROUP_CONCAT", "LISTAGG", "ARRAY_AGG", "MEDIAN", "PERCENTILE",
    "PERCENTILE_CONT", "PERCENTILE_DISC", "ANY_VALUE", "APPROX_COUNT_DISTINCT",
    "COUNTIF", "COUNT_IF",
];

/// Named scalar functions that classify a projection as FUNCTION.
const KNOWN_FUNCTIONS: &[&str] = &[
    "COALESCE", "NVL", "NVL2", "IFNULL", "NULLIF", "IIF", "CONCAT", "SUBSTRING",
    "SUBSTR", "LEFT", "RIGHT", "TRIM", "LTRIM", "RTRIM", "UPPER", "LOWER",
    "INITCAP", "REPLACE", "TRANSLATE", "TO_CHAR", "TO_DATE", "TO_TIMESTAMP",
    "TO_NUMBER", "DATE_TRUNC", "DATE_ADD", "DATE_SUB", "DATEADD", "DATEDIFF",
    "EXTRACT", "YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "SECOND", "ROUND",
    "FLOOR", "CEIL", "CEILING", "ABS", "SIGN", "MOD", "GREATEST", "LEAST",
    "DECODE", "LENGTH", "LEN", "CHARINDEX",
];

fn function_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| SQL_FUNCTIONS.iter().copied().collect())
}

fn keyword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| SQL_KEYWORDS.iter().copied().collect())
}

fn aggregate_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| AGGREGATE_FUNCTIONS.iter().copied().collect())
}

fn known_function_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| KNOWN_FUNCTIONS.iter().copied().collect())
}

pub fn is_sql_function(name: &str) -> bool {
    function_set().contains(name.to_uppercase().as_str())
}

pub fn is_sql_keyword(name: &str) -> bool {
    keyword_set().contains(name.to_uppercase().as_str())
}

pub fn is_aggregate_function(name: &str) -> bool {
    aggregate_set().contains(name.to_uppercase().as_str())
}

pub fn is_known_function(name: &str) -> bool {
    known_function_set().contains(name.to_uppercase().as_str())
}

/// True when the name is a script variable or bind parameter.
pub fn has_variable_prefix(name: &str) -> bool {
    if name.starts_with('@') {
        return true;
    }
    let upper = name.to_uppercase();
    VARIABLE_PREFIXES.iter().any(|p| upper.starts_with(p))
}
