//! SQL extraction from Python scripts.
//!
//! Harvests string literal constants and f-string templates. Templated
//! expressions are replaced with `?` placeholders so the statement stays
//! parseable; the table references around the placeholder survive.

use std::sync::OnceLock;

use regex::Regex;

use super::looks_like_sql;

fn triple_double() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)([fF]?)"""(.*?)""""#).expect("invalid regex"))
}

fn triple_single() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)([fF]?)'''(.*?)'''").expect("invalid regex"))
}

fn single_double() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([fF]?)"([^"\n]*)""#).expect("invalid regex"))
}

fn single_single() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([fF]?)'([^'\n]*)'").expect("invalid regex"))
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^}]*\}").expect("invalid regex"))
}

/// Extract every SQL string embedded in the script.
pub fn extract_sql_strings(script: &str) -> Vec<String> {
    let mut sql_strings: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if looks_like_sql(&s) && !sql_strings.contains(&s) {
            sql_strings.push(s);
        }
    };

    // Triple-quoted blocks first; mask them so the single-line patterns do
    // not re-match fragments of their content.
    let mut masked = script.to_string();
    for re in [triple_double(), triple_single()] {
        for captures in re.captures_iter(script) {
            let is_fstring = !captures[1].is_empty();
            push(template_to_sql(&captures[2], is_fstring));
        }
        masked = re.replace_all(&masked, " ").to_string();
    }

    for re in [single_double(), single_single()] {
        for captures in re.captures_iter(&masked) {
            let is_fstring = !captures[1].is_empty();
            push(template_to_sql(&captures[2], is_fstring));
        }
    }

    sql_strings
}

fn template_to_sql(text: &str, is_fstring: bool) -> String {
    if is_fstring {
        placeholder().replace_all(text, "?").to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_quoted_sql() {
        let script = r#"
def run(ctx):
    sql = """
    SELECT * FROM MART.VW_SALES_SUMMARY s
    JOIN MART.DIM_TIME t ON s.date_key = t.date_key
    """
    ctx.execute(sql)
"#;
        let sql = extract_sql_strings(script);
        assert_eq!(sql.len(), 1);
        assert!(sql[0].contains("MART.VW_SALES_SUMMARY"));
    }

    #[test]
    fn test_fstring_placeholders() {
        let script = r#"stmt = f"UPDATE {schema}.FACT_ORDERS SET status = 'PROCESSED'""#;
        let sql = extract_sql_strings(script);
        assert_eq!(sql.len(), 1);
        assert_eq!(sql[0], "UPDATE ?.FACT_ORDERS SET status = 'PROCESSED'");
    }

    #[test]
    fn test_plain_string_with_sql() {
        let script = r#"cursor.execute("DELETE FROM STG.STG_ORDERS")"#;
        let sql = extract_sql_strings(script);
        assert_eq!(sql, vec!["DELETE FROM STG.STG_ORDERS"]);
    }

    #[test]
    fn test_non_sql_strings_ignored() {
        let script = r#"print("processing complete")"#;
        assert!(extract_sql_strings(script).is_empty());
    }

    #[test]
    fn test_triple_quoted_fstring() {
        let script = "stmt = f\"\"\"SELECT * FROM {dataset}.EVENTS\"\"\"";
        let sql = extract_sql_strings(script);
        assert_eq!(sql, vec!["SELECT * FROM ?.EVENTS"]);
    }
}
