//! SQL extraction from Lua UDF scripts.
//!
//! A small lexical scanner tokenizes the script (comments, both quote styles,
//! `[[ ]]` long brackets, `..` concatenation) and a recognizer pulls the
//! first argument out of `query` / `pquery` / `query_no_preprocessing` /
//! `pquery_no_preprocessing` calls; the `_no_preprocessing` pair may also be
//! invoked as methods on the host-provided `exa` namespace. Free-standing
//! string literals that look like SQL are harvested as well, which catches
//! statements assembled into local variables before execution.

use super::looks_like_sql;

/// Functions that execute SQL when called directly.
const QUERY_FUNCTIONS: &[&str] = &["query", "pquery", "query_no_preprocessing", "pquery_no_preprocessing"];

/// Functions that execute SQL when called as `exa.<name>(...)`.
const NAMESPACE_QUERY_FUNCTIONS: &[&str] = &["query_no_preprocessing", "pquery_no_preprocessing"];

const NAMESPACE_OBJECT: &str = "exa";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Ident(String),
    Concat,
    Symbol(char),
}

/// Extract every SQL string embedded in the script.
pub fn extract_sql_strings(script: &str) -> Vec<String> {
    let tokens = tokenize(script);
    let mut sql_strings: Vec<String> = Vec::new();

    let mut push = |s: String| {
        if looks_like_sql(&s) && !sql_strings.contains(&s) {
            sql_strings.push(s);
        }
    };

    let mut i = 0;
    while i < tokens.len() {
        if let Some((sql, consumed)) = match_query_call(&tokens[i..]) {
            push(sql);
            i += consumed;
            continue;
        }
        if let Token::Str(s) = &tokens[i] {
            push(s.clone());
        }
        i += 1;
    }

    sql_strings
}

/// Recognize `name ( <string-expr> ...` at the head of the token slice and
/// return the concatenated string argument plus the number of tokens
/// consumed up to and including the argument.
fn match_query_call(tokens: &[Token]) -> Option<(String, usize)> {
    let mut idx = match tokens.first()? {
        Token::Ident(name) if name == NAMESPACE_OBJECT => {
            // exa.query_no_preprocessing(...) / exa:pquery_no_preprocessing(...)
            match (tokens.get(1), tokens.get(2)) {
                (Some(Token::Symbol('.')) | Some(Token::Symbol(':')), Some(Token::Ident(method)))
                    if NAMESPACE_QUERY_FUNCTIONS.contains(&method.as_str()) =>
                {
                    2
                }
                _ => return None,
            }
        }
        Token::Ident(name) if QUERY_FUNCTIONS.contains(&name.as_str()) => 0,
        _ => return None,
    };

    idx += 1;
    if !matches!(tokens.get(idx), Some(Token::Symbol('('))) {
        return None;
    }
    idx += 1;

    // First argument: string literal, or a `..` chain. Non-string operands in
    // the chain contribute nothing; string parts join with a single space.
    let mut parts: Vec<String> = Vec::new();
    let mut saw_any = false;
    loop {
        match tokens.get(idx) {
            Some(Token::Str(s)) => {
                parts.push(s.clone());
                saw_any = true;
                idx += 1;
            }
            Some(Token::Ident(_)) => {
                saw_any = true;
                idx += 1;
            }
            _ => break,
        }
        if matches!(tokens.get(idx), Some(Token::Concat)) {
            idx += 1;
            continue;
        }
        break;
    }

    if !saw_any || parts.is_empty() {
        return None;
    }

    Some((parts.join(" "), idx))
}

fn tokenize(script: &str) -> Vec<Token> {
    let chars: Vec<char> = script.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Comments: `--` line comments and `--[[ ]]` block comments.
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            if let Some(len) = long_bracket_level(&chars, i + 2) {
                i = skip_long_string(&chars, i + 2, len).1;
            } else {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            continue;
        }

        // Long strings [[...]] / [=[...]=].
        if c == '[' {
            if let Some(level) = long_bracket_level(&chars, i) {
                let (content, end) = skip_long_string(&chars, i, level);
                tokens.push(Token::Str(content));
                i = end;
                continue;
            }
        }

        // Quoted strings, escape-preserving: the embedded SQL may carry
        // literal \n sequences that are converted later.
        if c == '\'' || c == '"' {
            let quote = c;
            let mut content = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    content.push(chars[i]);
                    content.push(chars[i + 1]);
                    i += 2;
                } else {
                    content.push(chars[i]);
                    i += 1;
                }
            }
            i += 1;
            tokens.push(Token::Str(content));
            continue;
        }

        if c == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) != Some(&'.') {
            tokens.push(Token::Concat);
            i += 2;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if !c.is_whitespace() {
            tokens.push(Token::Symbol(c));
        }
        i += 1;
    }

    tokens
}

/// Returns the `=` count of a long-bracket opener at `start`, if one begins
/// there.
fn long_bracket_level(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    let mut i = start + 1;
    while chars.get(i) == Some(&'=') {
        level += 1;
        i += 1;
    }
    if chars.get(i) == Some(&'[') {
        Some(level)
    } else {
        None
    }
}

/// Consume a long string starting at `start`; returns the content and the
/// index just past the closing bracket.
fn skip_long_string(chars: &[char], start: usize, level: usize) -> (String, usize) {
    let content_start = start + 2 + level;
    let closer: String = format!("]{}]", "=".repeat(level));
    let closer_chars: Vec<char> = closer.chars().collect();

    let mut i = content_start;
    while i < chars.len() {
        if chars[i] == ']' && chars[i..].starts_with(&closer_chars) {
            let content: String = chars[content_start..i].iter().collect();
            return (content, i + closer_chars.len());
        }
        i += 1;
    }
    let content: String = chars[content_start..].iter().collect();
    (content, chars.len())
}
