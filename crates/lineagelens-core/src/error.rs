//! Error types for lineage extraction and serving.
//!
//! # Error Handling Strategy
//!
//! Analyzer entry points never fail: a SQL or script parse error degrades to
//! the regex fallback internally and only the `_strict` variants surface
//! [`LineageError::Parse`]. The cache loader fails fast with
//! [`LineageError::InvalidCache`], and the graph engine raises nothing but
//! [`LineageError::NotFound`]; range checks on query parameters happen at the
//! adapter boundary and produce [`LineageError::Validation`].

use thiserror::Error;

/// Unified error type for the lineage engine.
#[derive(Debug, Error)]
pub enum LineageError {
    /// The requested object does not exist in the loaded cache.
    #[error("object not found: {0}")]
    NotFound(String),

    /// SQL or script text could not be parsed, even by the fallback.
    #[error("parse error in {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    /// The cache file is structurally unusable.
    #[error("invalid cache: {reason}")]
    InvalidCache { reason: String },

    /// An extractor source (database, blob store, code host) is unreachable.
    /// Retryable at the orchestration layer.
    #[error("source unavailable: {source_name}: {detail}")]
    SourceUnavailable { source_name: String, detail: String },

    /// A query parameter is outside its permitted range.
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl LineageError {
    pub fn parse(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_cache(reason: impl Into<String>) -> Self {
        Self::InvalidCache {
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<sqlparser::parser::ParserError> for LineageError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::Parse {
            source_name: "sql".to_string(),
            detail: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LineageError {
    fn from(err: std::io::Error) -> Self {
        Self::InvalidCache {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidCache {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = LineageError::NotFound("DWH.FACT_SALES".to_string());
        assert_eq!(err.to_string(), "object not found: DWH.FACT_SALES");
    }

    #[test]
    fn test_validation_display() {
        let err = LineageError::validation("depth", "must be between 1 and 5");
        assert_eq!(err.to_string(), "invalid depth: must be between 1 and 5");
    }

    #[test]
    fn test_from_parser_error() {
        let parser_err = sqlparser::parser::ParserError::ParserError("boom".to_string());
        let err: LineageError = parser_err.into();
        assert!(matches!(err, LineageError::Parse { .. }));
    }
}
