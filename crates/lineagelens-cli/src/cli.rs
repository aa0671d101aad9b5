//! CLI argument parsing using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// LineageLens - cross-platform data lineage toolkit
#[derive(Parser, Debug)]
#[command(name = "lineagelens")]
#[command(about = "Extract, merge and serve data lineage graphs", long_about = None)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract table references from SQL files or scripts
    Analyze {
        /// Files to analyze (reads from stdin if none provided)
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,

        /// SQL dialect
        #[arg(short, long, default_value = "exasol", value_enum)]
        dialect: DialectArg,

        /// Input language
        #[arg(short, long, default_value = "sql", value_enum)]
        language: LanguageArg,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Run an extraction source and write a cache fragment
    Extract {
        /// JSON snapshot file with raw objects
        #[arg(long, value_name = "FILE", conflicts_with = "sql_dir")]
        snapshot: Option<PathBuf>,

        /// Directory tree of .sql definition files
        #[arg(long, value_name = "DIR")]
        sql_dir: Option<PathBuf>,

        /// Output cache file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// SQL dialect of the source definitions
        #[arg(long, default_value = "exasol", value_enum)]
        dialect: DialectArg,

        /// Base offset for minted numeric tags
        #[arg(long, default_value_t = 100_000)]
        tag_base: i64,

        /// Source name recorded in cache metadata
        #[arg(long)]
        source_name: Option<String>,
    },

    /// Merge a new cache fragment into a base cache
    Merge {
        /// Base cache file (its container shapes are preserved)
        #[arg(long, value_name = "FILE")]
        base: PathBuf,

        /// New cache file to merge in
        #[arg(long, value_name = "FILE")]
        new: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Serve the lineage query API over HTTP
    #[cfg(feature = "serve")]
    Serve {
        /// Cache file to load at startup
        #[arg(long, value_name = "FILE", env = "LINEAGELENS_CACHE")]
        cache: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080, env = "PORT")]
        port: u16,

        /// Remote bucket for cache retrieval (requires the remote-cache build)
        #[arg(long, env = "LINEAGELENS_BUCKET")]
        bucket: Option<String>,

        /// Blob path inside the bucket
        #[arg(long, env = "LINEAGELENS_BLOB")]
        blob: Option<String>,

        /// Project identifier for authenticated retrieval
        #[arg(long, env = "LINEAGELENS_PROJECT")]
        project: Option<String>,
    },
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Exasol,
    Bigquery,
    Generic,
}

impl From<DialectArg> for lineagelens_core::Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Exasol => lineagelens_core::Dialect::Exasol,
            DialectArg::Bigquery => lineagelens_core::Dialect::Bigquery,
            DialectArg::Generic => lineagelens_core::Dialect::Generic,
        }
    }
}

/// Input language for the analyze command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LanguageArg {
    Sql,
    Lua,
    Python,
}

impl From<LanguageArg> for lineagelens_core::ScriptLanguage {
    fn from(l: LanguageArg) -> Self {
        match l {
            LanguageArg::Sql => lineagelens_core::ScriptLanguage::Sql,
            LanguageArg::Lua => lineagelens_core::ScriptLanguage::Lua,
            LanguageArg::Python => lineagelens_core::ScriptLanguage::Python,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_args() {
        let args = Args::parse_from(["lineagelens", "analyze", "view.sql", "-d", "bigquery"]);
        match args.command {
            Command::Analyze {
                files,
                dialect,
                language,
                format,
            } => {
                assert_eq!(files.len(), 1);
                assert_eq!(dialect, DialectArg::Bigquery);
                assert_eq!(language, LanguageArg::Sql);
                assert_eq!(format, OutputFormat::Table);
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn test_parse_merge_args() {
        let args = Args::parse_from([
            "lineagelens",
            "merge",
            "--base",
            "base.json",
            "--new",
            "new.json",
            "-o",
            "out.json",
        ]);
        assert!(matches!(args.command, Command::Merge { .. }));
    }

    #[test]
    fn test_dialect_conversion() {
        let dialect: lineagelens_core::Dialect = DialectArg::Exasol.into();
        assert_eq!(dialect, lineagelens_core::Dialect::Exasol);
    }
}
