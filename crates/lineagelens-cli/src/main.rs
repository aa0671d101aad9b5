//! LineageLens CLI - extract, merge and serve data lineage graphs

mod cli;
mod input;
mod output;
#[cfg(feature = "serve")]
mod server;
mod sources;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use lineagelens_core::{
    merge_caches, parse_script, run_extraction, SqlAnalyzer, TableReference,
};

use cli::{Args, Command, DialectArg, LanguageArg, OutputFormat};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lineagelens: error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Analyze {
            files,
            dialect,
            language,
            format,
        } => cmd_analyze(&files, dialect, language, format),
        Command::Extract {
            snapshot,
            sql_dir,
            output,
            dialect,
            tag_base,
            source_name,
        } => cmd_extract(snapshot, sql_dir, &output, dialect, tag_base, source_name),
        Command::Merge { base, new, output } => cmd_merge(&base, &new, &output),
        #[cfg(feature = "serve")]
        Command::Serve {
            cache,
            port,
            bucket,
            blob,
            project,
        } => {
            let config = server::ServerConfig {
                cache_path: cache,
                port,
                bucket,
                blob,
                project,
            };
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?
                .block_on(server::run_server(config))
        }
    }
}

fn cmd_analyze(
    files: &[PathBuf],
    dialect: DialectArg,
    language: LanguageArg,
    format: OutputFormat,
) -> Result<()> {
    let sources = input::read_input(files)?;

    let mut all_refs: Vec<(String, Vec<TableReference>)> = Vec::new();
    for source in sources {
        let refs = match language {
            LanguageArg::Sql => SqlAnalyzer::new(dialect.into()).analyze(&source.content),
            LanguageArg::Lua | LanguageArg::Python => {
                parse_script(&source.content, language.into(), None)
            }
        };
        all_refs.push((source.name, refs));
    }

    match format {
        OutputFormat::Table => {
            for (name, refs) in &all_refs {
                print!("{}", output::format_references(name, refs));
            }
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = all_refs
                .into_iter()
                .map(|(name, refs)| (name, serde_json::to_value(refs).unwrap_or_default()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
    }

    Ok(())
}

fn cmd_extract(
    snapshot: Option<PathBuf>,
    sql_dir: Option<PathBuf>,
    output: &PathBuf,
    dialect: DialectArg,
    tag_base: i64,
    source_name: Option<String>,
) -> Result<()> {
    let result = match (snapshot, sql_dir) {
        (Some(path), None) => {
            let name = source_name.unwrap_or_else(|| "snapshot".to_string());
            let mut source =
                sources::SnapshotFileSource::new(path, name, dialect.into(), tag_base);
            run_extraction(&mut source)?
        }
        (None, Some(dir)) => {
            let name = source_name.unwrap_or_else(|| "sql-files".to_string());
            let mut source = sources::SqlDirectorySource::new(dir, name, tag_base);
            run_extraction(&mut source)?
        }
        _ => bail!("either --snapshot or --sql-dir is required"),
    };

    for warning in &result.warnings {
        eprintln!("lineagelens: warning: {warning}");
    }

    let cache = result.cache;
    std::fs::write(output, serde_json::to_string_pretty(&cache.to_value())?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "lineagelens: extracted {} objects, {} dependencies, {} column dependencies -> {}",
        cache.objects.len(),
        cache.table_deps.len(),
        cache.column_deps.len(),
        output.display()
    );

    Ok(())
}

fn cmd_merge(base_path: &PathBuf, new_path: &PathBuf, output: &PathBuf) -> Result<()> {
    let mut base: serde_json::Value = read_json(base_path)?;
    let new: serde_json::Value = read_json(new_path)?;

    let stats = merge_caches(&mut base, &new)?;

    for warning in &stats.warnings {
        eprintln!("lineagelens: warning: {warning}");
    }

    std::fs::write(output, serde_json::to_string_pretty(&base)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "lineagelens: merged {} -> {}: {}",
        new_path.display(),
        output.display(),
        output::format_merge_stats(&stats)
    );

    Ok(())
}

fn read_json(path: &PathBuf) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
