//! Input reading for the analyze command.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// A named piece of input text.
#[derive(Debug, Clone)]
pub struct InputSource {
    pub name: String,
    pub content: String,
}

/// Read the given files, or stdin when none are provided.
pub fn read_input(files: &[PathBuf]) -> Result<Vec<InputSource>> {
    if files.is_empty() {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        return Ok(vec![InputSource {
            name: "<stdin>".to_string(),
            content,
        }]);
    }

    files
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(InputSource {
                name: path.display().to_string(),
                content,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_named_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SELECT 1").unwrap();

        let sources = read_input(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].content.contains("SELECT 1"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = read_input(&[PathBuf::from("/definitely/not/here.sql")]);
        assert!(result.is_err());
    }
}
