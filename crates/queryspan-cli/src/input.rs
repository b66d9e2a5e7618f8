//! Reading the SQL sources to analyze.
//!
//! Each [`SqlSource`] is one file (or stdin). Sources are split into
//! statements later, so a source may hold a whole migration script.

use anyhow::{bail, Context, Result};
use std::io::{self, Read};
use std::path::PathBuf;

/// Name under which SQL piped through stdin is reported.
pub const STDIN_NAME: &str = "<stdin>";

/// SQL text together with the name its statements are reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSource {
    pub name: String,
    pub content: String,
}

impl SqlSource {
    /// Wraps `content`, dropping a leading byte order mark that editors on
    /// Windows prepend to saved scripts.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut content = content.into();
        if content.starts_with('\u{feff}') {
            content.drain(..'\u{feff}'.len_utf8());
        }
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Read the SQL sources named on the command line, or stdin when none are.
///
/// Fails when no source holds any SQL at all.
pub fn read_input(files: &[PathBuf]) -> Result<Vec<SqlSource>> {
    let sources = if files.is_empty() {
        read_from_stdin()?
    } else {
        read_from_files(files)?
    };
    ensure_sql(&sources)?;
    Ok(sources)
}

fn ensure_sql(sources: &[SqlSource]) -> Result<()> {
    if sources.iter().all(SqlSource::is_blank) {
        let names: Vec<_> = sources.iter().map(|source| source.name.as_str()).collect();
        bail!("no SQL to analyze in {}", names.join(", "));
    }
    Ok(())
}

fn read_from_stdin() -> Result<Vec<SqlSource>> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read SQL from stdin")?;

    Ok(vec![SqlSource::new(STDIN_NAME, content)])
}

fn read_from_files(files: &[PathBuf]) -> Result<Vec<SqlSource>> {
    files
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read SQL file: {}", path.display()))?;
            Ok(SqlSource::new(path.display().to_string(), content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_single_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SELECT id FROM orders").unwrap();

        let sources = read_input(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].content.contains("SELECT id FROM orders"));
        assert_eq!(sources[0].name, file.path().display().to_string());
    }

    #[test]
    fn test_read_multiple_files() {
        let mut file1 = NamedTempFile::new().unwrap();
        let mut file2 = NamedTempFile::new().unwrap();
        writeln!(file1, "SELECT id FROM orders").unwrap();
        writeln!(file2, "SELECT name FROM customers").unwrap();

        let sources =
            read_from_files(&[file1.path().to_path_buf(), file2.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_from_files(&[PathBuf::from("/nonexistent/file.sql")]).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read SQL file"));
    }

    #[test]
    fn test_byte_order_mark_is_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\u{feff}SELECT 1").unwrap();

        let sources = read_from_files(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(sources[0].content, "SELECT 1");
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut blank = NamedTempFile::new().unwrap();
        writeln!(blank, "   ").unwrap();

        let err = read_input(&[blank.path().to_path_buf()]).unwrap_err();
        assert!(err.to_string().starts_with("no SQL to analyze in "));
    }

    #[test]
    fn test_one_non_blank_source_is_enough() {
        let sources = [
            SqlSource::new(STDIN_NAME, "\n"),
            SqlSource::new("b.sql", "SELECT 1"),
        ];
        assert!(ensure_sql(&sources).is_ok());
        assert!(sources[0].is_blank());
    }
}
