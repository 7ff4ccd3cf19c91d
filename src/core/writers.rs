//! Writers for pipeline tables.
//!
//! Intermediate tables are written as UTF-8 CSV with no synthetic header
//! line: row 0 of the [`Table`] is the first line of the file.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::table::Table;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Failed to copy a finished file.
    #[error("failed to copy '{from}' to '{to}': {source}")]
    CopyFile {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write a table to CSV, one record per row.
///
/// Ragged rows are written as-is; readers in this crate are flexible.
///
/// # Example
///
/// ```no_run
/// use inspection_pipeline::core::{table::Table, writers::write_table_csv};
/// use std::path::Path;
///
/// let table = Table::from(vec![vec!["Time", "0001HEL_TOP"], vec!["0.0", "1.5"]]);
/// write_table_csv(Path::new("merged.CSV"), &table).unwrap();
/// ```
pub fn write_table_csv(path: &Path, table: &Table) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    for row in &table.rows {
        csv_writer
            .write_record(row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Copy a finished file verbatim, creating the destination directory.
pub fn copy_verbatim(from: &Path, to: &Path) -> Result<()> {
    ensure_parent_dirs(to)?;
    fs::copy(from, to).map_err(|e| WriteError::CopyFile {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source: e,
    })?;
    Ok(())
}
