//! Data loaders for raw instrument dumps and intermediate tables.
//!
//! This module provides parsers for:
//! - Raw per-channel exports (single-byte Japanese encoding, fixed preamble)
//! - Merged and reshaped pipeline tables (UTF-8 CSV, no inferred header)

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use encoding_rs::Encoding;
use thiserror::Error;

use super::table::Table;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("'{path}' ends before line {line} of the export preamble")]
    TruncatedPreamble { path: PathBuf, line: usize },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Where one column lives inside a raw channel export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWindow {
    /// Raw lines skipped before the header line
    pub skip_rows: usize,
    /// Zero-based field index
    pub column: usize,
    /// Maximum data rows returned
    pub max_rows: usize,
}

/// A single column extracted from a channel export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelColumn {
    /// Text of the header line at the column position
    pub header: String,
    pub values: Vec<String>,
}

impl ChannelColumn {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve a WHATWG encoding label such as `Shift_JIS`.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| LoaderError::UnknownEncoding(label.to_string()))
}

/// Read a whole file and decode it. Malformed sequences become U+FFFD.
pub fn decode_file(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        log::warn!(
            "{}: undecodable bytes replaced while reading as {}",
            path.display(),
            encoding.name()
        );
    }
    Ok(text.into_owned())
}

/// Return the text after the first `n` raw lines, or `None` if there are fewer.
pub fn skip_lines(text: &str, n: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..n {
        let idx = rest.find('\n')?;
        rest = &rest[idx + 1..];
    }
    Some(rest)
}

/// Extract one column from an already decoded channel export.
///
/// The line after the first `window.skip_rows` raw lines is the header; up to
/// `window.max_rows` following records supply the values. Records too short to
/// hold the column contribute a blank cell.
pub fn parse_channel_column(text: &str, window: ColumnWindow, path: &Path) -> Result<ChannelColumn> {
    let body = skip_lines(text, window.skip_rows).ok_or_else(|| LoaderError::TruncatedPreamble {
        path: path.to_path_buf(),
        line: window.skip_rows,
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => {
            let record = record.map_err(|e| LoaderError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            record.get(window.column).unwrap_or_default().trim().to_string()
        }
        None => String::new(),
    };

    let mut values = Vec::with_capacity(window.max_rows.min(4096));
    for record in records.take(window.max_rows) {
        let record = record.map_err(|e| LoaderError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        values.push(record.get(window.column).unwrap_or_default().trim().to_string());
    }

    Ok(ChannelColumn { header, values })
}

/// Decode a raw channel export and extract one column.
pub fn read_channel_column(
    path: &Path,
    window: ColumnWindow,
    encoding: &'static Encoding,
) -> Result<ChannelColumn> {
    let text = decode_file(path, encoding)?;
    parse_channel_column(&text, window, path)
}

/// Load a UTF-8 pipeline table. Every line, including the first, becomes a row.
pub fn load_table_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoaderError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(rows))
}
