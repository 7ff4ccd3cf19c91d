//! Per-category export of reshaped tables.
//!
//! Each category with at least one row gets its own CSV holding the time row
//! followed by that category's rows, named `<Prefix>_Test_<yyyymmdd>_<n>.csv`.

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

use super::categorize::Classifier;
use crate::config::PipelineConfig;
use crate::core::loaders::{self, LoaderError};
use crate::core::naming;
use crate::core::table::Table;
use crate::core::writers::{self, WriteError};

/// Errors that can occur during category export.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("failed to list '{path}': {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build date pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for split operations.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Writes one CSV per category found in a reshaped table.
#[derive(Debug, Clone)]
pub struct CategorySplitter {
    classifier: Classifier,
    identifier_column: usize,
    time_label: String,
    date_pattern: Regex,
}

impl CategorySplitter {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            classifier: Classifier::new(config.inject.categories.clone()),
            identifier_column: config.inject.identifier_column,
            time_label: config.layout.time_label.clone(),
            date_pattern: Regex::new(r"(\d{4})-(\d{2})-(\d{2})")?,
        })
    }

    /// `yyyymmdd` from the first `yyyy-mm-dd` in a file name.
    pub fn file_date(&self, name: &str) -> Option<String> {
        let caps = self.date_pattern.captures(name)?;
        Some(format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
    }

    /// Write each category's rows (after the time row) into `output_dir`.
    pub fn split_table(&self, table: &Table, date: &str, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let time_row = table
            .rows
            .iter()
            .find(|row| self.identifier(row) == self.time_label);

        let mut outputs = Vec::new();
        for rule in self.classifier.rules() {
            // contained-in rather than first-match, so a row may appear in two exports
            let rows: Vec<Vec<String>> = table
                .rows
                .iter()
                .filter(|row| {
                    let id = self.identifier(row);
                    id != self.time_label && !rule.keyword.is_empty() && id.contains(&rule.keyword)
                })
                .cloned()
                .collect();
            if rows.is_empty() {
                log::debug!("no rows for {}", rule.prefix);
                continue;
            }

            let mut out = Table::new(Vec::with_capacity(rows.len() + 1));
            if let Some(time_row) = time_row {
                out.rows.push(time_row.clone());
            }
            out.rows.extend(rows);

            let taken = naming::existing_names(output_dir).map_err(|e| SplitError::ListDir {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
            let stem = format!("{}_Test_{}", rule.prefix, date);
            let name = naming::first_free(&taken, |n| naming::numbered_suffix(&stem, "csv", 1, n));
            let path = output_dir.join(name);

            writers::write_table_csv(&path, &out)?;
            log::info!("wrote {} rows to {}", out.height(), path.display());
            outputs.push(path);
        }
        Ok(outputs)
    }

    /// Split one reshaped file. Files without a date in their name are skipped.
    pub fn split_file(&self, input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(date) = self.file_date(&name) else {
            log::warn!("no date in file name, skipping: {}", input.display());
            return Ok(Vec::new());
        };

        let table = loaders::load_table_csv(input)?;
        self.split_table(&table, &date, output_dir)
    }

    fn identifier<'a>(&self, row: &'a [String]) -> &'a str {
        row.get(self.identifier_column)
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn reshaped() -> Table {
        Table::from(vec![
            vec!["", "Time", "0", "1"],
            vec!["", "0001HEL_TOP", "1", "2"],
            vec!["", "0002HEL_SIDE", "3", "4"],
            vec!["", "0003BASEBALL", "5", "6"],
        ])
    }

    #[test]
    fn test_file_date() {
        let splitter = CategorySplitter::new(&PipelineConfig::default()).unwrap();
        assert_eq!(
            splitter.file_date("Output_2024-04-18_InspectionLOG_1.CSV"),
            Some("20240418".to_string())
        );
        assert_eq!(splitter.file_date("Output_undated_1.CSV"), None);
    }

    #[test]
    fn test_split_table_per_category() {
        let dir = tempdir().unwrap();
        let splitter = CategorySplitter::new(&PipelineConfig::default()).unwrap();

        let outputs = splitter.split_table(&reshaped(), "20240418", dir.path()).unwrap();

        let names: Vec<String> = outputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["Helmet_Test_20240418_1.csv", "BaseBall_Test_20240418_1.csv"]
        );

        let helmet = loaders::load_table_csv(&outputs[0]).unwrap();
        assert_eq!(helmet.height(), 3);
        assert_eq!(helmet.cell(0, 1), "Time");
        assert_eq!(helmet.cell(2, 1), "0002HEL_SIDE");
    }

    #[test]
    fn test_split_twice_increments_suffix() {
        let dir = tempdir().unwrap();
        let splitter = CategorySplitter::new(&PipelineConfig::default()).unwrap();

        splitter.split_table(&reshaped(), "20240418", dir.path()).unwrap();
        let second = splitter.split_table(&reshaped(), "20240418", dir.path()).unwrap();

        assert!(second[0].ends_with("Helmet_Test_20240418_2.csv"));
    }

    #[test]
    fn test_split_file_without_date_is_skipped() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Output_undated_1.csv");
        writers::write_table_csv(&input, &reshaped()).unwrap();

        let splitter = CategorySplitter::new(&PipelineConfig::default()).unwrap();
        assert!(splitter.split_file(&input, dir.path()).unwrap().is_empty());
    }
}
