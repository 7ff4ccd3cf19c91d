//! Reshaping a merged wide table into the report row layout.
//!
//! The wide table (one column per sample) is transposed into one row per
//! sample, samples are ordered by category priority and sequence, and fixed
//! column blocks are moved to where the report template expects them:
//!
//! 1. transpose, so each former column header becomes a row identifier
//! 2. set the time row aside, sort the sample rows, put the time row on top
//! 3. reorder columns to `front ++ tail ++ middle`
//! 4. move the identifier to column 1, blank column 0 and the metadata rectangle
//! 5. drop everything past the trailing threshold
//!
//! Tables narrower than a step expects are left alone for that step and a
//! [`LayoutNote`] is recorded.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::sorting::{SampleOrder, SortingError};
use crate::config::{LayoutConfig, SortConfig};
use crate::core::loaders::{self, LoaderError};
use crate::core::naming;
use crate::core::table::Table;
use crate::core::transforms;
use crate::core::workspace::Workspace;
use crate::core::writers::{self, WriteError};

/// Errors that can occur during reshaping.
#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error(transparent)]
    Sorting(#[from] SortingError),

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

    #[error("'{0}' has no file name")]
    NoFileName(PathBuf),
}

/// Result type for reshape operations.
pub type Result<T> = std::result::Result<T, ReshapeError>;

/// A structural step that was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutNote {
    /// No row was labelled with the time column name
    MissingTimeRow,
    /// Too narrow for a tail block; columns left in export order
    NarrowForRelocation { width: usize, tail_start: usize },
    /// Already within the trailing threshold
    WithinTrailingLimit { width: usize, limit: usize },
}

/// Output of [`ReshapeEngine::reshape`].
#[derive(Debug, Clone)]
pub struct Reshaped {
    pub table: Table,
    /// Sample rows (every row except the time row)
    pub samples: usize,
    /// Sample rows whose identifier did not follow the grammar
    pub unmatched: usize,
    pub notes: Vec<LayoutNote>,
}

/// Transforms merged tables into report-ready tables.
#[derive(Debug, Clone)]
pub struct ReshapeEngine {
    layout: LayoutConfig,
    order: SampleOrder,
}

impl ReshapeEngine {
    pub fn new(layout: &LayoutConfig, sort: &SortConfig) -> Result<Self> {
        Ok(Self {
            layout: layout.clone(),
            order: SampleOrder::new(&sort.priority)?,
        })
    }

    /// Reshape one wide table (row 0 = `Time`, sample ids...).
    pub fn reshape(&self, wide: &Table) -> Reshaped {
        let mut notes = Vec::new();

        let mut rows = transforms::transpose(wide).rows;

        let time_idx = rows
            .iter()
            .position(|row| row.first().map(|id| id.trim()) == Some(self.layout.time_label.as_str()));
        let time_row = match time_idx {
            Some(idx) => Some(rows.remove(idx)),
            None => {
                log::warn!("no '{}' row found; table has no time axis", self.layout.time_label);
                notes.push(LayoutNote::MissingTimeRow);
                None
            }
        };

        let samples = rows.len();
        let unmatched = samples - self.order.count_matching(&rows, 0);
        if unmatched > 0 {
            log::warn!("{} sample identifier(s) do not follow the naming grammar; sorted last", unmatched);
        }
        self.order.sort_rows(&mut rows, 0);

        if let Some(time_row) = time_row {
            rows.insert(0, time_row);
        }
        let mut table = Table::new(rows);

        if !transforms::relocate_blocks(&mut table, self.layout.front_end, self.layout.tail_start) {
            let width = table.width();
            log::warn!(
                "table is {} columns wide, no tail block at column {}; block relocation skipped",
                width,
                self.layout.tail_start
            );
            notes.push(LayoutNote::NarrowForRelocation {
                width,
                tail_start: self.layout.tail_start,
            });
        }

        // Identifier moves to column 1 over the first data column
        transforms::shift_identifier(&mut table);
        transforms::clear_rect(
            &mut table,
            self.layout.body_clear_first_row..usize::MAX,
            self.layout.body_clear_first_col..self.layout.body_clear_end_col,
        );

        if !transforms::truncate_columns(&mut table, self.layout.trailing_clear_at) {
            let width = table.width();
            log::info!(
                "table is {} columns wide, nothing past column {} to clear",
                width,
                self.layout.trailing_clear_at
            );
            notes.push(LayoutNote::WithinTrailingLimit {
                width,
                limit: self.layout.trailing_clear_at,
            });
        }

        Reshaped {
            table,
            samples,
            unmatched,
            notes,
        }
    }

    /// Merged tables in `dir` awaiting reshaping, sorted by name.
    pub fn input_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("merged table directory does not exist: {}", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ReshapeError::ListDir {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                path.is_file()
                    && name.contains(&self.layout.input_keyword)
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Name for the reshaped copy of `input`: `Output_<stem>_<n>.<ext>`, `n` from 1.
    pub fn output_path(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .ok_or_else(|| ReshapeError::NoFileName(input.to_path_buf()))?
            .to_string_lossy();
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = format!("{}{}", self.layout.output_prefix, stem);

        let taken = naming::existing_names(output_dir).map_err(|e| ReshapeError::ListDir {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        let name = naming::first_free(&taken, |n| naming::numbered_suffix(&stem, &ext, 1, n));
        Ok(output_dir.join(name))
    }

    /// Reshape one merged file and write the result into `output_dir`.
    pub fn reshape_file(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let wide = loaders::load_table_csv(input)?;
        log::info!(
            "reshaping {} ({} rows x {} columns)",
            input.display(),
            wide.height(),
            wide.width()
        );

        let reshaped = self.reshape(&wide);
        let output = self.output_path(input, output_dir)?;
        writers::write_table_csv(&output, &reshaped.table)?;

        log::info!(
            "saved {} ({} samples, {} unmatched)",
            output.display(),
            reshaped.samples,
            reshaped.unmatched
        );
        Ok(output)
    }

    /// Reshape each file independently; a failure is reported for that file only.
    pub fn reshape_files(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Vec<(PathBuf, Result<PathBuf>)> {
        inputs
            .iter()
            .map(|input| {
                let result = self.reshape_file(input, output_dir);
                if let Err(e) = &result {
                    log::error!("reshape of {} failed: {}", input.display(), e);
                }
                (input.clone(), result)
            })
            .collect()
    }

    /// Reshape every merged table in the CSV directory into the pivot directory.
    pub fn reshape_directory(&self, workspace: &Workspace) -> Result<Vec<(PathBuf, Result<PathBuf>)>> {
        let inputs = self.input_files(&workspace.csv)?;
        if inputs.is_empty() {
            log::warn!("no merged tables to reshape in {}", workspace.csv.display());
        }
        Ok(self.reshape_files(&inputs, &workspace.pivot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_with(front_end: usize, tail_start: usize, trailing: usize) -> ReshapeEngine {
        let layout = LayoutConfig {
            front_end,
            tail_start,
            trailing_clear_at: trailing,
            body_clear_first_row: 1,
            body_clear_first_col: 2,
            body_clear_end_col: front_end,
            ..LayoutConfig::default()
        };
        ReshapeEngine::new(&layout, &SortConfig::default()).unwrap()
    }

    /// Wide table with `ticks` data rows; cell values encode (tick, column).
    fn wide_table(ids: &[&str], ticks: usize) -> Table {
        let mut rows = Vec::with_capacity(ticks + 1);
        let mut header = vec!["Time".to_string()];
        header.extend(ids.iter().map(|s| s.to_string()));
        rows.push(header);
        for t in 0..ticks {
            let mut row = vec![format!("t{}", t)];
            row.extend((0..ids.len()).map(|c| format!("v{}_{}", c, t)));
            rows.push(row);
        }
        Table::new(rows)
    }

    fn identifiers(table: &Table) -> Vec<&str> {
        table.rows.iter().map(|r| r[1].as_str()).collect()
    }

    #[test]
    fn test_scenario_two_channels_row_order() {
        let engine = ReshapeEngine::new(&LayoutConfig::default(), &SortConfig::default()).unwrap();
        let wide = wide_table(&["0002BICYCLE", "0001HEL_TOP"], 5);

        let reshaped = engine.reshape(&wide);

        assert_eq!(identifiers(&reshaped.table), vec!["Time", "0001HEL_TOP", "0002BICYCLE"]);
        assert_eq!(reshaped.samples, 2);
        assert_eq!(reshaped.unmatched, 0);
        assert!(reshaped
            .notes
            .contains(&LayoutNote::NarrowForRelocation { width: 6, tail_start: 51 }));
    }

    #[test]
    fn test_unmatched_rows_sorted_last_in_input_order() {
        let engine = engine_with(3, 5, 100);
        let wide = wide_table(&["misc_b", "0005BASEBALL", "misc_a", "0001HEL_SIDE"], 8);

        let reshaped = engine.reshape(&wide);

        assert_eq!(
            identifiers(&reshaped.table),
            vec!["Time", "0001HEL_SIDE", "0005BASEBALL", "misc_b", "misc_a"]
        );
        assert_eq!(reshaped.unmatched, 2);
    }

    #[test]
    fn test_blocks_relocated_and_leading_column_rewritten() {
        // transposed width = 1 + 8 ticks = 9; front [0,3), middle [3,5), tail [5,9)
        let engine = engine_with(3, 5, 100);
        let wide = wide_table(&["0001HEL_TOP"], 8);

        let reshaped = engine.reshape(&wide);
        let time = &reshaped.table.rows[0];
        let sample = &reshaped.table.rows[1];

        // identifier replaces the first data column; width is unchanged
        assert_eq!(time, &vec!["", "Time", "t1", "t4", "t5", "t6", "t7", "t2", "t3"]);
        assert_eq!(sample.len(), 9);
        assert_eq!(sample[0], "");
        assert_eq!(sample[1], "0001HEL_TOP");
        // metadata rectangle (rows 1.., columns 2..3) blanked
        assert_eq!(sample[2], "");
        assert_eq!(sample[3], "v0_4");
        assert_eq!(sample[8], "v0_3");
    }

    #[test]
    fn test_default_layout_tail_follows_front_block() {
        let engine = ReshapeEngine::new(&LayoutConfig::default(), &SortConfig::default()).unwrap();
        let wide = wide_table(&["0001HEL_TOP"], 100);

        let reshaped = engine.reshape(&wide);
        let sample = &reshaped.table.rows[1];

        assert_eq!(sample.len(), 101);
        assert_eq!(sample[1], "0001HEL_TOP");
        assert!(sample[2..24].iter().all(String::is_empty));
        assert_eq!(sample[24], "v0_50");
        assert_eq!(reshaped.table.rows[0][24], "t50");
        // middle block after the 50 tail columns
        assert_eq!(sample[74], "v0_23");
        assert_eq!(sample[100], "v0_49");
    }

    #[test]
    fn test_relocation_keeps_column_set() {
        let engine = engine_with(24, 51, 10_000);
        let wide = wide_table(&["0001HEL_TOP"], 200);

        let reshaped = engine.reshape(&wide);
        let mut time: Vec<String> = reshaped.table.rows[0].clone();
        time.sort();
        // t0 sits in column 1 and is overwritten by the identifier
        let mut expected: Vec<String> = vec![String::new(), "Time".to_string()];
        expected.extend((1..200).map(|t| format!("t{}", t)));
        expected.sort();

        assert_eq!(time, expected);
    }

    #[test]
    fn test_trailing_columns_cleared() {
        let engine = engine_with(3, 5, 6);
        let wide = wide_table(&["0001HEL_TOP"], 20);

        let reshaped = engine.reshape(&wide);

        assert_eq!(reshaped.table.width(), 6);
        assert!(reshaped.notes.is_empty());
    }

    #[test]
    fn test_missing_time_row_is_noted() {
        let engine = engine_with(3, 5, 100);
        let wide = Table::from(vec![vec!["0002HEL_TOP", "0001HEL_TOP"], vec!["1", "2"]]);

        let reshaped = engine.reshape(&wide);

        assert!(reshaped.notes.contains(&LayoutNote::MissingTimeRow));
        assert_eq!(identifiers(&reshaped.table), vec!["0001HEL_TOP", "0002HEL_TOP"]);
    }

    #[test]
    fn test_reshape_file_and_sequence_naming() {
        let temp_dir = TempDir::new().unwrap();
        let csv_dir = temp_dir.path().join("CSV");
        let input = csv_dir.join("2024-04-18_InspectionLOG.CSV");
        writers::write_table_csv(&input, &wide_table(&["0002BICYCLE", "0001HEL_TOP"], 5)).unwrap();
        fs::write(csv_dir.join("unrelated.CSV"), "x").unwrap();

        let engine = ReshapeEngine::new(&LayoutConfig::default(), &SortConfig::default()).unwrap();
        let inputs = engine.input_files(&csv_dir).unwrap();
        assert_eq!(inputs, vec![input.clone()]);

        let first = engine.reshape_file(&input, temp_dir.path()).unwrap();
        let second = engine.reshape_file(&input, temp_dir.path()).unwrap();
        assert_eq!(
            first.file_name().unwrap(),
            "Output_2024-04-18_InspectionLOG_1.CSV"
        );
        assert_eq!(
            second.file_name().unwrap(),
            "Output_2024-04-18_InspectionLOG_2.CSV"
        );

        let written = loaders::load_table_csv(&first).unwrap();
        assert_eq!(identifiers(&written), vec!["Time", "0001HEL_TOP", "0002BICYCLE"]);
    }

    #[test]
    fn test_reshape_directory_isolates_failures() {
        let temp_dir = TempDir::new().unwrap();
        let ws = Workspace::new(temp_dir.path(), &crate::config::PathsConfig::default());
        writers::write_table_csv(
            &ws.csv.join("a_InspectionLOG.CSV"),
            &wide_table(&["0001HEL_TOP"], 3),
        )
        .unwrap();
        // invalid UTF-8 fails to parse
        fs::write(ws.csv.join("b_InspectionLOG.CSV"), [0xff, 0xfe, b',', 0x80]).unwrap();

        let engine = ReshapeEngine::new(&LayoutConfig::default(), &SortConfig::default()).unwrap();
        let results = engine.reshape_directory(&ws).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(ws.pivot.join("Output_a_InspectionLOG_1.CSV").is_file());
    }

    #[test]
    fn test_input_files_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ReshapeEngine::new(&LayoutConfig::default(), &SortConfig::default()).unwrap();
        assert!(engine.input_files(&temp_dir.path().join("CSV")).unwrap().is_empty());
    }
}
