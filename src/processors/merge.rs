//! Merging per-channel instrument dumps into one wide table.
//!
//! Each source directory holds one export per channel. The first file gives
//! the shared time axis, every file gives one value column named after its
//! file stem. The merged table is written to the CSV directory, copied to the
//! archive, and only then are the consumed dumps deleted.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use encoding_rs::Encoding;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::loaders::{self, ColumnWindow, LoaderError};
use crate::core::naming;
use crate::core::table::Table;
use crate::core::workspace::Workspace;
use crate::core::writers::{self, WriteError};

/// Errors that can occur while merging one source directory.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to list source directory '{path}': {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("failed to delete consumed file '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date format '{0}'")]
    DateFormat(String),

    #[error("merge of '{path}' rejected: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// What happened to one source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing to merge; no file was written or deleted
    NoInput,
    Merged(MergeReport),
}

/// Artifacts of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub source_dir: PathBuf,
    pub output: PathBuf,
    pub archive: PathBuf,
    /// Channel labels in discovery order
    pub channels: Vec<String>,
    /// Data rows, excluding the header
    pub rows: usize,
}

/// Per-directory results of a multi-source merge.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub results: Vec<(PathBuf, Result<MergeOutcome>)>,
}

impl MergeSummary {
    /// Reports of the directories that produced a table.
    pub fn produced(&self) -> Vec<&MergeReport> {
        self.results
            .iter()
            .filter_map(|(_, result)| match result {
                Ok(MergeOutcome::Merged(report)) => Some(report),
                _ => None,
            })
            .collect()
    }

    /// Overall success: at least one source produced output.
    pub fn any_produced(&self) -> bool {
        !self.produced().is_empty()
    }

    pub fn failures(&self) -> Vec<(&Path, &MergeError)> {
        self.results
            .iter()
            .filter_map(|(dir, result)| result.as_ref().err().map(|e| (dir.as_path(), e)))
            .collect()
    }
}

/// Keep only candidate source directories that currently exist.
pub fn discover_sources(candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|dir| {
            let present = dir.is_dir();
            if !present {
                log::debug!("source not mounted: {}", dir.display());
            }
            present
        })
        .cloned()
        .collect()
}

/// Merges channel dumps according to the fixed instrument export window.
#[derive(Debug, Clone)]
pub struct TableMerger {
    time_window: ColumnWindow,
    value_window: ColumnWindow,
    encoding: &'static Encoding,
    extension: String,
    time_label: String,
    log_suffix: String,
    date_format: String,
    output_dir: PathBuf,
    archive_dir: PathBuf,
}

impl TableMerger {
    pub fn new(config: &PipelineConfig, workspace: &Workspace) -> Result<Self> {
        let import = &config.import;
        Ok(Self {
            time_window: ColumnWindow {
                skip_rows: import.time_skip_rows,
                column: import.time_column,
                max_rows: import.max_rows,
            },
            value_window: ColumnWindow {
                skip_rows: import.value_skip_rows,
                column: import.value_column,
                max_rows: import.max_rows,
            },
            encoding: loaders::resolve_encoding(&import.encoding)?,
            extension: import.extension.clone(),
            time_label: config.layout.time_label.clone(),
            log_suffix: import.log_suffix.clone(),
            date_format: import.date_format.clone(),
            output_dir: workspace.csv.clone(),
            archive_dir: workspace.archive.clone(),
        })
    }

    /// Channel files of one directory, sorted by name.
    pub fn channel_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| MergeError::ListDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Build the wide table: `Time` plus one column per file.
    pub fn build_table(&self, files: &[PathBuf]) -> Result<Table> {
        let Some(first) = files.first() else {
            return Ok(Table::default());
        };

        let mut header = Vec::with_capacity(files.len() + 1);
        let mut columns = Vec::with_capacity(files.len() + 1);

        let time = loaders::read_channel_column(first, self.time_window, self.encoding)?;
        header.push(self.time_label.clone());
        columns.push(time.values);

        let mut expected_len = None;
        for path in files {
            let column = loaders::read_channel_column(path, self.value_window, self.encoding)?;
            match expected_len {
                None => expected_len = Some(column.len()),
                Some(len) if len != column.len() => log::warn!(
                    "{}: {} rows, first channel had {}",
                    path.display(),
                    column.len(),
                    len
                ),
                Some(_) => {}
            }
            header.push(channel_label(path));
            columns.push(column.values);
        }

        let mut table = Table::from_columns(columns);
        table.rows.insert(0, header);
        Ok(table)
    }

    /// Date-based file name not yet used in the output or archive directory.
    pub fn output_name(&self, date: NaiveDate) -> Result<String> {
        let mut stamp = String::new();
        write!(stamp, "{}", date.format(&self.date_format))
            .map_err(|_| MergeError::DateFormat(self.date_format.clone()))?;
        let base = format!("{}{}", stamp, self.log_suffix);

        let mut taken = naming::existing_names(&self.output_dir).map_err(|e| MergeError::ListDir {
            path: self.output_dir.clone(),
            source: e,
        })?;
        taken.extend(
            naming::existing_names(&self.archive_dir).map_err(|e| MergeError::ListDir {
                path: self.archive_dir.clone(),
                source: e,
            })?,
        );

        Ok(naming::first_free(&taken, |n| naming::counter_prefixed(&base, n)))
    }

    /// Merge one source directory.
    ///
    /// Source files are deleted only after both the primary table and its
    /// archival copy are written. An empty directory is a no-op.
    pub fn merge_directory(&self, dir: &Path, date: NaiveDate) -> Result<MergeOutcome> {
        self.merge_directory_with(dir, date, |_| Ok(()))
    }

    /// Like [`merge_directory`](Self::merge_directory), with `guard` run on the
    /// built table before anything is written. A rejection leaves the source
    /// files in place.
    pub fn merge_directory_with<F>(&self, dir: &Path, date: NaiveDate, guard: F) -> Result<MergeOutcome>
    where
        F: Fn(&Table) -> std::result::Result<(), String>,
    {
        let files = self.channel_files(dir)?;
        if files.is_empty() {
            log::warn!("no .{} files found in {}", self.extension, dir.display());
            return Ok(MergeOutcome::NoInput);
        }

        let table = self.build_table(&files)?;
        guard(&table).map_err(|reason| MergeError::Rejected {
            path: dir.to_path_buf(),
            reason,
        })?;

        let name = self.output_name(date)?;
        let output = self.output_dir.join(&name);
        let archive = self.archive_dir.join(&name);

        writers::write_table_csv(&output, &table)?;
        writers::copy_verbatim(&output, &archive)?;

        for path in &files {
            fs::remove_file(path).map_err(|e| MergeError::Delete {
                path: path.clone(),
                source: e,
            })?;
        }

        let channels: Vec<String> = table.header().iter().skip(1).cloned().collect();
        log::info!(
            "merged {} channels from {} into {} (source files removed)",
            channels.len(),
            dir.display(),
            name
        );

        Ok(MergeOutcome::Merged(MergeReport {
            source_dir: dir.to_path_buf(),
            output,
            archive,
            channels,
            rows: table.height().saturating_sub(1),
        }))
    }

    /// Merge every directory independently; one failure does not stop the rest.
    pub fn merge_sources(&self, dirs: &[PathBuf], date: NaiveDate) -> MergeSummary {
        self.merge_sources_with(dirs, date, |_| Ok(()))
    }

    /// [`merge_sources`](Self::merge_sources) with a per-directory guard.
    pub fn merge_sources_with<F>(&self, dirs: &[PathBuf], date: NaiveDate, guard: F) -> MergeSummary
    where
        F: Fn(&Table) -> std::result::Result<(), String>,
    {
        let mut summary = MergeSummary::default();
        for dir in dirs {
            let result = self.merge_directory_with(dir, date, &guard);
            if let Err(e) = &result {
                log::error!("merge of {} failed: {}", dir.display(), e);
            }
            summary.results.push((dir.clone(), result));
        }
        summary
    }
}

/// Channel label: the file name without its extension.
fn channel_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use tempfile::TempDir;

    const PREAMBLE_LINES: usize = 7;

    /// Instrument-style dump: 7 preamble lines, a header line, then the
    /// time axis header repeated, then `rows` data lines.
    fn write_dump(dir: &Path, name: &str, rows: usize, offset: f64) -> PathBuf {
        let encoding = loaders::resolve_encoding("Shift_JIS").unwrap();
        let mut text = String::new();
        for i in 0..PREAMBLE_LINES {
            text.push_str(&format!("\"メモ{}\",\"\"\n", i));
        }
        text.push_str("\"時間\",\"CH1\"\n");
        text.push_str("Time,Value\n");
        for i in 0..rows {
            text.push_str(&format!("{:.3},{:.2}\n", i as f64 * 0.001, offset + i as f64));
        }
        let (bytes, _, _) = encoding.encode(&text);
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn setup() -> (TempDir, PathBuf, Workspace, PipelineConfig) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("HIOKI8847");
        fs::create_dir_all(&source).unwrap();
        let ws = Workspace::new(temp_dir.path().join("base"), &PathsConfig::default());
        ws.ensure().unwrap();

        // Time and values share one window in the synthetic dumps
        let mut config = PipelineConfig::default();
        config.import.time_skip_rows = 8;
        config.import.value_skip_rows = 8;

        (temp_dir, source, ws, config)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 18).unwrap()
    }

    #[test]
    fn test_build_table_shape_and_names() {
        let (_tmp, source, ws, config) = setup();
        write_dump(&source, "0001HEL_TOP.CSV", 5, 0.0);
        write_dump(&source, "0002BICYCLE.CSV", 5, 100.0);
        write_dump(&source, "0003BASEBALL.CSV", 5, 200.0);

        let merger = TableMerger::new(&config, &ws).unwrap();
        let files = merger.channel_files(&source).unwrap();
        let table = merger.build_table(&files).unwrap();

        assert_eq!(table.height(), 6);
        assert_eq!(table.width(), 4);
        assert_eq!(
            table.header(),
            &["Time", "0001HEL_TOP", "0002BICYCLE", "0003BASEBALL"]
        );
        assert_eq!(table.cell(1, 0), "0.000");
        assert_eq!(table.cell(5, 2), "104.00");
    }

    #[test]
    fn test_build_table_respects_row_limit() {
        let (_tmp, source, ws, mut config) = setup();
        config.import.max_rows = 3;
        write_dump(&source, "A.CSV", 10, 0.0);

        let merger = TableMerger::new(&config, &ws).unwrap();
        let files = merger.channel_files(&source).unwrap();
        let table = merger.build_table(&files).unwrap();

        assert_eq!(table.height(), 4);
    }

    #[test]
    fn test_merge_directory_writes_archives_and_deletes() {
        let (_tmp, source, ws, config) = setup();
        let a = write_dump(&source, "A.CSV", 5, 0.0);
        let b = write_dump(&source, "B.CSV", 5, 1.0);

        let merger = TableMerger::new(&config, &ws).unwrap();
        let outcome = merger.merge_directory(&source, date()).unwrap();

        let report = match outcome {
            MergeOutcome::Merged(report) => report,
            MergeOutcome::NoInput => panic!("expected a merge"),
        };
        assert_eq!(report.rows, 5);
        assert_eq!(report.channels, vec!["A", "B"]);
        assert_eq!(report.output, ws.csv.join("2024-04-18_InspectionLOG.CSV"));
        assert_eq!(fs::read(&report.output).unwrap(), fs::read(&report.archive).unwrap());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_rejected_merge_keeps_sources() {
        let (_tmp, source, ws, config) = setup();
        let a = write_dump(&source, "0001HEL_TOP.CSV", 5, 0.0);

        let merger = TableMerger::new(&config, &ws).unwrap();
        let err = merger
            .merge_directory_with(&source, date(), |table| {
                assert_eq!(table.header(), &["Time", "0001HEL_TOP"]);
                Err("template missing".to_string())
            })
            .unwrap_err();

        assert!(matches!(err, MergeError::Rejected { ref reason, .. } if reason == "template missing"));
        assert!(a.exists());
        assert!(naming::existing_names(&ws.csv).unwrap().is_empty());
        assert!(naming::existing_names(&ws.archive).unwrap().is_empty());
    }

    #[test]
    fn test_second_run_same_day_gets_prefix() {
        let (_tmp, source, ws, config) = setup();
        let merger = TableMerger::new(&config, &ws).unwrap();

        write_dump(&source, "A.CSV", 5, 0.0);
        let first = merger.merge_directory(&source, date()).unwrap();
        write_dump(&source, "C.CSV", 5, 0.0);
        let second = merger.merge_directory(&source, date()).unwrap();

        let (MergeOutcome::Merged(first), MergeOutcome::Merged(second)) = (first, second) else {
            panic!("expected two merges");
        };
        assert_ne!(first.output, second.output);
        assert_eq!(
            second.output.file_name().unwrap(),
            "1-2024-04-18_InspectionLOG.CSV"
        );
        assert_eq!(first.channels, vec!["A"]);
        assert!(first.output.exists());
    }

    #[test]
    fn test_empty_directory_is_noop() {
        let (_tmp, source, ws, config) = setup();
        let other = source.join("notes.txt");
        fs::write(&other, "keep me").unwrap();

        let merger = TableMerger::new(&config, &ws).unwrap();
        let outcome = merger.merge_directory(&source, date()).unwrap();

        assert_eq!(outcome, MergeOutcome::NoInput);
        assert!(other.exists());
        assert!(naming::existing_names(&ws.csv).unwrap().is_empty());
        assert!(naming::existing_names(&ws.archive).unwrap().is_empty());
    }

    #[test]
    fn test_merge_sources_isolates_failures() {
        let (tmp, source, ws, config) = setup();
        write_dump(&source, "A.CSV", 5, 0.0);
        let missing = tmp.path().join("not-mounted");

        let merger = TableMerger::new(&config, &ws).unwrap();
        let summary = merger.merge_sources(&[missing.clone(), source.clone()], date());

        assert!(summary.any_produced());
        assert_eq!(summary.failures().len(), 1);
        assert_eq!(summary.failures()[0].0, missing.as_path());
    }

    #[test]
    fn test_discover_sources_filters_absent() {
        let (tmp, source, _ws, _config) = setup();
        let found = discover_sources(&[tmp.path().join("S"), source.clone()]);
        assert_eq!(found, vec![source]);
    }
}
