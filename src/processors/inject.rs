//! Categorized injection of reshaped rows into report workbooks.
//!
//! Rows are classified by keyword, the template of the dominant category is
//! opened, and each row is appended to its category's worksheet below the
//! last populated row. The populated workbook is saved under a fresh name in
//! the output directory; the template itself is never modified.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use umya_spreadsheet::Worksheet;

use super::categorize::{self, Classifier, TemplateChoice};
use crate::config::{InjectConfig, PipelineConfig};
use crate::core::loaders;
use crate::core::naming;
use crate::core::workspace::Workspace;

/// Errors that can occur during injection.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("template not found: {0}")]
    MissingTemplate(PathBuf),

    #[error("workbook error in '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("failed to list '{path}': {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for injection operations.
pub type Result<T> = std::result::Result<T, InjectError>;

/// Minimal worksheet surface the append logic needs. Rows and columns are 1-based.
pub trait ReportSheet {
    fn is_blank(&self, col: u32, row: u32) -> bool;
    fn last_row(&self) -> u32;
    fn write_text(&mut self, col: u32, row: u32, value: &str);
    fn write_number(&mut self, col: u32, row: u32, value: f64);
}

impl ReportSheet for Worksheet {
    fn is_blank(&self, col: u32, row: u32) -> bool {
        self.get_cell((col, row))
            .map(|cell| cell.get_value().trim().is_empty())
            .unwrap_or(true)
    }

    fn last_row(&self) -> u32 {
        self.get_highest_row()
    }

    fn write_text(&mut self, col: u32, row: u32, value: &str) {
        self.get_cell_mut((col, row)).set_value_string(value);
    }

    fn write_number(&mut self, col: u32, row: u32, value: f64) {
        self.get_cell_mut((col, row)).set_value_number(value);
    }
}

/// First row at or after `from` whose `col` is blank; one past the last row
/// when every scanned row is populated.
pub fn next_free_row<S: ReportSheet + ?Sized>(sheet: &S, col: u32, from: u32) -> u32 {
    let last = sheet.last_row();
    (from..=last)
        .find(|&row| sheet.is_blank(col, row))
        .unwrap_or_else(|| last.max(from.saturating_sub(1)) + 1)
}

/// Insertion point for the first appended row: the scan starts below the header rows.
pub fn find_insert_row<S: ReportSheet + ?Sized>(sheet: &S, col: u32, header_rows: u32) -> u32 {
    next_free_row(sheet, col, header_rows + 1)
}

/// Write `fields` left to right from `start_col`. The first field is the
/// identifier and always stays text; blank fields leave the cell untouched.
/// Returns the number of cells written.
pub fn write_row<S: ReportSheet + ?Sized>(
    sheet: &mut S,
    row: u32,
    start_col: u32,
    fields: &[String],
) -> usize {
    let mut written = 0;
    for (offset, field) in fields.iter().enumerate() {
        let value = field.trim();
        if value.is_empty() {
            continue;
        }
        let col = start_col + offset as u32;
        match value.parse::<f64>() {
            Ok(number) if offset > 0 && number.is_finite() => sheet.write_number(col, row, number),
            _ => sheet.write_text(col, row, value),
        }
        written += 1;
    }
    written
}

/// Outcome of one injection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectReport {
    pub output: PathBuf,
    pub template: PathBuf,
    /// No row matched a category; the default template was used
    pub degraded: bool,
    pub rows_written: usize,
    /// Output prefixes of the categories that received rows, sorted
    pub categories_used: Vec<String>,
    /// Rows without a category or whose sheet is absent from the template
    pub skipped: usize,
}

/// Routes reshaped rows into category worksheets.
#[derive(Debug, Clone)]
pub struct Injector {
    config: InjectConfig,
    classifier: Classifier,
    input_prefix: String,
    templates_dir: PathBuf,
    output_dir: PathBuf,
}

impl Injector {
    pub fn new(config: &PipelineConfig, workspace: &Workspace) -> Self {
        Self {
            config: config.inject.clone(),
            classifier: Classifier::new(config.inject.categories.clone()),
            input_prefix: config.layout.output_prefix.clone(),
            templates_dir: workspace.templates.clone(),
            output_dir: workspace.excel.clone(),
        }
    }

    /// Reshaped tables in `dir`: names starting with the reshape prefix, `.csv` in any case.
    pub fn reshaped_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| InjectError::ListDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                path.is_file()
                    && name.starts_with(&self.input_prefix)
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Concatenate the rows of every readable file; unreadable files are skipped.
    pub fn load_reshaped_rows(&self, files: &[PathBuf]) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for file in files {
            match loaders::load_table_csv(file) {
                Ok(table) => {
                    log::info!("loaded {} rows from {}", table.height(), file.display());
                    rows.extend(table.rows);
                }
                Err(e) => log::warn!("skipping {}: {}", file.display(), e),
            }
        }
        rows
    }

    fn identifier<'a>(&self, row: &'a [String]) -> &'a str {
        row.get(self.config.identifier_column)
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Template of the rule matching the most identifiers.
    ///
    /// Fails with `MissingTemplate` when no rule is configured or the chosen
    /// file is absent, so callers can check before anything is written.
    pub fn resolve_template<'a, I>(&self, identifiers: I) -> Result<(TemplateChoice, PathBuf)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.classifier.rules().is_empty() {
            return Err(InjectError::MissingTemplate(self.templates_dir.clone()));
        }
        let counts = self.classifier.category_counts(identifiers);
        let choice = self.classifier.choose_template(&counts);
        let template = self
            .templates_dir
            .join(&self.classifier.rules()[choice.rule_index].template);
        if !template.is_file() {
            log::error!("template not found: {}", template.display());
            return Err(InjectError::MissingTemplate(template));
        }
        Ok((choice, template))
    }

    /// Inject `rows` into a copy of the chosen template and save it.
    pub fn inject_rows(&self, rows: &[Vec<String>]) -> Result<InjectReport> {
        let (choice, template) = self.resolve_template(rows.iter().map(|row| self.identifier(row)))?;
        if choice.degraded {
            log::warn!(
                "no row matched a category; using default template {}",
                template.display()
            );
        } else {
            log::info!("using template {}", template.display());
        }

        let mut book = umya_spreadsheet::reader::xlsx::read(&template).map_err(|e| {
            InjectError::Workbook {
                path: template.clone(),
                message: e.to_string(),
            }
        })?;

        let start_col = self.config.start_col.max(1);
        let first_row = self.config.header_rows + 1;
        let mut cursors: HashMap<&str, u32> = HashMap::new();
        let mut missing_sheets: HashSet<&str> = HashSet::new();
        let mut used: BTreeSet<&str> = BTreeSet::new();
        let mut rows_written = 0;
        let mut skipped = 0;

        for row in rows {
            let identifier = self.identifier(row);
            let Some(index) = self.classifier.classify(identifier) else {
                log::debug!("no category for '{}'", identifier);
                skipped += 1;
                continue;
            };
            let rule = &self.classifier.rules()[index];

            let Some(sheet) = book.get_sheet_by_name_mut(&rule.sheet) else {
                if missing_sheets.insert(rule.sheet.as_str()) {
                    log::warn!(
                        "sheet '{}' not found in {}; skipping its rows",
                        rule.sheet,
                        template.display()
                    );
                }
                skipped += 1;
                continue;
            };

            let from = cursors.get(rule.sheet.as_str()).copied().unwrap_or(first_row);
            let target = next_free_row(&*sheet, start_col, from);
            let fields = row.get(self.config.identifier_column..).unwrap_or(&[]);
            write_row(sheet, target, start_col, fields);
            cursors.insert(rule.sheet.as_str(), target + 1);

            used.insert(rule.prefix.as_str());
            rows_written += 1;
        }

        for sheet in cursors.keys() {
            log::info!("appended rows to sheet '{}'", sheet);
        }

        let categories_used: Vec<String> = used.iter().map(|s| s.to_string()).collect();
        let output = self.output_path(&categories_used)?;
        umya_spreadsheet::writer::xlsx::write(&book, &output).map_err(|e| InjectError::Workbook {
            path: output.clone(),
            message: e.to_string(),
        })?;

        log::info!(
            "saved {} ({} rows, {} skipped)",
            output.display(),
            rows_written,
            skipped
        );

        Ok(InjectReport {
            output,
            template,
            degraded: choice.degraded,
            rows_written,
            categories_used,
            skipped,
        })
    }

    /// Load the given reshaped files and inject their rows.
    pub fn inject_files(&self, files: &[PathBuf]) -> Result<InjectReport> {
        let rows = self.load_reshaped_rows(files);
        self.inject_rows(&rows)
    }

    fn output_path(&self, categories_used: &[String]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| InjectError::CreateDirectory {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let taken = naming::existing_names(&self.output_dir).map_err(|e| InjectError::ListDir {
            path: self.output_dir.clone(),
            source: e,
        })?;

        let base = categorize::output_base_name(
            categories_used,
            &self.config.output_suffix,
            &self.config.fallback_name,
        );
        let name = naming::first_free(&taken, |n| {
            naming::numbered_suffix(&base, &self.config.extension, 0, n)
        });
        Ok(self.output_dir.join(name))
    }
}
