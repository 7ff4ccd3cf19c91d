//! Configuration types for the inspection pipeline.
//!
//! Every layout constant the instrument export or the report templates rely on
//! lives here, so a new instrument firmware or template revision only needs a
//! new YAML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Directory layout below the base location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base location; the CLI may override it
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Merged tables land here
    #[serde(default = "default_csv_dir")]
    pub csv: String,

    /// Archival copies of merged tables
    #[serde(default = "default_archive_dir")]
    pub archive: String,

    /// Report templates (.xlsm)
    #[serde(default = "default_templates_dir")]
    pub templates: String,

    /// Generated workbooks
    #[serde(default = "default_excel_dir")]
    pub excel: String,

    /// Reshaped tables (`.` keeps them in the base directory)
    #[serde(default = "default_pivot_dir")]
    pub pivot: String,

    #[serde(default = "default_charts_dir")]
    pub charts: String,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_csv_dir() -> String {
    "CSV".to_string()
}

fn default_archive_dir() -> String {
    "CSV_LOG".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_excel_dir() -> String {
    "EXCEL".to_string()
}

fn default_pivot_dir() -> String {
    ".".to_string()
}

fn default_charts_dir() -> String {
    "charts".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            csv: default_csv_dir(),
            archive: default_archive_dir(),
            templates: default_templates_dir(),
            excel: default_excel_dir(),
            pivot: default_pivot_dir(),
            charts: default_charts_dir(),
        }
    }
}

/// Raw channel import window. This is a property of the instrument's export
/// format, never inferred from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Candidate source locations (removable media may be absent)
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,

    /// Channel file extension, matched case-insensitively
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Raw lines skipped before the time column's header line
    #[serde(default = "default_time_skip_rows")]
    pub time_skip_rows: usize,

    /// Raw lines skipped before the value column's header line
    #[serde(default = "default_value_skip_rows")]
    pub value_skip_rows: usize,

    /// Maximum data rows read per column
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default)]
    pub time_column: usize,

    #[serde(default = "default_value_column")]
    pub value_column: usize,

    /// WHATWG encoding label of the raw dumps
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Appended to the date to form the merged file name
    #[serde(default = "default_log_suffix")]
    pub log_suffix: String,

    /// chrono format string for the date part of the merged file name
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_source_dirs() -> Vec<PathBuf> {
    ["S:", "U:", "T:"]
        .iter()
        .map(|drive| PathBuf::from(format!("{}\\HIOKI8847", drive)))
        .collect()
}

fn default_extension() -> String {
    "CSV".to_string()
}

fn default_time_skip_rows() -> usize {
    7
}

fn default_value_skip_rows() -> usize {
    8
}

fn default_max_rows() -> usize {
    2050
}

fn default_value_column() -> usize {
    1
}

fn default_encoding() -> String {
    "Shift_JIS".to_string()
}

fn default_log_suffix() -> String {
    "_InspectionLOG.CSV".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_dirs: default_source_dirs(),
            extension: default_extension(),
            time_skip_rows: default_time_skip_rows(),
            value_skip_rows: default_value_skip_rows(),
            max_rows: default_max_rows(),
            time_column: 0,
            value_column: default_value_column(),
            encoding: default_encoding(),
            log_suffix: default_log_suffix(),
            date_format: default_date_format(),
        }
    }
}

/// Positional layout of the reshaped table.
///
/// Columns `[0, front_end)` form the front block, `[front_end, tail_start)`
/// the middle block and `[tail_start, ..)` the tail. The report template
/// expects `front ++ tail ++ middle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_front_end")]
    pub front_end: usize,

    #[serde(default = "default_tail_start")]
    pub tail_start: usize,

    /// Columns at or beyond this index are cleared
    #[serde(default = "default_trailing_clear_at")]
    pub trailing_clear_at: usize,

    /// First row of the metadata rectangle that is blanked
    #[serde(default = "default_body_clear_first_row")]
    pub body_clear_first_row: usize,

    #[serde(default = "default_body_clear_first_col")]
    pub body_clear_first_col: usize,

    /// Exclusive end column of the blanked rectangle
    #[serde(default = "default_body_clear_end_col")]
    pub body_clear_end_col: usize,

    /// Header of the shared time axis column
    #[serde(default = "default_time_label")]
    pub time_label: String,

    /// Merged tables to reshape contain this in their file name
    #[serde(default = "default_input_keyword")]
    pub input_keyword: String,

    /// Prefix of reshaped output files
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

fn default_front_end() -> usize {
    24
}

fn default_tail_start() -> usize {
    51
}

fn default_trailing_clear_at() -> usize {
    1977
}

fn default_body_clear_first_row() -> usize {
    1
}

fn default_body_clear_first_col() -> usize {
    2
}

fn default_body_clear_end_col() -> usize {
    24
}

fn default_time_label() -> String {
    "Time".to_string()
}

fn default_input_keyword() -> String {
    "InspectionLOG".to_string()
}

fn default_output_prefix() -> String {
    "Output_".to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            front_end: default_front_end(),
            tail_start: default_tail_start(),
            trailing_clear_at: default_trailing_clear_at(),
            body_clear_first_row: default_body_clear_first_row(),
            body_clear_first_col: default_body_clear_first_col(),
            body_clear_end_col: default_body_clear_end_col(),
            time_label: default_time_label(),
            input_keyword: default_input_keyword(),
            output_prefix: default_output_prefix(),
        }
    }
}

/// Sample ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    /// Category tokens in ascending sort order
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
}

fn default_priority() -> Vec<String> {
    ["HEL_TOP", "HEL_ZENGO", "HEL_SIDE", "BICYCLE", "BASEBALL", "FALLARR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

/// One routing rule: rows whose identifier contains `keyword` go to `sheet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub keyword: String,
    /// Worksheet name inside the template
    pub sheet: String,
    /// Output file name prefix
    pub prefix: String,
    /// Template file name inside the templates directory
    pub template: String,
}

impl CategoryRule {
    fn new(keyword: &str, sheet: &str, prefix: &str, template: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            sheet: sheet.to_string(),
            prefix: prefix.to_string(),
            template: template.to_string(),
        }
    }
}

/// Workbook injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectConfig {
    /// Ordered, first match wins; the first rule is the default template
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,

    /// Field of a reshaped row carrying the sample identifier
    #[serde(default = "default_identifier_column")]
    pub identifier_column: usize,

    /// 1-based worksheet column receiving the identifier
    #[serde(default = "default_start_col")]
    pub start_col: u32,

    /// Header rows above the append region
    #[serde(default = "default_header_rows")]
    pub header_rows: u32,

    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Used when no category received rows
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,

    #[serde(default = "default_workbook_extension")]
    pub extension: String,
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("HEL", "LOG_Helmet", "Helmet", "ヘルメットグラフ作成.xlsm"),
        CategoryRule::new("BICYCLE", "LOG_Bicycle", "Bicycle", "自転車帽グラフ作成.xlsm"),
        CategoryRule::new("BASEBALL", "LOG_BaseBall", "BaseBall", "野球帽グラフ作成.xlsm"),
        CategoryRule::new("FALLARR", "LOG_FallArrest", "FallAll", "安全帯グラフ作成.xlsm"),
    ]
}

fn default_identifier_column() -> usize {
    1
}

fn default_start_col() -> u32 {
    2
}

fn default_header_rows() -> u32 {
    1
}

fn default_output_suffix() -> String {
    "グラフ作成用ファイル".to_string()
}

fn default_fallback_name() -> String {
    "グラフ作成用ファイル".to_string()
}

fn default_workbook_extension() -> String {
    "xlsm".to_string()
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            identifier_column: default_identifier_column(),
            start_col: default_start_col(),
            header_rows: default_header_rows(),
            output_suffix: default_output_suffix(),
            fallback_name: default_fallback_name(),
            extension: default_workbook_extension(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub sort: SortConfig,

    #[serde(default)]
    pub inject: InjectConfig,
}

impl PipelineConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject layouts the processors cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.front_end > self.layout.tail_start {
            return Err(ConfigError::Invalid(format!(
                "layout.front_end ({}) must not exceed layout.tail_start ({})",
                self.layout.front_end, self.layout.tail_start
            )));
        }
        if self.layout.body_clear_first_col > self.layout.body_clear_end_col {
            return Err(ConfigError::Invalid(
                "layout.body_clear_first_col is past layout.body_clear_end_col".to_string(),
            ));
        }
        if self.sort.priority.is_empty() {
            return Err(ConfigError::Invalid("sort.priority is empty".to_string()));
        }
        if self.inject.categories.is_empty() {
            return Err(ConfigError::Invalid("inject.categories is empty".to_string()));
        }
        if self.inject.start_col == 0 {
            return Err(ConfigError::Invalid("inject.start_col is 1-based".to_string()));
        }
        if encoding_rs::Encoding::for_label(self.import.encoding.as_bytes()).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown encoding label '{}'",
                self.import.encoding
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.import.max_rows, 2050);
        assert_eq!(config.layout.front_end, 24);
        assert_eq!(config.layout.tail_start, 51);
        assert_eq!(config.layout.trailing_clear_at, 1977);
        assert_eq!(config.sort.priority[0], "HEL_TOP");
        assert_eq!(config.inject.categories[0].sheet, "LOG_Helmet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("layout:\n  front_end: 27\n  tail_start: 52\n").unwrap();
        assert_eq!(config.layout.front_end, 27);
        assert_eq!(config.layout.tail_start, 52);
        assert_eq!(config.layout.trailing_clear_at, 1977);
        assert_eq!(config.import.value_skip_rows, 8);
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.sort.priority = vec!["BICYCLE".to_string(), "HEL_TOP".to_string()];
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.sort.priority, config.sort.priority);
        assert_eq!(loaded.inject.categories, config.inject.categories);
    }

    #[test]
    fn test_validate_rejects_inverted_blocks() {
        let mut config = PipelineConfig::default();
        config.layout.front_end = 60;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_encoding() {
        let mut config = PipelineConfig::default();
        config.import.encoding = "klingon".to_string();
        assert!(config.validate().is_err());
    }
}
