//! Resolved directory layout for one run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

/// Absolute-or-relative directories every stage reads from or writes to.
///
/// Built once from configuration and handed to each component; nothing below
/// the CLI looks at the process environment or working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub base: PathBuf,
    /// Merged tables
    pub csv: PathBuf,
    /// Archival copies of merged tables
    pub archive: PathBuf,
    pub templates: PathBuf,
    /// Generated workbooks
    pub excel: PathBuf,
    /// Reshaped tables
    pub pivot: PathBuf,
    pub charts: PathBuf,
}

impl Workspace {
    /// Resolve sub-directories below `base`.
    pub fn new(base: impl Into<PathBuf>, paths: &PathsConfig) -> Self {
        let base = base.into();
        let join = |name: &str| {
            if name.is_empty() || name == "." {
                base.clone()
            } else {
                base.join(name)
            }
        };

        Self {
            csv: join(&paths.csv),
            archive: join(&paths.archive),
            templates: join(&paths.templates),
            excel: join(&paths.excel),
            pivot: join(&paths.pivot),
            charts: join(&paths.charts),
            base,
        }
    }

    /// Resolve against the configured base directory.
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(paths.base_dir.clone(), paths)
    }

    /// Create any missing directory of the contract. Returns the ones created.
    pub fn ensure(&self) -> io::Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in self.required() {
            if dir.is_dir() {
                log::debug!("directory exists: {}", dir.display());
                continue;
            }
            log::warn!("directory missing, creating: {}", dir.display());
            fs::create_dir_all(dir)?;
            created.push(dir.to_path_buf());
        }
        Ok(created)
    }

    fn required(&self) -> [&Path; 5] {
        [
            self.csv.as_path(),
            self.archive.as_path(),
            self.templates.as_path(),
            self.excel.as_path(),
            self.pivot.as_path(),
        ]
    }
}
