//! Bench instrument inspection pipeline.
//!
//! This crate provides tools for:
//! - Merging per-channel instrument dumps into one wide table per run
//! - Reshaping merged tables into one sorted row per test sample
//! - Routing sample rows into category worksheets of report workbooks
//! - Per-category CSV export and per-channel charts
//!
//! # Example
//!
//! ```no_run
//! use inspection_pipeline::{core::Workspace, processors::ReshapeEngine, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let workspace = Workspace::from_config(&config.paths);
//! let engine = ReshapeEngine::new(&config.layout, &config.sort).unwrap();
//! for (input, result) in engine.reshape_directory(&workspace).unwrap() {
//!     println!("{}: {:?}", input.display(), result.is_ok());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    CategoryRule, ImportConfig, InjectConfig, LayoutConfig, PathsConfig, PipelineConfig, SortConfig,
};
pub use core::{Table, Workspace};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
