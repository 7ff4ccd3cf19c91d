//! Pipeline stages.

pub mod categorize;
pub mod inject;
pub mod merge;
pub mod reshape;
pub mod sorting;
pub mod split;

// Re-export key types for convenience
pub use categorize::{output_base_name, Classifier, TemplateChoice};
pub use inject::{find_insert_row, write_row, InjectError, InjectReport, Injector, ReportSheet};
pub use merge::{discover_sources, MergeError, MergeOutcome, MergeReport, MergeSummary, TableMerger};
pub use reshape::{LayoutNote, ReshapeEngine, ReshapeError, Reshaped};
pub use sorting::{SampleId, SampleOrder, SortKey, SortingError};
pub use split::{CategorySplitter, SplitError};
