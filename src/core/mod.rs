//! Core data types and I/O operations.

pub mod loaders;
pub mod naming;
pub mod table;
pub mod transforms;
pub mod workspace;
pub mod writers;

pub use loaders::{ChannelColumn, ColumnWindow, LoaderError};
pub use table::Table;
pub use workspace::Workspace;
pub use writers::WriteError;
