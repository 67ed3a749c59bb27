//! Data ingestion, artifact storage and dataset assembly
//!
//! Pipe-delimited table I/O, persisted intermediates, and the pipeline that
//! turns raw box scores into labeled model inputs.

pub mod dataset;
pub mod store;
pub mod table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use dataset::{DataManager, LabeledData};
pub use store::ArtifactStore;
pub use table::{GameRecord, GameTable};
