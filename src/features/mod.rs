//! Feature extraction
//!
//! Enrichment stages over the team table, the event feature table, scaling and
//! history tensors.

pub mod columns;
pub mod elo;
pub mod event;
pub mod history;
pub mod scaling;
pub mod temporal;
pub mod venue;

pub use columns::{ColumnManifest, FeatureSet};
pub use elo::{EloConfig, RatingEngine, TeamRating};
pub use event::EventFeatureAssembler;
pub use history::{HistoryDataset, HistoryTensorBuilder};
pub use scaling::QuantileScaler;
pub use temporal::{DateEncoder, TemporalFeatureBuilder};
pub use venue::HomeLocationResolver;
