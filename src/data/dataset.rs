//! Dataset assembly and Burn integration
//!
//! [`DataManager`] runs the processing stages over the raw tables and serves
//! the persisted results back as row-aligned arrays.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::{s, Array1, Array2, Array3, Axis};
use std::time::Instant;

use crate::data::store::ArtifactStore;
use crate::data::table::{GameTable, TARGET};
use crate::features::{
    ColumnManifest, DateEncoder, EloConfig, EventFeatureAssembler, HistoryDataset,
    HistoryTensorBuilder, HomeLocationResolver, QuantileScaler, RatingEngine,
    TemporalFeatureBuilder,
};
use crate::{Config, NbaError, Result};

/// Run one pipeline stage and log how long it took
fn timed<T>(stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let out = f()?;
    log::info!("{} took {:.2?}", stage, start.elapsed());
    Ok(out)
}

/// Drives the processing stages against one data directory
pub struct DataManager {
    config: Config,
    store: ArtifactStore,
}

impl DataManager {
    pub fn new(config: Config) -> Self {
        let store = ArtifactStore::new(&config.data.data_path);
        DataManager { config, store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Rebuild the processed tables, manifests and feature table from the raw
    /// team and player files.
    pub fn update_raw_datasets(&self) -> Result<ColumnManifest> {
        let data = &self.config.data;
        let features_config = &self.config.features;

        let mut team = timed("Loading team table", || {
            let table = GameTable::read_delimited(self.store.raw_table_path(&data.team_table), data.row_limit)?;
            Ok(table.sorted_by_date())
        })?;
        let player = timed("Loading player table", || {
            let table = GameTable::read_delimited(self.store.raw_table_path(&data.player_table), data.row_limit)?;
            Ok(table.sorted_by_date())
        })?;
        log::info!("Loaded {} team rows and {} player rows", team.len(), player.len());

        let mut manifest = ColumnManifest::default();
        let encoder = DateEncoder::new();
        let added = timed("Encoding dates", || encoder.encode(&mut team))?;
        manifest = manifest.with_features(added);
        let added = timed("Days since last game", || encoder.days_since_last_game(&mut team))?;
        manifest = manifest.with_features(added);
        let added = timed("Resolving home venues", || HomeLocationResolver::new().assign(&mut team))?;
        manifest = manifest.with_features(added);

        let elo = EloConfig {
            starting_rating: features_config.starting_rating,
            multiplier: features_config.rating_multiplier,
        };
        for &rating_type in &features_config.rating_types {
            let engine = RatingEngine::new(elo, rating_type);
            let added = timed(&format!("Computing {} ratings", rating_type), || engine.assign(&mut team))?;
            manifest = manifest.with_features(added);
        }

        let base_columns = manifest.initial_team_data_columns.clone();
        for &window in &features_config.rolling_windows {
            let builder = TemporalFeatureBuilder::new(window);
            let added = timed(&format!("Rolling window {}", window), || {
                builder.build(&mut team, &base_columns)
            })?;
            manifest = manifest.with_features(added);
        }

        let assembler = EventFeatureAssembler::new();
        let mut features = timed("Assembling event features", || assembler.build(&team, &manifest))?;
        timed("Attaching labels", || assembler.attach_labels(&mut features, &team))?;

        let scaled_columns = manifest.scaled_columns();
        let scaler = QuantileScaler::new();
        timed("Scaling", || {
            let in_team = scaler.scale(&mut team, &scaled_columns)?;
            let in_features = scaler.scale(&mut features, &scaled_columns)?;
            log::debug!("Scaled {} team columns and {} feature columns", in_team, in_features);
            Ok(())
        })?;

        timed("Saving artifacts", || {
            self.store.save_processed_table(&data.team_table, &team)?;
            self.store.save_processed_table(&data.player_table, &player)?;
            self.store.save_manifest(&manifest)?;
            self.store.save_features(&features)
        })?;

        log::info!(
            "Processed {} feature rows: {} standalone, {} diff columns",
            features.len(),
            manifest.standalone_feature_columns.len(),
            manifest.diff_feature_cols.len()
        );
        Ok(manifest)
    }

    /// Build and persist the per-team and combined history tensors from the
    /// processed team table. Returns the combined tensors.
    pub fn build_past_n_game_dataset(&self, history_length: usize, transpose: bool) -> Result<HistoryDataset> {
        if history_length == 0 {
            return Err(NbaError::Config("history_length must be at least 1".into()));
        }
        let mut team = timed("Loading processed team table", || {
            Ok(self.store.load_processed_table(&self.config.data.team_table)?.sorted_by_date())
        })?;
        let manifest = self.store.load_manifest()?;
        let base_columns = &manifest.initial_team_data_columns;

        let builder = HistoryTensorBuilder::new(history_length, transpose);
        timed("Mirroring opponents", || builder.mirror_opponents(&mut team, base_columns))?;
        let dataset = timed("Building history windows", || builder.build_history(&team, base_columns))?;
        self.store
            .save_history(&self.store.history_path(history_length, transpose), &dataset)?;

        let combined = timed("Combining matchups", || builder.combine_history(&team, &dataset))?;
        self.store
            .save_history(&self.store.combined_history_path(history_length, transpose), &combined)?;
        Ok(combined)
    }

    /// Event features, labels and (optionally) combined history tensors,
    /// row-aligned with the persisted feature table.
    pub fn get_labeled_data(
        &self,
        history_length: usize,
        transpose: bool,
        get_history_data: bool,
    ) -> Result<LabeledData> {
        let features = self.store.load_features()?;
        let manifest = self.store.load_manifest()?;
        let event_columns = manifest.event_feature_columns();
        let rows = features.len();

        let mut event = Array2::<f64>::zeros((rows, event_columns.len()));
        for (j, name) in event_columns.iter().enumerate() {
            for (i, value) in features.column(name)?.iter().enumerate() {
                if !value.is_nan() {
                    event[[i, j]] = *value;
                }
            }
        }
        let labels = Array1::from(features.column(TARGET)?.to_vec());

        let history = if get_history_data {
            let combined = self
                .store
                .load_history(&self.store.combined_history_path(history_length, transpose))?;
            stack_history(&features, &combined)?
        } else {
            Array3::zeros((rows, 0, 0))
        };

        log::info!(
            "Labeled data: {} rows, {} event features, history {:?}",
            rows,
            event_columns.len(),
            history.shape()
        );
        Ok(LabeledData {
            history,
            event,
            labels,
            event_columns,
        })
    }
}

/// Combined tensor of each feature row, stacked on a leading row axis
fn stack_history(features: &GameTable, combined: &HistoryDataset) -> Result<Array3<f64>> {
    let mut history: Option<Array3<f64>> = None;
    for (i, r) in features.records().iter().enumerate() {
        let matrix = combined
            .get(&r.team_tag)
            .and_then(|games| games.get(&r.game_key))
            .ok_or_else(|| NbaError::MissingHistory {
                team: r.team_tag.clone(),
                game_key: r.game_key.clone(),
            })?;
        let out = history.get_or_insert_with(|| {
            Array3::zeros((features.len(), matrix.nrows(), matrix.ncols()))
        });
        if out.shape()[1..] != *matrix.shape() {
            return Err(NbaError::Shape(format!(
                "history for {} in game {} is {:?}, expected {:?}",
                r.team_tag,
                r.game_key,
                matrix.shape(),
                &out.shape()[1..]
            )));
        }
        out.slice_mut(s![i, .., ..]).assign(matrix);
    }
    Ok(history.unwrap_or_else(|| Array3::zeros((0, 0, 0))))
}

/// Model inputs, one row per directed pairing in chronological order
#[derive(Debug, Clone)]
pub struct LabeledData {
    /// `[rows, history_length, features]`, or `[rows, features, history_length]`
    /// when transposed; `[rows, 0, 0]` when history was not requested
    pub history: Array3<f64>,
    /// `[rows, event features]`
    pub event: Array2<f64>,
    /// `[rows]`, 1 for a win
    pub labels: Array1<f64>,
    /// Column names of `event`
    pub event_columns: Vec<String>,
}

impl LabeledData {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    /// Split into train/validation, keeping row order so validation games come
    /// after training games
    pub fn split(self, train_ratio: f32) -> (Self, Self) {
        let split_idx = ((self.len() as f32 * train_ratio) as usize).min(self.len());
        let part = |range: std::ops::Range<usize>| LabeledData {
            history: self.history.slice(s![range.clone(), .., ..]).to_owned(),
            event: self.event.slice(s![range.clone(), ..]).to_owned(),
            labels: self.labels.slice(s![range]).to_owned(),
            event_columns: self.event_columns.clone(),
        };
        (part(0..split_idx), part(split_idx..self.len()))
    }
}

/// One labeled row, flattened for batching
#[derive(Debug, Clone)]
pub struct LabeledSample {
    /// Row-major history matrix
    pub history: Vec<f32>,
    pub history_shape: [usize; 2],
    pub event: Vec<f32>,
    pub label: f32,
}

impl Dataset<LabeledSample> for LabeledData {
    fn get(&self, index: usize) -> Option<LabeledSample> {
        if index >= self.len() {
            return None;
        }
        let history = self.history.index_axis(Axis(0), index);
        Some(LabeledSample {
            history: history.iter().map(|v| *v as f32).collect(),
            history_shape: [history.nrows(), history.ncols()],
            event: self.event.row(index).iter().map(|v| *v as f32).collect(),
            label: self.labels[index] as f32,
        })
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Batch of labeled rows
#[derive(Debug, Clone)]
pub struct LabeledBatch<B: Backend> {
    /// [batch, history rows, history cols]
    pub history: Tensor<B, 3>,
    /// [batch, event features]
    pub event: Tensor<B, 2>,
    /// [batch]
    pub label: Tensor<B, 1>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct LabeledBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> LabeledBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        LabeledBatcher { device }
    }
}

impl<B: Backend> Batcher<B, LabeledSample, LabeledBatch<B>> for LabeledBatcher<B> {
    fn batch(&self, items: Vec<LabeledSample>, _device: &B::Device) -> LabeledBatch<B> {
        let batch_size = items.len();
        let [rows, cols] = items.first().map(|s| s.history_shape).unwrap_or([0, 0]);
        let event_dim = items.first().map(|s| s.event.len()).unwrap_or(0);

        let mut history_data = Vec::with_capacity(batch_size * rows * cols);
        let mut event_data = Vec::with_capacity(batch_size * event_dim);
        let mut label_data = Vec::with_capacity(batch_size);
        for sample in &items {
            history_data.extend_from_slice(&sample.history);
            event_data.extend_from_slice(&sample.event);
            label_data.push(sample.label);
        }

        let history = Tensor::<B, 1>::from_floats(history_data.as_slice(), &self.device)
            .reshape([batch_size, rows, cols]);
        let event = Tensor::<B, 1>::from_floats(event_data.as_slice(), &self.device)
            .reshape([batch_size, event_dim]);
        let label = Tensor::<B, 1>::from_floats(label_data.as_slice(), &self.device);

        LabeledBatch {
            history,
            event,
            label,
        }
    }
}
