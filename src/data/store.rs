//! Persisted pipeline artifacts
//!
//! Every intermediate lives under one data directory: processed tables and the
//! feature table as pipe-delimited text, history tensors as bincode, and the
//! column manifest as one JSON list per file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::table::GameTable;
use crate::features::columns::ColumnManifest;
use crate::features::history::HistoryDataset;
use crate::{NbaError, Result};

const FEATURES_FILE: &str = "features.csv";
const KEY_COLUMNS_FILE: &str = "key_columns.json";
const STANDALONE_FILE: &str = "standalone_feature_columns.json";
const DIFF_FILE: &str = "diff_feature_cols.json";
const TEAM_COLUMNS_FILE: &str = "initial_team_column_list.json";
const PLAYER_COLUMNS_FILE: &str = "initial_player_column_list.json";

/// Reads and writes artifacts under a data directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.csv", table))
    }

    pub fn processed_table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}_processed.csv", table))
    }

    pub fn features_path(&self) -> PathBuf {
        self.root.join(FEATURES_FILE)
    }

    pub fn history_path(&self, history_length: usize, transpose: bool) -> PathBuf {
        self.root
            .join(format!("past_n_game_dataset_{}_{}.bin", history_length, transpose))
    }

    pub fn combined_history_path(&self, history_length: usize, transpose: bool) -> PathBuf {
        self.root.join(format!(
            "past_n_game_dataset_combined_{}_{}.bin",
            history_length, transpose
        ))
    }

    pub fn save_processed_table(&self, name: &str, table: &GameTable) -> Result<()> {
        let path = self.processed_table_path(name);
        table.write_delimited(&path)?;
        log::info!("Saved {} rows to {}", table.len(), path.display());
        Ok(())
    }

    pub fn load_processed_table(&self, name: &str) -> Result<GameTable> {
        GameTable::read_delimited(self.processed_table_path(name), None)
    }

    pub fn save_features(&self, features: &GameTable) -> Result<()> {
        let path = self.features_path();
        features.write_delimited(&path)?;
        log::info!("Saved {} feature rows to {}", features.len(), path.display());
        Ok(())
    }

    pub fn load_features(&self) -> Result<GameTable> {
        GameTable::read_delimited(self.features_path(), None)
    }

    pub fn save_history(&self, path: &Path, dataset: &HistoryDataset) -> Result<()> {
        self.ensure_root()?;
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, dataset)?;
        writer.flush()?;
        log::info!("Saved history tensors for {} teams to {}", dataset.len(), path.display());
        Ok(())
    }

    pub fn load_history(&self, path: &Path) -> Result<HistoryDataset> {
        let reader = BufReader::new(open_existing(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Write the five manifest lists
    pub fn save_manifest(&self, manifest: &ColumnManifest) -> Result<()> {
        self.write_json(KEY_COLUMNS_FILE, &manifest.key_columns)?;
        self.write_json(STANDALONE_FILE, &manifest.standalone_feature_columns)?;
        self.write_json(DIFF_FILE, &manifest.diff_feature_cols)?;
        self.write_json(TEAM_COLUMNS_FILE, &manifest.initial_team_data_columns)?;
        self.write_json(PLAYER_COLUMNS_FILE, &manifest.initial_player_data_columns)?;
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ColumnManifest> {
        Ok(ColumnManifest {
            key_columns: self.read_json(KEY_COLUMNS_FILE)?,
            standalone_feature_columns: self.read_json(STANDALONE_FILE)?,
            diff_feature_cols: self.read_json(DIFF_FILE)?,
            initial_team_data_columns: self.read_json(TEAM_COLUMNS_FILE)?,
            initial_player_data_columns: self.read_json(PLAYER_COLUMNS_FILE)?,
        })
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        self.ensure_root()?;
        let mut writer = BufWriter::new(File::create(self.root.join(file))?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let reader = BufReader::new(open_existing(&self.root.join(file))?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn open_existing(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(NbaError::ArtifactNotFound(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}
