//! Column-set metadata threaded through the pipeline
//!
//! Each enrichment stage returns the columns it produced as a [`FeatureSet`];
//! the assembler folds them into a [`ColumnManifest`] that is persisted with the
//! processed tables and reloaded by later runs.

use serde::{Deserialize, Serialize};

use crate::data::table::{BOX_SCORE_COLUMNS, KEY_COLUMNS, TARGET};

/// Suffix of opponent-relative feature columns
pub const DIFF_SUFFIX: &str = "_diff";

/// Columns a stage added to the team table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    /// Copied as-is into the event feature table
    pub standalone: Vec<String>,
    /// Also emitted as `<name>_diff` against the opponent
    pub diff: Vec<String>,
}

impl FeatureSet {
    pub fn standalone(names: Vec<String>) -> Self {
        FeatureSet {
            standalone: names,
            diff: Vec::new(),
        }
    }

    /// Columns registered both standalone and diff-eligible
    pub fn paired(names: Vec<String>) -> Self {
        FeatureSet {
            standalone: names.clone(),
            diff: names,
        }
    }
}

/// Column names shared by every stage of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnManifest {
    pub key_columns: Vec<String>,
    pub standalone_feature_columns: Vec<String>,
    pub diff_feature_cols: Vec<String>,
    /// Per-game base columns; rolling windows and history tensors draw from these
    pub initial_team_data_columns: Vec<String>,
    pub initial_player_data_columns: Vec<String>,
}

impl Default for ColumnManifest {
    fn default() -> Self {
        let player: Vec<String> = BOX_SCORE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut team = player.clone();
        team.extend(
            ["feature_home", TARGET, "days_since_last_fight"]
                .iter()
                .map(|c| c.to_string()),
        );
        ColumnManifest {
            key_columns: KEY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            standalone_feature_columns: Vec::new(),
            diff_feature_cols: Vec::new(),
            initial_team_data_columns: team,
            initial_player_data_columns: player,
        }
    }
}

impl ColumnManifest {
    /// Fold a stage's output into the manifest, skipping names already present
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        for name in features.standalone {
            if !self.standalone_feature_columns.contains(&name) {
                self.standalone_feature_columns.push(name);
            }
        }
        for name in features.diff {
            if !self.diff_feature_cols.contains(&name) {
                self.diff_feature_cols.push(name);
            }
        }
        self
    }

    /// Feature table column name of a diff feature
    pub fn diff_name(column: &str) -> String {
        format!("{}{}", column, DIFF_SUFFIX)
    }

    /// Event feature columns in model-input order: standalone, then diffs
    pub fn event_feature_columns(&self) -> Vec<String> {
        let mut columns = self.standalone_feature_columns.clone();
        columns.extend(self.diff_feature_cols.iter().map(|c| Self::diff_name(c)));
        columns
    }

    /// Sorted union of base, standalone and diff column names, minus the label
    pub fn scaled_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .initial_team_data_columns
            .iter()
            .chain(&self.standalone_feature_columns)
            .chain(&self.diff_feature_cols)
            .filter(|c| c.as_str() != TARGET)
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
