//! Event feature table
//!
//! One row per directed pairing `(game_key, team_tag, opponent_tag)`. Standalone
//! features are copied from the team's row; diff features subtract the
//! opponent's value for the same game.

use std::collections::{HashMap, HashSet};

use crate::data::table::{GameTable, TARGET};
use crate::features::columns::ColumnManifest;
use crate::{GameKey, NbaError, Result};

/// Builds the event feature table from an enriched team table
#[derive(Debug, Default)]
pub struct EventFeatureAssembler;

impl EventFeatureAssembler {
    pub fn new() -> Self {
        EventFeatureAssembler
    }

    /// Feature rows in team-table order, first occurrence of each pairing.
    ///
    /// Missing values count as 0, on both sides of a diff. A pairing whose
    /// opponent row is absent gets `own - 0`.
    pub fn build(&self, table: &GameTable, manifest: &ColumnManifest) -> Result<GameTable> {
        let mut seen: HashSet<(&GameKey, &str, &str)> = HashSet::new();
        let mut rows = Vec::new();
        let mut side: HashMap<(&GameKey, &str), usize> = HashMap::new();
        for (row, r) in table.records().iter().enumerate() {
            if seen.insert((&r.game_key, r.team_tag.as_str(), r.opponent_tag.as_str())) {
                rows.push(row);
            }
            side.entry((&r.game_key, r.team_tag.as_str())).or_insert(row);
        }

        let opponents: Vec<Option<usize>> = rows
            .iter()
            .map(|&row| {
                let r = table.record(row);
                side.get(&(&r.game_key, r.opponent_tag.as_str())).copied()
            })
            .collect();
        let unmatched = opponents.iter().filter(|o| o.is_none()).count();
        if unmatched > 0 {
            log::warn!("{} feature rows have no opponent row; diffs use 0", unmatched);
        }

        let mut features = GameTable::new(
            rows.iter()
                .map(|&row| {
                    let mut record = table.record(row).clone();
                    record.attributes.clear();
                    record
                })
                .collect(),
        );

        for name in &manifest.standalone_feature_columns {
            let values = table.column(name)?;
            let out = rows.iter().map(|&row| zero_nan(values[row])).collect();
            features.add_column(name, out)?;
        }
        for name in &manifest.diff_feature_cols {
            let values = table.column(name)?;
            let out = rows
                .iter()
                .zip(&opponents)
                .map(|(&row, opp)| {
                    let theirs = opp.map_or(0.0, |o| zero_nan(values[o]));
                    zero_nan(values[row]) - theirs
                })
                .collect();
            features.add_column(&ColumnManifest::diff_name(name), out)?;
        }

        log::info!(
            "Built {} event rows with {} feature columns",
            features.len(),
            features.columns().len()
        );
        Ok(features)
    }

    /// Join `win` from `labels` on `(team_tag, opponent_tag, game_key, date_str)`
    pub fn attach_labels(&self, features: &mut GameTable, labels: &GameTable) -> Result<()> {
        let wins = labels.column(TARGET)?;
        let mut index: HashMap<(&str, &str, &GameKey, &str), f64> = HashMap::new();
        for (row, r) in labels.records().iter().enumerate() {
            index
                .entry((
                    r.team_tag.as_str(),
                    r.opponent_tag.as_str(),
                    &r.game_key,
                    r.date_str.as_str(),
                ))
                .or_insert(wins[row]);
        }

        let values = features
            .records()
            .iter()
            .map(|r| {
                let key = (
                    r.team_tag.as_str(),
                    r.opponent_tag.as_str(),
                    &r.game_key,
                    r.date_str.as_str(),
                );
                index.get(&key).copied().ok_or_else(|| NbaError::MissingLabel {
                    team: r.team_tag.clone(),
                    opponent: r.opponent_tag.clone(),
                    game_key: r.game_key.clone(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        features.add_column(TARGET, values)
    }
}

fn zero_nan(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
