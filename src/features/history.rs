//! Fixed-length per-team game history tensors
//!
//! Each team game gets a matrix of its previous `history_length` games, one row
//! per game holding the team's base columns, the opponent's mirrored values and
//! their difference. Games before the team's first are zero rows at the top.

use ndarray::{concatenate, Array2, Axis};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::table::GameTable;
use crate::{GameKey, NbaError, Result};

/// Suffix of columns mirrored from the opponent's row of the same game
pub const OPPONENT_SUFFIX: &str = "_opponent";

/// team -> game -> matrix
pub type HistoryDataset = BTreeMap<String, BTreeMap<GameKey, Array2<f64>>>;

pub fn opponent_column(column: &str) -> String {
    format!("{}{}", column, OPPONENT_SUFFIX)
}

/// Builds history windows of one length and orientation
#[derive(Debug, Clone)]
pub struct HistoryTensorBuilder {
    history_length: usize,
    transpose: bool,
}

impl HistoryTensorBuilder {
    pub fn new(history_length: usize, transpose: bool) -> Self {
        HistoryTensorBuilder {
            history_length,
            transpose,
        }
    }

    /// Axis along which game features run
    pub fn feature_axis(&self) -> Axis {
        if self.transpose {
            Axis(0)
        } else {
            Axis(1)
        }
    }

    /// Add `<c>_opponent` for every base column from the opponent's row of the
    /// same game. Each row must have exactly one counterpart.
    pub fn mirror_opponents(&self, table: &mut GameTable, base_columns: &[String]) -> Result<()> {
        let partners = {
            let mut index: HashMap<(&str, &str, &GameKey), Vec<usize>> = HashMap::new();
            for (row, r) in table.records().iter().enumerate() {
                index
                    .entry((r.team_tag.as_str(), r.opponent_tag.as_str(), &r.game_key))
                    .or_default()
                    .push(row);
            }
            table
                .records()
                .iter()
                .map(|r| {
                    let key = (r.opponent_tag.as_str(), r.team_tag.as_str(), &r.game_key);
                    match index.get(&key).map(|rows| rows.as_slice()) {
                        Some([row]) => Ok(*row),
                        Some(rows) if rows.len() > 1 => Err(NbaError::AmbiguousOpponent {
                            team: r.team_tag.clone(),
                            game_key: r.game_key.clone(),
                            count: rows.len(),
                        }),
                        _ => Err(NbaError::MissingOpponent {
                            team: r.team_tag.clone(),
                            game_key: r.game_key.clone(),
                        }),
                    }
                })
                .collect::<Result<Vec<usize>>>()?
        };

        for column in base_columns {
            let values = table.column(column)?;
            let mirrored = partners.iter().map(|&p| values[p]).collect();
            table.add_column(&opponent_column(column), mirrored)?;
        }
        Ok(())
    }

    /// History matrix for every team game, keyed by team then game.
    ///
    /// Requires the `<c>_opponent` columns from [`Self::mirror_opponents`].
    /// Matrices are `(history_length, 3 * base)`, or `(3 * base, history_length)`
    /// when transposed.
    pub fn build_history(&self, table: &GameTable, base_columns: &[String]) -> Result<HistoryDataset> {
        if let Some(r) = table.records().iter().find(|r| r.date.is_none()) {
            return Err(NbaError::InvalidDate {
                stage: "history",
                team: r.team_tag.clone(),
                date_str: r.date_str.clone(),
            });
        }

        let own: Vec<&[f64]> = base_columns
            .iter()
            .map(|c| table.column(c))
            .collect::<Result<_>>()?;
        let opponent: Vec<&[f64]> = base_columns
            .iter()
            .map(|c| table.column(&opponent_column(c)))
            .collect::<Result<_>>()?;
        let width = base_columns.len() * 3;

        let game_features = |row: usize| -> Vec<f64> {
            let ours: Vec<f64> = own.iter().map(|col| zero_nan(col[row])).collect();
            let theirs: Vec<f64> = opponent.iter().map(|col| zero_nan(col[row])).collect();
            let diff: Vec<f64> = ours.iter().zip(&theirs).map(|(a, b)| a - b).collect();
            [ours, theirs, diff].concat()
        };

        let mut dataset = HistoryDataset::new();
        for (team, mut rows) in table.rows_by_team() {
            rows.sort_by_key(|&r| table.record(r).date);

            let mut games: HashSet<&GameKey> = HashSet::new();
            for &row in &rows {
                let game_key = &table.record(row).game_key;
                if !games.insert(game_key) {
                    return Err(NbaError::DuplicateGame {
                        team: team.clone(),
                        game_key: game_key.clone(),
                    });
                }
            }

            let features: Vec<Vec<f64>> = rows.iter().map(|&r| game_features(r)).collect();
            let mut windows = BTreeMap::new();
            for (i, &row) in rows.iter().enumerate() {
                let start = i.saturating_sub(self.history_length);
                let pad = self.history_length - (i - start);
                let mut matrix = Array2::<f64>::zeros((self.history_length, width));
                for (k, game) in features[start..i].iter().enumerate() {
                    for (j, value) in game.iter().enumerate() {
                        matrix[[pad + k, j]] = *value;
                    }
                }
                if self.transpose {
                    matrix = matrix.t().as_standard_layout().into_owned();
                }
                windows.insert(table.record(row).game_key.clone(), matrix);
            }
            dataset.insert(team, windows);
        }

        log::info!(
            "Built history windows of length {} for {} teams",
            self.history_length,
            dataset.len()
        );
        Ok(dataset)
    }

    /// Team, opponent and difference matrices side by side along the feature
    /// axis, for each pairing in the table.
    pub fn combine_history(&self, table: &GameTable, dataset: &HistoryDataset) -> Result<HistoryDataset> {
        let lookup = |team: &str, game_key: &GameKey| {
            dataset
                .get(team)
                .and_then(|games| games.get(game_key))
                .ok_or_else(|| NbaError::MissingHistory {
                    team: team.to_string(),
                    game_key: game_key.clone(),
                })
        };

        let mut seen: HashSet<(&GameKey, &str, &str, &str)> = HashSet::new();
        let mut combined = HistoryDataset::new();
        for r in table.records() {
            let key = (
                &r.game_key,
                r.team_tag.as_str(),
                r.opponent_tag.as_str(),
                r.date_str.as_str(),
            );
            if !seen.insert(key) {
                continue;
            }
            let ours = lookup(&r.team_tag, &r.game_key)?;
            let theirs = lookup(&r.opponent_tag, &r.game_key)?;
            let diff = ours - theirs;
            let matrix = concatenate(self.feature_axis(), &[ours.view(), theirs.view(), diff.view()])
                .map_err(|e| NbaError::Shape(format!("{} in game {}: {}", r.team_tag, r.game_key, e)))?;
            combined
                .entry(r.team_tag.clone())
                .or_default()
                .insert(r.game_key.clone(), matrix);
        }
        Ok(combined)
    }
}

fn zero_nan(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matchup_table;
    use ndarray::array;

    /// A hosts B on three dates; A scores 10/20/30, B 1/2/3
    fn three_games() -> (GameTable, Vec<String>) {
        let mut table = matchup_table(&[
            ("A", "B", "2021-01-01", 1.0),
            ("A", "B", "2021-01-02", 0.0),
            ("A", "B", "2021-01-03", 1.0),
        ]);
        table
            .add_column("pts", vec![10.0, 1.0, 20.0, 2.0, 30.0, 3.0])
            .unwrap();
        (table, vec!["pts".to_string()])
    }

    fn key(date: &str) -> GameKey {
        GameKey::new(date, "A", "B")
    }

    #[test]
    fn test_mirror_opponents() {
        let (mut table, base) = three_games();
        HistoryTensorBuilder::new(2, false)
            .mirror_opponents(&mut table, &base)
            .unwrap();
        assert_eq!(
            table.column("pts_opponent").unwrap(),
            &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]
        );
    }

    #[test]
    fn test_mirror_missing_and_ambiguous() {
        let (table, base) = three_games();
        let builder = HistoryTensorBuilder::new(2, false);

        let mut lone = table.select_rows(&[0, 1, 2]);
        let err = builder.mirror_opponents(&mut lone, &base).unwrap_err();
        assert!(matches!(err, NbaError::MissingOpponent { .. }));

        let mut doubled = table.select_rows(&[0, 1, 1]);
        let err = builder.mirror_opponents(&mut doubled, &base).unwrap_err();
        assert!(matches!(err, NbaError::AmbiguousOpponent { count: 2, .. }));
    }

    #[test]
    fn test_window_holds_previous_games_only() {
        let (mut table, base) = three_games();
        let builder = HistoryTensorBuilder::new(2, false);
        builder.mirror_opponents(&mut table, &base).unwrap();
        let dataset = builder.build_history(&table, &base).unwrap();

        let a = &dataset["A"];
        assert_eq!(a[&key("2021-01-01")], Array2::<f64>::zeros((2, 3)));
        assert_eq!(a[&key("2021-01-02")], array![[0.0, 0.0, 0.0], [10.0, 1.0, 9.0]]);
        assert_eq!(a[&key("2021-01-03")], array![[10.0, 1.0, 9.0], [20.0, 2.0, 18.0]]);
        assert_eq!(
            dataset["B"][&key("2021-01-03")],
            array![[1.0, 10.0, -9.0], [2.0, 20.0, -18.0]]
        );
    }

    #[test]
    fn test_long_history_keeps_latest_games() {
        let mut table = matchup_table(&[
            ("A", "B", "2021-01-01", 1.0),
            ("A", "B", "2021-01-02", 0.0),
            ("A", "B", "2021-01-03", 1.0),
            ("A", "B", "2021-01-04", 0.0),
            ("A", "B", "2021-01-05", 1.0),
        ]);
        table
            .add_column("pts", vec![10.0, 1.0, 20.0, 2.0, 30.0, 3.0, 40.0, 4.0, 50.0, 5.0])
            .unwrap();
        let base = vec!["pts".to_string()];

        for transpose in [false, true] {
            let mut table = table.clone();
            let builder = HistoryTensorBuilder::new(2, transpose);
            builder.mirror_opponents(&mut table, &base).unwrap();
            let dataset = builder.build_history(&table, &base).unwrap();

            let m = &dataset["A"][&key("2021-01-05")];
            let expected = array![[30.0, 3.0, 27.0], [40.0, 4.0, 36.0]];
            if transpose {
                assert_eq!(m, &expected.t().to_owned());
            } else {
                assert_eq!(m, &expected);
            }
            assert!(m.iter().all(|v| ![10.0, 20.0, 1.0, 2.0].contains(v)));

            let combined = builder.combine_history(&table, &dataset).unwrap();
            let joined = &combined["A"][&key("2021-01-05")];
            let expected_shape: [usize; 2] = if transpose { [9, 2] } else { [2, 9] };
            assert_eq!(joined.shape(), &expected_shape);
        }
    }

    #[test]
    fn test_short_history_is_left_padded() {
        let (mut table, base) = three_games();
        let builder = HistoryTensorBuilder::new(4, false);
        builder.mirror_opponents(&mut table, &base).unwrap();
        let dataset = builder.build_history(&table, &base).unwrap();

        let m = &dataset["A"][&key("2021-01-03")];
        assert_eq!(m.shape(), &[4, 3]);
        assert!(m.row(0).iter().chain(m.row(1).iter()).all(|v| *v == 0.0));
        assert_eq!(m[[2, 0]], 10.0);
        assert_eq!(m[[3, 0]], 20.0);
    }

    #[test]
    fn test_transposed_window() {
        let (mut table, base) = three_games();
        let builder = HistoryTensorBuilder::new(2, true);
        builder.mirror_opponents(&mut table, &base).unwrap();
        let dataset = builder.build_history(&table, &base).unwrap();
        assert_eq!(
            dataset["A"][&key("2021-01-03")],
            array![[10.0, 20.0], [1.0, 2.0], [9.0, 18.0]]
        );
    }

    #[test]
    fn test_duplicate_game_is_error() {
        let (table, base) = three_games();
        let mut doubled = table.select_rows(&[0, 0, 1]);
        doubled.add_column("pts_opponent", vec![0.0; 3]).unwrap();
        let err = HistoryTensorBuilder::new(2, false)
            .build_history(&doubled, &base)
            .unwrap_err();
        assert!(matches!(err, NbaError::DuplicateGame { .. }));
    }

    #[test]
    fn test_combined_shape_triples_features() {
        for transpose in [false, true] {
            let (mut table, base) = three_games();
            let builder = HistoryTensorBuilder::new(2, transpose);
            builder.mirror_opponents(&mut table, &base).unwrap();
            let dataset = builder.build_history(&table, &base).unwrap();
            let combined = builder.combine_history(&table, &dataset).unwrap();

            let team = &dataset["A"][&key("2021-01-03")];
            let joined = &combined["A"][&key("2021-01-03")];
            let axis = builder.feature_axis();
            assert_eq!(joined.len_of(axis), team.len_of(axis) * 3);
            assert_eq!(joined.len_of(Axis(1 - axis.index())), 2);
        }
    }

    #[test]
    fn test_combined_blocks() {
        let (mut table, base) = three_games();
        let builder = HistoryTensorBuilder::new(2, false);
        builder.mirror_opponents(&mut table, &base).unwrap();
        let dataset = builder.build_history(&table, &base).unwrap();
        let combined = builder.combine_history(&table, &dataset).unwrap();

        let joined = &combined["A"][&key("2021-01-03")];
        assert_eq!(
            joined.row(1).to_vec(),
            vec![20.0, 2.0, 18.0, 2.0, 20.0, -18.0, 18.0, -18.0, 36.0]
        );
    }

    #[test]
    fn test_combine_missing_history() {
        let (mut table, base) = three_games();
        let builder = HistoryTensorBuilder::new(2, false);
        builder.mirror_opponents(&mut table, &base).unwrap();
        let mut dataset = builder.build_history(&table, &base).unwrap();
        dataset.remove("B");
        let err = builder.combine_history(&table, &dataset).unwrap_err();
        assert!(matches!(err, NbaError::MissingHistory { .. }));
    }
}
