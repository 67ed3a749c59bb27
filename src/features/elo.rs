//! Elo rating recurrence for team strength estimation
//!
//! Computes pregame and postgame ratings for every team record, in date order.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::data::table::{GameTable, TARGET};
use crate::features::columns::FeatureSet;
use crate::{NbaError, RatingType, Result};

/// Elo rating configuration
#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    /// Rating of a team with no earlier game
    pub starting_rating: f64,
    /// Scales every rating adjustment
    pub multiplier: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            starting_rating: 1500.0,
            multiplier: 1.0,
        }
    }
}

/// Ratings of one record around its game
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamRating {
    pub pregame: f64,
    pub postgame: f64,
}

/// Expected score (0-1) of a team against an opponent
pub fn expected_score(rating: f64, opponent_rating: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent_rating - rating) / 400.0))
}

/// Postgame rating from both pregame ratings and the result (1 = win, 0 = loss)
pub fn new_rating(
    rating: f64,
    opponent_rating: f64,
    win: f64,
    multiplier: f64,
    rating_type: RatingType,
) -> f64 {
    let expected = expected_score(rating, opponent_rating);
    rating + multiplier * rating_type.k_factor() * (win - expected)
}

/// Name of the pregame rating feature column
pub fn pregame_column(rating_type: RatingType) -> String {
    format!("feature_team_pregame_rating_{}", rating_type.index())
}

/// Name of the postgame rating column
pub fn postgame_column(rating_type: RatingType) -> String {
    format!("feature_team_postgame_rating_{}", rating_type.index())
}

/// Postgame ratings per team, sorted by date
type RatingHistory<'a> = HashMap<&'a str, Vec<(NaiveDate, f64)>>;

/// Sequential rating computer
pub struct RatingEngine {
    config: EloConfig,
    rating_type: RatingType,
}

impl RatingEngine {
    pub fn new(config: EloConfig, rating_type: RatingType) -> Self {
        RatingEngine {
            config,
            rating_type,
        }
    }

    /// Ratings for every row of `table`, row-aligned.
    ///
    /// A record's pregame rating is the postgame rating of its team's latest
    /// record strictly before its date. Records sharing a date never see each
    /// other; among several earlier records on one date, the last in
    /// `(date, team_tag, opponent_tag, row)` order wins.
    pub fn compute_ratings(&self, table: &GameTable) -> Result<Vec<TeamRating>> {
        let wins = table.column(TARGET)?;
        let records = table.records();

        let mut dates = Vec::with_capacity(records.len());
        for record in records {
            let date = record.date.ok_or_else(|| NbaError::InvalidDate {
                stage: "rating",
                team: record.team_tag.clone(),
                date_str: record.date_str.clone(),
            })?;
            dates.push(date);
        }

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            dates[a]
                .cmp(&dates[b])
                .then_with(|| records[a].team_tag.cmp(&records[b].team_tag))
                .then_with(|| records[a].opponent_tag.cmp(&records[b].opponent_tag))
        });

        let mut history: RatingHistory = HashMap::new();
        let mut ratings = vec![
            TeamRating {
                pregame: self.config.starting_rating,
                postgame: self.config.starting_rating,
            };
            records.len()
        ];

        for row in order {
            let record = &records[row];
            let win = wins[row];
            if win.is_nan() {
                return Err(NbaError::Parse(format!(
                    "missing {} flag for {} vs {} on {}",
                    TARGET, record.team_tag, record.opponent_tag, record.date_str
                )));
            }

            let pregame = self.rating_before(&history, &record.team_tag, dates[row]);
            let opponent_pregame = self.rating_before(&history, &record.opponent_tag, dates[row]);
            let postgame = new_rating(
                pregame,
                opponent_pregame,
                win,
                self.config.multiplier,
                self.rating_type,
            );

            ratings[row] = TeamRating { pregame, postgame };
            history
                .entry(record.team_tag.as_str())
                .or_default()
                .push((dates[row], postgame));
        }

        Ok(ratings)
    }

    /// Add the pregame and postgame rating columns to `table`
    pub fn assign(&self, table: &mut GameTable) -> Result<FeatureSet> {
        let ratings = self.compute_ratings(table)?;
        let pregame = pregame_column(self.rating_type);
        table.add_column(&pregame, ratings.iter().map(|r| r.pregame).collect())?;
        table.add_column(
            &postgame_column(self.rating_type),
            ratings.iter().map(|r| r.postgame).collect(),
        )?;
        log::debug!(
            "Assigned {} ratings ({}) to {} records",
            self.rating_type,
            pregame,
            table.len()
        );
        Ok(FeatureSet::paired(vec![pregame]))
    }

    /// Latest postgame rating strictly before `date`
    fn rating_before(&self, history: &RatingHistory<'_>, team: &str, date: NaiveDate) -> f64 {
        history
            .get(team)
            .and_then(|games| {
                let idx = games.partition_point(|(d, _)| *d < date);
                idx.checked_sub(1).map(|i| games[i].1)
            })
            .unwrap_or(self.config.starting_rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matchup_table;
    use crate::data::table::GameRecord;

    fn engine() -> RatingEngine {
        RatingEngine::new(EloConfig::default(), RatingType::Steady)
    }

    fn row_of(table: &GameTable, team: &str, date: &str) -> usize {
        table
            .records()
            .iter()
            .position(|r| r.team_tag == team && r.date_str == date)
            .unwrap()
    }

    #[test]
    fn test_initial_ratings() {
        let table = matchup_table(&[("BOS", "LAL", "2021-01-05", 1.0)]);
        let ratings = engine().compute_ratings(&table).unwrap();
        assert!(ratings.iter().all(|r| r.pregame == 1500.0));
    }

    #[test]
    fn test_winner_up_loser_down_equal_and_opposite() {
        let table = matchup_table(&[("BOS", "LAL", "2021-01-05", 1.0)]);
        let ratings = engine().compute_ratings(&table).unwrap();
        let bos = ratings[row_of(&table, "BOS", "2021-01-05")];
        let lal = ratings[row_of(&table, "LAL", "2021-01-05")];

        assert!(bos.postgame > bos.pregame);
        assert!(lal.postgame < lal.pregame);
        let gain = bos.postgame - bos.pregame;
        let loss = lal.pregame - lal.postgame;
        assert!((gain - loss).abs() < 1e-9);
        assert!((gain - 10.0).abs() < 1e-9); // K=20, expected 0.5
    }

    #[test]
    fn test_reactive_moves_further() {
        let table = matchup_table(&[("BOS", "LAL", "2021-01-05", 1.0)]);
        let steady = engine().compute_ratings(&table).unwrap();
        let reactive = RatingEngine::new(EloConfig::default(), RatingType::Reactive)
            .compute_ratings(&table)
            .unwrap();
        let row = row_of(&table, "BOS", "2021-01-05");
        assert!(reactive[row].postgame > steady[row].postgame);
    }

    #[test]
    fn test_postgame_feeds_next_pregame() {
        let table = matchup_table(&[
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("BOS", "NYK", "2021-01-07", 0.0),
        ]);
        let ratings = engine().compute_ratings(&table).unwrap();
        let first = ratings[row_of(&table, "BOS", "2021-01-05")];
        let second = ratings[row_of(&table, "BOS", "2021-01-07")];
        assert_eq!(second.pregame, first.postgame);

        // NYK never played before: its pregame is the start, opponent side uses BOS's
        let nyk = ratings[row_of(&table, "NYK", "2021-01-07")];
        assert_eq!(nyk.pregame, 1500.0);
        assert!(nyk.postgame > 1500.0);
        assert!((nyk.postgame - nyk.pregame + second.postgame - second.pregame).abs() < 1e-9);
    }

    #[test]
    fn test_same_date_games_do_not_chain() {
        let table = matchup_table(&[
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("BOS", "NYK", "2021-01-05", 1.0),
        ]);
        let ratings = engine().compute_ratings(&table).unwrap();
        let bos: Vec<f64> = table
            .records()
            .iter()
            .zip(&ratings)
            .filter(|(r, _)| r.team_tag == "BOS")
            .map(|(_, t)| t.pregame)
            .collect();
        assert_eq!(bos, vec![1500.0, 1500.0]);
    }

    #[test]
    fn test_last_same_date_game_feeds_next_date() {
        // BOS loses to NYK and beats LAL on D1; the NYK row comes first in the table
        let table = matchup_table(&[
            ("BOS", "NYK", "2021-01-05", 0.0),
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("BOS", "CHI", "2021-01-06", 1.0),
        ]);
        let ratings = engine().compute_ratings(&table).unwrap();
        let vs_nyk = ratings[0];
        let vs_lal = ratings[2];
        assert_eq!(vs_lal.postgame, 1510.0);
        assert_eq!(vs_nyk.postgame, 1490.0);

        // (date, team, opponent) order puts LAL before NYK, so NYK's result is latest
        let next = ratings[row_of(&table, "BOS", "2021-01-06")];
        assert_eq!(next.pregame, vs_nyk.postgame);
    }

    #[test]
    fn test_row_order_does_not_matter() {
        let table = matchup_table(&[
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("LAL", "NYK", "2021-01-06", 0.0),
            ("NYK", "BOS", "2021-01-09", 1.0),
        ]);
        let reversed_rows: Vec<usize> = (0..table.len()).rev().collect();
        let reversed = table.select_rows(&reversed_rows);

        let a = engine().compute_ratings(&table).unwrap();
        let b = engine().compute_ratings(&reversed).unwrap();
        for (i, &j) in reversed_rows.iter().enumerate() {
            assert_eq!(b[i], a[j]);
        }
    }

    #[test]
    fn test_null_date_rejected() {
        let mut table = GameTable::new(vec![GameRecord::new("BOS", "LAL", "x", "2021-00-05")]);
        table.add_column(TARGET, vec![1.0]).unwrap();
        let err = engine().compute_ratings(&table).unwrap_err();
        assert!(matches!(err, NbaError::InvalidDate { stage: "rating", .. }));
    }

    #[test]
    fn test_assign_registers_pregame_feature() {
        let mut table = matchup_table(&[("BOS", "LAL", "2021-01-05", 1.0)]);
        let features = engine().assign(&mut table).unwrap();
        assert_eq!(features.standalone, vec!["feature_team_pregame_rating_0"]);
        assert_eq!(features.diff, features.standalone);
        assert!(table.has_column("feature_team_postgame_rating_0"));
    }

    #[test]
    fn test_expected_score() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
        assert!(expected_score(1600.0, 1500.0) > 0.5);
    }
}
