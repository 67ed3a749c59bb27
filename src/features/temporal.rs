//! Temporal feature extraction
//!
//! Calendar encodings, rest days, and rolling-window statistics computed per
//! team over its previous games. The current game never enters its own window.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

use crate::data::table::GameTable;
use crate::features::columns::FeatureSet;
use crate::{NbaError, Result};

/// Days between a team's game and its previous game
pub const REST_COLUMN: &str = "days_since_last_fight";

/// Calendar fields one-hot encoded from the game date
const CALENDAR_FIELDS: [&str; 3] = ["dow", "year", "month"];

/// Calendar encodings derived from each record's date
#[derive(Debug, Default)]
pub struct DateEncoder;

impl DateEncoder {
    pub fn new() -> Self {
        DateEncoder
    }

    /// Add `dow` (Monday = 0), `year`, `month` and their one-hot columns.
    ///
    /// Unknown dates get `NaN` fields and all-zero one-hots. One-hot columns are
    /// emitted per field in ascending value order.
    pub fn encode(&self, table: &mut GameTable) -> Result<FeatureSet> {
        let fields: Vec<Vec<f64>> = CALENDAR_FIELDS
            .iter()
            .map(|field| {
                table
                    .records()
                    .iter()
                    .map(|r| match r.date {
                        Some(d) => calendar_value(d, field),
                        None => f64::NAN,
                    })
                    .collect()
            })
            .collect();

        let mut one_hots = Vec::new();
        for (field, values) in CALENDAR_FIELDS.iter().zip(fields) {
            let distinct: BTreeSet<i64> = values
                .iter()
                .filter(|v| !v.is_nan())
                .map(|v| *v as i64)
                .collect();
            for value in distinct {
                let name = format!("{}_{}", field, value);
                let flags = values
                    .iter()
                    .map(|v| if !v.is_nan() && *v as i64 == value { 1.0 } else { 0.0 })
                    .collect();
                table.add_column(&name, flags)?;
                one_hots.push(name);
            }
            table.add_column(field, values)?;
        }

        log::debug!("Encoded {} calendar one-hot columns", one_hots.len());
        Ok(FeatureSet::standalone(one_hots))
    }

    /// Add `days_since_last_fight`: days since the team's previous record in
    /// table order, `NaN` for its first game or when either date is unknown.
    pub fn days_since_last_game(&self, table: &mut GameTable) -> Result<FeatureSet> {
        let mut rest = vec![f64::NAN; table.len()];
        for rows in table.rows_by_team().values() {
            for pair in rows.windows(2) {
                let (prev, cur) = (table.record(pair[0]).date, table.record(pair[1]).date);
                if let (Some(p), Some(c)) = (prev, cur) {
                    rest[pair[1]] = (c - p).num_days() as f64;
                }
            }
        }
        table.add_column(REST_COLUMN, rest)?;
        Ok(FeatureSet::paired(vec![REST_COLUMN.to_string()]))
    }
}

fn calendar_value(date: NaiveDate, field: &str) -> f64 {
    match field {
        "dow" => date.weekday().num_days_from_monday() as f64,
        "year" => date.year() as f64,
        _ => date.month() as f64,
    }
}

/// Mean of the `window` values before each position.
///
/// Positions with fewer than `window` predecessors, or with a `NaN` among them,
/// are `NaN`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Least-squares slope of the `window` values before each position against
/// their index `0..window`.
pub fn rolling_slope(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, ols_slope)
}

/// Least-squares slope of `y` against `0..y.len()`
pub fn ols_slope(y: &[f64]) -> f64 {
    let n = y.len();
    if n < 2 {
        return f64::NAN;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, v) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (v - y_mean);
        sxx += dx * dx;
    }
    sxy / sxx
}

fn rolling_apply(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i < window {
                return f64::NAN;
            }
            let w = &values[i - window..i];
            if w.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f(w)
            }
        })
        .collect()
}

/// Rolling average and trend features for one window size
pub struct TemporalFeatureBuilder {
    window: usize,
}

impl TemporalFeatureBuilder {
    pub fn new(window: usize) -> Self {
        TemporalFeatureBuilder { window }
    }

    pub fn avg_column(&self, column: &str) -> String {
        format!("feature_team_rl_avg_{}_{}", column, self.window)
    }

    pub fn trend_column(&self, column: &str) -> String {
        format!("feature_team_rl_trend_{}_{}", column, self.window)
    }

    /// Add `feature_team_rl_avg_<c>_<n>` and `feature_team_rl_trend_<c>_<n>` for
    /// every base column, computed per team over its games in date order.
    pub fn build(&self, table: &mut GameTable, base_columns: &[String]) -> Result<FeatureSet> {
        if let Some(r) = table.records().iter().find(|r| r.date.is_none()) {
            return Err(NbaError::InvalidDate {
                stage: "rolling window",
                team: r.team_tag.clone(),
                date_str: r.date_str.clone(),
            });
        }

        let teams: Vec<Vec<usize>> = table
            .rows_by_team()
            .into_values()
            .map(|mut rows| {
                rows.sort_by_key(|&r| table.record(r).date);
                rows
            })
            .collect();

        let mut added = Vec::with_capacity(base_columns.len() * 2);
        for column in base_columns {
            let values = table.column(column)?;
            let mut avg = vec![f64::NAN; values.len()];
            let mut trend = vec![f64::NAN; values.len()];

            for rows in &teams {
                let series: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                let means = rolling_mean(&series, self.window);
                let slopes = rolling_slope(&series, self.window);
                for (k, &row) in rows.iter().enumerate() {
                    avg[row] = means[k];
                    trend[row] = slopes[k];
                }
            }

            let (avg_name, trend_name) = (self.avg_column(column), self.trend_column(column));
            table.add_column(&avg_name, avg)?;
            table.add_column(&trend_name, trend)?;
            added.push(avg_name);
            added.push(trend_name);
        }

        log::debug!(
            "Built {} rolling features for window {} over {} teams",
            added.len(),
            self.window,
            teams.len()
        );
        Ok(FeatureSet::paired(added))
    }
}
