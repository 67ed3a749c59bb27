//! Per-column quantile scaling
//!
//! Maps each feature column onto [0, 1] through its empirical distribution.
//! Missing values are filled with the column median before fitting.

use crate::data::table::GameTable;
use crate::Result;

/// Upper bound on the number of quantile landmarks
pub const DEFAULT_QUANTILES: usize = 1000;

/// Values within this distance of the extreme landmarks snap to 0 or 1
const BOUNDS_THRESHOLD: f64 = 1e-7;

/// Uniform-output quantile transform fitted on one column
#[derive(Debug, Clone)]
pub struct QuantileTransformer {
    quantiles: Vec<f64>,
    references: Vec<f64>,
}

impl QuantileTransformer {
    /// Fit on the non-`NaN` values; `None` when there are none
    pub fn fit(values: &[f64], n_quantiles: usize) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = n_quantiles.min(values.len()).max(2);
        let references: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let mut quantiles: Vec<f64> = references.iter().map(|&p| percentile(&sorted, p)).collect();
        // Interpolation rounding can break monotonicity
        for i in 1..quantiles.len() {
            if quantiles[i] < quantiles[i - 1] {
                quantiles[i] = quantiles[i - 1];
            }
        }
        Some(QuantileTransformer {
            quantiles,
            references,
        })
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        let lower = self.quantiles[0];
        let upper = self.quantiles[self.quantiles.len() - 1];
        let neg_quantiles: Vec<f64> = self.quantiles.iter().rev().map(|q| -q).collect();
        let neg_references: Vec<f64> = self.references.iter().rev().map(|r| -r).collect();

        values
            .iter()
            .map(|&x| {
                if x.is_nan() {
                    return x;
                }
                if x - BOUNDS_THRESHOLD < lower {
                    return 0.0;
                }
                if x + BOUNDS_THRESHOLD > upper {
                    return 1.0;
                }
                // Averaging both directions keeps repeated landmarks at their midpoint
                let forward = interp(x, &self.quantiles, &self.references);
                let backward = interp(-x, &neg_quantiles, &neg_references);
                (0.5 * (forward - backward)).clamp(0.0, 1.0)
            })
            .collect()
    }
}

/// Linear-interpolated percentile of sorted values, `p` in [0, 1]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Piecewise-linear interpolation over increasing `xp`, clamped at the ends
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    let j = xp.partition_point(|&v| v <= x) - 1;
    let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + slope * (x - xp[j])
}

/// Median of the non-`NaN` values
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile(&sorted, 0.5))
}

/// Median-fill then quantile-transform one column; an all-`NaN` column becomes zeros
pub fn scale_column(values: &[f64]) -> Vec<f64> {
    let Some(fill) = median(values) else {
        return vec![0.0; values.len()];
    };
    let filled: Vec<f64> = values
        .iter()
        .map(|v| if v.is_nan() { fill } else { *v })
        .collect();
    match QuantileTransformer::fit(&filled, DEFAULT_QUANTILES) {
        Some(transformer) => transformer.transform(&filled),
        None => vec![0.0; values.len()],
    }
}

/// Scales named columns of a table in place, each fitted independently
#[derive(Debug, Default)]
pub struct QuantileScaler;

impl QuantileScaler {
    pub fn new() -> Self {
        QuantileScaler
    }

    /// Scale every listed column the table has; returns how many were scaled
    pub fn scale(&self, table: &mut GameTable, columns: &[String]) -> Result<usize> {
        let mut scaled = 0;
        for name in columns {
            if !table.has_column(name) {
                continue;
            }
            let values = scale_column(table.column(name)?);
            table.add_column(name, values)?;
            scaled += 1;
        }
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matchup_table;

    #[test]
    fn test_uniform_output_for_distinct_values() {
        let values: Vec<f64> = (0..11).map(|i| i as f64 * 3.0).collect();
        let t = QuantileTransformer::fit(&values, DEFAULT_QUANTILES).unwrap();
        let out = t.transform(&values);
        for (i, v) in out.iter().enumerate() {
            assert!((v - i as f64 / 10.0).abs() < 1e-9, "{} at {}", v, i);
        }
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let values = vec![5.0, -2.0, 7.5, 7.5, 100.0, 0.0, 3.3];
        let out = scale_column(&values);
        let mut pairs: Vec<(f64, f64)> = values.iter().copied().zip(out).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in pairs.windows(2) {
            assert!(w[1].1 >= w[0].1);
        }
        assert!(pairs.iter().all(|(_, y)| (0.0..=1.0).contains(y)));
        assert_eq!(pairs.first().unwrap().1, 0.0);
        assert_eq!(pairs.last().unwrap().1, 1.0);
    }

    #[test]
    fn test_random_column_preserves_rank() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(11);
        let values: Vec<f64> = (0..2500).map(|_| rng.gen_range(-50.0..50.0)).collect();
        let out = scale_column(&values);
        for _ in 0..500 {
            let (i, j) = (rng.gen_range(0..values.len()), rng.gen_range(0..values.len()));
            if values[i] < values[j] {
                assert!(out[i] <= out[j]);
            }
        }
        let mean = out.iter().sum::<f64>() / out.len() as f64;
        assert!((mean - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_nan_filled_with_median() {
        let out = scale_column(&[1.0, f64::NAN, 3.0, 2.0, 4.0]);
        assert!(out.iter().all(|v| !v.is_nan()));
        // NaN became the median 2.5, which sits midway
        assert!((out[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_columns() {
        assert_eq!(scale_column(&[f64::NAN, f64::NAN]), vec![0.0, 0.0]);
        assert_eq!(scale_column(&[4.0, 4.0, 4.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_scaler_skips_absent_columns() {
        let mut table = matchup_table(&[
            ("A", "B", "2021-01-01", 1.0),
            ("A", "B", "2021-01-02", 0.0),
        ]);
        table.add_column("pts", vec![90.0, 100.0, 110.0, 95.0]).unwrap();
        let scaled = QuantileScaler::new()
            .scale(&mut table, &["pts".to_string(), "ast".to_string()])
            .unwrap();
        assert_eq!(scaled, 1);
        assert_eq!(table.column("pts").unwrap(), &[0.0, 2.0 / 3.0, 1.0, 1.0 / 3.0]);
        assert_eq!(table.column("win").unwrap(), &[1.0, 0.0, 0.0, 1.0]);
    }
}
