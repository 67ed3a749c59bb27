//! Home venue inference
//!
//! A team's home venue for a season is the location it played at most often.

use chrono::Datelike;
use std::collections::HashMap;

use crate::data::table::GameTable;
use crate::features::columns::FeatureSet;
use crate::Result;

/// Feature column flagging games at the team's home venue
pub const HOME_COLUMN: &str = "feature_home";

/// (team, season year) -> home location; unknown dates form a `None` season
pub type HomeLocations = HashMap<(String, Option<i32>), String>;

/// Location counts in first-seen order
#[derive(Debug, Default)]
struct LocationTally {
    counts: Vec<(String, u32)>,
}

impl LocationTally {
    fn add(&mut self, location: &str) {
        match self.counts.iter_mut().find(|(l, _)| l == location) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((location.to_string(), 1)),
        }
    }

    /// Most frequent label; ties go to the one seen first
    fn plurality(&self) -> Option<&str> {
        let mut best: Option<&(String, u32)> = None;
        for entry in &self.counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(l, _)| l.as_str())
    }
}

/// Resolves per-season home venues and flags home games
#[derive(Debug, Default)]
pub struct HomeLocationResolver;

impl HomeLocationResolver {
    pub fn new() -> Self {
        HomeLocationResolver
    }

    /// Plurality location per (team, year), counting records in table order
    pub fn resolve(&self, table: &GameTable) -> HomeLocations {
        let mut tallies: HashMap<(String, Option<i32>), LocationTally> = HashMap::new();
        for record in table.records() {
            let key = (record.team_tag.clone(), record.date.map(|d| d.year()));
            tallies.entry(key).or_default().add(&record.location);
        }
        tallies
            .into_iter()
            .filter_map(|(key, tally)| tally.plurality().map(|l| (key, l.to_string())))
            .collect()
    }

    /// Add the `feature_home` column (1 at the season's home venue, else 0)
    pub fn assign(&self, table: &mut GameTable) -> Result<FeatureSet> {
        let homes = self.resolve(table);
        let values = table
            .records()
            .iter()
            .map(|r| {
                let key = (r.team_tag.clone(), r.date.map(|d| d.year()));
                match homes.get(&key) {
                    Some(home) if *home == r.location => 1.0,
                    _ => 0.0,
                }
            })
            .collect();
        table.add_column(HOME_COLUMN, values)?;
        log::debug!("Resolved {} team-season home venues", homes.len());
        Ok(FeatureSet::standalone(vec![HOME_COLUMN.to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::matchup_table;

    fn home_of<'a>(homes: &'a HomeLocations, team: &str, year: i32) -> &'a str {
        homes[&(team.to_string(), Some(year))].as_str()
    }

    #[test]
    fn test_plurality_location() {
        let table = matchup_table(&[
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("BOS", "NYK", "2021-01-07", 1.0),
            ("LAL", "BOS", "2021-01-09", 0.0),
        ]);
        let homes = HomeLocationResolver::new().resolve(&table);
        assert_eq!(home_of(&homes, "BOS", 2021), "BOS Arena");
        // LAL: once at BOS Arena, once at LAL Arena; BOS Arena seen first
        assert_eq!(home_of(&homes, "LAL", 2021), "BOS Arena");
        assert_eq!(home_of(&homes, "NYK", 2021), "BOS Arena");
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let mut tally = LocationTally::default();
        for l in ["B", "A", "A", "B", "C"] {
            tally.add(l);
        }
        assert_eq!(tally.plurality(), Some("B"));
    }

    #[test]
    fn test_seasons_resolved_separately() {
        let table = matchup_table(&[
            ("BOS", "LAL", "2020-03-01", 1.0),
            ("LAL", "BOS", "2021-03-01", 1.0),
            ("LAL", "BOS", "2021-03-03", 1.0),
        ]);
        let homes = HomeLocationResolver::new().resolve(&table);
        assert_eq!(home_of(&homes, "BOS", 2020), "BOS Arena");
        assert_eq!(home_of(&homes, "BOS", 2021), "LAL Arena");
    }

    #[test]
    fn test_assign_flags_home_games() {
        let mut table = matchup_table(&[
            ("BOS", "LAL", "2021-01-05", 1.0),
            ("BOS", "NYK", "2021-01-07", 1.0),
            ("LAL", "NYK", "2021-01-08", 1.0),
            ("LAL", "BOS", "2021-01-09", 0.0),
        ]);
        let features = HomeLocationResolver::new().assign(&mut table).unwrap();
        assert_eq!(features.standalone, vec![HOME_COLUMN]);
        assert!(features.diff.is_empty());

        let flags = table.column(HOME_COLUMN).unwrap();
        let bos: Vec<f64> = table
            .records()
            .iter()
            .zip(flags)
            .filter(|(r, _)| r.team_tag == "BOS")
            .map(|(_, f)| *f)
            .collect();
        assert_eq!(bos, vec![1.0, 1.0, 0.0]);
    }
}
