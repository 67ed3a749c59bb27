//! Synthetic game tables for tests

use std::fmt::Write as _;
use std::path::Path;

use crate::data::table::{GameRecord, GameTable, BOX_SCORE_COLUMNS, TARGET};

/// Two rows per game: `(home, away, date, home_win)`. The venue is named after
/// the home team.
pub(crate) fn matchup_table(games: &[(&str, &str, &str, f64)]) -> GameTable {
    let mut records = Vec::new();
    let mut wins = Vec::new();
    for &(home, away, date, home_win) in games {
        let venue = format!("{} Arena", home);
        records.push(GameRecord::new(home, away, &venue, date));
        wins.push(home_win);
        records.push(GameRecord::new(away, home, &venue, date));
        wins.push(1.0 - home_win);
    }
    let mut table = GameTable::new(records);
    table.add_column(TARGET, wins).unwrap();
    table
}

/// Deterministic box-score value for a team/stat/game index
pub(crate) fn stat_value(team: usize, stat: usize, game: usize) -> f64 {
    ((team * 31 + stat * 7 + game * 13) % 97) as f64 + stat as f64 * 0.25
}

/// Write a round-robin league of raw team and player files into `dir`.
///
/// Every ordered pair of teams meets `rounds` times, one game per day. Returns
/// the number of team rows written.
pub(crate) fn write_raw_league(
    dir: &Path,
    team_table: &str,
    player_table: &str,
    teams: &[&str],
    rounds: usize,
) -> usize {
    let mut header = String::from("team_tag|opponent_tag|location|year|month|day|team_name");
    for stat in BOX_SCORE_COLUMNS {
        write!(header, "|{}", stat).unwrap();
    }
    let mut team_file = format!("{}|win\n", header);
    let mut player_file = format!("{}|player_link\n", header);

    let mut day = 0usize;
    let mut rows = 0usize;
    for round in 0..rounds {
        for (h, home) in teams.iter().enumerate() {
            for (a, away) in teams.iter().enumerate() {
                if h == a {
                    continue;
                }
                day += 1;
                let (month, dom) = (1 + (day - 1) / 28, 1 + (day - 1) % 28);
                let home_wins = (h + a + round) % 2 == 0;
                for (side, tag, opp, idx, win) in [
                    (0, home, away, h, home_wins),
                    (1, away, home, a, !home_wins),
                ] {
                    let mut line = format!(
                        "{}|{}|{} Arena|2021|{}|{}|{} club",
                        tag, opp, home, month, dom, tag
                    );
                    for s in 0..BOX_SCORE_COLUMNS.len() {
                        write!(line, "|{}", stat_value(idx, s, day + side)).unwrap();
                    }
                    writeln!(team_file, "{}|{}", line, if win { 1 } else { 0 }).unwrap();
                    writeln!(player_file, "{}|/players/{}-guard", line, tag).unwrap();
                    rows += 1;
                }
            }
        }
    }

    std::fs::write(dir.join(format!("{}.csv", team_table)), team_file).unwrap();
    std::fs::write(dir.join(format!("{}.csv", player_table)), player_file).unwrap();
    rows
}
