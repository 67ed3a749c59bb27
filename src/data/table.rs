//! Game table storage and pipe-delimited ingest
//!
//! One row per team (or player) participation in a game. Identity fields live on
//! [`GameRecord`]; numeric columns are stored column-wise with `NaN` for missing.

use crate::{GameKey, NbaError, Result, TeamGameKey};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Field delimiter of every table file
pub const DELIMITER: u8 = b'|';

/// Label column
pub const TARGET: &str = "win";

/// Join keys of the feature table
pub const KEY_COLUMNS: [&str; 4] = ["game_key", "team_tag", "opponent_tag", "date_str"];

/// Columns that are always read as text
pub const TEXT_COLUMNS: [&str; 11] = [
    "team_tag",
    "team_link",
    "team_name",
    "opponent_tag",
    "opponent_name",
    "opponent_link",
    "location",
    "date_str",
    "game_key",
    "team_game_key",
    "player_link",
];

/// Per-game box-score statistics shared by the team and player tables
pub const BOX_SCORE_COLUMNS: [&str; 34] = [
    "ast",
    "ast_pct",
    "blk",
    "blk_pct",
    "def_rtg",
    "drb",
    "drb_pct",
    "efg_pct",
    "fg",
    "fg3",
    "fg3_pct",
    "fg3a",
    "fg3a_per_fga_pct",
    "fg_pct",
    "fga",
    "ft",
    "ft_pct",
    "fta",
    "fta_per_fga_pct",
    "mp",
    "off_rtg",
    "orb",
    "orb_pct",
    "pf",
    "plus_minus",
    "pts",
    "stl",
    "stl_pct",
    "tov",
    "tov_pct",
    "trb",
    "trb_pct",
    "ts_pct",
    "usg_pct",
];

/// Identity of one side of one game
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub team_tag: String,
    pub opponent_tag: String,
    pub location: String,
    /// Zero-padded `YYYY-MM-DD`, kept even when it does not parse
    pub date_str: String,
    pub date: Option<NaiveDate>,
    pub game_key: GameKey,
    pub team_game_key: TeamGameKey,
    /// Remaining text columns (team_name, player_link, ...)
    pub attributes: BTreeMap<String, String>,
}

impl GameRecord {
    pub fn new(team_tag: &str, opponent_tag: &str, location: &str, date_str: &str) -> Self {
        GameRecord {
            team_tag: team_tag.to_string(),
            opponent_tag: opponent_tag.to_string(),
            location: location.to_string(),
            date_str: date_str.to_string(),
            date: parse_date(date_str),
            game_key: GameKey::new(date_str, team_tag, opponent_tag),
            team_game_key: TeamGameKey::new(date_str, team_tag, opponent_tag),
            attributes: BTreeMap::new(),
        }
    }

    /// Build from raw year/month/day fields as they appear in the source file
    pub fn from_parts(
        team_tag: &str,
        opponent_tag: &str,
        location: &str,
        year: &str,
        month: &str,
        day: &str,
    ) -> Self {
        Self::new(team_tag, opponent_tag, location, &date_string(year, month, day))
    }
}

/// Zero-padded date string from raw parts
pub fn date_string(year: &str, month: &str, day: &str) -> String {
    format!("{:0>4}-{:0>2}-{:0>2}", year.trim(), month.trim(), day.trim())
}

/// Parse a `YYYY-MM-DD` string; anything else is an unknown date
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

/// Records plus named numeric columns, row-aligned
#[derive(Debug, Clone, Default)]
pub struct GameTable {
    records: Vec<GameRecord>,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<Vec<f64>>,
}

impl GameTable {
    pub fn new(records: Vec<GameRecord>) -> Self {
        GameTable {
            records,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    pub fn record(&self, row: usize) -> &GameRecord {
        &self.records[row]
    }

    /// Numeric column names in insertion order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.index
            .get(name)
            .map(|&i| self.values[i].as_slice())
            .ok_or_else(|| NbaError::MissingColumn(name.to_string()))
    }

    /// Add a numeric column, replacing any column of the same name in place
    pub fn add_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.records.len() {
            return Err(NbaError::ColumnLength {
                column: name.to_string(),
                expected: self.records.len(),
                actual: values.len(),
            });
        }
        match self.index.get(name) {
            Some(&i) => self.values[i] = values,
            None => {
                self.index.insert(name.to_string(), self.columns.len());
                self.columns.push(name.to_string());
                self.values.push(values);
            }
        }
        Ok(())
    }

    /// Sorted union of attribute names across records
    pub fn attribute_columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .records
            .iter()
            .flat_map(|r| r.attributes.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        GameTable {
            records: rows.iter().map(|&r| self.records[r].clone()).collect(),
            columns: self.columns.clone(),
            index: self.index.clone(),
            values: self
                .values
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    /// Stable sort by `(date_str, team_tag, opponent_tag)`.
    ///
    /// Zero-padded date strings order the same way as the dates they encode.
    pub fn sorted_by_date(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            let (ra, rb) = (&self.records[a], &self.records[b]);
            ra.date_str
                .cmp(&rb.date_str)
                .then_with(|| ra.team_tag.cmp(&rb.team_tag))
                .then_with(|| ra.opponent_tag.cmp(&rb.opponent_tag))
        });
        self.select_rows(&order)
    }

    /// Row indices per team, in table order
    pub fn rows_by_team(&self) -> BTreeMap<String, Vec<usize>> {
        let mut teams: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (row, record) in self.records.iter().enumerate() {
            teams.entry(record.team_tag.clone()).or_default().push(row);
        }
        teams
    }

    /// Read a pipe-delimited table with a header row.
    ///
    /// Columns listed in [`TEXT_COLUMNS`], or holding any non-numeric value, are
    /// kept as text; every other column is numeric with empty fields as `NaN`.
    /// A non-numeric value in a box-score column is a parse error.
    /// `date_str` is taken from the file when present, otherwise built from the
    /// raw `year`/`month`/`day` fields.
    pub fn read_delimited<P: AsRef<Path>>(path: P, row_limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NbaError::ArtifactNotFound(path.to_path_buf()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            if row_limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
            let record = result?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        let position = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| NbaError::MissingColumn(name.to_string()))
        };

        let team_col = required("team_tag")?;
        let opponent_col = required("opponent_tag")?;
        let location_col = position("location");
        let date_source = match position("date_str") {
            Some(col) => DateSource::Column(col),
            None => DateSource::Parts(required("year")?, required("month")?, required("day")?),
        };

        for (i, header) in headers.iter().enumerate() {
            if !BOX_SCORE_COLUMNS.contains(&header.as_str()) {
                continue;
            }
            if let Some(line) = rows.iter().position(|row| parse_numeric(&row[i]).is_none()) {
                return Err(NbaError::Parse(format!(
                    "{}: non-numeric {} value '{}' on line {}",
                    path.display(),
                    header,
                    rows[line][i],
                    line + 2
                )));
            }
        }

        let numeric: Vec<bool> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                !TEXT_COLUMNS.contains(&h.as_str())
                    && rows.iter().all(|row| parse_numeric(&row[i]).is_some())
            })
            .collect();

        let records = rows
            .iter()
            .map(|row| {
                let location = location_col.map(|i| row[i].as_str()).unwrap_or("");
                let mut record = match date_source {
                    DateSource::Column(d) => {
                        GameRecord::new(&row[team_col], &row[opponent_col], location, &row[d])
                    }
                    DateSource::Parts(y, m, d) => GameRecord::from_parts(
                        &row[team_col],
                        &row[opponent_col],
                        location,
                        &row[y],
                        &row[m],
                        &row[d],
                    ),
                };
                for (i, header) in headers.iter().enumerate() {
                    if !numeric[i] && !is_identity_column(header) {
                        record.attributes.insert(header.clone(), row[i].clone());
                    }
                }
                record
            })
            .collect();

        let mut table = GameTable::new(records);
        for (i, header) in headers.iter().enumerate() {
            if numeric[i] {
                let values = rows
                    .iter()
                    .map(|row| parse_numeric(&row[i]).unwrap_or(f64::NAN))
                    .collect();
                table.add_column(header, values)?;
            }
        }

        log::debug!(
            "Read {} rows, {} numeric columns from {}",
            table.len(),
            table.columns.len(),
            path.display()
        );
        Ok(table)
    }

    /// Write as a pipe-delimited table: identity columns, attributes, then numeric
    /// columns. `NaN` becomes an empty field.
    pub fn write_delimited<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_path(path)?;

        let attributes = self.attribute_columns();
        let mut header: Vec<&str> = IDENTITY_COLUMNS.to_vec();
        header.extend(attributes.iter().map(|a| a.as_str()));
        header.extend(self.columns.iter().map(|c| c.as_str()));
        writer.write_record(&header)?;

        for (row, record) in self.records.iter().enumerate() {
            let mut fields: Vec<String> = vec![
                record.team_tag.clone(),
                record.opponent_tag.clone(),
                record.location.clone(),
                record.date_str.clone(),
                record.game_key.to_string(),
                record.team_game_key.to_string(),
            ];
            for name in &attributes {
                fields.push(record.attributes.get(name).cloned().unwrap_or_default());
            }
            for col in &self.values {
                fields.push(format_numeric(col[row]));
            }
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Where a table file keeps its dates
enum DateSource {
    Column(usize),
    Parts(usize, usize, usize),
}

/// Identity fields written ahead of everything else
const IDENTITY_COLUMNS: [&str; 6] = [
    "team_tag",
    "opponent_tag",
    "location",
    "date_str",
    "game_key",
    "team_game_key",
];

fn is_identity_column(name: &str) -> bool {
    IDENTITY_COLUMNS.contains(&name)
}

/// Numeric field parser: empty is missing, booleans map to 0/1
pub fn parse_numeric(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Some(f64::NAN);
    }
    match field.to_ascii_lowercase().as_str() {
        "true" => return Some(1.0),
        "false" => return Some(0.0),
        "nan" => return Some(f64::NAN),
        _ => {}
    }
    field.parse::<f64>().ok()
}

/// Shortest representation that parses back to the same value
pub fn format_numeric(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
