//! NBA game outcome dataset builder
//!
//! Turns raw team box-score rows into an event feature table and fixed-length
//! per-team history tensors for outcome classifiers.

pub mod data;
pub mod features;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Order-independent identity of a matchup on a date.
///
/// Built from the three strings `[date_str, team_tag, opponent_tag]` sorted
/// lexicographically, so both sides of a game produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameKey(pub String);

impl GameKey {
    pub fn new(date_str: &str, team_tag: &str, opponent_tag: &str) -> Self {
        let mut parts = [date_str, team_tag, opponent_tag];
        parts.sort_unstable();
        GameKey(parts.join(":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directional identity of one team's side of a game
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamGameKey(pub String);

impl TeamGameKey {
    pub fn new(date_str: &str, team_tag: &str, opponent_tag: &str) -> Self {
        TeamGameKey(format!("{}:{}:{}", date_str, team_tag, opponent_tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamGameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rating recurrence variant; selects the K-factor of the update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingType {
    /// Slow-moving rating (K = 20)
    Steady,
    /// Fast-moving rating (K = 40)
    Reactive,
}

impl RatingType {
    /// Numeric tag used in feature column names
    pub fn index(&self) -> u8 {
        match self {
            RatingType::Steady => 0,
            RatingType::Reactive => 1,
        }
    }

    pub fn k_factor(&self) -> f64 {
        match self {
            RatingType::Steady => 20.0,
            RatingType::Reactive => 40.0,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RatingType::Steady),
            1 => Some(RatingType::Reactive),
            _ => None,
        }
    }
}

impl fmt::Display for RatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingType::Steady => write!(f, "steady"),
            RatingType::Reactive => write!(f, "reactive"),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum NbaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has {actual} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid date '{date_str}' for {team} in {stage}")]
    InvalidDate {
        stage: &'static str,
        team: String,
        date_str: String,
    },

    #[error("No opponent row for {team} in game {game_key}")]
    MissingOpponent { team: String, game_key: GameKey },

    #[error("{count} opponent rows for {team} in game {game_key}")]
    AmbiguousOpponent {
        team: String,
        game_key: GameKey,
        count: usize,
    },

    #[error("Duplicate game {game_key} for {team}")]
    DuplicateGame { team: String, game_key: GameKey },

    #[error("No label for {team} vs {opponent} in game {game_key}")]
    MissingLabel {
        team: String,
        opponent: String,
        game_key: GameKey,
    },

    #[error("No history tensor for {team} in game {game_key}")]
    MissingHistory { team: String, game_key: GameKey },

    #[error("Artifact not found: {} - run the stage that builds it first", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, NbaError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding raw inputs and every persisted artifact
    pub data_path: String,
    pub team_table: String,
    pub player_table: String,
    /// Read only the first N rows of each raw table (test runs)
    pub row_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub rolling_windows: Vec<usize>,
    pub starting_rating: f64,
    pub rating_multiplier: f64,
    pub rating_types: Vec<RatingType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub history_length: usize,
    pub transpose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                data_path: "data".to_string(),
                team_table: "box_score_details".to_string(),
                player_table: "player_details".to_string(),
                row_limit: None,
            },
            features: FeatureConfig {
                rolling_windows: vec![3, 10, 50],
                starting_rating: 1500.0,
                rating_multiplier: 1.0,
                rating_types: vec![RatingType::Steady, RatingType::Reactive],
            },
            history: HistoryConfig {
                history_length: 16,
                transpose: true,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NbaError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| NbaError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NbaError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.history_length == 0 {
            return Err(NbaError::Config("history_length must be at least 1".into()));
        }
        if self.features.rolling_windows.contains(&0) {
            return Err(NbaError::Config(
                "rolling windows must cover at least 1 game".into(),
            ));
        }
        Ok(())
    }
}
