//! NBA dataset builder CLI
//!
//! Builds event features and history tensors from raw box-score tables.

use clap::{Parser, Subcommand};
use nba::{Config, Result};

#[derive(Parser)]
#[command(name = "nba")]
#[command(about = "Feature and history-tensor builder for NBA outcome models", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Rebuild processed tables, manifests and the feature table from raw data
    Process {
        /// Read only the first N rows of each raw table
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Build per-team and combined history tensors
    History {
        /// Games per window (defaults to the config value)
        #[arg(long)]
        length: Option<usize>,
        /// Keep windows as [games, features] instead of transposing
        #[arg(long)]
        no_transpose: bool,
    },
    /// Load the labeled data and print its shapes
    Summary {
        #[arg(long)]
        length: Option<usize>,
        #[arg(long)]
        no_transpose: bool,
        /// Skip loading history tensors
        #[arg(long)]
        no_history: bool,
        /// Fraction of rows in the training part
        #[arg(long, default_value = "0.8")]
        train_ratio: f32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Process { limit } => commands::process(config, limit),
        Commands::History {
            length,
            no_transpose,
        } => commands::history(config, length, no_transpose),
        Commands::Summary {
            length,
            no_transpose,
            no_history,
            train_ratio,
        } => commands::summary(config, length, no_transpose, no_history, train_ratio),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use nba::data::DataManager;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all(&config.data.data_path)?;
        println!("Created {}/ directory", config.data.data_path);

        println!("\nNext steps:");
        println!(
            "  1. Place {}.csv and {}.csv in {}/",
            config.data.team_table, config.data.player_table, config.data.data_path
        );
        println!("  2. Run 'nba process' to build the feature table");
        println!("  3. Run 'nba history' to build history tensors");
        println!("  4. Run 'nba summary' to check the labeled data");

        Ok(())
    }

    pub fn process(mut config: Config, limit: Option<usize>) -> Result<()> {
        if limit.is_some() {
            config.data.row_limit = limit;
        }
        let manager = DataManager::new(config);
        let manifest = manager.update_raw_datasets()?;

        println!("Processed data in {}", manager.store().root().display());
        println!("  Standalone features: {}", manifest.standalone_feature_columns.len());
        println!("  Diff features:       {}", manifest.diff_feature_cols.len());
        Ok(())
    }

    fn window(config: &Config, length: Option<usize>, no_transpose: bool) -> (usize, bool) {
        (
            length.unwrap_or(config.history.history_length),
            config.history.transpose && !no_transpose,
        )
    }

    pub fn history(config: Config, length: Option<usize>, no_transpose: bool) -> Result<()> {
        let (history_length, transpose) = window(&config, length, no_transpose);
        let manager = DataManager::new(config);
        let combined = manager.build_past_n_game_dataset(history_length, transpose)?;

        let games: usize = combined.values().map(|g| g.len()).sum();
        let shape = combined
            .values()
            .flat_map(|g| g.values())
            .next()
            .map(|m| format!("{:?}", m.shape()))
            .unwrap_or_else(|| "-".to_string());
        println!("History tensors (length {}, transpose {})", history_length, transpose);
        println!("  Teams:  {}", combined.len());
        println!("  Games:  {}", games);
        println!("  Shape:  {}", shape);
        Ok(())
    }

    pub fn summary(
        config: Config,
        length: Option<usize>,
        no_transpose: bool,
        no_history: bool,
        train_ratio: f32,
    ) -> Result<()> {
        let (history_length, transpose) = window(&config, length, no_transpose);
        let manager = DataManager::new(config);
        let data = manager.get_labeled_data(history_length, transpose, !no_history)?;

        let wins = data.labels.sum();
        println!("Labeled data");
        println!("───────────────────────────────");
        println!("  Rows:     {}", data.len());
        println!("  Event:    {:?}", data.event.shape());
        println!("  History:  {:?}", data.history.shape());
        if !data.is_empty() {
            println!("  Win rate: {:.3}", wins / data.len() as f64);
        }

        let (train, val) = data.split(train_ratio);
        println!("  Split:    {} train / {} validation", train.len(), val.len());
        Ok(())
    }
}
