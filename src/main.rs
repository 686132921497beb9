use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ladder_meta::calculate::popularity::bands;
use ladder_meta::config::AppConfig;
use ladder_meta::dataset;
use ladder_meta::fetch::Fetcher;
use ladder_meta::models::Lookup;
use ladder_meta::report;
use ladder_meta::storage::DatasetKind;

#[derive(Parser)]
#[command(name = "ladder-meta")]
#[command(about = "Ladder match analysis: fetch, datasets, popularity reports")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download leaderboard users and per-profile histories
    Fetch {
        /// Max profiles to fetch (for testing)
        #[arg(long)]
        limit: Option<usize>,

        /// Refetch profiles that already have files on disk
        #[arg(long)]
        update: bool,
    },

    /// Build the model, verification, and test datasets from raw files
    BuildDatasets,

    /// Compute and persist best ratings per player
    CacheRatings {
        /// Dataset to cache ("model", "verification", "test"; default all)
        #[arg(long)]
        dataset: Option<String>,

        /// Best-rating window size (default from config)
        #[arg(long)]
        window: Option<usize>,
    },

    /// Render reports from cached ratings
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// Civilization popularity per rating band (CSV + HTML)
    Popularity {
        /// Dataset to report on
        #[arg(long, default_value = "model")]
        dataset: String,

        /// Best-rating window size (default from config)
        #[arg(long)]
        window: Option<usize>,
    },

    /// Map similarity from popularity profiles (CSV)
    Similarity {
        /// Dataset to report on
        #[arg(long, default_value = "model")]
        dataset: String,

        /// Best-rating window size (default from config)
        #[arg(long)]
        window: Option<usize>,
    },
}

fn dataset_kind(name: &str) -> Result<DatasetKind> {
    match name {
        "model" => Ok(DatasetKind::Model),
        "verification" => Ok(DatasetKind::Verification),
        "test" => Ok(DatasetKind::Test),
        other => anyhow::bail!(
            "Unknown dataset: {}. Use 'model', 'verification', or 'test'.",
            other
        ),
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = PathBuf::from(&cli.config);
    let mut config = if path.exists() {
        AppConfig::from_file(&path)?
    } else {
        AppConfig::default()
    };

    if let Some(ref data_dir) = cli.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    if let Some(ref log_level) = cli.log_level {
        config.log_level = log_level.clone();
    }

    Ok(config)
}

fn load_lookup(path: &Path) -> Lookup {
    match Lookup::from_file(path) {
        Ok(lookup) => lookup,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "strings file unavailable, reports will show numeric codes"
            );
            Lookup::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting ladder-meta v{}", env!("CARGO_PKG_VERSION"));

    let storage = config.storage();

    match cli.command {
        Commands::Fetch { limit, update } => {
            let fetcher = Fetcher::new(config.fetcher(), storage)?;
            let summary = fetcher.run(limit, update).await?;

            println!("\n=== Fetch Results ===");
            println!("Leaderboard users:  {}", summary.users);
            println!("Profiles fetched:   {}", summary.profiles_fetched);
            println!("Profiles skipped:   {}", summary.profiles_skipped);
        }

        Commands::BuildDatasets => {
            let summary = dataset::build_datasets(&storage)?;

            println!("\n=== Dataset Results ===");
            println!("Model rows:         {}", summary.model);
            println!("Verification rows:  {}", summary.verification);
            println!("Test rows:          {}", summary.test);
            println!("Total:              {}", summary.total());
        }

        Commands::CacheRatings { dataset, window } => {
            let kinds = match dataset {
                Some(ref name) => vec![dataset_kind(name)?],
                None => DatasetKind::all().to_vec(),
            };
            let window = window.unwrap_or(config.rating.window_size);

            println!("\n=== Rating Cache Results ===");
            println!("Window size:        {}", window);
            for kind in kinds {
                let cached = dataset::cache_ratings(
                    &storage,
                    kind,
                    window,
                    config.rating.min_history_factor,
                )?;
                println!("{:<19} {} players", kind.name(), cached);
            }
        }

        Commands::Report { action } => {
            let lookup = load_lookup(&config.strings_path);
            let band_set = bands(&config.rating.edges(), config.rating.band_overlap);

            match action {
                ReportAction::Popularity { dataset, window } => {
                    let kind = dataset_kind(&dataset)?;
                    let window = window.unwrap_or(config.rating.window_size);
                    let paths =
                        report::popularity_report(&storage, &lookup, kind, window, &band_set)?;

                    println!("\n=== Popularity Report ===");
                    for path in &paths {
                        println!("Wrote {}", path.display());
                    }
                }

                ReportAction::Similarity { dataset, window } => {
                    let kind = dataset_kind(&dataset)?;
                    let window = window.unwrap_or(config.rating.window_size);
                    let paths =
                        report::similarity_report(&storage, &lookup, kind, window, &band_set)?;

                    println!("\n=== Similarity Report ===");
                    for path in &paths {
                        println!("Wrote {}", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_kind_parsing() {
        assert_eq!(dataset_kind("model").unwrap(), DatasetKind::Model);
        assert_eq!(
            dataset_kind("verification").unwrap(),
            DatasetKind::Verification
        );
        assert_eq!(dataset_kind("test").unwrap(), DatasetKind::Test);
        assert!(dataset_kind("train").is_err());
    }

    #[test]
    fn test_load_lookup_missing_file_falls_back() {
        let lookup = load_lookup(Path::new("/nonexistent/strings.json"));
        assert_eq!(lookup.civ_name(1), None);
    }
}
