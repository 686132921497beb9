//! Flat-file storage layer.
//!
//! Everything persists as CSV under a single data directory:
//!
//! ```text
//! data/
//!   raw/        matches_for_{profile}.csv, ratings_for_{profile}.csv, users.csv
//!   datasets/   match_model_data.csv, match_verification_data.csv, match_test_data.csv
//!   cache/      player_rating_{dataset}_{window}_data.csv
//!   reports/    rendered CSV/HTML reports
//! ```

mod cache;
mod csv;

pub use self::cache::{read_rating_cache, write_rating_cache, RatingCacheEntry};
pub use self::csv::{CsvReader, CsvRecord, CsvWriter};

use std::path::PathBuf;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Which split of the canonical dataset a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Model,
    Verification,
    Test,
}

impl DatasetKind {
    /// The name used in dataset and cache filenames.
    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Model => "model",
            DatasetKind::Verification => "verification",
            DatasetKind::Test => "test",
        }
    }

    /// All kinds in split order.
    pub fn all() -> [DatasetKind; 3] {
        [
            DatasetKind::Model,
            DatasetKind::Verification,
            DatasetKind::Test,
        ]
    }
}

/// Storage configuration with typed path helpers.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory for all data
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory for raw per-profile feed files.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Directory for split dataset files.
    pub fn datasets_dir(&self) -> PathBuf {
        self.data_dir.join("datasets")
    }

    /// Directory for best-rating cache files.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Directory for rendered reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    /// Raw match file for one profile.
    pub fn matches_path(&self, profile_id: &str) -> PathBuf {
        self.raw_dir().join(format!("matches_for_{profile_id}.csv"))
    }

    /// Raw rating-history file for one profile.
    pub fn ratings_path(&self, profile_id: &str) -> PathBuf {
        self.raw_dir().join(format!("ratings_for_{profile_id}.csv"))
    }

    /// Leaderboard users file.
    pub fn users_path(&self) -> PathBuf {
        self.raw_dir().join("users.csv")
    }

    /// Canonical dataset file for one split.
    pub fn dataset_path(&self, kind: DatasetKind) -> PathBuf {
        self.datasets_dir()
            .join(format!("match_{}_data.csv", kind.name()))
    }

    /// Best-rating cache file for one (split, window) pair.
    pub fn rating_cache_path(&self, kind: DatasetKind, window_size: usize) -> PathBuf {
        self.cache_dir()
            .join(format!("player_rating_{}_{}_data.csv", kind.name(), window_size))
    }
}
