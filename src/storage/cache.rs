//! Persisted best-rating caches.
//!
//! Computing best ratings for thousands of players is the slow part of
//! report generation, so the results are written to one cache file per
//! (dataset, window) pair as bare `player_id,best_rating` rows.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use super::csv::{CsvReader, CsvRecord, CsvWriter};
use super::StorageError;
use crate::models::ModelError;

/// One cached best-rating row.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingCacheEntry {
    pub player_id: String,
    pub best_rating: f64,
}

impl CsvRecord for RatingCacheEntry {
    fn to_row(&self) -> Vec<String> {
        vec![self.player_id.clone(), self.best_rating.to_string()]
    }

    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError> {
        let player_id = row
            .get(0)
            .ok_or(ModelError::MissingField("player_id"))?
            .to_string();
        let raw = row.get(1).ok_or(ModelError::MissingField("best_rating"))?;
        let best_rating = raw
            .parse()
            .map_err(|_| ModelError::invalid("best_rating", raw))?;

        Ok(Self {
            player_id,
            best_rating,
        })
    }
}

/// Write a cache file. Players are sorted by id so repeated runs
/// produce identical files. Returns the number of rows written.
pub fn write_rating_cache(
    path: &Path,
    ratings: &HashMap<String, f64>,
) -> Result<usize, StorageError> {
    let mut entries: Vec<RatingCacheEntry> = ratings
        .iter()
        .map(|(player_id, best_rating)| RatingCacheEntry {
            player_id: player_id.clone(),
            best_rating: *best_rating,
        })
        .collect();
    entries.sort_by(|a, b| a.player_id.cmp(&b.player_id));

    let written = CsvWriter::<RatingCacheEntry>::new(path).write_all(&entries)?;
    info!(path = %path.display(), players = written, "wrote rating cache");
    Ok(written)
}

/// Load a cache file into a player → best-rating map.
pub fn read_rating_cache(path: &Path) -> Result<HashMap<String, f64>, StorageError> {
    let entries = CsvReader::<RatingCacheEntry>::new(path).read_all()?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.player_id, entry.best_rating))
        .collect())
}
