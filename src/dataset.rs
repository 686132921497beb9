//! Canonical dataset construction.
//!
//! Turns the deduplicated raw match pool into three flat dataset files
//! (model, verification, test) with resolved winners, and persists the
//! per-dataset best-rating caches that report generation reads.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::calculate::winner::determine_winner;
use crate::ingest::{self, DataError};
use crate::models::{MatchRecord, PlayerAggregate, RatedPlayer};
use crate::storage::{read_rating_cache, write_rating_cache, CsvWriter, DatasetKind, StorageConfig};

/// Row counts per split after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSummary {
    pub model: usize,
    pub verification: usize,
    pub test: usize,
}

impl DatasetSummary {
    pub fn total(&self) -> usize {
        self.model + self.verification + self.test
    }
}

/// Split position for one row index in the 80/10/10 scheme.
fn split_for(index: usize) -> DatasetKind {
    match index % 10 {
        8 => DatasetKind::Verification,
        9 => DatasetKind::Test,
        _ => DatasetKind::Model,
    }
}

/// Build the three dataset files from the raw data directory.
///
/// Matches are loaded in `(started, match_id)` order, winners resolved
/// in parallel, and rows dealt round-robin into an 80/10/10 split, so
/// the same raw pool always produces the same three files. Matches
/// with an unresolved winner keep the `0` sentinel and stay in the
/// datasets.
pub fn build_datasets(storage: &StorageConfig) -> Result<DatasetSummary, DataError> {
    let matches = ingest::load_all_matches(storage)?;
    let lookup = ingest::load_rating_lookup(storage)?;

    let records: Vec<MatchRecord> = matches
        .par_iter()
        .filter_map(|raw| {
            let winning_team = determine_winner(raw, &lookup);
            match MatchRecord::from_raw(raw, winning_team) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(match_id = raw.match_id, error = %e, "skipping malformed match");
                    None
                }
            }
        })
        .collect();

    let mut splits: HashMap<DatasetKind, Vec<MatchRecord>> = HashMap::new();
    for (index, record) in records.into_iter().enumerate() {
        splits.entry(split_for(index)).or_default().push(record);
    }

    let mut counts = [0usize; 3];
    for (slot, kind) in DatasetKind::all().into_iter().enumerate() {
        let rows = splits.remove(&kind).unwrap_or_default();
        counts[slot] = CsvWriter::<MatchRecord>::new(storage.dataset_path(kind)).write_all(&rows)?;
    }

    let summary = DatasetSummary {
        model: counts[0],
        verification: counts[1],
        test: counts[2],
    };
    info!(
        model = summary.model,
        verification = summary.verification,
        test = summary.test,
        "built datasets"
    );
    Ok(summary)
}

/// Compute and persist best ratings for every player in a dataset.
///
/// Players whose history is too short for the window have no estimate
/// and are left out of the cache file. Returns the number of players
/// cached.
pub fn cache_ratings(
    storage: &StorageConfig,
    kind: DatasetKind,
    window_size: usize,
    min_history_factor: f64,
) -> Result<usize, DataError> {
    let records = ingest::load_dataset(storage, kind)?;
    let aggregates = PlayerAggregate::group(records);
    let total = aggregates.len();

    let mut ratings: HashMap<String, f64> = HashMap::new();
    for (player_id, mut aggregate) in aggregates {
        if let Some(best) = aggregate.best_rating_with(window_size, min_history_factor) {
            ratings.insert(player_id, best);
        }
    }

    info!(
        dataset = kind.name(),
        window = window_size,
        rated = ratings.len(),
        unrated = total - ratings.len(),
        "computed best ratings"
    );
    let written = write_rating_cache(&storage.rating_cache_path(kind, window_size), &ratings)?;
    Ok(written)
}

/// Pair a dataset's players with their cached best ratings.
///
/// Reads the cache file written by [`cache_ratings`]; players missing
/// from it are skipped.
pub fn rated_players(
    storage: &StorageConfig,
    kind: DatasetKind,
    window_size: usize,
) -> Result<Vec<RatedPlayer>, DataError> {
    let records = ingest::load_dataset(storage, kind)?;
    let aggregates = PlayerAggregate::group(records);
    let cached = read_rating_cache(&storage.rating_cache_path(kind, window_size))?;
    Ok(RatedPlayer::from_cache(aggregates, &cached))
}
