//! Loading raw feed files into memory.
//!
//! The fetch stage leaves one match file and one rating file per
//! profile under `data/raw/`. This module discovers those files,
//! deduplicates matches that appear in several profiles' feeds, and
//! builds the rating lookup used for winner resolution.

use std::collections::HashSet;

use glob::glob;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{MatchRecord, RatingLookup, RatingObservation, RawMatch};
use crate::storage::{CsvReader, DatasetKind, StorageConfig, StorageError};

/// Data-loading errors.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("No rating history for profile {0}")]
    NoRatings(String),
}

/// Profile ids with a match file on disk, sorted.
pub fn scan_profiles(storage: &StorageConfig) -> Result<Vec<String>, DataError> {
    let pattern = storage
        .raw_dir()
        .join("matches_for_*.csv")
        .to_string_lossy()
        .into_owned();

    let mut profiles = Vec::new();
    for entry in glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        let stem = path.file_stem().and_then(|s| s.to_str());
        if let Some(profile_id) = stem.and_then(|s| s.strip_prefix("matches_for_")) {
            profiles.push(profile_id.to_string());
        }
    }

    profiles.sort();
    Ok(profiles)
}

/// Load every fetched match, deduplicated across profile files.
///
/// The same match appears in the feed of each fetched participant, so
/// rows are deduplicated on `(started, match_id)`. The result is sorted
/// by that same pair to make downstream splits reproducible.
pub fn load_all_matches(storage: &StorageConfig) -> Result<Vec<RawMatch>, DataError> {
    let profiles = scan_profiles(storage)?;

    let mut seen: HashSet<(i64, u64)> = HashSet::new();
    let mut matches = Vec::new();
    for profile_id in &profiles {
        let rows = CsvReader::<RawMatch>::new(storage.matches_path(profile_id)).read_all()?;
        for raw in rows {
            if seen.insert((raw.started, raw.match_id)) {
                matches.push(raw);
            }
        }
    }

    matches.sort_by_key(|m| (m.started, m.match_id));
    info!(
        profiles = profiles.len(),
        matches = matches.len(),
        "loaded raw matches"
    );
    Ok(matches)
}

/// Load one profile's rating history. A missing file is an error: a
/// profile with a match file but no rating file points at an
/// interrupted fetch.
pub fn load_ratings(
    storage: &StorageConfig,
    profile_id: &str,
) -> Result<Vec<RatingObservation>, DataError> {
    let reader = CsvReader::<RatingObservation>::new(storage.ratings_path(profile_id));
    if !reader.exists() {
        return Err(DataError::NoRatings(profile_id.to_string()));
    }
    Ok(reader.read_all()?)
}

/// Build the rating lookup for every fetched profile.
///
/// Only fetched profiles carry histories; opponents that were never
/// fetched stay absent from the lookup and contribute no outcome
/// signal during winner resolution.
pub fn load_rating_lookup(storage: &StorageConfig) -> Result<RatingLookup, DataError> {
    let profiles = scan_profiles(storage)?;

    let mut lookup = RatingLookup::new();
    for profile_id in &profiles {
        lookup.insert(profile_id.clone(), load_ratings(storage, profile_id)?);
    }

    info!(profiles = profiles.len(), "built rating lookup");
    Ok(lookup)
}

/// Load one canonical dataset split.
pub fn load_dataset(
    storage: &StorageConfig,
    kind: DatasetKind,
) -> Result<Vec<MatchRecord>, DataError> {
    let records = CsvReader::<MatchRecord>::new(storage.dataset_path(kind)).read_all()?;
    info!(dataset = kind.name(), matches = records.len(), "loaded dataset");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CsvWriter;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn duel(match_id: u64, started: i64, player_ids: [&str; 2]) -> RawMatch {
        RawMatch {
            match_id,
            started,
            map_code: 9,
            civs: vec![5, 30],
            ratings: vec![1000, 1010],
            player_ids: player_ids.iter().map(|id| id.to_string()).collect(),
            teams: vec![1, 2],
            version: "0".to_string(),
        }
    }

    fn observation(rating: u32, timestamp: i64) -> RatingObservation {
        RatingObservation {
            profile_id: "a".to_string(),
            rating,
            old_rating: None,
            num_wins: 0,
            num_losses: 0,
            drops: 0,
            timestamp,
            won_state: Default::default(),
        }
    }

    #[test]
    fn test_scan_profiles_sorted() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        for profile_id in ["b", "a", "1301032"] {
            CsvWriter::<RawMatch>::new(storage.matches_path(profile_id))
                .append(&duel(1, 100, ["a", "b"]))
                .unwrap();
        }
        // Unrelated files in raw/ are ignored.
        std::fs::write(storage.users_path(), "profile_id,name,rating,num_games\n").unwrap();

        let profiles = scan_profiles(&storage).unwrap();

        assert_eq!(profiles, vec!["1301032", "a", "b"]);
    }

    #[test]
    fn test_scan_profiles_empty_dir() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        assert!(scan_profiles(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_load_all_matches_dedupes_and_sorts() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        // The same match shows up in both players' feeds.
        let shared = duel(7, 200, ["a", "b"]);
        CsvWriter::<RawMatch>::new(storage.matches_path("a"))
            .append_batch(&[duel(9, 300, ["a", "c"]), shared.clone()])
            .unwrap();
        CsvWriter::<RawMatch>::new(storage.matches_path("b"))
            .append_batch(&[shared.clone(), duel(3, 100, ["b", "c"])])
            .unwrap();

        let matches = load_all_matches(&storage).unwrap();

        let ids: Vec<u64> = matches.iter().map(|m| m.match_id).collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }

    #[test]
    fn test_load_ratings_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        let err = load_ratings(&storage, "242765").unwrap_err();

        assert!(matches!(err, DataError::NoRatings(ref id) if id == "242765"));
    }

    #[test]
    fn test_load_rating_lookup_requires_every_profile() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        CsvWriter::<RawMatch>::new(storage.matches_path("a"))
            .append(&duel(1, 100, ["a", "b"]))
            .unwrap();

        // Match file present, rating file absent.
        assert!(matches!(
            load_rating_lookup(&storage),
            Err(DataError::NoRatings(_))
        ));

        CsvWriter::<RatingObservation>::new(storage.ratings_path("a"))
            .append_batch(&[observation(1000, 100), observation(1010, 200)])
            .unwrap();

        let lookup = load_rating_lookup(&storage).unwrap();
        assert!(lookup.contains("a"));
        assert!(!lookup.contains("b"));
    }

    #[test]
    fn test_load_dataset_missing_reads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());

        assert!(load_dataset(&storage, DatasetKind::Model).unwrap().is_empty());
    }
}
