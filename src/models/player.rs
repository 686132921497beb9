//! Per-player match aggregates.
//!
//! A [`PlayerAggregate`] owns one player's view of the match set:
//! shared references to every canonical record they took part in, a
//! memoized best-rating estimate per window size, and the proportional
//! civilization/map share counting that feeds popularity reports.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::MatchRecord;
use crate::calculate::best_rating::{best_window_with, DEFAULT_MIN_HISTORY_FACTOR};

/// Ratings at or below this value are placement noise and are excluded
/// from best-rating estimation.
pub const RATING_FLOOR: u32 = 100;

/// The representative-skill estimate for one window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestRatingEstimate {
    /// Median of the most stable rating window
    pub median: f64,

    /// Sample standard deviation of that window
    pub stdev: f64,
}

/// Which per-match attribute a share counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Civilization,
    Map,
}

/// Proportional share counting shared by live and cached players.
///
/// Selects the player's matches on the optional map filter and the
/// per-match rating band `(start, edge]`, then adds `1/selected` to the
/// counter key of each selected match so every player contributes a
/// total weight of one. Returns false when nothing was selected.
fn add_dimension_shares(
    player_id: &str,
    matches: &[Arc<MatchRecord>],
    dimension: Dimension,
    counter: &mut HashMap<u32, f64>,
    map_filter: Option<u32>,
    start: u32,
    edge: u32,
) -> bool {
    let selected: Vec<u32> = matches
        .iter()
        .filter_map(|record| {
            if let Some(map_code) = map_filter {
                if record.map_code != map_code {
                    return None;
                }
            }

            let participant = record.participant(player_id)?;
            if participant.rating <= start || participant.rating > edge {
                return None;
            }

            Some(match dimension {
                Dimension::Civilization => participant.civ,
                Dimension::Map => record.map_code,
            })
        })
        .collect();

    if selected.is_empty() {
        return false;
    }

    let share = 1.0 / selected.len() as f64;
    for key in selected {
        *counter.entry(key).or_default() += share;
    }
    true
}

/// One player's matches plus lazily computed rating estimates.
#[derive(Debug, Clone, Default)]
pub struct PlayerAggregate {
    /// Player profile id
    pub player_id: String,

    /// Every canonical record the player took part in
    pub matches: Vec<Arc<MatchRecord>>,

    /// Memoized estimate per window size. Entries are not invalidated
    /// when matches are added later; callers build the match set first.
    cache: HashMap<usize, Option<BestRatingEstimate>>,
}

impl PlayerAggregate {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            matches: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Attach a match the player took part in.
    pub fn add_match(&mut self, record: Arc<MatchRecord>) {
        self.matches.push(record);
    }

    /// Group canonical records into per-player aggregates. Every
    /// participant of every match gets the record attached.
    pub fn group(records: Vec<MatchRecord>) -> HashMap<String, PlayerAggregate> {
        let mut players: HashMap<String, PlayerAggregate> = HashMap::new();

        for record in records {
            let record = Arc::new(record);
            for participant in &record.participants {
                players
                    .entry(participant.player_id.clone())
                    .or_insert_with(|| PlayerAggregate::new(participant.player_id.clone()))
                    .add_match(Arc::clone(&record));
            }
        }

        players
    }

    /// The player's per-match ratings above the placement floor, in
    /// match-list order.
    pub fn valid_ratings(&self) -> Vec<u32> {
        self.matches
            .iter()
            .filter_map(|record| record.rating_for(&self.player_id))
            .filter(|rating| *rating > RATING_FLOOR)
            .collect()
    }

    /// Representative rating for the given window size, or `None` when
    /// the history is too short. Memoized per window size.
    pub fn best_rating(&mut self, window_size: usize) -> Option<f64> {
        self.best_rating_with(window_size, DEFAULT_MIN_HISTORY_FACTOR)
    }

    /// Like [`best_rating`](Self::best_rating) with an explicit
    /// minimum-history margin.
    pub fn best_rating_with(&mut self, window_size: usize, min_history_factor: f64) -> Option<f64> {
        self.estimate_with(window_size, min_history_factor)
            .map(|estimate| estimate.median)
    }

    /// Sample standard deviation of the winning window.
    pub fn best_stdev(&mut self, window_size: usize) -> Option<f64> {
        self.estimate_with(window_size, DEFAULT_MIN_HISTORY_FACTOR)
            .map(|estimate| estimate.stdev)
    }

    fn estimate_with(
        &mut self,
        window_size: usize,
        min_history_factor: f64,
    ) -> Option<BestRatingEstimate> {
        if let Some(cached) = self.cache.get(&window_size) {
            return *cached;
        }

        let estimate = best_window_with(&self.valid_ratings(), window_size, min_history_factor);
        self.cache.insert(window_size, estimate);
        estimate
    }

    /// Add this player's civilization shares to a counter.
    pub fn add_civ_shares(
        &self,
        counter: &mut HashMap<u32, f64>,
        map_filter: Option<u32>,
        start: u32,
        edge: u32,
    ) -> bool {
        add_dimension_shares(
            &self.player_id,
            &self.matches,
            Dimension::Civilization,
            counter,
            map_filter,
            start,
            edge,
        )
    }

    /// Add this player's map shares to a counter.
    pub fn add_map_shares(
        &self,
        counter: &mut HashMap<u32, f64>,
        start: u32,
        edge: u32,
    ) -> bool {
        add_dimension_shares(
            &self.player_id,
            &self.matches,
            Dimension::Map,
            counter,
            None,
            start,
            edge,
        )
    }
}

/// A player whose best rating was loaded from a persisted cache file
/// instead of being recomputed from match history.
#[derive(Debug, Clone)]
pub struct RatedPlayer {
    /// Player profile id
    pub player_id: String,

    /// Every canonical record the player took part in
    pub matches: Vec<Arc<MatchRecord>>,

    /// Cached representative rating
    pub best_rating: f64,
}

impl RatedPlayer {
    /// Pair aggregates with cached ratings. Players missing from the
    /// cache had no estimate when it was built and are skipped.
    pub fn from_cache(
        aggregates: HashMap<String, PlayerAggregate>,
        cached_ratings: &HashMap<String, f64>,
    ) -> Vec<RatedPlayer> {
        let mut players: Vec<RatedPlayer> = aggregates
            .into_iter()
            .filter_map(|(player_id, aggregate)| {
                cached_ratings.get(&player_id).map(|rating| RatedPlayer {
                    player_id,
                    matches: aggregate.matches,
                    best_rating: *rating,
                })
            })
            .collect();
        players.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        players
    }

    /// Add this player's shares for the given dimension to a counter.
    pub fn add_shares(
        &self,
        dimension: Dimension,
        counter: &mut HashMap<u32, f64>,
        map_filter: Option<u32>,
        start: u32,
        edge: u32,
    ) -> bool {
        add_dimension_shares(
            &self.player_id,
            &self.matches,
            dimension,
            counter,
            map_filter,
            start,
            edge,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Participant, RawMatch};
    use pretty_assertions::assert_eq;

    fn duel(rating: u32, civ: u32, map_code: u32) -> MatchRecord {
        let raw = RawMatch {
            match_id: 1,
            started: 1_582_654_374,
            map_code,
            civs: vec![civ, 1],
            ratings: vec![rating, 1000],
            player_ids: vec!["p1".to_string(), "p2".to_string()],
            teams: vec![1, 2],
            version: "0".to_string(),
        };
        MatchRecord::from_raw(&raw, 1).unwrap()
    }

    fn aggregate_with_ratings(ratings: &[u32]) -> PlayerAggregate {
        let mut aggregate = PlayerAggregate::new("p1");
        for rating in ratings {
            aggregate.add_match(Arc::new(duel(*rating, 5, 9)));
        }
        aggregate
    }

    #[test]
    fn test_valid_ratings_filters_placement_noise() {
        let aggregate = aggregate_with_ratings(&[10, 10, 100, 1000, 1000, 1000]);

        assert_eq!(aggregate.valid_ratings(), vec![1000, 1000, 1000]);
    }

    #[test]
    fn test_best_rating_picks_most_stable_window() {
        let mut aggregate = aggregate_with_ratings(&[103, 104, 105, 1015, 1016, 1017]);

        assert_eq!(aggregate.best_rating(3), Some(1016.0));
    }

    #[test]
    fn test_best_rating_requires_enough_history() {
        // Three ratings survive the floor, below the 4.5 needed for a
        // window of three.
        let mut aggregate = aggregate_with_ratings(&[10, 10, 100, 1000, 1000, 1000]);

        assert_eq!(aggregate.best_rating(3), None);
    }

    #[test]
    fn test_best_rating_is_memoized_across_mutation() {
        let mut aggregate = aggregate_with_ratings(&[1000, 1000, 1000]);
        assert_eq!(aggregate.best_rating(2), Some(1000.0));

        aggregate.add_match(Arc::new(duel(2000, 5, 9)));

        // The cached estimate survives later match additions.
        assert_eq!(aggregate.best_rating(2), Some(1000.0));
    }

    #[test]
    fn test_best_stdev_of_flat_window() {
        let mut aggregate = aggregate_with_ratings(&[1000, 1000, 1000]);

        assert_eq!(aggregate.best_stdev(2), Some(0.0));
    }

    #[test]
    fn test_civ_shares_are_proportional() {
        let mut aggregate = PlayerAggregate::new("p1");
        for civ in [5, 30, 35] {
            aggregate.add_match(Arc::new(duel(1000, civ, 9)));
        }

        let mut counter = HashMap::new();
        let contributed = aggregate.add_civ_shares(&mut counter, None, 0, 10_000);

        assert!(contributed);
        for civ in [5, 30, 35] {
            let share = counter[&civ];
            assert!((share - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_shares_respect_rating_band() {
        let mut aggregate = PlayerAggregate::new("p1");
        aggregate.add_match(Arc::new(duel(10, 5, 9)));
        aggregate.add_match(Arc::new(duel(1000, 30, 9)));

        // The low-rated match is the only one inside (0, 20].
        let mut counter = HashMap::new();
        assert!(aggregate.add_civ_shares(&mut counter, None, 0, 20));
        assert_eq!(counter.len(), 1);
        assert!((counter[&5] - 1.0).abs() < 1e-9);

        // Nothing inside (2000, 3000].
        let mut empty = HashMap::new();
        assert!(!aggregate.add_civ_shares(&mut empty, None, 2000, 3000));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_shares_respect_map_filter() {
        let mut aggregate = PlayerAggregate::new("p1");
        aggregate.add_match(Arc::new(duel(1000, 5, 9)));
        aggregate.add_match(Arc::new(duel(1000, 30, 33)));

        let mut counter = HashMap::new();
        assert!(aggregate.add_civ_shares(&mut counter, Some(33), 0, 10_000));
        assert_eq!(counter.len(), 1);
        assert!((counter[&30] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_map_shares() {
        let mut aggregate = PlayerAggregate::new("p1");
        aggregate.add_match(Arc::new(duel(1000, 5, 9)));
        aggregate.add_match(Arc::new(duel(1000, 30, 9)));
        aggregate.add_match(Arc::new(duel(1000, 35, 33)));

        let mut counter = HashMap::new();
        assert!(aggregate.add_map_shares(&mut counter, 0, 10_000));
        assert!((counter[&9] - 2.0 / 3.0).abs() < 1e-9);
        assert!((counter[&33] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_attaches_record_to_every_participant() {
        let record = duel(1000, 5, 9);
        let players = PlayerAggregate::group(vec![record]);

        assert_eq!(players.len(), 2);
        assert_eq!(players["p1"].matches.len(), 1);
        assert_eq!(players["p2"].matches.len(), 1);
        assert!(matches!(
            players["p1"].matches[0].participants.as_slice(),
            [Participant { .. }, Participant { .. }]
        ));
    }

    #[test]
    fn test_rated_players_skip_uncached() {
        let players = PlayerAggregate::group(vec![duel(1000, 5, 9)]);
        let mut cached = HashMap::new();
        cached.insert("p1".to_string(), 1016.0);

        let rated = RatedPlayer::from_cache(players, &cached);

        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].player_id, "p1");
        assert_eq!(rated[0].best_rating, 1016.0);
    }
}
