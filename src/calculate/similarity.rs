//! Map similarity from popularity profiles.
//!
//! Two maps are similar when civilizations are picked on them with the
//! same band-by-band frequency. For every civilization the L1 distance
//! between two maps' per-band popularity vectors scores one vote; the
//! votes are weighted and tallied into a best-match table per map.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::popularity::{counters_by_rating_band, rankings, RatingBand};
use crate::models::{Dimension, RatedPlayer};

/// Per-civilization, per-map popularity vectors (one entry per band).
pub type PopularityProfiles = BTreeMap<u32, BTreeMap<u32, Vec<f64>>>;

/// Build popularity profiles from rated players.
///
/// For every map seen in the players' matches, civilization popularity
/// is computed band by band with the map filter applied. A civilization
/// never picked on a map keeps an all-zero vector so every civilization
/// compares the same map set.
pub fn popularity_profiles(players: &[RatedPlayer], bands: &[RatingBand]) -> PopularityProfiles {
    let maps: BTreeSet<u32> = players
        .iter()
        .flat_map(|player| player.matches.iter().map(|record| record.map_code))
        .collect();

    let mut profiles: PopularityProfiles = BTreeMap::new();
    for &map_code in &maps {
        let counters =
            counters_by_rating_band(players, Dimension::Civilization, Some(map_code), bands);
        for (band_index, counter) in counters.iter().enumerate() {
            for standing in rankings(&counter.counts) {
                profiles
                    .entry(standing.code)
                    .or_default()
                    .entry(map_code)
                    .or_insert_with(|| vec![0.0; bands.len()])[band_index] = standing.popularity;
            }
        }
    }

    for vectors in profiles.values_mut() {
        for &map_code in &maps {
            vectors
                .entry(map_code)
                .or_insert_with(|| vec![0.0; bands.len()]);
        }
    }

    profiles
}

/// Weighted best matches for one map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSimilarity {
    pub map_code: u32,
    /// Up to two closest maps with their accumulated weights
    pub best_matches: Vec<(u32, f64)>,
}

fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Compute the weighted best-match table.
///
/// For each civilization and map, the closest other map (minimum L1
/// distance, ties to the lower code) scores one vote weighted by
/// `max_distance - distance`, where the maximum is taken over all
/// closest-pair distances. Votes accumulate per map; the top two
/// weights win.
pub fn map_similarity(profiles: &PopularityProfiles) -> Vec<MapSimilarity> {
    // (map, best-matching map, distance) per civilization.
    let mut votes: Vec<(u32, u32, f64)> = Vec::new();

    for maps in profiles.values() {
        for (&map_a, vector_a) in maps {
            let mut best: Option<(u32, f64)> = None;

            for (&map_b, vector_b) in maps {
                if map_b == map_a {
                    continue;
                }
                let distance = l1_distance(vector_a, vector_b);
                let closer = match best {
                    Some((_, best_distance)) => distance < best_distance,
                    None => true,
                };
                if closer {
                    best = Some((map_b, distance));
                }
            }

            if let Some((map_b, distance)) = best {
                votes.push((map_a, map_b, distance));
            }
        }
    }

    let max_distance = votes
        .iter()
        .map(|(_, _, d)| *d)
        .fold(0.0_f64, f64::max);

    let mut tallies: BTreeMap<u32, BTreeMap<u32, f64>> = BTreeMap::new();
    for (map_a, map_b, distance) in votes {
        *tallies
            .entry(map_a)
            .or_default()
            .entry(map_b)
            .or_default() += max_distance - distance;
    }

    tallies
        .into_iter()
        .map(|(map_code, counter)| {
            let mut entries: Vec<(u32, f64)> = counter.into_iter().collect();
            entries.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            entries.truncate(2);

            MapSimilarity {
                map_code,
                best_matches: entries,
            }
        })
        .collect()
}
