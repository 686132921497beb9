//! Rating-banded popularity counting.
//!
//! Players are bucketed by their cached best rating into overlapping
//! bands; within each band every player contributes proportional
//! civilization or map shares, which roll up into ranking tables and a
//! CDF used for report coloring.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Dimension, Lookup, RatedPlayer};

/// Sentinel edge closing the open-ended top band.
pub const OPEN_EDGE: u32 = 10_000;

/// Default overlap between consecutive bands.
pub const DEFAULT_BAND_OVERLAP: u32 = 50;

/// The reference band edges: 650 through 1700 in steps of 50, closed
/// by the open-edge sentinel.
pub fn reference_edges() -> Vec<u32> {
    let mut edges: Vec<u32> = (650..=1700).step_by(50).collect();
    edges.push(OPEN_EDGE);
    edges
}

/// One half-open rating interval `(start, edge]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingBand {
    pub start: u32,
    pub edge: u32,
    pub label: String,
}

impl RatingBand {
    /// Whether a rating falls inside the band.
    pub fn contains(&self, rating: f64) -> bool {
        rating > self.start as f64 && rating <= self.edge as f64
    }
}

/// Build overlapping bands from an edge list. Each band after the
/// first starts `overlap` points below the previous edge.
pub fn bands(edges: &[u32], overlap: u32) -> Vec<RatingBand> {
    let mut result = Vec::with_capacity(edges.len());
    let mut start = 0u32;

    for &edge in edges {
        let label = if edge == OPEN_EDGE {
            format!("{start}+")
        } else {
            format!("{}-{edge}", start + 1)
        };
        result.push(RatingBand { start, edge, label });
        start = edge.saturating_sub(overlap);
    }

    result
}

/// Proportional share counts for one band.
#[derive(Debug, Clone)]
pub struct BandCounter {
    pub band: RatingBand,
    /// Share per civilization or map code
    pub counts: HashMap<u32, f64>,
    /// Whether any player contributed to this band
    pub has_result: bool,
}

/// A counter resolved to display names, built fresh per report.
#[derive(Debug, Clone, Serialize)]
pub struct PopularitySnapshot {
    pub dimension_key: String,
    pub counts: HashMap<String, f64>,
    pub has_result: bool,
}

impl BandCounter {
    /// Resolve codes to display names. Codes missing from the lookup
    /// keep their numeric form.
    pub fn to_snapshot(&self, lookup: &Lookup, dimension: Dimension) -> PopularitySnapshot {
        let counts = self
            .counts
            .iter()
            .map(|(code, share)| {
                let name = match dimension {
                    Dimension::Civilization => lookup.civ_name(*code),
                    Dimension::Map => lookup.map_name(*code),
                };
                (
                    name.map(str::to_string).unwrap_or_else(|| code.to_string()),
                    *share,
                )
            })
            .collect();

        PopularitySnapshot {
            dimension_key: self.band.label.clone(),
            counts,
            has_result: self.has_result,
        }
    }
}

/// Count proportional shares per band.
///
/// A player lands in every band containing their cached best rating;
/// inside a band only their matches with an in-band per-match rating
/// (and matching the optional map filter) contribute.
pub fn counters_by_rating_band(
    players: &[RatedPlayer],
    dimension: Dimension,
    map_filter: Option<u32>,
    bands: &[RatingBand],
) -> Vec<BandCounter> {
    bands
        .iter()
        .map(|band| {
            let mut counts = HashMap::new();
            let mut has_result = false;

            for player in players {
                if !band.contains(player.best_rating) {
                    continue;
                }
                if player.add_shares(dimension, &mut counts, map_filter, band.start, band.edge) {
                    has_result = true;
                }
            }

            BandCounter {
                band: band.clone(),
                counts,
                has_result,
            }
        })
        .collect()
}

/// One category's position in a band ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub code: u32,
    pub rank: usize,
    /// Summed proportional share
    pub share: f64,
    /// Share normalized by the band total
    pub popularity: f64,
}

/// Rank categories by descending share. Ties break on the lower code
/// so the ordering is deterministic.
pub fn rankings(counts: &HashMap<u32, f64>) -> Vec<Standing> {
    let total: f64 = counts.values().sum();

    let mut entries: Vec<(u32, f64)> = counts.iter().map(|(code, share)| (*code, *share)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (code, share))| Standing {
            code,
            rank: idx + 1,
            share,
            popularity: if total > 0.0 { share / total } else { 0.0 },
        })
        .collect()
}

/// Cumulative distribution of popularity values, keyed by the value
/// rounded to three decimals (stored in thousandths).
pub fn popularity_cdf(values: &[f64]) -> BTreeMap<i64, f64> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let total = sorted.len() as f64;
    let mut cdf = BTreeMap::new();
    for (idx, value) in sorted.iter().enumerate() {
        // Duplicates overwrite with the highest position, giving the
        // fraction of values at or below this one.
        cdf.insert(to_mills(*value), (idx + 1) as f64 / total);
    }
    cdf
}

/// CDF position for a popularity value; values below the smallest key
/// map to 0.
pub fn cdf_value(cdf: &BTreeMap<i64, f64>, value: f64) -> f64 {
    let key = to_mills(value);
    cdf.range(..=key)
        .next_back()
        .map(|(_, fraction)| *fraction)
        .unwrap_or(0.0)
}

fn to_mills(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}
