//! Statistics calculation engine.
//!
//! Computes derived metrics from canonical match records:
//! - Best-rating estimation over sliding windows
//! - Winner resolution from rating-history signals
//! - Rating-banded popularity and rankings
//! - Civilization win rates
//! - Map similarity clustering

pub mod best_rating;
pub mod popularity;
pub mod similarity;
pub mod winner;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::models::MatchRecord;

/// Win and decided-match counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WinCounts {
    pub wins: u32,
    pub decided: u32,
}

impl WinCounts {
    /// Win rate over decided matches.
    pub fn win_rate(&self) -> f64 {
        calculate_win_rate(self.wins, self.decided)
    }
}

/// Calculate win rate from wins over decided matches.
pub fn calculate_win_rate(wins: u32, decided: u32) -> f64 {
    if decided == 0 {
        0.0
    } else {
        wins as f64 / decided as f64
    }
}

/// Count wins per civilization over decided matches.
///
/// Matches without a resolved winner stay out of both numerator and
/// denominator; they still count toward popularity elsewhere.
pub fn civ_win_counts(
    records: &[Arc<MatchRecord>],
    map_filter: Option<u32>,
) -> HashMap<u32, WinCounts> {
    let mut counts: HashMap<u32, WinCounts> = HashMap::new();

    for record in records {
        if !record.is_decided() {
            continue;
        }
        if let Some(map_code) = map_filter {
            if record.map_code != map_code {
                continue;
            }
        }

        for participant in &record.participants {
            let entry = counts.entry(participant.civ).or_default();
            entry.decided += 1;
            if participant.team == record.winning_team {
                entry.wins += 1;
            }
        }
    }

    counts
}
