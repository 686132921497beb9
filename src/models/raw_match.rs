//! Raw match rows as fetched from the ladder feed.
//!
//! Per-player attributes (civilization, rating, id, team) arrive as
//! parallel lists and are stored colon-joined in the per-profile match
//! files, in feed order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ModelError;
use crate::storage::CsvRecord;

/// One match as reported by the feed, before winner resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    /// Feed-assigned match id
    pub match_id: u64,

    /// Unix timestamp of the match start
    pub started: i64,

    /// Map code (resolved to a name at render time)
    pub map_code: u32,

    /// Civilization code per player, parallel to `player_ids`
    pub civs: Vec<u32>,

    /// In-match rating per player, parallel to `player_ids`
    pub ratings: Vec<u32>,

    /// Player profile ids, feed order
    pub player_ids: Vec<String>,

    /// Team id per player, parallel to `player_ids`
    pub teams: Vec<u32>,

    /// Game version string reported by the feed
    pub version: String,
}

fn field<'a>(row: &'a csv::StringRecord, idx: usize, name: &'static str) -> Result<&'a str, ModelError> {
    row.get(idx).ok_or(ModelError::MissingField(name))
}

fn parse_joined_u32(raw: &str, name: &'static str) -> Result<Vec<u32>, ModelError> {
    raw.split(':')
        .map(|part| part.parse().map_err(|_| ModelError::invalid(name, raw)))
        .collect()
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(":")
}

impl RawMatch {
    /// Check that the parallel per-player lists line up.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.player_ids.len();
        if self.civs.len() != n || self.ratings.len() != n || self.teams.len() != n {
            return Err(ModelError::MismatchedLists);
        }
        Ok(())
    }

    /// Number of players in the match.
    pub fn num_players(&self) -> usize {
        self.player_ids.len()
    }

    /// In-match rating for a player, if they took part.
    pub fn rating_for(&self, player_id: &str) -> Option<u32> {
        self.player_ids
            .iter()
            .position(|id| id == player_id)
            .map(|idx| self.ratings[idx])
    }

    /// Team shape label, e.g. "1v1" or "2v2" or "1v2".
    ///
    /// Counts players per team and joins the sorted counts with "v".
    pub fn match_type(&self) -> String {
        let mut sizes: HashMap<u32, usize> = HashMap::new();
        for team in &self.teams {
            *sizes.entry(*team).or_default() += 1;
        }

        let mut counts: Vec<usize> = sizes.values().copied().collect();
        counts.sort_unstable();
        counts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("v")
    }
}

impl CsvRecord for RawMatch {
    fn header() -> Option<&'static [&'static str]> {
        Some(&[
            "match_id",
            "started",
            "map_code",
            "civs",
            "ratings",
            "player_ids",
            "teams",
            "version",
        ])
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.match_id.to_string(),
            self.started.to_string(),
            self.map_code.to_string(),
            join(&self.civs),
            join(&self.ratings),
            self.player_ids.join(":"),
            join(&self.teams),
            self.version.clone(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError> {
        let raw = Self {
            match_id: {
                let v = field(row, 0, "match_id")?;
                v.parse().map_err(|_| ModelError::invalid("match_id", v))?
            },
            started: {
                let v = field(row, 1, "started")?;
                v.parse().map_err(|_| ModelError::invalid("started", v))?
            },
            map_code: {
                let v = field(row, 2, "map_code")?;
                v.parse().map_err(|_| ModelError::invalid("map_code", v))?
            },
            civs: parse_joined_u32(field(row, 3, "civs")?, "civs")?,
            ratings: parse_joined_u32(field(row, 4, "ratings")?, "ratings")?,
            player_ids: field(row, 5, "player_ids")?
                .split(':')
                .map(str::to_string)
                .collect(),
            teams: parse_joined_u32(field(row, 6, "teams")?, "teams")?,
            version: field(row, 7, "version")?.to_string(),
        };

        raw.validate()?;
        Ok(raw)
    }
}
