//! Canonical match records.
//!
//! A [`MatchRecord`] is the normalized form of a raw match after winner
//! resolution: participants are sorted by player id so the same match
//! serializes to the same row no matter which profile's file it came
//! from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{ModelError, RawMatch};
use crate::storage::CsvRecord;

/// One player's slot in a canonical match record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Player profile id
    pub player_id: String,

    /// Civilization code
    pub civ: u32,

    /// In-match rating
    pub rating: u32,

    /// Team id
    pub team: u32,
}

/// A normalized match with a resolved winner.
///
/// `winning_team` is 0 when no winner could be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unix timestamp of the match start
    pub started: i64,

    /// Map code
    pub map_code: u32,

    /// Participants, sorted by player id
    pub participants: Vec<Participant>,

    /// Winning team id, or 0 when undetermined
    pub winning_team: u32,

    /// Game version string
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

impl MatchRecord {
    /// Normalize a raw match into a canonical record.
    pub fn from_raw(raw: &RawMatch, winning_team: u32) -> Result<Self, ModelError> {
        raw.validate()?;

        let mut participants: Vec<Participant> = raw
            .player_ids
            .iter()
            .enumerate()
            .map(|(idx, player_id)| Participant {
                player_id: player_id.clone(),
                civ: raw.civs[idx],
                rating: raw.ratings[idx],
                team: raw.teams[idx],
            })
            .collect();
        participants.sort_by(|a, b| a.player_id.cmp(&b.player_id));

        Ok(Self {
            started: raw.started,
            map_code: raw.map_code,
            participants,
            winning_team,
            version: raw.version.clone(),
        })
    }

    /// Whether a winner was determined.
    pub fn is_decided(&self) -> bool {
        self.winning_team != 0
    }

    /// The participant slot for a player, if they took part.
    pub fn participant(&self, player_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.player_id == player_id)
    }

    /// In-match rating for a player.
    pub fn rating_for(&self, player_id: &str) -> Option<u32> {
        self.participant(player_id).map(|p| p.rating)
    }

    /// Whether a player won this match. `None` when the match is
    /// undetermined or the player did not take part.
    pub fn won_by(&self, player_id: &str) -> Option<bool> {
        if !self.is_decided() {
            return None;
        }
        self.participant(player_id)
            .map(|p| p.team == self.winning_team)
    }

    /// Team shape label, e.g. "1v1" or "2v2".
    pub fn match_type(&self) -> String {
        let mut sizes: HashMap<u32, usize> = HashMap::new();
        for participant in &self.participants {
            *sizes.entry(participant.team).or_default() += 1;
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

impl CsvRecord for MatchRecord {
    fn to_row(&self) -> Vec<String> {
        let joined = |f: &dyn Fn(&Participant) -> String| {
            self.participants
                .iter()
                .map(|p| f(p))
                .collect::<Vec<_>>()
                .join(":")
        };

        vec![
            self.started.to_string(),
            self.map_code.to_string(),
            joined(&|p| p.civ.to_string()),
            joined(&|p| p.rating.to_string()),
            joined(&|p| p.player_id.clone()),
            joined(&|p| p.team.to_string()),
            self.winning_team.to_string(),
            self.version.clone(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError> {
        let civs = parse_joined_u32(field(row, 2, "civs")?, "civs")?;
        let ratings = parse_joined_u32(field(row, 3, "ratings")?, "ratings")?;
        let player_ids: Vec<String> = field(row, 4, "player_ids")?
            .split(':')
            .map(str::to_string)
            .collect();
        let teams = parse_joined_u32(field(row, 5, "teams")?, "teams")?;

        if civs.len() != player_ids.len()
            || ratings.len() != player_ids.len()
            || teams.len() != player_ids.len()
        {
            return Err(ModelError::MismatchedLists);
        }

        let participants = player_ids
            .into_iter()
            .enumerate()
            .map(|(idx, player_id)| Participant {
                player_id,
                civ: civs[idx],
                rating: ratings[idx],
                team: teams[idx],
            })
            .collect();

        Ok(Self {
            started: {
                let v = field(row, 0, "started")?;
                v.parse().map_err(|_| ModelError::invalid("started", v))?
            },
            map_code: {
                let v = field(row, 1, "map_code")?;
                v.parse().map_err(|_| ModelError::invalid("map_code", v))?
            },
            participants,
            winning_team: {
                let v = field(row, 6, "winning_team")?;
                v.parse()
                    .map_err(|_| ModelError::invalid("winning_team", v))?
            },
            version: field(row, 7, "version")?.to_string(),
        })
    }
}
