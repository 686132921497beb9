//! Rating history observations.
//!
//! The ladder feed reports a player's rating history as a series of
//! snapshots. Two derived fields make the series useful for winner
//! resolution: `old_rating` (the rating before the game that produced
//! the snapshot) and `won_state` (whether that game was won or lost).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ModelError;
use crate::storage::CsvRecord;

/// Outcome label derived from consecutive rating observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WonState {
    Won,
    Lost,
    #[default]
    Unknown,
}

impl WonState {
    /// Stable string form used in rating CSV rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            WonState::Won => "won",
            WonState::Lost => "lost",
            WonState::Unknown => "na",
        }
    }

    /// Parse the CSV string form.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "won" => Ok(WonState::Won),
            "lost" => Ok(WonState::Lost),
            "na" | "" => Ok(WonState::Unknown),
            other => Err(ModelError::invalid("won_state", other)),
        }
    }
}

/// One snapshot from a player's rating history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingObservation {
    /// Player this observation belongs to
    pub profile_id: String,

    /// Rating after the game
    pub rating: u32,

    /// Rating before the game, derived from the previous snapshot.
    /// The earliest snapshot has no predecessor.
    pub old_rating: Option<u32>,

    /// Cumulative win count at this point
    pub num_wins: u32,

    /// Cumulative loss count at this point
    pub num_losses: u32,

    /// Cumulative drop count at this point
    pub drops: u32,

    /// Unix timestamp of the snapshot
    pub timestamp: i64,

    /// Whether the game behind this snapshot was won or lost
    pub won_state: WonState,
}

fn field<'a>(row: &'a csv::StringRecord, idx: usize, name: &'static str) -> Result<&'a str, ModelError> {
    row.get(idx).ok_or(ModelError::MissingField(name))
}

fn parse_u32(row: &csv::StringRecord, idx: usize, name: &'static str) -> Result<u32, ModelError> {
    let raw = field(row, idx, name)?;
    raw.parse().map_err(|_| ModelError::invalid(name, raw))
}

fn parse_i64(row: &csv::StringRecord, idx: usize, name: &'static str) -> Result<i64, ModelError> {
    let raw = field(row, idx, name)?;
    raw.parse().map_err(|_| ModelError::invalid(name, raw))
}

impl CsvRecord for RatingObservation {
    fn header() -> Option<&'static [&'static str]> {
        Some(&[
            "profile_id",
            "rating",
            "old_rating",
            "num_wins",
            "num_losses",
            "drops",
            "timestamp",
            "won_state",
        ])
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.profile_id.clone(),
            self.rating.to_string(),
            self.old_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.num_wins.to_string(),
            self.num_losses.to_string(),
            self.drops.to_string(),
            self.timestamp.to_string(),
            self.won_state.as_str().to_string(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError> {
        let old_rating = match field(row, 2, "old_rating")? {
            "" => None,
            raw => Some(raw.parse().map_err(|_| ModelError::invalid("old_rating", raw))?),
        };

        Ok(Self {
            profile_id: field(row, 0, "profile_id")?.to_string(),
            rating: parse_u32(row, 1, "rating")?,
            old_rating,
            num_wins: parse_u32(row, 3, "num_wins")?,
            num_losses: parse_u32(row, 4, "num_losses")?,
            drops: parse_u32(row, 5, "drops")?,
            timestamp: parse_i64(row, 6, "timestamp")?,
            won_state: WonState::parse(field(row, 7, "won_state")?)?,
        })
    }
}

/// Fill in the derived fields of a freshly fetched rating history.
///
/// Observations are sorted by timestamp. Each snapshot's `old_rating`
/// becomes the previous snapshot's rating, and `won_state` reflects
/// which cumulative counter advanced. The earliest snapshot has no
/// predecessor and stays unknown.
pub fn derive_won_states(mut observations: Vec<RatingObservation>) -> Vec<RatingObservation> {
    observations.sort_by_key(|o| o.timestamp);

    for i in (1..observations.len()).rev() {
        let (prev, current) = {
            let (left, right) = observations.split_at_mut(i);
            (&left[i - 1], &mut right[0])
        };

        current.old_rating = Some(prev.rating);
        current.won_state = if current.num_wins > prev.num_wins {
            WonState::Won
        } else if current.num_losses > prev.num_losses {
            WonState::Lost
        } else {
            WonState::Unknown
        };
    }

    if let Some(first) = observations.first_mut() {
        first.old_rating = None;
        first.won_state = WonState::Unknown;
    }

    observations
}

/// One player's observations indexed by `old_rating`.
///
/// Winner resolution matches a participant's in-match rating against
/// the `old_rating` of nearby history snapshots, so the index groups
/// observations by that field. Snapshots without an `old_rating` carry
/// no signal and are left out.
#[derive(Debug, Clone, Default)]
pub struct RatingIndex {
    by_old_rating: HashMap<u32, Vec<RatingObservation>>,
}

impl RatingIndex {
    /// Build the index from a player's observations.
    pub fn from_observations(observations: Vec<RatingObservation>) -> Self {
        let mut by_old_rating: HashMap<u32, Vec<RatingObservation>> = HashMap::new();
        for obs in observations {
            if let Some(old_rating) = obs.old_rating {
                by_old_rating.entry(old_rating).or_default().push(obs);
            }
        }
        Self { by_old_rating }
    }

    /// All observations whose `old_rating` equals the given rating.
    pub fn with_old_rating(&self, rating: u32) -> &[RatingObservation] {
        self.by_old_rating
            .get(&rating)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Rating indexes for every player with a rating history on disk.
#[derive(Debug, Clone, Default)]
pub struct RatingLookup {
    players: HashMap<String, RatingIndex>,
}

impl RatingLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one player's history.
    pub fn insert(&mut self, profile_id: String, observations: Vec<RatingObservation>) {
        self.players
            .insert(profile_id, RatingIndex::from_observations(observations));
    }

    /// Whether any history is known for the player.
    pub fn contains(&self, profile_id: &str) -> bool {
        self.players.contains_key(profile_id)
    }

    /// Observations for a player whose `old_rating` equals the given
    /// rating. Players without a known history yield an empty slice.
    pub fn observations_for(&self, profile_id: &str, old_rating: u32) -> &[RatingObservation] {
        self.players
            .get(profile_id)
            .map(|index| index.with_old_rating(old_rating))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_observation(rating: u32, num_wins: u32, num_losses: u32, timestamp: i64) -> RatingObservation {
        RatingObservation {
            profile_id: "1301032".to_string(),
            rating,
            old_rating: None,
            num_wins,
            num_losses,
            drops: 0,
            timestamp,
            won_state: WonState::Unknown,
        }
    }

    #[test]
    fn test_won_state_round_trip() {
        for state in [WonState::Won, WonState::Lost, WonState::Unknown] {
            assert_eq!(WonState::parse(state.as_str()).unwrap(), state);
        }
        assert_eq!(WonState::parse("").unwrap(), WonState::Unknown);
        assert!(WonState::parse("draw").is_err());
    }

    #[test]
    fn test_derive_won_states() {
        let observations = vec![
            raw_observation(1020, 11, 5, 200),
            raw_observation(1000, 10, 5, 100),
            raw_observation(1005, 11, 6, 300),
        ];

        let derived = derive_won_states(observations);

        assert_eq!(derived[0].timestamp, 100);
        assert_eq!(derived[0].old_rating, None);
        assert_eq!(derived[0].won_state, WonState::Unknown);

        assert_eq!(derived[1].old_rating, Some(1000));
        assert_eq!(derived[1].won_state, WonState::Won);

        assert_eq!(derived[2].old_rating, Some(1020));
        assert_eq!(derived[2].won_state, WonState::Lost);
    }

    #[test]
    fn test_derive_won_states_no_counter_change() {
        let observations = vec![raw_observation(1000, 10, 5, 100), raw_observation(1000, 10, 5, 200)];

        let derived = derive_won_states(observations);

        assert_eq!(derived[1].won_state, WonState::Unknown);
        assert_eq!(derived[1].old_rating, Some(1000));
    }

    #[test]
    fn test_csv_row_round_trip() {
        let observation = RatingObservation {
            profile_id: "242765".to_string(),
            rating: 1158,
            old_rating: Some(1132),
            num_wins: 42,
            num_losses: 17,
            drops: 1,
            timestamp: 1582654374,
            won_state: WonState::Won,
        };

        let row = observation.to_row();
        assert_eq!(
            row,
            vec!["242765", "1158", "1132", "42", "17", "1", "1582654374", "won"]
        );

        let record = csv::StringRecord::from(row);
        let parsed = RatingObservation::from_row(&record).unwrap();
        assert_eq!(parsed, observation);
    }

    #[test]
    fn test_csv_row_empty_old_rating() {
        let observation = RatingObservation {
            old_rating: None,
            ..raw_observation(1000, 10, 5, 100)
        };

        let row = observation.to_row();
        assert_eq!(row[2], "");
        assert_eq!(row[7], "na");

        let parsed = RatingObservation::from_row(&csv::StringRecord::from(row)).unwrap();
        assert_eq!(parsed.old_rating, None);
        assert_eq!(parsed.won_state, WonState::Unknown);
    }

    #[test]
    fn test_from_row_rejects_bad_rating() {
        let record = csv::StringRecord::from(vec![
            "242765", "abc", "1132", "42", "17", "1", "1582654374", "won",
        ]);

        assert!(RatingObservation::from_row(&record).is_err());
    }

    #[test]
    fn test_rating_lookup_by_old_rating() {
        let mut lookup = RatingLookup::new();
        let observations = vec![
            RatingObservation {
                old_rating: Some(1132),
                won_state: WonState::Won,
                ..raw_observation(1158, 43, 17, 1582655000)
            },
            RatingObservation {
                old_rating: Some(1132),
                won_state: WonState::Lost,
                ..raw_observation(1120, 43, 18, 1582660000)
            },
            RatingObservation {
                old_rating: Some(1158),
                won_state: WonState::Lost,
                ..raw_observation(1140, 43, 19, 1582670000)
            },
            RatingObservation {
                old_rating: None,
                ..raw_observation(1100, 40, 15, 1582600000)
            },
        ];
        lookup.insert("1301032".to_string(), observations);

        assert_eq!(lookup.observations_for("1301032", 1132).len(), 2);
        assert_eq!(lookup.observations_for("1301032", 1158).len(), 1);
        assert!(lookup.observations_for("1301032", 900).is_empty());
        assert!(lookup.observations_for("unknown", 1132).is_empty());
        assert!(lookup.contains("1301032"));
        assert!(!lookup.contains("unknown"));
    }
}
