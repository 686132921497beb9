//! Winner resolution from rating-history signals.
//!
//! The feed does not report match winners directly. Each participant's
//! rating history is searched for observations whose `old_rating`
//! equals their in-match rating and whose timestamp falls shortly after
//! the match start; the won/lost labels on those observations are
//! aggregated per team.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{RatingLookup, RawMatch, WonState};

/// Observations this long after the match start are still attributed
/// to it.
pub const RESOLUTION_WINDOW_SECS: i64 = 3600;

/// What the rating history says about one participant's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Won,
    Lost,
    /// No usable observation in the window.
    Unknown,
    /// Both won and lost labels in the window.
    Contradictory,
}

fn personal_outcome(
    player_id: &str,
    match_rating: u32,
    started: i64,
    ratings: &RatingLookup,
) -> Outcome {
    let mut saw_won = false;
    let mut saw_lost = false;

    for obs in ratings.observations_for(player_id, match_rating) {
        if obs.timestamp <= started || obs.timestamp > started + RESOLUTION_WINDOW_SECS {
            continue;
        }
        match obs.won_state {
            WonState::Won => saw_won = true,
            WonState::Lost => saw_lost = true,
            WonState::Unknown => {}
        }
    }

    match (saw_won, saw_lost) {
        (true, true) => Outcome::Contradictory,
        (true, false) => Outcome::Won,
        (false, true) => Outcome::Lost,
        (false, false) => Outcome::Unknown,
    }
}

fn team_outcome(members: &[Outcome]) -> Outcome {
    if members.contains(&Outcome::Contradictory) {
        return Outcome::Contradictory;
    }

    let saw_won = members.contains(&Outcome::Won);
    let saw_lost = members.contains(&Outcome::Lost);
    match (saw_won, saw_lost) {
        (true, true) => Outcome::Contradictory,
        (true, false) => Outcome::Won,
        (false, true) => Outcome::Lost,
        (false, false) => Outcome::Unknown,
    }
}

/// Determine the winning team of a raw match, or 0 when the rating
/// histories are silent or disagree.
pub fn determine_winner(raw: &RawMatch, ratings: &RatingLookup) -> u32 {
    let mut teams: BTreeMap<u32, Vec<Outcome>> = BTreeMap::new();

    for (idx, player_id) in raw.player_ids.iter().enumerate() {
        let outcome = personal_outcome(player_id, raw.ratings[idx], raw.started, ratings);
        teams.entry(raw.teams[idx]).or_default().push(outcome);
    }

    let outcomes: BTreeMap<u32, Outcome> = teams
        .iter()
        .map(|(team, members)| (*team, team_outcome(members)))
        .collect();

    if outcomes.values().any(|o| *o == Outcome::Contradictory) {
        debug!(match_id = raw.match_id, "contradictory rating signals, winner undetermined");
        return 0;
    }

    let winners: Vec<u32> = outcomes
        .iter()
        .filter(|(_, o)| **o == Outcome::Won)
        .map(|(team, _)| *team)
        .collect();

    match winners.as_slice() {
        [team] => {
            debug!(match_id = raw.match_id, winning_team = *team, "winner resolved");
            *team
        }
        _ => {
            debug!(match_id = raw.match_id, "no single winning team, winner undetermined");
            0
        }
    }
}
