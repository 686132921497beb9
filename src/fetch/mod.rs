//! HTTP fetcher for the ladder feeds.
//!
//! Downloads three paged feeds (leaderboard users, per-profile match
//! lists, per-profile rating histories) and writes them to the raw
//! data directory. Page sources are behind a trait so the pagination
//! and conversion logic can run against canned payloads in tests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{derive_won_states, ModelError, RatingObservation, RawMatch};
use crate::storage::{CsvRecord, CsvWriter, StorageConfig, StorageError};

/// Errors that can occur during fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Configuration for the fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Feed base URL
    pub base_url: String,

    /// Ladder to pull (4 = 1v1 random map)
    pub leaderboard_id: u32,

    /// Rows requested per page
    pub page_size: usize,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Pause between consecutive requests
    pub request_delay: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aoe2.net/api".to_string(),
            leaderboard_id: 4,
            page_size: 10_000,
            timeout: Duration::from_secs(30),
            user_agent: "ladder-meta/0.1".to_string(),
            request_delay: Duration::from_millis(500),
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub profile_id: u64,
    pub name: String,
    pub rating: u32,
    #[serde(rename = "games")]
    pub num_games: u32,
}

impl CsvRecord for User {
    fn header() -> Option<&'static [&'static str]> {
        Some(&["profile_id", "name", "rating", "num_games"])
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.profile_id.to_string(),
            self.name.clone(),
            self.rating.to_string(),
            self.num_games.to_string(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError> {
        let field = |idx: usize, name: &'static str| -> Result<&str, ModelError> {
            row.get(idx).ok_or(ModelError::MissingField(name))
        };

        Ok(Self {
            profile_id: field(0, "profile_id")?
                .parse()
                .map_err(|_| ModelError::invalid("profile_id", field(0, "profile_id").unwrap_or("")))?,
            name: field(1, "name")?.to_string(),
            rating: field(2, "rating")?
                .parse()
                .map_err(|_| ModelError::invalid("rating", field(2, "rating").unwrap_or("")))?,
            num_games: field(3, "num_games")?
                .parse()
                .map_err(|_| ModelError::invalid("num_games", field(3, "num_games").unwrap_or("")))?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardPage {
    #[allow(dead_code)]
    total: u64,
    leaderboard: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct PlayerPayload {
    profile_id: u64,
    civ: u32,
    rating: Option<u32>,
    team: u32,
}

#[derive(Debug, Deserialize)]
struct MatchPayload {
    match_id: u64,
    started: i64,
    map_type: u32,
    leaderboard_id: u32,
    num_players: u32,
    version: Option<String>,
    players: Vec<PlayerPayload>,
}

#[derive(Debug, Deserialize)]
struct RatingPayload {
    rating: u32,
    num_wins: u32,
    num_losses: u32,
    drops: u32,
    timestamp: i64,
}

/// Convert a page of match payloads to raw matches.
///
/// Matches from other ladders, matches with fewer than two players,
/// and matches where any player's rating is missing are dropped.
/// Duplicate start timestamps (re-listed games) keep the first copy.
fn matches_from_payload(payloads: Vec<MatchPayload>, leaderboard_id: u32) -> Vec<RawMatch> {
    let mut seen_starts: HashSet<i64> = HashSet::new();
    let mut matches = Vec::new();

    for payload in payloads {
        if payload.leaderboard_id != leaderboard_id || payload.num_players < 2 {
            continue;
        }
        if !seen_starts.insert(payload.started) {
            continue;
        }
        if payload.players.iter().any(|p| p.rating.is_none()) {
            debug!(match_id = payload.match_id, "skipping match with unrated player");
            continue;
        }

        matches.push(RawMatch {
            match_id: payload.match_id,
            started: payload.started,
            map_code: payload.map_type,
            civs: payload.players.iter().map(|p| p.civ).collect(),
            ratings: payload.players.iter().filter_map(|p| p.rating).collect(),
            player_ids: payload
                .players
                .iter()
                .map(|p| p.profile_id.to_string())
                .collect(),
            teams: payload.players.iter().map(|p| p.team).collect(),
            version: payload.version.unwrap_or_else(|| "0".to_string()),
        });
    }

    matches.sort_by_key(|m| m.started);
    matches
}

/// Convert a rating-history page to observations with derived fields.
fn observations_from_payload(
    profile_id: &str,
    payloads: Vec<RatingPayload>,
) -> Vec<RatingObservation> {
    let observations = payloads
        .into_iter()
        .map(|p| RatingObservation {
            profile_id: profile_id.to_string(),
            rating: p.rating,
            old_rating: None,
            num_wins: p.num_wins,
            num_losses: p.num_losses,
            drops: p.drops,
            timestamp: p.timestamp,
            won_state: Default::default(),
        })
        .collect();

    derive_won_states(observations)
}

/// A paged JSON feed.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<serde_json::Value>;
}

/// The real HTTP page source.
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPageSource {
    pub fn new(config: &FetcherConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<serde_json::Value> {
        let url = format!("{}/{path}", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}

/// Outcome counts of one fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub users: usize,
    pub profiles_fetched: usize,
    pub profiles_skipped: usize,
}

/// Downloads the feeds and writes raw files.
pub struct Fetcher<S: PageSource> {
    source: S,
    config: FetcherConfig,
    storage: StorageConfig,
}

impl Fetcher<HttpPageSource> {
    /// Build a fetcher backed by the real HTTP feed.
    pub fn new(config: FetcherConfig, storage: StorageConfig) -> FetchResult<Self> {
        let source = HttpPageSource::new(&config)?;
        Ok(Self::with_source(source, config, storage))
    }
}

impl<S: PageSource> Fetcher<S> {
    pub fn with_source(source: S, config: FetcherConfig, storage: StorageConfig) -> Self {
        Self {
            source,
            config,
            storage,
        }
    }

    async fn pause(&self) {
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
    }

    /// Fetch leaderboard users, write `users.csv`, return the rows.
    pub async fn fetch_users(&self, limit: Option<usize>) -> FetchResult<Vec<User>> {
        let mut users: Vec<User> = Vec::new();
        let mut start = 1usize;

        loop {
            let query = [
                ("leaderboard_id", self.config.leaderboard_id.to_string()),
                ("start", start.to_string()),
                ("count", self.config.page_size.to_string()),
            ];
            let value = self.source.fetch_page("leaderboard", &query).await?;
            let page: LeaderboardPage = serde_json::from_value(value)?;

            let received = page.leaderboard.len();
            users.extend(page.leaderboard);
            debug!(start, received, "leaderboard page");

            if received < self.config.page_size {
                break;
            }
            if limit.is_some_and(|l| users.len() >= l) {
                break;
            }
            start += received;
            self.pause().await;
        }

        if let Some(limit) = limit {
            users.truncate(limit);
        }

        CsvWriter::<User>::new(self.storage.users_path()).write_all(&users)?;
        info!(users = users.len(), "fetched leaderboard");
        Ok(users)
    }

    /// Fetch one profile's matches and write its raw match file.
    /// Returns the number of matches kept.
    pub async fn fetch_matches(&self, profile_id: &str) -> FetchResult<usize> {
        let mut payloads: Vec<MatchPayload> = Vec::new();
        let mut start = 0usize;

        loop {
            let query = [
                ("profile_id", profile_id.to_string()),
                ("start", start.to_string()),
                ("count", self.config.page_size.to_string()),
            ];
            let value = self.source.fetch_page("player/matches", &query).await?;
            let page: Vec<MatchPayload> = serde_json::from_value(value)?;

            let received = page.len();
            payloads.extend(page);

            if received < self.config.page_size {
                break;
            }
            start += received;
            self.pause().await;
        }

        let matches = matches_from_payload(payloads, self.config.leaderboard_id);
        let written = CsvWriter::<RawMatch>::new(self.storage.matches_path(profile_id))
            .write_all(&matches)?;
        info!(profile_id, matches = written, "fetched matches");
        Ok(written)
    }

    /// Fetch one profile's rating history, post-process it, and write
    /// its raw rating file. Returns the number of observations.
    pub async fn fetch_ratings(&self, profile_id: &str) -> FetchResult<usize> {
        let mut payloads: Vec<RatingPayload> = Vec::new();
        let mut start = 0usize;

        loop {
            let query = [
                ("profile_id", profile_id.to_string()),
                ("leaderboard_id", self.config.leaderboard_id.to_string()),
                ("start", start.to_string()),
                ("count", self.config.page_size.to_string()),
            ];
            let value = self.source.fetch_page("player/ratinghistory", &query).await?;
            let page: Vec<RatingPayload> = serde_json::from_value(value)?;

            let received = page.len();
            payloads.extend(page);

            if received < self.config.page_size {
                break;
            }
            start += received;
            self.pause().await;
        }

        let observations = observations_from_payload(profile_id, payloads);
        let written = CsvWriter::<RatingObservation>::new(self.storage.ratings_path(profile_id))
            .write_all(&observations)?;
        info!(profile_id, observations = written, "fetched rating history");
        Ok(written)
    }

    /// Full run: leaderboard first, then matches and ratings for each
    /// profile. Profiles with both raw files already on disk are
    /// skipped unless `update` is set.
    pub async fn run(&self, limit: Option<usize>, update: bool) -> FetchResult<FetchSummary> {
        let users = self.fetch_users(limit).await?;
        let mut summary = FetchSummary {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            let profile_id = user.profile_id.to_string();
            let have_both = self.storage.matches_path(&profile_id).exists()
                && self.storage.ratings_path(&profile_id).exists();
            if have_both && !update {
                debug!(profile_id, "raw files present, skipping");
                summary.profiles_skipped += 1;
                continue;
            }

            self.pause().await;
            if let Err(e) = self.fetch_matches(&profile_id).await {
                warn!(profile_id, error = %e, "match fetch failed, continuing");
                continue;
            }
            self.pause().await;
            self.fetch_ratings(&profile_id).await?;
            summary.profiles_fetched += 1;
        }

        info!(
            users = summary.users,
            fetched = summary.profiles_fetched,
            skipped = summary.profiles_skipped,
            "fetch run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WonState;
    use crate::storage::CsvReader;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CannedSource {
        pages: Mutex<VecDeque<Value>>,
    }

    impl CannedSource {
        fn new(pages: Vec<Value>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
            }
        }
    }

    #[async_trait]
    impl PageSource for CannedSource {
        async fn fetch_page(&self, _path: &str, _query: &[(&str, String)]) -> FetchResult<Value> {
            Ok(self
                .pages
                .lock()
                .expect("page queue poisoned")
                .pop_front()
                .unwrap_or_else(|| json!([])))
        }
    }

    fn test_config() -> FetcherConfig {
        FetcherConfig {
            page_size: 2,
            request_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn fetcher(dir: &TempDir, pages: Vec<Value>) -> Fetcher<CannedSource> {
        Fetcher::with_source(
            CannedSource::new(pages),
            test_config(),
            StorageConfig::new(dir.path()),
        )
    }

    fn user_json(profile_id: u64, rating: u32) -> Value {
        json!({
            "profile_id": profile_id,
            "name": format!("player{profile_id}"),
            "rating": rating,
            "games": 100,
        })
    }

    #[tokio::test]
    async fn test_fetch_users_paginates_until_short_page() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(
            &dir,
            vec![
                json!({"total": 3, "leaderboard": [user_json(1, 1100), user_json(2, 1050)]}),
                json!({"total": 3, "leaderboard": [user_json(3, 1000)]}),
            ],
        );

        let users = fetcher.fetch_users(None).await.unwrap();

        assert_eq!(users.len(), 3);
        assert_eq!(users[2].profile_id, 3);

        let on_disk = CsvReader::<User>::new(dir.path().join("raw/users.csv"))
            .read_all()
            .unwrap();
        assert_eq!(on_disk, users);
    }

    #[tokio::test]
    async fn test_fetch_users_respects_limit() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(
            &dir,
            vec![json!({"total": 5, "leaderboard": [user_json(1, 1100), user_json(2, 1050)]})],
        );

        let users = fetcher.fetch_users(Some(1)).await.unwrap();

        assert_eq!(users.len(), 1);
    }

    fn match_json(match_id: u64, started: i64, leaderboard_id: u32, rated: bool) -> Value {
        json!({
            "match_id": match_id,
            "started": started,
            "map_type": 9,
            "leaderboard_id": leaderboard_id,
            "num_players": 2,
            "version": "36906",
            "players": [
                {"profile_id": 1, "civ": 5, "rating": if rated { json!(1000) } else { Value::Null }, "team": 1},
                {"profile_id": 2, "civ": 30, "rating": 1010, "team": 2},
            ],
        })
    }

    #[tokio::test]
    async fn test_fetch_matches_filters_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(
            &dir,
            vec![json!([
                match_json(10, 100, 4, true),
                match_json(11, 100, 4, true),  // duplicate start
                match_json(12, 200, 3, true),  // other ladder
                match_json(13, 300, 4, false), // unrated player
            ])],
        );

        let written = fetcher.fetch_matches("1").await.unwrap();

        assert_eq!(written, 1);
        let matches = CsvReader::<RawMatch>::new(dir.path().join("raw/matches_for_1.csv"))
            .read_all()
            .unwrap();
        assert_eq!(matches[0].match_id, 10);
        assert_eq!(matches[0].version, "36906");
    }

    fn rating_json(rating: u32, num_wins: u32, num_losses: u32, timestamp: i64) -> Value {
        json!({
            "rating": rating,
            "num_wins": num_wins,
            "num_losses": num_losses,
            "drops": 0,
            "timestamp": timestamp,
        })
    }

    #[tokio::test]
    async fn test_fetch_ratings_derives_fields() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(
            &dir,
            vec![json!([
                rating_json(1016, 11, 5, 200),
                rating_json(1000, 10, 5, 100),
            ])],
        );

        let written = fetcher.fetch_ratings("1").await.unwrap();
        assert_eq!(written, 2);

        let observations =
            CsvReader::<RatingObservation>::new(dir.path().join("raw/ratings_for_1.csv"))
                .read_all()
                .unwrap();
        assert_eq!(observations[0].timestamp, 100);
        assert_eq!(observations[1].old_rating, Some(1000));
        assert_eq!(observations[1].won_state, WonState::Won);
    }

    #[tokio::test]
    async fn test_run_skips_profiles_with_raw_files() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::new(dir.path());
        std::fs::create_dir_all(storage.raw_dir()).unwrap();
        std::fs::write(storage.matches_path("1"), "").unwrap();
        std::fs::write(storage.ratings_path("1"), "").unwrap();

        let fetcher = fetcher(
            &dir,
            vec![json!({"total": 1, "leaderboard": [user_json(1, 1100)]})],
        );

        let summary = fetcher.run(None, false).await.unwrap();

        assert_eq!(summary.users, 1);
        assert_eq!(summary.profiles_skipped, 1);
        assert_eq!(summary.profiles_fetched, 0);
    }

    #[test]
    fn test_user_csv_round_trip() {
        let user = User {
            profile_id: 242765,
            name: "TheViper".to_string(),
            rating: 2400,
            num_games: 1500,
        };

        let parsed = User::from_row(&csv::StringRecord::from(user.to_row())).unwrap();
        assert_eq!(parsed, user);
    }
}
