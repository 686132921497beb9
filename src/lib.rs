//! # Ladder Meta
//!
//! An offline batch pipeline over a ranked ladder feed: pull match and
//! rating histories, build reproducible datasets, and report on
//! civilization popularity and map similarity across rating bands.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (matches, ratings, players, lookups)
//! - **fetch**: Leaderboard and per-profile history download
//! - **ingest**: Loading and deduplicating the raw feed files
//! - **dataset**: Winner resolution, dataset splits, rating caches
//! - **calculate**: Best ratings, popularity bands, map similarity
//! - **report**: CSV and standalone HTML rendering
//! - **storage**: CSV readers and writers plus the on-disk layout
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod report;
pub mod storage;

pub use models::*;
