//! Core data models for the ladder analysis pipeline.

mod lookup;
mod match_record;
mod player;
mod rating;
mod raw_match;

pub use lookup::*;
pub use match_record::*;
pub use player::*;
pub use rating::*;
pub use raw_match::*;

use thiserror::Error;

/// Errors raised while parsing or converting model rows.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Mismatched participant list lengths")]
    MismatchedLists,
}

impl ModelError {
    /// Shorthand for an invalid-field error.
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }
}
