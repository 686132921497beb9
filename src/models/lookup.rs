//! Code-to-name lookup tables.
//!
//! The ladder feed identifies civilizations and maps by numeric codes.
//! Display names live in a JSON strings file shipped alongside the data,
//! loaded once and injected into the render layer.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading the strings file.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to read strings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse strings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One code/name pair in the strings file.
#[derive(Debug, Clone, Deserialize)]
struct StringEntry {
    id: u32,
    string: String,
}

/// The strings file layout: one list of entries per keyed dimension.
#[derive(Debug, Deserialize)]
struct StringsFile {
    civ: Vec<StringEntry>,
    map_type: Vec<StringEntry>,
}

/// Read-only civilization and map name tables.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    civ: HashMap<u32, String>,
    map: HashMap<u32, String>,
    map_reverse: HashMap<String, u32>,
}

impl Lookup {
    /// Load the tables from a strings JSON file.
    pub fn from_file(path: &Path) -> Result<Self, LookupError> {
        let contents = std::fs::read_to_string(path)?;
        let file: StringsFile = serde_json::from_str(&contents)?;
        Ok(Self::from_entries(file))
    }

    fn from_entries(file: StringsFile) -> Self {
        let civ = file
            .civ
            .into_iter()
            .map(|e| (e.id, e.string))
            .collect::<HashMap<_, _>>();
        let map: HashMap<u32, String> = file
            .map_type
            .into_iter()
            .map(|e| (e.id, e.string))
            .collect();
        let map_reverse = map.iter().map(|(k, v)| (v.clone(), *k)).collect();

        Self {
            civ,
            map,
            map_reverse,
        }
    }

    /// Display name for a civilization code.
    pub fn civ_name(&self, code: u32) -> Option<&str> {
        self.civ.get(&code).map(String::as_str)
    }

    /// Display name for a map code.
    pub fn map_name(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Reverse lookup: map code for a display name.
    pub fn map_code(&self, name: &str) -> Option<u32> {
        self.map_reverse.get(name).copied()
    }

    /// All known civilization codes, sorted.
    pub fn civ_codes(&self) -> Vec<u32> {
        let mut codes: Vec<u32> = self.civ.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    /// All known map codes, sorted.
    pub fn map_codes(&self) -> Vec<u32> {
        let mut codes: Vec<u32> = self.map.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}
