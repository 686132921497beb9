//! Report rendering.
//!
//! Turns calculator outputs into CSV tables and standalone HTML pages
//! under the reports directory. Nothing is recomputed here; every
//! number comes from the `calculate` module via cached player ratings.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::calculate::popularity::{
    cdf_value, counters_by_rating_band, popularity_cdf, rankings, RatingBand, Standing,
};
use crate::calculate::similarity::{map_similarity, popularity_profiles, MapSimilarity};
use crate::dataset;
use crate::ingest::DataError;
use crate::models::{Dimension, Lookup, RatedPlayer};
use crate::storage::{DatasetKind, StorageConfig, StorageError};

/// Report rendering errors.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One civilization's standing per band, ready for rendering.
#[derive(Debug, Clone)]
pub struct PopularityRow {
    pub code: u32,
    pub name: String,
    /// One entry per band; `None` where the civilization never shows up
    pub cells: Vec<Option<Standing>>,
}

/// The full popularity table, one row per civilization, one column
/// pair per rating band.
#[derive(Debug, Clone)]
pub struct PopularityTable {
    pub band_labels: Vec<String>,
    pub rows: Vec<PopularityRow>,
}

fn display_name(lookup: &Lookup, dimension: Dimension, code: u32) -> String {
    let name = match dimension {
        Dimension::Civilization => lookup.civ_name(code),
        Dimension::Map => lookup.map_name(code),
    };
    name.map(str::to_string).unwrap_or_else(|| code.to_string())
}

/// Assemble the popularity table for one player pool.
pub fn popularity_table(
    players: &[RatedPlayer],
    lookup: &Lookup,
    bands: &[RatingBand],
    map_filter: Option<u32>,
) -> PopularityTable {
    let counters = counters_by_rating_band(players, Dimension::Civilization, map_filter, bands);

    let mut codes: BTreeSet<u32> = BTreeSet::new();
    let per_band: Vec<std::collections::HashMap<u32, Standing>> = counters
        .iter()
        .map(|counter| {
            let standings = rankings(&counter.counts);
            codes.extend(standings.iter().map(|s| s.code));
            standings.into_iter().map(|s| (s.code, s)).collect()
        })
        .collect();

    let mut rows: Vec<PopularityRow> = codes
        .into_iter()
        .map(|code| PopularityRow {
            code,
            name: display_name(lookup, Dimension::Civilization, code),
            cells: per_band.iter().map(|band| band.get(&code).cloned()).collect(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    PopularityTable {
        band_labels: bands.iter().map(|b| b.label.clone()).collect(),
        rows,
    }
}

/// Write the popularity table as CSV, one column pair per band.
pub fn write_popularity_csv(table: &PopularityTable, path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["civilization".to_string()];
    for label in &table.band_labels {
        header.push(format!("{label} rank"));
        header.push(format!("{label} popularity"));
    }
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.name.clone()];
        for cell in &row.cells {
            match cell {
                Some(standing) => {
                    record.push(standing.rank.to_string());
                    record.push(format!("{:.4}", standing.popularity));
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render the popularity table as a standalone HTML page.
///
/// Cells are colored on the popularity CDF: the most popular picks in
/// the whole table come out red, the least popular blue.
pub fn render_popularity_html(table: &PopularityTable) -> String {
    let values: Vec<f64> = table
        .rows
        .iter()
        .flat_map(|row| row.cells.iter().flatten().map(|s| s.popularity))
        .collect();
    let cdf = popularity_cdf(&values);

    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Civilization popularity</title>\n\
         <style>\n\
         table { border-collapse: collapse; }\n\
         th, td { border: 1px solid #444; padding: 4px 8px; text-align: right; }\n\
         th { background: #eee; }\n\
         td.name { text-align: left; }\n\
         </style>\n</head>\n<body>\n\
         <h1>Civilization popularity by rating band</h1>\n<table>\n",
    );

    page.push_str("<tr><th>civilization</th>");
    for label in &table.band_labels {
        page.push_str(&format!("<th>{}</th>", escape(label)));
    }
    page.push_str("</tr>\n");

    for row in &table.rows {
        page.push_str(&format!("<tr><td class=\"name\">{}</td>", escape(&row.name)));
        for cell in &row.cells {
            match cell {
                Some(standing) => {
                    let hue = (1.0 - cdf_value(&cdf, standing.popularity)) * 240.0;
                    page.push_str(&format!(
                        "<td style=\"background-color: hsl({hue:.0}, 100%, 60%)\">#{} {:.3}</td>",
                        standing.rank, standing.popularity
                    ));
                }
                None => page.push_str("<td></td>"),
            }
        }
        page.push_str("</tr>\n");
    }

    page.push_str(&format!(
        "</table>\n<p>Generated {}</p>\n</body>\n</html>\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    page
}

/// Write the map-similarity table as CSV.
pub fn write_similarity_csv(
    similarities: &[MapSimilarity],
    lookup: &Lookup,
    path: &Path,
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "map",
        "best_match",
        "weight",
        "second_match",
        "second_weight",
    ])?;

    for similarity in similarities {
        let mut record = vec![display_name(lookup, Dimension::Map, similarity.map_code)];
        for slot in 0..2 {
            match similarity.best_matches.get(slot) {
                Some((code, weight)) => {
                    record.push(display_name(lookup, Dimension::Map, *code));
                    record.push(format!("{weight:.4}"));
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Build and write the popularity report (CSV and HTML) for one
/// dataset. Returns the written paths.
pub fn popularity_report(
    storage: &StorageConfig,
    lookup: &Lookup,
    kind: DatasetKind,
    window_size: usize,
    bands: &[RatingBand],
) -> Result<Vec<PathBuf>, ReportError> {
    let players = dataset::rated_players(storage, kind, window_size)?;
    let table = popularity_table(&players, lookup, bands, None);

    fs::create_dir_all(storage.reports_dir())?;
    let stem = format!("civ_popularity_{}_{}", kind.name(), window_size);
    let csv_path = storage.reports_dir().join(format!("{stem}.csv"));
    let html_path = storage.reports_dir().join(format!("{stem}.html"));

    write_popularity_csv(&table, &csv_path)?;
    fs::write(&html_path, render_popularity_html(&table))?;

    info!(
        players = players.len(),
        civs = table.rows.len(),
        csv = %csv_path.display(),
        html = %html_path.display(),
        "wrote popularity report"
    );
    Ok(vec![csv_path, html_path])
}

/// Build and write the map-similarity report for one dataset.
pub fn similarity_report(
    storage: &StorageConfig,
    lookup: &Lookup,
    kind: DatasetKind,
    window_size: usize,
    bands: &[RatingBand],
) -> Result<Vec<PathBuf>, ReportError> {
    let players = dataset::rated_players(storage, kind, window_size)?;
    let profiles = popularity_profiles(&players, bands);
    let similarities = map_similarity(&profiles);

    fs::create_dir_all(storage.reports_dir())?;
    let path = storage
        .reports_dir()
        .join(format!("map_similarity_{}_{}.csv", kind.name(), window_size));
    write_similarity_csv(&similarities, lookup, &path)?;

    info!(
        maps = similarities.len(),
        path = %path.display(),
        "wrote similarity report"
    );
    Ok(vec![path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::popularity::bands;
    use crate::models::{MatchRecord, RawMatch};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lookup() -> Lookup {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strings.json");
        std::fs::write(
            &path,
            r#"{
                "civ": [
                    {"id": 5, "string": "Goths"},
                    {"id": 30, "string": "Aztecs"}
                ],
                "map_type": [
                    {"id": 9, "string": "Arabia"},
                    {"id": 33, "string": "MegaRandom"}
                ]
            }"#,
        )
        .unwrap();
        Lookup::from_file(&path).unwrap()
    }

    fn duel(civ: u32, map_code: u32) -> Arc<MatchRecord> {
        let raw = RawMatch {
            match_id: 1,
            started: 1_582_654_374,
            map_code,
            civs: vec![civ, 1],
            ratings: vec![1000, 1000],
            player_ids: vec!["p1".to_string(), "p2".to_string()],
            teams: vec![1, 2],
            version: "0".to_string(),
        };
        Arc::new(MatchRecord::from_raw(&raw, 1).unwrap())
    }

    fn players() -> Vec<RatedPlayer> {
        vec![RatedPlayer {
            player_id: "p1".to_string(),
            matches: vec![duel(5, 9), duel(5, 9), duel(30, 33)],
            best_rating: 1000.0,
        }]
    }

    #[test]
    fn test_popularity_table_rows_sorted_by_name() {
        let test_bands = bands(&[2000], 50);

        let table = popularity_table(&players(), &lookup(), &test_bands, None);

        assert_eq!(table.band_labels, vec!["1-2000"]);
        let names: Vec<&str> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Aztecs", "Goths"]);

        let goths = table.rows[1].cells[0].as_ref().unwrap();
        assert_eq!(goths.rank, 1);
        assert!((goths.popularity - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_popularity_table_empty_band_cells() {
        // Second band sits above the player's rating.
        let test_bands = bands(&[2000, 3000], 50);

        let table = popularity_table(&players(), &lookup(), &test_bands, None);

        for row in &table.rows {
            assert!(row.cells[0].is_some());
            assert!(row.cells[1].is_none());
        }
    }

    #[test]
    fn test_popularity_csv_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("popularity.csv");
        let table = popularity_table(&players(), &lookup(), &bands(&[2000], 50), None);

        write_popularity_csv(&table, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "civilization,1-2000 rank,1-2000 popularity");
        assert_eq!(lines[1], "Aztecs,2,0.3333");
        assert_eq!(lines[2], "Goths,1,0.6667");
    }

    #[test]
    fn test_html_colors_top_pick_red() {
        let table = popularity_table(&players(), &lookup(), &bands(&[2000], 50), None);

        let page = render_popularity_html(&table);

        // The most popular cell sits at the top of the CDF, hue 0.
        assert!(page.contains("hsl(0, 100%, 60%)"));
        assert!(page.contains("<th>1-2000</th>"));
        assert!(page.contains("Goths"));
        assert!(page.contains("Generated "));
    }

    #[test]
    fn test_html_escapes_names() {
        let table = PopularityTable {
            band_labels: vec!["1-650".to_string()],
            rows: vec![PopularityRow {
                code: 5,
                name: "<Goths & friends>".to_string(),
                cells: vec![None],
            }],
        };

        let page = render_popularity_html(&table);

        assert!(page.contains("&lt;Goths &amp; friends&gt;"));
        assert!(!page.contains("<Goths"));
    }

    #[test]
    fn test_similarity_csv_resolves_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("similarity.csv");
        let similarities = vec![MapSimilarity {
            map_code: 9,
            best_matches: vec![(33, 1.25)],
        }];

        write_similarity_csv(&similarities, &lookup(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "map,best_match,weight,second_match,second_weight");
        assert_eq!(lines[1], "Arabia,MegaRandom,1.2500,,");
    }
}
