//! Generic typed CSV reader/writer.
//!
//! Every flat file in the data directory goes through these two types.
//! Reading is tolerant: rows that fail to parse are logged and skipped
//! so one corrupt line never poisons a whole file.

use std::fs::{self, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::StorageError;
use crate::models::ModelError;

/// A type with a flat CSV row form.
pub trait CsvRecord: Sized {
    /// Header row, if files of this type carry one.
    fn header() -> Option<&'static [&'static str]> {
        None
    }

    /// Serialize to one CSV row.
    fn to_row(&self) -> Vec<String>;

    /// Parse from one CSV row.
    fn from_row(row: &csv::StringRecord) -> Result<Self, ModelError>;
}

/// Writes records of type T to a CSV file.
pub struct CsvWriter<T: CsvRecord> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: CsvRecord> CsvWriter<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single record, creating the file (and header) on first
    /// write.
    pub fn append(&self, record: &T) -> Result<(), StorageError> {
        self.append_batch(std::slice::from_ref(record)).map(|_| ())
    }

    /// Append multiple records. Returns the number written.
    pub fn append_batch(&self, records: &[T]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        self.ensure_parent()?;
        let fresh_file = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if fresh_file {
            if let Some(header) = T::header() {
                writer.write_record(header)?;
            }
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;

        debug!(
            path = %self.path.display(),
            count = records.len(),
            "appended records"
        );
        Ok(records.len())
    }

    /// Replace the file contents with the given records.
    pub fn write_all(&self, records: &[T]) -> Result<usize, StorageError> {
        self.ensure_parent()?;
        let file = fs::File::create(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if let Some(header) = T::header() {
            writer.write_record(header)?;
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;

        info!(
            path = %self.path.display(),
            count = records.len(),
            "wrote file"
        );
        Ok(records.len())
    }
}

/// Reads records of type T from a CSV file.
pub struct CsvReader<T: CsvRecord> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: CsvRecord> CsvReader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the underlying file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all records. A missing file reads as empty; unparseable
    /// rows are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "file does not exist, returning empty");
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(T::header().is_some())
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        row = idx + 1,
                        error = %e,
                        "skipping unreadable row"
                    );
                    continue;
                }
            };

            match T::from_row(&row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        row = idx + 1,
                        error = %e,
                        "skipping malformed row"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Read records matching a predicate.
    pub fn read_where<F>(&self, predicate: F) -> Result<Vec<T>, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read_all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Count parseable records without keeping them.
    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.read_all()?.len())
    }
}
