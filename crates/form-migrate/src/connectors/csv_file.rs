//! Delimited file source.
//!
//! Rows are parsed on a blocking thread and handed over a bounded channel,
//! so the reader stalls whenever the pipeline stops pulling.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

use crate::connectors::{channel_stream, Record, RecordStream};
use crate::error::{Error, Result};

/// Configuration for a delimited file source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvFileConfig {
    /// Path to the file, relative to the working directory.
    pub path: PathBuf,
    /// Delimiter character.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Rows buffered ahead of the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_delimiter() -> char {
    ','
}

fn default_channel_capacity() -> usize {
    256
}

/// Delimited file source with a header row.
pub struct CsvFileSource {
    config: CsvFileConfig,
}

impl CsvFileSource {
    /// Creates a new file source.
    #[must_use]
    pub fn new(config: CsvFileConfig) -> Self {
        Self { config }
    }

    /// Opens the file and starts streaming rows.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(self) -> Result<RecordStream> {
        let file = File::open(&self.config.path).map_err(|e| {
            Error::SourceStream(format!(
                "Failed to open CSV file '{}': {}",
                self.config.path.display(),
                e
            ))
        })?;

        let delimiter = u8::try_from(self.config.delimiter).map_err(|_| {
            Error::Config(format!(
                "delimiter '{}' is not a single-byte character",
                self.config.delimiter
            ))
        })?;

        let reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(file);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        tokio::task::spawn_blocking(move || read_rows(reader, &tx));

        Ok(channel_stream(rx))
    }
}

/// Pushes every row into `tx`, stopping at the first error or when the
/// receiver goes away.
fn read_rows<R: Read>(mut reader: csv::Reader<R>, tx: &mpsc::Sender<Result<Record>>) {
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
    };

    for row in reader.records() {
        let item = row.map(|row| to_record(&headers, &row)).map_err(Error::from);
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("CSV consumer stopped; closing reader");
            return;
        }
        if failed {
            return;
        }
    }
}

/// Builds a record keyed by header name.
pub(crate) fn to_record(headers: &csv::StringRecord, row: &csv::StringRecord) -> Record {
    headers
        .iter()
        .zip(row.iter())
        .map(|(name, value)| (name.to_string(), serde_json::Value::String(value.to_string())))
        .collect()
}

#[cfg(test)]
#[path = "csv_file_tests.rs"]
mod tests;
