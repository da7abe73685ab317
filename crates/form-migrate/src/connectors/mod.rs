//! Record sources.
//!
//! A source yields a lazy, finite, single-pass stream of [`Record`]s, either
//! from a delimited file with a header row or from a bulk submission read
//! against the form service.

pub mod csv_file;
pub mod json_stream;

use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::client::FormApi;
use crate::config::{MigrationConfig, MigrationOptions};
use crate::error::Result;

/// One unit of source data: field name to value, in source order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Lazy stream of records. Not restartable.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// File suffix that selects the delimited-file source.
pub const DELIMITED_FILE_SUFFIX: &str = ".csv";

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Delimited file, relative to the working directory.
    File(PathBuf),
    /// Form URL on the source service.
    Remote(String),
}

impl SourceLocation {
    /// Classifies a raw location.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote location cannot be turned into a URL.
    pub fn parse(location: &str, config: &MigrationConfig) -> Result<Self> {
        if is_delimited_file(location) {
            Ok(Self::File(PathBuf::from(location)))
        } else {
            Ok(Self::Remote(config.resolve_location(location)?))
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Whether a location names a delimited file.
#[must_use]
pub fn is_delimited_file(location: &str) -> bool {
    location
        .to_ascii_lowercase()
        .ends_with(DELIMITED_FILE_SUFFIX)
}

/// Opens the record stream for a source.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the bulk read fails
/// before any record arrives.
pub async fn open_record_source(
    location: &SourceLocation,
    api: &dyn FormApi,
    options: &MigrationOptions,
) -> Result<RecordStream> {
    match location {
        SourceLocation::File(path) => csv_file::CsvFileSource::new(csv_file::CsvFileConfig {
            path: path.clone(),
            delimiter: options.csv_delimiter,
            channel_capacity: options.channel_capacity,
        })
        .open(),
        SourceLocation::Remote(url) => api.fetch_submissions(url, options.record_limit).await,
    }
}

/// Adapts a bounded channel receiver into a record stream.
pub(crate) fn channel_stream(rx: mpsc::Receiver<Result<Record>>) -> RecordStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
