//! Configuration types for form-migrate.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Transformer name that selects the built-in form-to-form copy.
pub const FORM_TRANSFORMER: &str = "form";

/// Positional keyword that selects whole-project migration.
pub const PROJECT_KEYWORD: &str = "project";

/// Main migration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Base URL of the form service. Relative locations are joined to it.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Credentials for reading from the source project.
    #[serde(default)]
    pub source: Credentials,
    /// Credentials for writing to the destination project.
    #[serde(default)]
    pub destination: Credentials,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// Credentials for one side of the migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Project API key, sent as `x-token`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Session token, sent as `x-jwt-token` when no API key is set.
    #[serde(default)]
    pub token: Option<String>,
}

impl Credentials {
    /// Returns the authentication header to send, if any.
    #[must_use]
    pub fn auth_header(&self) -> Option<(&'static str, &str)> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(("x-token", key))
        } else {
            self.token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| ("x-jwt-token", t))
        }
    }
}

/// Migration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Submissions in flight for a standalone form migration.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Submissions in flight for each form of a project migration.
    #[serde(default = "default_project_concurrency")]
    pub project_concurrency: usize,
    /// `limit` sent with the bulk submission read.
    #[serde(default = "default_limit")]
    pub record_limit: u64,
    /// `limit` sent with the project form listing.
    #[serde(default = "default_limit")]
    pub form_limit: u64,
    /// Field delimiter for file sources.
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
    /// Records buffered between the source and the pipeline.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Draw a progress spinner while submitting.
    #[serde(default = "default_true")]
    pub progress: bool,
    /// Skip TLS certificate validation on the bulk submission read.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            project_concurrency: default_project_concurrency(),
            record_limit: default_limit(),
            form_limit: default_limit(),
            csv_delimiter: default_csv_delimiter(),
            channel_capacity: default_channel_capacity(),
            progress: true,
            accept_invalid_certs: true,
        }
    }
}

fn default_concurrency() -> usize {
    100
}

fn default_project_concurrency() -> usize {
    1
}

fn default_limit() -> u64 {
    10_000_000
}

fn default_csv_delimiter() -> char {
    ','
}

fn default_channel_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl MigrationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The endpoint is checked per job, not here, so that a config without
    /// one still loads and fails with the job's own error.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.options.concurrency == 0 || self.options.project_concurrency == 0 {
            return Err(Error::Config(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.options.channel_capacity == 0 {
            return Err(Error::Config(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        if !self.options.csv_delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "csv_delimiter '{}' must be an ASCII character",
                self.options.csv_delimiter
            )));
        }
        if let Some(endpoint) = &self.endpoint {
            if !is_url(endpoint) {
                return Err(Error::Config(format!(
                    "Invalid endpoint '{}'. Allowed schemes: http, https",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Turns a location into a request URL.
    ///
    /// Absolute URLs pass through; anything else is joined to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is relative and no endpoint is set.
    pub fn resolve_location(&self, location: &str) -> Result<String> {
        if is_url(location) {
            return Ok(location.trim_end_matches('/').to_string());
        }
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::Config("No form server endpoint provided".to_string()))?;
        Ok(format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            location.trim_matches('/')
        ))
    }
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// What the operator asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Migrate one form (or file) into one destination form.
    Form {
        /// Source form location or delimited file path.
        source: String,
        /// Transformer reference.
        transformer: String,
        /// Destination form location.
        destination: String,
    },
    /// Migrate every form of a project.
    Project {
        /// Source project location.
        source: String,
        /// Destination project location.
        destination: String,
    },
}

impl Invocation {
    /// Interprets positional parameters.
    ///
    /// `[src, dest]`, `[src, transformer, dest]` or `[src, "project", dest]`.
    ///
    /// # Errors
    ///
    /// Returns an error for any other number of parameters.
    pub fn from_params(params: &[String]) -> Result<Self> {
        match params {
            [source, destination] => Ok(Self::Form {
                source: source.clone(),
                transformer: FORM_TRANSFORMER.to_string(),
                destination: destination.clone(),
            }),
            [source, keyword, destination] if keyword == PROJECT_KEYWORD => Ok(Self::Project {
                source: source.clone(),
                destination: destination.clone(),
            }),
            [source, transformer, destination] => Ok(Self::Form {
                source: source.clone(),
                transformer: transformer.clone(),
                destination: destination.clone(),
            }),
            _ => Err(Error::Config(format!(
                "expected <source> [transformer|project] <destination>, got {} argument(s)",
                params.len()
            ))),
        }
    }
}
