// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # form-migrate
//!
//! `form-migrate` is a CLI tool and library for migrating form submissions
//! from a delimited file or a source form service into a destination form
//! service, creating destination forms from the source schema when they do
//! not exist yet.
//!
//! ## Supported Sources
//!
//! | Source | Notes |
//! |--------|-------|
//! | Delimited file (`.csv`) | Header row names the fields |
//! | Remote form | Bulk submission read, streamed as it arrives |
//! | Remote project | Every form, one after another |
//!
//! ## Quick Start
//!
//! ```bash
//! # Copy a form's submissions (destination created if missing)
//! form-migrate https://api.example.com/src/contact https://api.example.com/dst/contact
//!
//! # Import a CSV through a mapping file
//! form-migrate people.csv mapping.yaml https://api.example.com/dst/people
//!
//! # Copy a whole project
//! form-migrate https://api.example.com/src project https://api.example.com/dst
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! endpoint: https://api.example.com
//! source:
//!   api_key: ${SOURCE_API_KEY}
//! destination:
//!   token: ${DEST_JWT}
//! options:
//!   concurrency: 100
//!   project_concurrency: 1
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connectors;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod sink;
pub mod transform;

pub use client::{Form, FormApi, FormSummary, HttpFormClient, NewForm, SubmitResponse};
pub use config::{Credentials, Invocation, MigrationConfig, MigrationOptions};
pub use connectors::{Record, RecordStream, SourceLocation};
pub use error::{Error, Result};
pub use pipeline::{FormReport, MigrationJob, Migrator};
pub use resolver::{DestinationResolver, ResolvedDestination};
pub use sink::{MigrationStats, SubmissionOutcome, SubmissionSink};
pub use transform::{TransformResult, Transformer, TransformerRegistry};
