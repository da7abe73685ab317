//! Error types for form-migrate.
//!
//! Configuration and resolution errors are fatal to a job. Per-record
//! submission failures never surface here; they are counted in
//! [`MigrationStats`](crate::sink::MigrationStats) and logged.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating forms.
///
/// Error codes follow the pattern `FMIG-XXX` for easy grepping in logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (FMIG-001).
    #[error("[FMIG-001] Configuration error: {0}")]
    Config(String),

    /// Transformer reference could not be resolved (FMIG-002).
    #[error("[FMIG-002] Unknown transformer '{0}'")]
    Transformer(String),

    /// Remote resource does not exist (FMIG-003).
    #[error("[FMIG-003] Not found: {0}")]
    NotFound(String),

    /// Credentials rejected by the form service (FMIG-004).
    #[error("[FMIG-004] Authentication failed: {0}")]
    Authentication(String),

    /// Non-success response to a control request (FMIG-005).
    #[error("[FMIG-005] API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// Transport failure (FMIG-006).
    #[error("[FMIG-006] HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Source stream could not be read or decoded (FMIG-007).
    #[error("[FMIG-007] Source stream error: {0}")]
    SourceStream(String),

    /// Delimited file parse error (FMIG-008).
    #[error("[FMIG-008] CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error (FMIG-009).
    #[error("[FMIG-009] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error (FMIG-010).
    #[error("[FMIG-010] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error (FMIG-011).
    #[error("[FMIG-011] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source project has no forms (FMIG-012).
    #[error("[FMIG-012] No forms were found within the source project '{0}'")]
    EmptyProject(String),

    /// Destination form could not be created (FMIG-013).
    #[error("[FMIG-013] Failed to create form '{path}': {reason}")]
    FormCreation {
        /// Path of the form being created.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// A transformer rejected a record (FMIG-014).
    #[error("[FMIG-014] Transform failed: {0}")]
    TransformFailed(String),

    /// A form inside a project migration failed (FMIG-015).
    #[error("[FMIG-015] Migration of form '{path}' failed: {source}")]
    Form {
        /// Form path within the project.
        path: String,
        /// The form's own error.
        #[source]
        source: Box<Error>,
    },

    /// Internal error (FMIG-016).
    ///
    /// Indicates an unexpected internal error. Please report if encountered.
    #[error("[FMIG-016] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "FMIG-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "FMIG-001",
            Self::Transformer(_) => "FMIG-002",
            Self::NotFound(_) => "FMIG-003",
            Self::Authentication(_) => "FMIG-004",
            Self::Api { .. } => "FMIG-005",
            Self::Http(_) => "FMIG-006",
            Self::SourceStream(_) => "FMIG-007",
            Self::Csv(_) => "FMIG-008",
            Self::Json(_) => "FMIG-009",
            Self::Yaml(_) => "FMIG-010",
            Self::Io(_) => "FMIG-011",
            Self::EmptyProject(_) => "FMIG-012",
            Self::FormCreation { .. } => "FMIG-013",
            Self::TransformFailed(_) => "FMIG-014",
            Self::Form { .. } => "FMIG-015",
            Self::Internal(_) => "FMIG-016",
        }
    }

    /// Whether this error means the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            Self::Form { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Maps a non-success status on a control request to an error.
    pub(crate) fn from_status(status: u16, body: String, what: &str) -> Self {
        match status {
            404 => Self::NotFound(what.to_string()),
            401 | 403 => Self::Authentication(format!("{what}: {body}")),
            _ => Self::Api { status, body },
        }
    }
}
