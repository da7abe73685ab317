//! Destination form resolution.
//!
//! An existing destination form is used as is; its schema is never touched.
//! A missing one is created from the source form's title, path, name and
//! components before any record flows.

use tracing::{debug, info};

use crate::client::{Form, FormApi, NewForm};
use crate::connectors::SourceLocation;
use crate::error::{Error, Result};

/// Outcome of [`DestinationResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDestination {
    /// The destination form already existed.
    Existing(Form),
    /// The destination form was created from the source schema.
    Created(Form),
}

impl ResolvedDestination {
    /// The destination form definition.
    #[must_use]
    pub fn form(&self) -> &Form {
        match self {
            Self::Existing(form) | Self::Created(form) => form,
        }
    }

    /// Whether the form was created by this run.
    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Resolve-or-create protocol for destination forms.
pub struct DestinationResolver<'a> {
    source: &'a dyn FormApi,
    destination: &'a dyn FormApi,
}

impl<'a> DestinationResolver<'a> {
    /// Creates a resolver reading schemas from `source` and writing to
    /// `destination`.
    #[must_use]
    pub fn new(source: &'a dyn FormApi, destination: &'a dyn FormApi) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Makes sure `destination` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be loaded for any reason
    /// other than not existing, if the source form cannot be loaded, or if
    /// creation fails.
    pub async fn resolve(
        &self,
        destination: &str,
        source: &SourceLocation,
    ) -> Result<ResolvedDestination> {
        match self.destination.load_form(destination).await {
            Ok(form) => {
                debug!("Destination form {} exists", destination);
                return Ok(ResolvedDestination::Existing(form));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let source_url = match source {
            SourceLocation::Remote(url) => url,
            SourceLocation::File(path) => {
                return Err(Error::FormCreation {
                    path: destination.to_string(),
                    reason: format!(
                        "destination does not exist and '{}' is a file with no schema to copy",
                        path.display()
                    ),
                })
            }
        };

        info!("Creating form {}", destination);
        let source_form = self.source.load_form(source_url).await?;
        let project = project_location(destination, &source_form.path);
        let body = NewForm::from(&source_form);

        let created = self
            .destination
            .create_form(&project, &body)
            .await
            .map_err(|e| Error::FormCreation {
                path: body.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(ResolvedDestination::Created(created))
    }
}

/// The project owning a destination form: its location minus `/<path>`.
///
/// Falls back to dropping the last path segment when the location does not
/// end with the form path.
#[must_use]
pub fn project_location(destination: &str, form_path: &str) -> String {
    let destination = destination.trim_end_matches('/');
    let suffix = format!("/{}", form_path.trim_matches('/'));
    if !form_path.is_empty() {
        if let Some(project) = destination.strip_suffix(&suffix) {
            return project.to_string();
        }
    }
    destination
        .rsplit_once('/')
        .map_or_else(|| destination.to_string(), |(project, _)| project.to_string())
}
