//! Migration orchestration.
//!
//! [`Migrator::migrate_form`] resolves the destination first, then streams
//! source → transform → sink. [`Migrator::migrate_project`] does that for
//! every form of a project, one form at a time.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::client::{FormApi, HttpFormClient};
use crate::config::{Invocation, MigrationConfig, FORM_TRANSFORMER};
use crate::connectors::{open_record_source, RecordStream, SourceLocation};
use crate::error::{Error, Result};
use crate::resolver::DestinationResolver;
use crate::sink::{MigrationStats, SubmissionSink};
use crate::transform::{TransformResult, Transformer, TransformerRegistry};

/// One form-to-form migration run.
pub struct MigrationJob {
    /// Where records come from.
    pub source: SourceLocation,
    /// Destination form URL.
    pub destination: String,
    /// Transformer resolved for this run.
    pub transformer: Arc<dyn Transformer>,
    /// Submissions allowed in flight.
    pub concurrency: usize,
}

/// Result of migrating one form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormReport {
    /// Source location as given.
    pub source: String,
    /// Destination location as given.
    pub destination: String,
    /// Whether the destination form was created by this run.
    pub created: bool,
    /// Counters.
    pub stats: MigrationStats,
}

/// Migration driver holding both API sides and the transformer registry.
pub struct Migrator {
    config: MigrationConfig,
    source_api: Arc<dyn FormApi>,
    destination_api: Arc<dyn FormApi>,
    registry: TransformerRegistry,
}

impl Migrator {
    /// Creates a migrator with HTTP clients for both sides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a client cannot
    /// be built.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        config.validate()?;
        let source_api = Arc::new(HttpFormClient::new(
            config.source.clone(),
            config.options.accept_invalid_certs,
        )?);
        let destination_api = Arc::new(HttpFormClient::new(config.destination.clone(), false)?);
        Ok(Self::with_clients(config, source_api, destination_api))
    }

    /// Creates a migrator over existing API clients.
    #[must_use]
    pub fn with_clients(
        config: MigrationConfig,
        source_api: Arc<dyn FormApi>,
        destination_api: Arc<dyn FormApi>,
    ) -> Self {
        Self {
            config,
            source_api,
            destination_api,
            registry: TransformerRegistry::new(),
        }
    }

    /// Replaces the transformer registry.
    #[must_use]
    pub fn with_registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The transformer registry, for registering custom transformers.
    pub fn registry_mut(&mut self) -> &mut TransformerRegistry {
        &mut self.registry
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Runs whatever the command line asked for.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error.
    pub async fn run(&self, invocation: &Invocation) -> Result<Vec<FormReport>> {
        match invocation {
            Invocation::Form {
                source,
                transformer,
                destination,
            } => Ok(vec![self.migrate_form(source, destination, transformer).await?]),
            Invocation::Project {
                source,
                destination,
            } => {
                self.migrate_project(source, destination, FORM_TRANSFORMER)
                    .await
            }
        }
    }

    /// Migrates a single form (or file) into a destination form.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition is missing, the transformer cannot
    /// be resolved, the destination cannot be resolved or created, the
    /// source stream fails, or a record fails to transform.
    pub async fn migrate_form(
        &self,
        source: &str,
        destination: &str,
        transformer: &str,
    ) -> Result<FormReport> {
        self.migrate_form_with(
            source,
            destination,
            transformer,
            self.config.options.concurrency,
        )
        .await
    }

    /// Migrates every form of a project, in listing order, stopping at the
    /// first form that fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails or is empty, or the first
    /// per-form error wrapped in [`Error::Form`].
    pub async fn migrate_project(
        &self,
        source: &str,
        destination: &str,
        transformer: &str,
    ) -> Result<Vec<FormReport>> {
        require(source, "You must provide a source project to copy.")?;
        require(destination, "You must provide a destination project.")?;
        self.require_endpoint()?;
        self.registry.resolve(transformer)?;

        let project = self.config.resolve_location(source)?;
        let forms = self
            .source_api
            .list_forms(&project, self.config.options.form_limit)
            .await?;
        if forms.is_empty() {
            return Err(Error::EmptyProject(source.to_string()));
        }

        info!("Migrating {} forms from {}", forms.len(), project);

        let source = source.trim_end_matches('/');
        let destination = destination.trim_end_matches('/');
        let mut reports = Vec::with_capacity(forms.len());

        for form in &forms {
            let report = self
                .migrate_form_with(
                    &format!("{}/{}", source, form.path),
                    &format!("{}/{}", destination, form.path),
                    transformer,
                    self.config.options.project_concurrency,
                )
                .await
                .map_err(|e| Error::Form {
                    path: form.path.clone(),
                    source: Box::new(e),
                })?;
            reports.push(report);
        }

        Ok(reports)
    }

    async fn migrate_form_with(
        &self,
        source: &str,
        destination: &str,
        transformer: &str,
        concurrency: usize,
    ) -> Result<FormReport> {
        require(source, "You must provide a source form or CSV to copy.")?;
        require(
            transformer,
            "You must provide a transformer to perform the migration.",
        )?;
        require(destination, "You must provide a destination form.")?;
        self.require_endpoint()?;

        let job = MigrationJob {
            source: SourceLocation::parse(source, &self.config)?,
            destination: self.config.resolve_location(destination)?,
            transformer: self.registry.resolve(transformer)?,
            concurrency,
        };

        let resolved = DestinationResolver::new(&*self.source_api, &*self.destination_api)
            .resolve(&job.destination, &job.source)
            .await?;

        let stats = self.run_job(job).await?;

        Ok(FormReport {
            source: source.to_string(),
            destination: destination.to_string(),
            created: resolved.was_created(),
            stats,
        })
    }

    async fn run_job(&self, job: MigrationJob) -> Result<MigrationStats> {
        let start = Instant::now();
        info!(
            "Migrating {} to {} using '{}'",
            job.source,
            job.destination,
            job.transformer.name()
        );

        let records =
            open_record_source(&job.source, &*self.source_api, &self.config.options).await?;
        let sink = SubmissionSink::new(
            Arc::clone(&self.destination_api),
            &job.destination,
            job.concurrency,
        )
        .with_progress(self.config.options.progress);

        let mut stats = stream_records(records, job.transformer.as_ref(), sink).await?;
        stats.duration_secs = start.elapsed().as_secs_f64();

        info!(
            "Migrated {}: {} read, {} accepted, {} rejected, {} failed, {} skipped in {:.2}s ({:.0} rec/sec)",
            job.destination,
            stats.read,
            stats.accepted,
            stats.rejected,
            stats.transport_errors,
            stats.skipped,
            stats.duration_secs,
            stats.throughput()
        );

        Ok(stats)
    }

    fn require_endpoint(&self) -> Result<()> {
        if self.config.endpoint.as_deref().is_some_and(|e| !e.is_empty()) {
            Ok(())
        } else {
            Err(Error::Config("No form server endpoint provided".to_string()))
        }
    }
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Config(message.to_string()))
    } else {
        Ok(())
    }
}

/// Drives records through the transformer into the sink.
///
/// Transforms run one at a time in source order; only submissions overlap.
/// A source error or a transform failure stops consumption. Submissions
/// already queued are still awaited before the error is returned.
///
/// # Errors
///
/// Returns the source error or [`Error::TransformFailed`].
pub async fn stream_records(
    mut records: RecordStream,
    transformer: &dyn Transformer,
    mut sink: SubmissionSink,
) -> Result<MigrationStats> {
    let mut read = 0;
    let mut skipped = 0;

    let outcome: Result<()> = async {
        while let Some(item) = records.next().await {
            let record = item?;
            read += 1;
            match transformer.transform(&record).await {
                TransformResult::Emit(payload) => sink.send(payload).await?,
                TransformResult::Skip => skipped += 1,
                TransformResult::Fail(reason) => {
                    error!(record = ?record, "Transform failed: {}", reason);
                    return Err(Error::TransformFailed(reason));
                }
            }
        }
        Ok(())
    }
    .await;

    drop(records);
    let mut stats = sink.finish().await;
    stats.read = read;
    stats.skipped = skipped;

    outcome.map(|()| stats)
}
