//! Record transformation.
//!
//! A [`Transformer`] only classifies records; it never submits. Transformers
//! are resolved by name through a [`TransformerRegistry`] once, at job start.

pub mod mapping;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::FORM_TRANSFORMER;
use crate::connectors::Record;
use crate::error::{Error, Result};

pub use mapping::{MappingSpec, MappingTransformer};

/// Outcome of transforming one record.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    /// Submit this payload.
    Emit(Record),
    /// Drop the record. Not a failure.
    Skip,
    /// The record cannot be transformed; stops the form's stream.
    Fail(String),
}

/// Maps a source record to a destination payload.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Transforms one record. May perform I/O.
    async fn transform(&self, record: &Record) -> TransformResult;
}

/// Returns the submission data of a record.
///
/// Remote submissions keep their fields under `data`; file rows are flat.
pub fn submission_data(record: &Record) -> &Record {
    match record.get("data") {
        Some(serde_json::Value::Object(data)) => data,
        _ => record,
    }
}

/// Form-to-form copy with aligned field names.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormTransformer;

#[async_trait]
impl Transformer for FormTransformer {
    fn name(&self) -> &str {
        FORM_TRANSFORMER
    }

    async fn transform(&self, record: &Record) -> TransformResult {
        match record.get("data") {
            Some(data @ serde_json::Value::Object(_)) => {
                let mut payload = Record::new();
                payload.insert("data".to_string(), data.clone());
                TransformResult::Emit(payload)
            }
            _ => TransformResult::Emit(record.clone()),
        }
    }
}

/// Resolves transformer references.
///
/// Lookup order: registered names (including the built-in `"form"`), then a
/// mapping file relative to the base directory.
pub struct TransformerRegistry {
    entries: HashMap<String, Arc<dyn Transformer>>,
    base_dir: PathBuf,
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformerRegistry {
    /// Registry holding the built-in transformer, resolving files against
    /// the working directory.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
            base_dir: PathBuf::from("."),
        };
        registry.register(FORM_TRANSFORMER, Arc::new(FormTransformer));
        registry
    }

    /// Resolves mapping files against `dir` instead of the working directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Registers a transformer under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, transformer: Arc<dyn Transformer>) {
        self.entries.insert(name.into(), transformer);
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves a transformer reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transformer`] if nothing matches, or the load error
    /// of a mapping file that exists but is invalid.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Transformer>> {
        if name.is_empty() {
            return Err(Error::Config(
                "You must provide a transformer to perform the migration.".to_string(),
            ));
        }
        if let Some(transformer) = self.entries.get(name) {
            return Ok(Arc::clone(transformer));
        }

        let path = self.base_dir.join(name);
        if is_mapping_file(&path) && path.is_file() {
            return Ok(Arc::new(MappingTransformer::from_file(&path)?));
        }

        Err(Error::Transformer(name.to_string()))
    }
}

fn is_mapping_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "json")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Transformer for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn transform(&self, _record: &Record) -> TransformResult {
            TransformResult::Fail("always".into())
        }
    }

    #[tokio::test]
    async fn test_form_transformer_flat_record_is_identity() {
        let row = record(json!({"name": "Alice", "email": "a@x.com"}));
        assert_eq!(
            FormTransformer.transform(&row).await,
            TransformResult::Emit(row.clone())
        );
    }

    #[tokio::test]
    async fn test_form_transformer_keeps_only_submission_data() {
        let doc = record(json!({
            "_id": "s1",
            "owner": "u1",
            "created": "2024-01-01",
            "data": {"name": "Alice"}
        }));
        assert_eq!(
            FormTransformer.transform(&doc).await,
            TransformResult::Emit(record(json!({"data": {"name": "Alice"}})))
        );
    }

    #[test]
    fn test_submission_data() {
        let doc = record(json!({"data": {"a": 1}, "_id": "x"}));
        assert_eq!(submission_data(&doc), &record(json!({"a": 1})));
        let row = record(json!({"a": 1}));
        assert_eq!(submission_data(&row), &row);
    }

    #[test]
    fn test_registry_resolves_builtin() {
        let registry = TransformerRegistry::new();
        assert_eq!(registry.resolve("form").unwrap().name(), "form");
    }

    #[tokio::test]
    async fn test_registry_resolves_registered() {
        let mut registry = TransformerRegistry::new();
        registry.register("rejecting", Arc::new(Rejecting));

        let transformer = registry.resolve("rejecting").unwrap();
        assert_eq!(
            transformer.transform(&Record::new()).await,
            TransformResult::Fail("always".into())
        );
        assert_eq!(registry.names(), vec!["form", "rejecting"]);
    }

    #[test]
    fn test_registry_unknown_name_fails() {
        let registry = TransformerRegistry::new();
        assert!(matches!(
            registry.resolve("transforms/custom.js"),
            Err(Error::Transformer(_))
        ));
        assert!(matches!(registry.resolve(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_registry_loads_mapping_file_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("map.yaml"), "fields:\n  full_name: name\n").unwrap();

        let registry = TransformerRegistry::new().with_base_dir(dir.path());
        let transformer = registry.resolve("map.yaml").unwrap();
        assert_eq!(transformer.name(), "map.yaml");
        assert!(registry.resolve("other.yaml").is_err());
    }
}
