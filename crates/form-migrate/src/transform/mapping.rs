//! Declarative field mapping loaded from a YAML or JSON file.
//!
//! ```yaml
//! fields:
//!   full_name: name        # source field -> destination field
//! include_unmapped: false
//! required: [email]        # missing or empty -> Fail
//! skip_when_empty: [name]  # missing or empty -> Skip
//! wrap_data: true          # payload becomes {"data": {...}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::connectors::Record;
use crate::error::Result;
use crate::transform::{submission_data, TransformResult, Transformer};

/// Mapping file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingSpec {
    /// Renames (`source_field` -> `dest_field`).
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Copy fields that have no rename.
    #[serde(default = "default_true")]
    pub include_unmapped: bool,
    /// Fields that must be present and non-empty.
    #[serde(default)]
    pub required: Vec<String>,
    /// Records with any of these fields empty are dropped.
    #[serde(default)]
    pub skip_when_empty: Vec<String>,
    /// Nest the payload under `data`.
    #[serde(default)]
    pub wrap_data: bool,
}

fn default_true() -> bool {
    true
}

/// Transformer driven by a [`MappingSpec`].
#[derive(Debug, Clone)]
pub struct MappingTransformer {
    name: String,
    spec: MappingSpec,
}

impl MappingTransformer {
    /// Creates a transformer from a parsed mapping.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: MappingSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Loads a mapping file. `.json` is read as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let spec: MappingSpec = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("mapping")
            .to_string();
        Ok(Self::new(name, spec))
    }
}

fn is_empty(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

#[async_trait]
impl Transformer for MappingTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(&self, record: &Record) -> TransformResult {
        let fields = submission_data(record);

        if self
            .spec
            .skip_when_empty
            .iter()
            .any(|f| is_empty(fields.get(f)))
        {
            return TransformResult::Skip;
        }

        if let Some(missing) = self.spec.required.iter().find(|f| is_empty(fields.get(*f))) {
            return TransformResult::Fail(format!("missing required field '{missing}'"));
        }

        let mut payload = Record::new();
        for (key, value) in fields {
            match self.spec.fields.get(key) {
                Some(dest) => {
                    payload.insert(dest.clone(), value.clone());
                }
                None if self.spec.include_unmapped => {
                    payload.insert(key.clone(), value.clone());
                }
                None => {}
            }
        }

        if self.spec.wrap_data {
            let mut wrapped = Record::new();
            wrapped.insert("data".to_string(), serde_json::Value::Object(payload));
            payload = wrapped;
        }

        TransformResult::Emit(payload)
    }
}
