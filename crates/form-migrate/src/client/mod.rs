//! Form service API.
//!
//! The pipeline only talks to the service through [`FormApi`], so the
//! orchestrators can be driven against an in-memory double in tests.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connectors::{Record, RecordStream};
use crate::error::Result;

pub use http::HttpFormClient;

/// Fields requested when listing the forms of a project.
pub const FORM_SUMMARY_SELECT: &str = "_id,path,title";

/// A form definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Server-side identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Path, unique within the project.
    #[serde(default)]
    pub path: String,
    /// Machine name.
    #[serde(default)]
    pub name: String,
    /// Component schema, kept verbatim.
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

/// Body of a form creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewForm {
    /// Display title.
    pub title: String,
    /// Path, unique within the project.
    pub path: String,
    /// Machine name.
    pub name: String,
    /// Component schema.
    pub components: Vec<serde_json::Value>,
}

impl From<&Form> for NewForm {
    fn from(form: &Form) -> Self {
        Self {
            title: form.title.clone(),
            path: form.path.clone(),
            name: form.name.clone(),
            components: form.components.clone(),
        }
    }
}

/// One entry of a project form listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    /// Server-side identifier.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Form path.
    pub path: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
}

/// Raw response to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl SubmitResponse {
    /// Any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Operations the migration needs from a form service.
///
/// Locations are absolute URLs: a form URL for form operations and a
/// project URL for `create_form` and `list_forms`.
#[async_trait]
pub trait FormApi: Send + Sync {
    /// Loads a form definition.
    ///
    /// Fails with [`Error::NotFound`](crate::error::Error::NotFound) if the
    /// form does not exist.
    async fn load_form(&self, form: &str) -> Result<Form>;

    /// Creates a form in a project.
    async fn create_form(&self, project: &str, form: &NewForm) -> Result<Form>;

    /// Lists the forms of a project.
    async fn list_forms(&self, project: &str, limit: u64) -> Result<Vec<FormSummary>>;

    /// Streams every submission of a form.
    async fn fetch_submissions(&self, form: &str, limit: u64) -> Result<RecordStream>;

    /// Submits one payload. Non-2xx statuses are returned, not raised.
    async fn submit(&self, form: &str, payload: &Record) -> Result<SubmitResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_deserialize_ignores_extra_fields() {
        let json = r#"{"_id":"abc","title":"Foo","path":"foo","name":"foo","type":"form","components":[{"key":"name"}]}"#;
        let form: Form = serde_json::from_str(json).unwrap();
        assert_eq!(form.id.as_deref(), Some("abc"));
        assert_eq!(form.components.len(), 1);
    }

    #[test]
    fn test_new_form_copies_schema_verbatim() {
        let form = Form {
            id: Some("abc".into()),
            title: "Foo".into(),
            path: "foo".into(),
            name: "foo".into(),
            components: vec![serde_json::json!({"type": "textfield", "key": "name"})],
        };
        let body = serde_json::to_value(NewForm::from(&form)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "title": "Foo",
                "path": "foo",
                "name": "foo",
                "components": [{"type": "textfield", "key": "name"}]
            })
        );
    }

    #[test]
    fn test_submit_response_success_range() {
        let ok = |status| SubmitResponse {
            status,
            body: String::new(),
        };
        assert!(ok(200).is_success());
        assert!(ok(201).is_success());
        assert!(!ok(302).is_success());
        assert!(!ok(400).is_success());
    }
}
