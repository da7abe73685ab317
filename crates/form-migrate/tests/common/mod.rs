//! In-memory form service shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use form_migrate::{
    Error, Form, FormApi, FormSummary, MigrationConfig, NewForm, Record, RecordStream, Result,
    SubmitResponse,
};

pub const ENDPOINT: &str = "https://forms.test";

type SubmitRule = Box<dyn Fn(&Record) -> Option<Result<SubmitResponse>> + Send + Sync>;

/// Form service double that records every call.
#[derive(Default)]
pub struct MockFormApi {
    forms: Mutex<HashMap<String, Form>>,
    load_errors: HashMap<String, u16>,
    submissions: HashMap<String, Vec<Record>>,
    listing: Option<Vec<FormSummary>>,
    fail_create: bool,
    submit_rule: Option<SubmitRule>,
    submit_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub loads: Mutex<Vec<String>>,
    pub creates: Mutex<Vec<(String, NewForm)>>,
    pub fetches: Mutex<Vec<String>>,
    pub submits: Mutex<Vec<(String, Record)>>,
}

impl MockFormApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(self, url: &str, form: Form) -> Self {
        self.forms.lock().unwrap().insert(url.to_string(), form);
        self
    }

    pub fn with_load_error(mut self, url: &str, status: u16) -> Self {
        self.load_errors.insert(url.to_string(), status);
        self
    }

    pub fn with_submissions(mut self, url: &str, records: Vec<Record>) -> Self {
        self.submissions.insert(url.to_string(), records);
        self
    }

    pub fn with_listing(mut self, forms: Vec<FormSummary>) -> Self {
        self.listing = Some(forms);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn with_submit_rule(
        mut self,
        rule: impl Fn(&Record) -> Option<Result<SubmitResponse>> + Send + Sync + 'static,
    ) -> Self {
        self.submit_rule = Some(Box::new(rule));
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted_payloads(&self) -> Vec<Record> {
        self.submits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.loads.lock().unwrap().len()
            + self.creates.lock().unwrap().len()
            + self.fetches.lock().unwrap().len()
            + self.submits.lock().unwrap().len()
    }
}

#[async_trait]
impl FormApi for MockFormApi {
    async fn load_form(&self, form: &str) -> Result<Form> {
        self.loads.lock().unwrap().push(form.to_string());
        if let Some(status) = self.load_errors.get(form) {
            return Err(Error::Api {
                status: *status,
                body: "load failed".to_string(),
            });
        }
        self.forms
            .lock()
            .unwrap()
            .get(form)
            .cloned()
            .ok_or_else(|| Error::NotFound(form.to_string()))
    }

    async fn create_form(&self, project: &str, form: &NewForm) -> Result<Form> {
        self.creates
            .lock()
            .unwrap()
            .push((project.to_string(), form.clone()));
        if self.fail_create {
            return Err(Error::Api {
                status: 400,
                body: "path already taken".to_string(),
            });
        }
        let created = Form {
            id: Some(format!("id-{}", form.path)),
            title: form.title.clone(),
            path: form.path.clone(),
            name: form.name.clone(),
            components: form.components.clone(),
        };
        self.forms
            .lock()
            .unwrap()
            .insert(format!("{}/{}", project, form.path), created.clone());
        Ok(created)
    }

    async fn list_forms(&self, project: &str, _limit: u64) -> Result<Vec<FormSummary>> {
        self.listing.clone().ok_or_else(|| Error::Api {
            status: 500,
            body: format!("cannot list {project}"),
        })
    }

    async fn fetch_submissions(&self, form: &str, _limit: u64) -> Result<RecordStream> {
        self.fetches.lock().unwrap().push(form.to_string());
        let records = self
            .submissions
            .get(form)
            .cloned()
            .ok_or_else(|| Error::SourceStream(format!("connection refused: {form}")))?;
        Ok(futures::stream::iter(records.into_iter().map(Ok)).boxed())
    }

    async fn submit(&self, form: &str, payload: &Record) -> Result<SubmitResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.submits
            .lock()
            .unwrap()
            .push((form.to_string(), payload.clone()));

        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.submit_rule.as_ref().and_then(|rule| rule(payload)) {
            Some(result) => result,
            None => Ok(SubmitResponse {
                status: 201,
                body: "{}".to_string(),
            }),
        }
    }
}

pub fn config() -> MigrationConfig {
    let mut config = MigrationConfig {
        endpoint: Some(ENDPOINT.to_string()),
        ..Default::default()
    };
    config.options.progress = false;
    config
}

pub fn url(path: &str) -> String {
    format!("{ENDPOINT}/{path}")
}

pub fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn numbered_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| record(serde_json::json!({ "data": { "index": i } })))
        .collect()
}

pub fn form(title: &str, path: &str) -> Form {
    Form {
        id: Some(format!("id-{path}")),
        title: title.to_string(),
        path: path.to_string(),
        name: path.to_string(),
        components: vec![serde_json::json!({"type": "textfield", "key": "name"})],
    }
}

pub fn summary(path: &str) -> FormSummary {
    FormSummary {
        id: Some(format!("id-{path}")),
        path: path.to_string(),
        title: path.to_uppercase(),
    }
}

pub fn shared(api: MockFormApi) -> Arc<MockFormApi> {
    Arc::new(api)
}
