//! reqwest implementation of [`FormApi`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::client::{Form, FormApi, FormSummary, NewForm, SubmitResponse, FORM_SUMMARY_SELECT};
use crate::config::Credentials;
use crate::connectors::json_stream::decode_records;
use crate::connectors::{Record, RecordStream};
use crate::error::{Error, Result};

/// Creates an HTTP client.
///
/// No request timeout is set; transport defaults apply.
pub fn create_http_client(accept_invalid_certs: bool) -> Result<Client> {
    Ok(Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?)
}

/// HTTP client for one side (source or destination) of a migration.
pub struct HttpFormClient {
    client: Client,
    bulk_client: Client,
    credentials: Credentials,
}

impl HttpFormClient {
    /// Creates a client carrying `credentials` on every request.
    ///
    /// `accept_invalid_certs` applies to the bulk submission read only.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(credentials: Credentials, accept_invalid_certs: bool) -> Result<Self> {
        Ok(Self {
            client: create_http_client(false)?,
            bulk_client: create_http_client(accept_invalid_certs)?,
            credentials,
        })
    }

    fn request(&self, client: &Client, method: Method, url: &str) -> RequestBuilder {
        let req = client
            .request(method, url)
            .header("content-type", "application/json");

        match self.credentials.auth_header() {
            Some((name, value)) => req.header(name, value),
            None => req,
        }
    }

    /// Fails on non-2xx, keeping the body for diagnostics.
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(Error::from_status(status.as_u16(), body, what))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl FormApi for HttpFormClient {
    async fn load_form(&self, form: &str) -> Result<Form> {
        let response = self
            .request(&self.client, Method::GET, form)
            .send()
            .await?;
        let response = Self::check(response, form).await?;
        Self::json(response).await
    }

    async fn create_form(&self, project: &str, form: &NewForm) -> Result<Form> {
        let url = format!("{}/form", project.trim_end_matches('/'));
        let response = self
            .request(&self.client, Method::POST, &url)
            .json(form)
            .send()
            .await?;
        let response = Self::check(response, &url).await?;
        Self::json(response).await
    }

    async fn list_forms(&self, project: &str, limit: u64) -> Result<Vec<FormSummary>> {
        let url = format!("{}/form", project.trim_end_matches('/'));
        let response = self
            .request(&self.client, Method::GET, &url)
            .query(&[("limit", limit.to_string().as_str()), ("select", FORM_SUMMARY_SELECT)])
            .send()
            .await?;
        let response = Self::check(response, &url).await?;
        Self::json(response).await
    }

    async fn fetch_submissions(&self, form: &str, limit: u64) -> Result<RecordStream> {
        let url = format!("{}/submission", form.trim_end_matches('/'));
        let response = self
            .request(&self.bulk_client, Method::GET, &url)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;
        let response = Self::check(response, &url).await?;
        Ok(decode_records(response.bytes_stream()))
    }

    async fn submit(&self, form: &str, payload: &Record) -> Result<SubmitResponse> {
        let url = format!("{}/submission", form.trim_end_matches('/'));
        let response = self
            .request(&self.client, Method::POST, &url)
            .json(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(SubmitResponse { status, body })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
