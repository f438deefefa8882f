//! HTTP client for the einstein dispatch endpoint.

use anyhow::{Context, Result};
use bmi_wire::{Command, Credentials, ExecuteRequest};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CliError;

/// Client that runs commands as one caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run a command and return its `return_value`.
    ///
    /// A failure envelope becomes [`CliError::Api`] whatever the HTTP status.
    pub async fn execute(&self, command: &Command) -> Result<Value, CliError> {
        let request = ExecuteRequest::new(self.credentials.clone(), command)
            .map_err(|e| CliError::Other(e.into()))?;

        let response = self
            .client
            .post(self.url("/v1/execute"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        unwrap_envelope(status.as_u16(), &body)
    }

    /// Run a command and decode its `return_value`.
    pub async fn execute_as<T: DeserializeOwned>(&self, command: &Command) -> Result<T, CliError> {
        let value = self.execute(command).await?;
        serde_json::from_value(value)
            .map_err(|e| CliError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

/// Split an envelope into its value or a [`CliError::Api`].
fn unwrap_envelope(http_status: u16, body: &str) -> Result<Value, CliError> {
    let envelope: Value = serde_json::from_str(body).map_err(|_| {
        CliError::InvalidResponse(format!("HTTP {http_status}: {}", body.trim()))
    })?;

    let status = envelope
        .get("status_code")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| CliError::InvalidResponse(format!("missing status_code in {envelope}")))?;

    if status == 200 {
        return Ok(envelope.get("return_value").cloned().unwrap_or(Value::Null));
    }

    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error");
    Err(CliError::api(status, message))
}
