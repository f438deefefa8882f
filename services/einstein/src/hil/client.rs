//! HIL REST client.
//!
//! Requests carry the caller's own credentials as HTTP basic auth, so the
//! fabric's authorization decisions apply to the caller and not to BMI.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{IsolationError, NetworkIsolation, NodeInfo};

/// HIL API version prefix.
pub const HIL_API: &str = "v0";

#[derive(Serialize)]
struct NodeBody<'a> {
    node: &'a str,
}

/// Blocking HIL client.
pub struct HilClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HilClient {
    /// Create a client for `url` authenticating as `username`.
    pub fn new(
        url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, IsolationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IsolationError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", url.trim_end_matches('/'), HIL_API),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, api: &str) -> String {
        format!("{}/{}", self.base_url, api)
    }

    fn send(&self, request: RequestBuilder) -> Result<Option<Value>, IsolationError> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| IsolationError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| IsolationError::Connection(e.to_string()))?;
        parse_response(status, &body)
    }

    fn get(&self, api: &str) -> Result<Option<Value>, IsolationError> {
        let url = self.url(api);
        debug!(url = %url, "HIL GET");
        self.send(self.client.get(&url))
    }

    fn post(&self, api: &str, body: &impl Serialize) -> Result<Option<Value>, IsolationError> {
        let url = self.url(api);
        debug!(url = %url, "HIL POST");
        self.send(self.client.post(&url).json(body))
    }

    fn names(value: Option<Value>) -> Result<Vec<String>, IsolationError> {
        match value {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| IsolationError::InvalidResponse(e.to_string())),
        }
    }
}

/// Interpret an HIL response.
///
/// 200 yields the JSON body when there is one; other 2xx/3xx succeed with
/// no value; 401 and 403 are authentication and authorization failures;
/// anything else carries the service's `message`.
pub fn parse_response(status: u16, body: &str) -> Result<Option<Value>, IsolationError> {
    match status {
        200 => Ok(serde_json::from_str(body).ok()),
        201..=399 => Ok(None),
        401 => Err(IsolationError::AuthenticationFailed),
        403 => Err(IsolationError::AuthorizationFailed),
        _ => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.trim().to_string());
            Err(IsolationError::Unknown { status, message })
        }
    }
}

impl NetworkIsolation for HilClient {
    fn node_mac_addr(&self, node: &str, nic: &str) -> Result<String, IsolationError> {
        let value = self.get(&format!("node/{node}"))?.unwrap_or(Value::Null);
        let info: NodeInfo = serde_json::from_value(value)
            .map_err(|e| IsolationError::InvalidResponse(e.to_string()))?;
        debug!(node = %node, nic_count = info.nics.len(), "Fetched node info");

        info.mac_for(nic)
            .map(str::to_string)
            .ok_or_else(|| IsolationError::NicNotFound {
                node: node.to_string(),
                nic: nic.to_string(),
            })
    }

    fn validate_project(&self, project: &str) -> Result<(), IsolationError> {
        self.get(&format!("project/{project}/nodes")).map(|_| ())
    }

    fn attach_node(&self, project: &str, node: &str) -> Result<(), IsolationError> {
        self.post(&format!("project/{project}/connect_node"), &NodeBody { node })
            .map(|_| ())
    }

    fn detach_node(&self, project: &str, node: &str) -> Result<(), IsolationError> {
        self.post(&format!("project/{project}/detach_node"), &NodeBody { node })
            .map(|_| ())
    }

    fn list_free_nodes(&self) -> Result<Vec<String>, IsolationError> {
        Self::names(self.get("free_nodes")?)
    }

    fn project_nodes(&self, project: &str) -> Result<Vec<String>, IsolationError> {
        Self::names(self.get(&format!("project/{project}/nodes"))?)
    }
}
