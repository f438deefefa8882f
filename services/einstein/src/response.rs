//! Response envelope.
//!
//! Success is `{"status_code": 200, "return_value": ...}`, failure is
//! `{"status_code": N, "message": "..."}`.

use bmi_id::{extract_id, IMAGE_MARKER};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::MetadataStore;
use crate::error::BmiError;

/// Status code of a successful operation.
pub const STATUS_OK: u16 = 200;

/// Outcome of one orchestrator operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response<T> {
    Success { status_code: u16, return_value: T },
    Failure { status_code: u16, message: String },
}

impl<T> Response<T> {
    pub fn success(value: T) -> Self {
        Response::Success {
            status_code: STATUS_OK,
            return_value: value,
        }
    }

    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Response::Failure {
            status_code,
            message: message.into(),
        }
    }

    /// Envelope for `err`, translating derived storage names in its
    /// message when the error asks for it.
    pub fn from_error(err: &BmiError, store: &dyn MetadataStore) -> Self {
        let message = err.to_string();
        let message = if err.needs_name_translation() {
            translate_names(&message, store)
        } else {
            message
        };
        Self::failure(err.status_code(), message)
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Response::Success { status_code, .. } | Response::Failure { status_code, .. } => {
                *status_code
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// The payload, if the operation succeeded.
    pub fn value(&self) -> Option<&T> {
        match self {
            Response::Success { return_value, .. } => Some(return_value),
            Response::Failure { .. } => None,
        }
    }

    /// The error message, if the operation failed.
    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Success { .. } => None,
            Response::Failure { message, .. } => Some(message),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Response::Success { return_value, .. } => Some(return_value),
            Response::Failure { .. } => None,
        }
    }
}

impl<T: Serialize> Response<T> {
    /// Erase the payload type.
    pub fn into_json(self) -> serde_json::Value {
        serde_json::to_value(&self).unwrap_or_else(|e| {
            serde_json::json!({
                "status_code": 500,
                "message": format!("Failed to serialize response: {e}"),
            })
        })
    }
}

/// Replace a derived storage name leading `message` with its image name.
///
/// Only the first space-separated token is considered. Anything that does
/// not resolve leaves the message untouched.
pub fn translate_names(message: &str, store: &dyn MetadataStore) -> String {
    let first = message.split(' ').next().unwrap_or_default();
    if !first.contains(IMAGE_MARKER) {
        return message.to_string();
    }

    let Ok(id) = extract_id(first) else {
        return message.to_string();
    };
    match store.find_name_of_image(id) {
        Ok(Some(name)) => {
            debug!(storage_name = %first, image = %name, "Translated storage name");
            format!("{name}{}", &message[first.len()..])
        }
        _ => message.to_string(),
    }
}
