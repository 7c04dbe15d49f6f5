use anyhow::anyhow;
use reqwest::StatusCode as HttpStatus;
use serde_json::Value;

use crate::poll::Cancelled;
use crate::resource::ResourceType;
use crate::status::StatusCode;

/// Failure of a client operation.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Empty or malformed id, rejected before any request was made.
    #[error("invalid {expected} id: {id:?}")]
    InvalidInput { expected: ResourceType, id: String },

    /// The resource a new one is built from did not finish in time.
    #[error("dependency {id} was not ready after {attempts} attempt(s)")]
    DependencyNotReady { id: String, attempts: u32 },

    /// The resource itself did not finish within the polling policy.
    #[error("{id} was not ready after {attempts} attempt(s)")]
    NotReady { id: String, attempts: u32 },

    /// The resource reached a failure status server-side.
    #[error("{id} failed with status {code}: {}", .message.as_deref().unwrap_or("no message"))]
    Faulty {
        id: String,
        code: StatusCode,
        message: Option<String>,
    },

    #[error("cancelled while waiting for a dependency")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl From<Cancelled> for ResourceError {
    fn from(_: Cancelled) -> Self {
        ResourceError::Cancelled
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub(crate) code: Option<u16>,
    #[serde(default)]
    pub(crate) status: Option<ApiErrorStatus>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorStatus {
    #[serde(default)]
    pub(crate) code: Option<i64>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) extra: Option<Value>,
}

/// Builds an actionable error from an API error body.
///
/// `url` must be the request URL without credentials.
pub(crate) fn format_api_error(status: HttpStatus, url: &str, e: &ApiErrorResponse) -> anyhow::Error {
    let status_in_body = e.code.unwrap_or(status.as_u16());
    let message = e
        .status
        .as_ref()
        .and_then(|s| s.message.as_deref())
        .unwrap_or("");
    let api_code = e
        .status
        .as_ref()
        .and_then(|s| s.code)
        .map(|c| c.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let extra = e
        .status
        .as_ref()
        .and_then(|s| s.extra.as_ref())
        .map(Value::to_string)
        .unwrap_or_default();

    if status == HttpStatus::UNAUTHORIZED {
        return anyhow!(
            "BigML authentication failed (HTTP {}).\n- Check BIGML_USERNAME and BIGML_API_KEY, or the `username:`/`api_key:` entries in .bigmlrc\n- Development-mode resources need dev_mode enabled\n\nServer message: {}\napi code: {}\nrequest: {}",
            status_in_body,
            message,
            api_code,
            url
        );
    }

    if status == HttpStatus::PAYMENT_REQUIRED || status == HttpStatus::FORBIDDEN {
        return anyhow!(
            "BigML refused the request (HTTP {}): the account may have reached its limits or lack access to this resource.\n\nServer message: {}\napi code: {}\n{}\nrequest: {}",
            status_in_body,
            message,
            api_code,
            extra,
            url
        );
    }

    if status == HttpStatus::NOT_FOUND {
        return anyhow!(
            "BigML resource not found (HTTP 404).\n- The resource may have been deleted, or belongs to the other (production/development) mode\n\nServer message: {}\nrequest: {}",
            message,
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}\napi code: {}\n{}",
        status_in_body,
        url,
        message,
        api_code,
        extra
    )
}
