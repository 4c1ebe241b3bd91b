//! Wire envelope used for both command and response messages.
//!
//! Commands and responses share one shape, `{action, data}`. The action tag
//! also travels out-of-band as a message header so the worker can route
//! without decoding the body first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Header carrying the action tag.
pub const ACTION_HEADER: &str = "action";
/// Header carrying the correlation identifier.
pub const CORRELATION_HEADER: &str = "correlation-id";

/// Message returned to callers when a worker fails for reasons they can't fix.
pub const GENERIC_FAILURE: &str = "An error occurred!";

const RESPONSE_SUFFIX: &str = "Response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub action: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(action: impl Into<String>, data: T) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }
}

/// Action tag stamped on the response to `action`.
pub fn response_action(action: &str) -> String {
    format!("{action}{RESPONSE_SUFFIX}")
}

/// Per-call token matching a response to the request that caused it.
///
/// Minted from a v4 UUID, so two live calls never share one. Comparison is
/// exact string equality; there is no prefix or case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, candidate: Option<&str>) -> bool {
        candidate == Some(self.0.as_str())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of every response envelope.
///
/// `success` is mandatory on the wire. `data` is operation specific and
/// omitted when the operation has nothing to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult<T = Value> {
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> HandlerResult<T> {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
            data: None,
        }
    }

    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            success: true,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            data: None,
        }
    }
}

impl HandlerResult<Value> {
    /// Successful result carrying `data` encoded as JSON.
    pub fn with_data<D: Serialize>(message: impl Into<String>, data: &D) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::success(message, value),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode handler result data");
                Self::failure(GENERIC_FAILURE)
            }
        }
    }
}
