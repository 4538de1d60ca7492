//! Request/response payload types for instance capabilities.
//!
//! These are deliberately thin: payloads are opaque JSON values and byte
//! buffers. Wire framing, frame-shape validation, and payload migration
//! all live in the transport layer above this crate — the capability
//! traits only need real signatures to delegate through.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single query within a [`QueryDataRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataQuery {
    /// Correlates the query with its response.
    pub ref_id: String,
    /// Plugin-defined query model.
    #[serde(default)]
    pub json: Value,
}

/// Batch of queries dispatched to a query-handling instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDataRequest {
    pub queries: Vec<DataQuery>,
}

/// Result for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataResponse {
    pub ref_id: String,
    /// Encoded data frames, opaque to muninn.
    #[serde(default)]
    pub frames: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Responses keyed back to their queries by `ref_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDataResponse {
    pub responses: Vec<DataResponse>,
}

/// Health of an instance as reported by its health-check capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Error,
}

/// Result of a health check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_details: Option<Value>,
}

impl CheckHealthResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.into(),
            json_details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
            json_details: None,
        }
    }
}

/// HTTP-shaped resource call forwarded to an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallResourceRequest {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

/// Response to a resource call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResourceResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

/// Request to subscribe a client to a stream path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeStreamRequest {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// Outcome of a stream subscription attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeStreamStatus {
    Ok,
    NotFound,
    PermissionDenied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeStreamResponse {
    pub status: SubscribeStreamStatus,
    /// Snapshot delivered to the subscriber before live packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Value>,
}

/// Client-to-instance publication on a stream path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishStreamRequest {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishStreamResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request to run a stream, producing packets until closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStreamRequest {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// One packet emitted by a running stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamPacket {
    pub data: Value,
}
