//! Result of a single probe execution.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::severity::Severity;
use crate::types::Timestamp;

/// A scalar metadata value attached to a [`CheckResult`].
///
/// Serialized untagged so the wire shape is a plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Int(i64::from(v))
    }
}

impl From<u32> for MetadataValue {
    fn from(v: u32) -> Self {
        MetadataValue::Int(i64::from(v))
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

/// Sorted so that serialization is deterministic.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One probe's outcome.
///
/// Constructed via [`CheckResult::new`] and enriched with the builder
/// methods [`with_latency`](CheckResult::with_latency),
/// [`with_metadata`](CheckResult::with_metadata) and
/// [`with_timestamp`](CheckResult::with_timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Probe identifier, unique within its system (e.g. `"http-check"`).
    pub id: String,

    /// Probe kind: `"http"`, `"database"`, `"rdap"`, `"google-sheets"`, ...
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable probe name.
    pub name: String,

    #[serde(rename = "status")]
    pub severity: Severity,

    pub message: String,

    /// When the probe started.
    #[serde(rename = "last_check")]
    pub timestamp: Timestamp,

    #[serde(rename = "response_time_ms")]
    pub latency_ms: i64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl CheckResult {
    /// Create a result stamped with the current time, zero latency and no
    /// metadata.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            latency_ms: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_latency(mut self, latency_ms: i64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Replace the metadata map.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a single metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
