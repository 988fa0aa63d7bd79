//! Ingress and API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A newly stored image awaiting processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub artifact_key: String,
    pub arrived_at: DateTime<Utc>,
}

impl CaptureEvent {
    pub fn new(artifact_key: impl Into<String>) -> Self {
        Self {
            artifact_key: artifact_key.into(),
            arrived_at: Utc::now(),
        }
    }
}

/// Object-created notification (S3 event shape), one record per stored object
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEventNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEventRecord {
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    pub s3: StorageEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEntity {
    #[serde(default)]
    pub bucket: Option<StorageBucket>,
    pub object: StorageObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageBucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub key: String,
}

impl StorageEventNotification {
    /// Capture events in record order
    pub fn capture_events(&self) -> Vec<CaptureEvent> {
        self.records
            .iter()
            .map(|r| CaptureEvent {
                artifact_key: r.s3.object.key.clone(),
                arrived_at: r.event_time.unwrap_or_else(Utc::now),
            })
            .collect()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rate_limit_enabled: bool,
    pub second_factor_enabled: bool,
}
