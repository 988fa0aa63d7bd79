//! ActuationChannel - Door command publishing
//!
//! Publishes `{"username", "command"}` messages to the topic the door
//! controller subscribes to.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Commands understood by the door controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorCommand {
    Open,
}

/// Message body published to the door topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub username: String,
    pub command: DoorCommand,
}

/// Publish capability
#[async_trait]
pub trait ActuationChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: &CommandPayload, qos: u8) -> Result<()>;
}

/// Publishes over an HTTP data-plane endpoint (`POST /topics/{topic}?qos=N`)
pub struct HttpActuationChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpActuationChannel {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.endpoint, topic)
    }
}

#[async_trait]
impl ActuationChannel for HttpActuationChannel {
    async fn publish(&self, topic: &str, payload: &CommandPayload, qos: u8) -> Result<()> {
        let url = self.topic_url(topic);
        let resp = self
            .client
            .post(&url)
            .query(&[("qos", qos)])
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Actuation(format!(
                "publish to {} failed: {} - {}",
                topic, status, body
            )));
        }

        Ok(())
    }
}

/// Sends door commands to one configured topic at qos 0
pub struct DoorActuator {
    channel: Arc<dyn ActuationChannel>,
    topic: String,
}

impl DoorActuator {
    pub fn new(channel: Arc<dyn ActuationChannel>, topic: String) -> Self {
        Self { channel, topic }
    }

    /// Publish an open command on behalf of `username`
    pub async fn open(&self, username: &str) -> Result<()> {
        let payload = CommandPayload {
            username: username.to_string(),
            command: DoorCommand::Open,
        };

        tracing::info!(topic = %self.topic, username = %username, "Publishing open command");
        self.channel.publish(&self.topic, &payload, 0).await
    }
}
