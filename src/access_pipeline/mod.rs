//! AccessEventPipeline - Capture → identity → door
//!
//! ## Flow
//!
//! Matched:   relocate to `detected/<identity>/` → rate-limit claim →
//!            second factor → publish open → thumbnail (best-effort) → welcome card
//! Unmatched: relocate to `unknown/` → thumbnail (best-effort) → triage card
//!
//! ## Failure semantics
//!
//! Each step commits before the next starts. A fatal failure aborts the
//! remaining steps and nothing already committed is undone; in particular a
//! failed notification leaves the door opened and the artifact relocated.
//! A denied rate-limit claim or second factor ends the run successfully
//! without actuation or notification. A capture whose intake object is already
//! gone was handled by an earlier delivery and is skipped.
//!
//! Manual triggers go through the same rate-limit and second-factor gates as
//! a matched identity.

use crate::actuation_channel::DoorActuator;
use crate::error::{Error, Result};
use crate::identity_resolver::{IdentityMatch, IdentityResolver};
use crate::models::CaptureEvent;
use crate::notifier::{MessageCard, NotificationSink};
use crate::object_relocator::{Artifact, Classification, ObjectRelocator};
use crate::object_store::ObjectStore;
use crate::rate_limiter::{RateLimiter, OPEN_ACTION};
use crate::second_factor::{SecondFactorDecision, SecondFactorGate};
use crate::state::{AppConfig, Capabilities};
use crate::thumbnailer::Thumbnailer;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Terminal state of one capture invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Door opened and welcome sent
    Matched {
        identity: String,
        confidence: f32,
        artifact: Artifact,
    },
    /// Nobody recognized; triage card sent
    Unmatched { artifact: Artifact },
    /// Identity already let in within the grace window
    Suppressed { identity: String, artifact: Artifact },
    /// Second factor did not approve
    Rejected { identity: String, artifact: Artifact },
    /// Intake object already relocated by an earlier delivery
    AlreadyProcessed { key: String },
}

/// Terminal state of a manual trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Opened { username: String },
    Suppressed { username: String },
    Rejected { username: String },
}

/// Result of the rate-limit and second-factor checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Admitted,
    Suppressed,
    Rejected,
}

pub struct AccessEventPipeline {
    resolver: IdentityResolver,
    relocator: ObjectRelocator,
    /// limiter and grace seconds
    rate_limit: Option<(RateLimiter, i64)>,
    second_factor: Option<SecondFactorGate>,
    actuator: DoorActuator,
    thumbnailer: Thumbnailer,
    notifier: Arc<dyn NotificationSink>,
    store: Arc<dyn ObjectStore>,
    train_url: String,
}

impl AccessEventPipeline {
    pub fn new(config: &AppConfig, caps: &Capabilities) -> Result<Self> {
        let rate_limit = match config.open_rate_seconds {
            Some(grace) => {
                let store = caps.rate_limit_store.clone().ok_or_else(|| {
                    Error::Config("OPEN_RATE_SECONDS is set but no rate-limit store".to_string())
                })?;
                Some((RateLimiter::new(store), grace))
            }
            None => None,
        };

        let second_factor = match &config.second_factor {
            Some(sf) => {
                let invoker = caps.authorization.clone().ok_or_else(|| {
                    Error::Config("MFA_ARN is set but no authorization invoker".to_string())
                })?;
                Some(SecondFactorGate::new(invoker, sf.clone()))
            }
            None => None,
        };

        Ok(Self {
            resolver: IdentityResolver::new(caps.face_matcher.clone(), config.bucket_name.clone()),
            relocator: ObjectRelocator::new(caps.object_store.clone()),
            rate_limit,
            second_factor,
            actuator: DoorActuator::new(caps.actuation.clone(), config.iot_topic.clone()),
            thumbnailer: Thumbnailer::new(caps.object_store.clone()),
            notifier: caps.notifier.clone(),
            store: caps.object_store.clone(),
            train_url: config.train_url.clone(),
        })
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit.is_some()
    }

    pub fn second_factor_enabled(&self) -> bool {
        self.second_factor.is_some()
    }

    /// Process one captured image
    pub async fn handle(&self, event: &CaptureEvent) -> Result<AccessOutcome> {
        let span = tracing::info_span!(
            "capture",
            run_id = %uuid::Uuid::new_v4(),
            key = %event.artifact_key
        );

        async {
            tracing::debug!(arrived_at = %event.arrived_at, "Processing capture");

            if !self.store.exists(&event.artifact_key).await? {
                tracing::info!("Intake object already gone, skipping redelivered capture");
                return Ok(AccessOutcome::AlreadyProcessed {
                    key: event.artifact_key.clone(),
                });
            }

            let identity = self.resolver.resolve(&event.artifact_key).await.map_err(|e| {
                tracing::error!(error = %e, "Identity lookup failed");
                e
            })?;

            let result = if identity.present {
                self.matched(event, identity).await
            } else {
                self.unmatched(event).await
            };

            if let Err(e) = &result {
                tracing::error!(error = %e, "Capture processing failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn matched(&self, event: &CaptureEvent, found: IdentityMatch) -> Result<AccessOutcome> {
        let identity = found.identity;
        let classification = Classification::Detected {
            identity: identity.clone(),
        };

        let mut artifact = self
            .relocator
            .relocate(&event.artifact_key, &classification)
            .await?;

        match self.admit(&identity).await? {
            Admission::Admitted => {}
            Admission::Suppressed => return Ok(AccessOutcome::Suppressed { identity, artifact }),
            Admission::Rejected => return Ok(AccessOutcome::Rejected { identity, artifact }),
        }

        self.actuator.open(&identity).await?;

        self.attach_thumbnail(&mut artifact).await;

        let card = MessageCard::welcome(&identity, &self.store.public_url(artifact.display_key()));
        tracing::info!(identity = %identity, "Sending welcome message");
        self.notifier.send(&card).await?;

        Ok(AccessOutcome::Matched {
            identity,
            confidence: found.confidence,
            artifact,
        })
    }

    async fn unmatched(&self, event: &CaptureEvent) -> Result<AccessOutcome> {
        tracing::info!("No matches found, sending to unknown folder");

        let mut artifact = self
            .relocator
            .relocate(&event.artifact_key, &Classification::Unknown)
            .await?;

        self.attach_thumbnail(&mut artifact).await;

        let card = MessageCard::triage(
            &self.store.public_url(artifact.display_key()),
            &self.train_url,
            &artifact.key,
        );
        tracing::info!(key = %artifact.key, "Sending triage message");
        self.notifier.send(&card).await?;

        Ok(AccessOutcome::Unmatched { artifact })
    }

    /// Open the door for `username` without a capture
    pub async fn trigger(&self, username: &str) -> Result<TriggerOutcome> {
        let span = tracing::info_span!("trigger", run_id = %uuid::Uuid::new_v4(), username = %username);

        async {
            let username = username.to_string();
            match self.admit(&username).await? {
                Admission::Admitted => {}
                Admission::Suppressed => return Ok(TriggerOutcome::Suppressed { username }),
                Admission::Rejected => return Ok(TriggerOutcome::Rejected { username }),
            }

            self.actuator.open(&username).await?;
            Ok(TriggerOutcome::Opened { username })
        }
        .instrument(span)
        .await
    }

    /// Rate-limit claim, then second factor
    async fn admit(&self, identity: &str) -> Result<Admission> {
        if let Some((limiter, grace)) = &self.rate_limit {
            if !limiter.try_claim(identity, OPEN_ACTION, *grace).await {
                tracing::warn!(identity = %identity, grace_seconds = grace, "Rate limit triggered for open event");
                return Ok(Admission::Suppressed);
            }
        }

        if let Some(gate) = &self.second_factor {
            if gate.authorize(identity).await? == SecondFactorDecision::Denied {
                tracing::warn!(identity = %identity, "Second factor denied, door stays closed");
                return Ok(Admission::Rejected);
            }
        }

        Ok(Admission::Admitted)
    }

    /// Best-effort: leaves `artifact.small` unset on failure
    async fn attach_thumbnail(&self, artifact: &mut Artifact) {
        match self.thumbnailer.shrink(&artifact.key).await {
            Ok(small) => artifact.small = Some(small),
            Err(e) => {
                tracing::warn!(
                    key = %artifact.key,
                    error = %e,
                    "Error resizing, falling back to full-size image"
                );
            }
        }
    }
}
