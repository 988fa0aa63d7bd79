//! LabelingPipeline - Human triage of unrecognized faces
//!
//! Train: enroll the staged image under the given name, then copy it to
//! `trained/<name>/`. Discard: no enrollment (optionally archive under
//! `discarded/`).
//!
//! The staged artifact and its `_small` variant are deleted on every terminal
//! outcome, including enrollment or copy failure, so the `unknown/` folder
//! never accumulates orphans. The first failure is still returned.

use crate::error::{Error, Result};
use crate::identity_resolver::IdentityResolver;
use crate::object_relocator::{Classification, ObjectRelocator, UNKNOWN_PREFIX};
use crate::state::{AppConfig, Capabilities};
use crate::thumbnailer::small_key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header read by the chat client to render the action result
pub const CARD_ACTION_STATUS_HEADER: &str = "CARD-ACTION-STATUS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Train,
    Discard,
}

impl fmt::Display for LabelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelAction::Train => write!(f, "train"),
            LabelAction::Discard => write!(f, "discard"),
        }
    }
}

/// Body posted by the triage card actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub action: LabelAction,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl LabelRequest {
    /// Reject requests that cannot be processed. Nothing is deleted for these.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::Validation("key is required".to_string()));
        }
        // only staged triage artifacts can be labeled or discarded
        let staged = self.key.strip_prefix(UNKNOWN_PREFIX).unwrap_or("");
        if staged.is_empty() || staged.contains('/') {
            return Err(Error::Validation(format!(
                "key is not a staged triage artifact: {}",
                self.key
            )));
        }

        if self.action == LabelAction::Train {
            let name = self.name.as_deref().map(str::trim).unwrap_or("");
            if name.is_empty() {
                return Err(Error::Validation("name is required to train".to_string()));
            }
            // chat client sends the placeholder through when the input was left blank
            if name == crate::notifier::NAME_PLACEHOLDER {
                return Err(Error::Validation("name was not filled in".to_string()));
            }
            if name.contains('/') || name == "." || name == ".." {
                return Err(Error::Validation(format!("invalid name: {}", name)));
            }
        }

        Ok(())
    }

    fn trimmed_name(&self) -> &str {
        self.name.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Result of a processed label request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelOutcome {
    pub action: LabelAction,
    pub key: String,
    /// Where the artifact was copied, if anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocated_to: Option<String>,
}

impl LabelOutcome {
    /// Value for [`CARD_ACTION_STATUS_HEADER`]
    pub fn status_header(&self) -> String {
        format!("model {}ed successfully", self.action)
    }
}

pub struct LabelingPipeline {
    resolver: IdentityResolver,
    relocator: ObjectRelocator,
    archive_discarded: bool,
}

impl LabelingPipeline {
    pub fn new(config: &AppConfig, caps: &Capabilities) -> Self {
        Self {
            resolver: IdentityResolver::new(caps.face_matcher.clone(), config.bucket_name.clone()),
            relocator: ObjectRelocator::new(caps.object_store.clone()),
            archive_discarded: config.archive_discarded,
        }
    }

    pub async fn handle(&self, req: &LabelRequest) -> Result<LabelOutcome> {
        req.validate()?;

        tracing::info!(action = %req.action, key = %req.key, name = ?req.name, "Label request");

        let processed = self.process(req).await;
        if let Err(e) = &processed {
            tracing::error!(action = %req.action, key = %req.key, error = %e, "Label processing failed");
        }

        let cleanup = self.relocator.discard(&req.key).await;
        if let Err(e) = &cleanup {
            tracing::error!(key = %req.key, error = %e, "Failed to remove staged artifact");
        }

        let derived = small_key(&req.key);
        if let Err(e) = self.relocator.discard(&derived).await {
            tracing::warn!(key = %derived, error = %e, "Failed to remove staged thumbnail");
        }

        let relocated_to = processed?;
        cleanup?;

        Ok(LabelOutcome {
            action: req.action,
            key: req.key.clone(),
            relocated_to,
        })
    }

    /// Enroll / copy step; returns the new key when the artifact was copied
    async fn process(&self, req: &LabelRequest) -> Result<Option<String>> {
        match req.action {
            LabelAction::Train => {
                let name = req.trimmed_name();
                tracing::info!(key = %req.key, name = %name, "Training model on artifact");
                self.resolver.enroll(&req.key, name).await?;

                let classification = Classification::Trained {
                    name: name.to_string(),
                };
                let artifact = self.relocator.copy_to(&req.key, &classification).await?;
                Ok(Some(artifact.key))
            }
            LabelAction::Discard if self.archive_discarded => {
                let artifact = self
                    .relocator
                    .copy_to(&req.key, &Classification::Discarded)
                    .await?;
                Ok(Some(artifact.key))
            }
            LabelAction::Discard => Ok(None),
        }
    }
}
