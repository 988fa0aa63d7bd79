//! ObjectRelocator - Moves processed artifacts to their classification folder
//!
//! ## Responsibilities
//!
//! - Derive the terminal key for an outcome (detected / unknown / trained / discarded)
//! - Copy the artifact there with public-read ACL
//! - Remove the original key
//!
//! Target keys embed a content hash of the source key, so relocating the same
//! intake key twice lands on the same target.

use crate::error::Result;
use crate::object_store::{Acl, ObjectStore};
use serde::Serialize;
use md5::{Digest, Md5};
use std::sync::Arc;

/// Folder unmatched artifacts wait in until a human labels them
pub const UNKNOWN_PREFIX: &str = "unknown/";

/// Terminal classification of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Matched a known identity
    Detected { identity: String },
    /// No identity at or above threshold, awaiting triage
    Unknown,
    /// Labeled by a human and enrolled
    Trained { name: String },
    /// Discarded by a human
    Discarded,
}

impl Classification {
    /// Key the artifact lands on for this classification
    pub fn target_key(&self, source_key: &str) -> String {
        let hash = content_hash(source_key);
        match self {
            Classification::Detected { identity } => format!("detected/{}/{}.jpg", identity, hash),
            Classification::Unknown => format!("{}{}.jpg", UNKNOWN_PREFIX, hash),
            Classification::Trained { name } => format!("trained/{}/{}.jpg", name, hash),
            Classification::Discarded => format!("discarded/{}.jpg", hash),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Detected { .. } => "detected",
            Classification::Unknown => "unknown",
            Classification::Trained { .. } => "trained",
            Classification::Discarded => "discarded",
        }
    }
}

/// Lowercase hex digest of a key string
pub fn content_hash(key: &str) -> String {
    let digest = Md5::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// A stored image and its derived variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub key: String,
    /// Downscaled variant, absent when thumbnailing failed or was not attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
}

impl Artifact {
    pub fn new(key: String) -> Self {
        Self { key, small: None }
    }

    /// Key to reference in notifications (small variant when available)
    pub fn display_key(&self) -> &str {
        self.small.as_deref().unwrap_or(&self.key)
    }
}

/// Relocates artifacts between folders of one bucket
pub struct ObjectRelocator {
    store: Arc<dyn ObjectStore>,
}

impl ObjectRelocator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Copy `key` to its classification folder and delete the original
    pub async fn relocate(&self, key: &str, classification: &Classification) -> Result<Artifact> {
        let artifact = self.copy_to(key, classification).await?;
        self.discard(key).await?;
        Ok(artifact)
    }

    /// Copy `key` to its classification folder, leaving the original in place
    pub async fn copy_to(&self, key: &str, classification: &Classification) -> Result<Artifact> {
        let new_key = classification.target_key(key);

        tracing::info!(
            bucket = %self.store.bucket(),
            source_key = %key,
            dest_key = %new_key,
            classification = classification.as_str(),
            "Copying artifact"
        );

        self.store.copy(key, &new_key, Acl::PublicRead).await?;
        Ok(Artifact::new(new_key))
    }

    /// Remove the original artifact
    pub async fn discard(&self, key: &str) -> Result<()> {
        tracing::info!(bucket = %self.store.bucket(), key = %key, "Discarding artifact");
        self.store.delete(key).await
    }
}
