//! IdentityResolver - Face matching adapter
//!
//! ## Responsibilities
//!
//! - Ask the face matcher who is in a stored image (max 1 face, 70% threshold)
//! - Map "no candidate at or above threshold" to an unknown identity
//! - Enroll labeled images under an external id
//!
//! No retry happens here. A transport failure fails the invocation and the
//! trigger redelivers.

mod client;

pub use client::HttpFaceMatcher;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Minimum similarity (percent) for a candidate to count as a match
pub const FACE_MATCH_THRESHOLD: f32 = 70.0;

/// Only the best candidate is ever considered
pub const MAX_FACES: u32 = 1;

/// Location of an image inside the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub bucket: String,
    pub key: String,
}

/// Candidate returned by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCandidate {
    /// External image id the face was enrolled under
    pub identity: String,
    /// Similarity in percent (0-100)
    pub confidence: f32,
}

/// Face matching capability
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    /// Search the collection for faces similar to the one in `image`
    async fn search_faces(
        &self,
        image: &ImageRef,
        max_faces: u32,
        threshold: f32,
    ) -> Result<Vec<FaceCandidate>>;

    /// Index the face(s) in `image` under `external_id`, returning the number indexed
    async fn index_faces(&self, image: &ImageRef, external_id: &str) -> Result<usize>;
}

/// Result of an identity lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityMatch {
    pub identity: String,
    pub confidence: f32,
    /// false when no candidate reached the threshold
    pub present: bool,
}

impl IdentityMatch {
    pub fn matched(identity: String, confidence: f32) -> Self {
        Self {
            identity,
            confidence,
            present: true,
        }
    }

    pub fn unknown() -> Self {
        Self {
            identity: String::new(),
            confidence: 0.0,
            present: false,
        }
    }
}

/// Wraps the face matcher for one bucket
pub struct IdentityResolver {
    matcher: Arc<dyn FaceMatcher>,
    bucket: String,
    threshold: f32,
}

impl IdentityResolver {
    pub fn new(matcher: Arc<dyn FaceMatcher>, bucket: String) -> Self {
        Self {
            matcher,
            bucket,
            threshold: FACE_MATCH_THRESHOLD,
        }
    }

    fn image_ref(&self, key: &str) -> ImageRef {
        ImageRef {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }

    /// Resolve who is in the artifact at `key`
    pub async fn resolve(&self, key: &str) -> Result<IdentityMatch> {
        let candidates = self
            .matcher
            .search_faces(&self.image_ref(key), MAX_FACES, self.threshold)
            .await?;

        // threshold is enforced here as well as in the matcher
        let best = candidates
            .into_iter()
            .filter(|c| c.confidence >= self.threshold)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        match best {
            Some(candidate) => {
                tracing::info!(
                    key = %key,
                    identity = %candidate.identity,
                    confidence = candidate.confidence,
                    "Face matched"
                );
                Ok(IdentityMatch::matched(candidate.identity, candidate.confidence))
            }
            None => {
                tracing::info!(key = %key, "No face match at or above threshold");
                Ok(IdentityMatch::unknown())
            }
        }
    }

    /// Enroll the artifact at `key` under `name`
    pub async fn enroll(&self, key: &str, name: &str) -> Result<usize> {
        let indexed = self.matcher.index_faces(&self.image_ref(key), name).await?;

        if indexed == 0 {
            tracing::warn!(key = %key, name = %name, "Enrollment indexed no faces");
        } else {
            tracing::info!(key = %key, name = %name, indexed, "Faces enrolled");
        }

        Ok(indexed)
    }
}
