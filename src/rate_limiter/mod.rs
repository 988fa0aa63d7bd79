//! RateLimiter - Grace-window claims per (subject, action)
//!
//! ## Responsibilities
//!
//! - Grant at most one claim per (subject, action) inside a grace window
//! - Delegate atomicity to the backing store's conditional write
//! - Fail closed: a store error denies the claim
//!
//! Records are never deleted. A claim is live while its timestamp is not
//! older than `now - grace`.

mod memory;
mod repository;

pub use memory::MemoryRateLimitStore;
pub use repository::MySqlRateLimitStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Action name used for door openings
pub const OPEN_ACTION: &str = "open";

/// A claim record as written to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitClaim {
    pub subject: String,
    pub action: String,
    /// Unix seconds
    pub timestamp: i64,
}

/// Backing store with an atomic conditional write
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Write `claim` iff no record exists for (action, subject) or the existing
    /// record's timestamp is strictly older than `cutoff`.
    ///
    /// Returns `Ok(false)` when the condition failed.
    async fn put_if_stale(&self, claim: &RateLimitClaim, cutoff: i64) -> Result<bool>;
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Try to claim (subject, action) for the next `grace_seconds`
    pub async fn try_claim(&self, subject: &str, action: &str, grace_seconds: i64) -> bool {
        self.try_claim_at(subject, action, grace_seconds, Utc::now().timestamp())
            .await
    }

    /// Same as [`try_claim`](Self::try_claim) with an explicit clock
    pub async fn try_claim_at(
        &self,
        subject: &str,
        action: &str,
        grace_seconds: i64,
        now: i64,
    ) -> bool {
        let claim = RateLimitClaim {
            subject: subject.to_string(),
            action: action.to_string(),
            timestamp: now,
        };
        let cutoff = now - grace_seconds;

        match self.store.put_if_stale(&claim, cutoff).await {
            Ok(true) => {
                tracing::debug!(subject = %subject, action = %action, now, "Rate limit claim granted");
                true
            }
            Ok(false) => {
                tracing::debug!(
                    subject = %subject,
                    action = %action,
                    cutoff,
                    "Rate limit claim denied (claimed within grace window)"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    subject = %subject,
                    action = %action,
                    error = %e,
                    "Rate limit store failed, denying claim"
                );
                false
            }
        }
    }
}
