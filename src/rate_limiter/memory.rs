//! In-process rate-limit store for single-instance deployments

use super::{RateLimitClaim, RateLimitStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Claims keyed by (action, subject)
#[derive(Default)]
pub struct MemoryRateLimitStore {
    claims: Mutex<HashMap<(String, String), i64>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (action, subject) pairs ever claimed
    pub async fn claim_count(&self) -> usize {
        self.claims.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn put_if_stale(&self, claim: &RateLimitClaim, cutoff: i64) -> Result<bool> {
        let mut claims = self.claims.lock().await;
        let key = (claim.action.clone(), claim.subject.clone());

        match claims.get(&key) {
            Some(&existing) if existing >= cutoff => Ok(false),
            _ => {
                claims.insert(key, claim.timestamp);
                Ok(true)
            }
        }
    }
}
