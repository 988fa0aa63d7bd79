//! MySQL rate-limit store
//!
//! Each claim is a pair of single-statement conditional writes: an UPDATE that
//! only matches a stale row, then an INSERT IGNORE for an absent row. Either
//! statement affecting a row means the claim was written. Concurrent claimers
//! are serialized by the row lock / primary key, never by process state.

use super::{RateLimitClaim, RateLimitStore};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

pub struct MySqlRateLimitStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlRateLimitStore {
    /// `table` must be a plain identifier (validated at config load)
    pub fn new(pool: MySqlPool, table: String) -> Self {
        Self { pool, table }
    }

    /// Create the claims table if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS `{}` (
                name VARCHAR(64) NOT NULL,
                selector VARCHAR(255) NOT NULL,
                timestamp BIGINT NOT NULL,
                PRIMARY KEY (name, selector)
            )
            "#,
            self.table
        );

        sqlx::query(&ddl)
            .execute(&self.pool)
            .await?;

        tracing::info!(table = %self.table, "Rate limit table ready");
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for MySqlRateLimitStore {
    async fn put_if_stale(&self, claim: &RateLimitClaim, cutoff: i64) -> Result<bool> {
        let update = format!(
            "UPDATE `{}` SET timestamp = ? WHERE name = ? AND selector = ? AND timestamp < ?",
            self.table
        );
        let refreshed = sqlx::query(&update)
            .bind(claim.timestamp)
            .bind(&claim.action)
            .bind(&claim.subject)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        if refreshed.rows_affected() > 0 {
            return Ok(true);
        }

        let insert = format!(
            "INSERT IGNORE INTO `{}` (name, selector, timestamp) VALUES (?, ?, ?)",
            self.table
        );
        let inserted = sqlx::query(&insert)
            .bind(&claim.action)
            .bind(&claim.subject)
            .bind(claim.timestamp)
            .execute(&self.pool)
            .await?;

        Ok(inserted.rows_affected() > 0)
    }
}
