//! services/api/src/adapters/db.rs
//!
//! This module contains the Postgres adapter, a concrete implementation of the
//! `SnapshotSink` port from the `core` crate. Each snapshot key is one row in
//! the `snapshots` table, overwritten on every persist.

use async_trait::async_trait;
use review_core::ports::{PortError, PortResult, SnapshotSink};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SnapshotSink` port.
#[derive(Clone)]
pub struct PgSnapshotSink {
    pool: PgPool,
}

impl PgSnapshotSink {
    /// Creates a new `PgSnapshotSink`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SnapshotRecord {
    body: serde_json::Value,
}

//=========================================================================================
// `SnapshotSink` Trait Implementation
//=========================================================================================

#[async_trait]
impl SnapshotSink for PgSnapshotSink {
    async fn persist(&self, key: &str, snapshot: serde_json::Value) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO snapshots (key, body, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()",
        )
        .bind(key)
        .bind(snapshot)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, key: &str) -> PortResult<Option<serde_json::Value>> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT body FROM snapshots WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(|r| r.body))
    }
}
