//! Store driver traits.
//!
//! The executor dispatches one call per validated query and otherwise knows
//! nothing about wire protocols. Both drivers take the structured connection
//! settings for the target database and must honor the per-call timeout.

use crate::error::GatewayResult;
use crate::models::ConnectionSettings;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Rows or documents returned by one store call.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub rows: Vec<JsonValue>,
    /// True if the store had more rows than the enforced ceiling.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Driver for relational targets: one SQL text per call.
#[async_trait]
pub trait RelationalDriver: Send + Sync {
    async fn query(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        sql: &str,
        limit: u32,
        timeout: Duration,
    ) -> GatewayResult<ResultSet>;
}

/// Driver for document targets: filter queries and aggregation pipelines.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    async fn find(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        collection: &str,
        filter: &JsonValue,
        limit: u32,
        timeout: Duration,
    ) -> GatewayResult<ResultSet>;

    async fn aggregate(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        collection: &str,
        stages: &[JsonValue],
        limit: u32,
        timeout: Duration,
    ) -> GatewayResult<ResultSet>;
}
