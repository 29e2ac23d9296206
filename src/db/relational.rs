//! sqlx-backed relational driver.
//!
//! Pools are created lazily per database name and cached for the life of
//! the driver. Row limits are enforced by streaming: the driver fetches at
//! most `limit + 1` rows, so an unbounded result set costs one extra row,
//! not the whole table.

use crate::db::driver::{RelationalDriver, ResultSet};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ConnectionSettings, RelationalFlavor};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlValueRef};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgValueRef};
use sqlx::{Column, Decode, MySqlPool, PgPool, Row, Type, TypeInfo};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::debug;

const POOL_MAX_CONNECTIONS: u32 = 5;

/// Engine-specific pool.
enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

/// Relational driver over sqlx connection pools.
pub struct SqlxRelationalDriver {
    pools: RwLock<HashMap<String, DbPool>>,
}

impl SqlxRelationalDriver {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    async fn connect(&self, settings: &ConnectionSettings) -> GatewayResult<DbPool> {
        let flavor = settings.flavor.ok_or_else(|| {
            GatewayError::execution("connection settings have no relational flavor", false)
        })?;

        match flavor {
            RelationalFlavor::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&settings.host)
                    .port(settings.port)
                    .username(&settings.user)
                    .password(&settings.password)
                    .database(&settings.database);
                if let Some(socket) = &settings.socket {
                    options = options.socket(socket);
                }
                let pool = MySqlPoolOptions::new()
                    .max_connections(POOL_MAX_CONNECTIONS)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::MySql(pool))
            }
            RelationalFlavor::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(&settings.host)
                    .port(settings.port)
                    .username(&settings.user)
                    .password(&settings.password)
                    .database(&settings.database);
                if let Some(socket) = &settings.socket {
                    options = options.socket(socket.as_str());
                }
                let pool = PgPoolOptions::new()
                    .max_connections(POOL_MAX_CONNECTIONS)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::Postgres(pool))
            }
        }
    }

    async fn ensure_pool(
        &self,
        database: &str,
        settings: &ConnectionSettings,
    ) -> GatewayResult<()> {
        if self.pools.read().await.contains_key(database) {
            return Ok(());
        }
        let pool = self.connect(settings).await?;
        self.pools.write().await.entry(database.to_string()).or_insert(pool);
        Ok(())
    }
}

impl Default for SqlxRelationalDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationalDriver for SqlxRelationalDriver {
    async fn query(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        sql: &str,
        limit: u32,
        query_timeout: Duration,
    ) -> GatewayResult<ResultSet> {
        self.ensure_pool(database, settings).await?;
        let start = Instant::now();

        debug!(database = %database, limit, "Executing relational query");

        let pools = self.pools.read().await;
        let pool = pools
            .get(database)
            .ok_or_else(|| GatewayError::execution("pool disappeared", true))?;

        // Fetch one row past the limit so truncation is detectable.
        let fetch_limit = limit as usize + 1;
        let rows = match pool {
            DbPool::MySql(pool) => {
                let rows_future = {
                    use sqlx::Executor;
                    pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
                };
                match timeout(query_timeout, rows_future).await {
                    Ok(results) => collect_rows(results, mysql_row_to_json)?,
                    Err(_) => {
                        return Err(GatewayError::timeout(
                            "query execution",
                            query_timeout.as_secs(),
                        ));
                    }
                }
            }
            DbPool::Postgres(pool) => {
                let rows_future = {
                    use sqlx::Executor;
                    pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
                };
                match timeout(query_timeout, rows_future).await {
                    Ok(results) => collect_rows(results, pg_row_to_json)?,
                    Err(_) => {
                        return Err(GatewayError::timeout(
                            "query execution",
                            query_timeout.as_secs(),
                        ));
                    }
                }
            }
        };

        let truncated = rows.len() > limit as usize;
        let rows: Vec<JsonValue> = rows.into_iter().take(limit as usize).collect();

        Ok(ResultSet {
            rows,
            truncated,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn collect_rows<R>(
    results: Vec<Result<R, sqlx::Error>>,
    to_json: fn(&R) -> JsonValue,
) -> GatewayResult<Vec<JsonValue>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        let row = result.map_err(GatewayError::from)?;
        rows.push(to_json(&row));
    }
    Ok(rows)
}

// =============================================================================
// Row decoding
// =============================================================================

/// Wrapper for raw DECIMAL/NUMERIC values as strings, preserving the exact
/// database representation.
struct RawDecimal(String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn bytes_to_json(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

macro_rules! try_decode {
    ($row:expr, $idx:expr, $ty:ty, $conv:expr) => {
        if let Ok(Some(v)) = $row.try_get::<Option<$ty>, _>($idx) {
            #[allow(clippy::redundant_closure_call)]
            return ($conv)(v);
        }
    };
}

fn mysql_row_to_json(row: &MySqlRow) -> JsonValue {
    let map: serde_json::Map<String, JsonValue> = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), mysql_decode(row, idx, col.type_info().name())))
        .collect();
    JsonValue::Object(map)
}

fn mysql_decode(row: &MySqlRow, idx: usize, type_name: &str) -> JsonValue {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        try_decode!(row, idx, RawDecimal, |v: RawDecimal| JsonValue::String(v.0));
        return JsonValue::Null;
    }
    if lower == "json" {
        try_decode!(row, idx, JsonValue, |v| v);
        return JsonValue::Null;
    }

    try_decode!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
    try_decode!(row, idx, u64, |v: u64| JsonValue::Number(v.into()));
    try_decode!(row, idx, f64, float_to_json);
    try_decode!(row, idx, bool, JsonValue::Bool);
    try_decode!(row, idx, String, JsonValue::String);
    try_decode!(row, idx, chrono::NaiveDateTime, |v: chrono::NaiveDateTime| {
        JsonValue::String(v.to_string())
    });
    try_decode!(
        row,
        idx,
        chrono::DateTime<chrono::Utc>,
        |v: chrono::DateTime<chrono::Utc>| JsonValue::String(v.to_rfc3339())
    );
    try_decode!(row, idx, chrono::NaiveDate, |v: chrono::NaiveDate| {
        JsonValue::String(v.to_string())
    });
    try_decode!(row, idx, chrono::NaiveTime, |v: chrono::NaiveTime| {
        JsonValue::String(v.to_string())
    });
    try_decode!(row, idx, Vec<u8>, |v: Vec<u8>| bytes_to_json(&v));

    JsonValue::Null
}

fn pg_row_to_json(row: &PgRow) -> JsonValue {
    let map: serde_json::Map<String, JsonValue> = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), pg_decode(row, idx, col.type_info().name())))
        .collect();
    JsonValue::Object(map)
}

fn pg_decode(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
    let lower = type_name.to_lowercase();

    if lower.contains("numeric") || lower.contains("decimal") {
        try_decode!(row, idx, RawDecimal, |v: RawDecimal| JsonValue::String(v.0));
        return JsonValue::Null;
    }
    if lower == "json" || lower == "jsonb" {
        try_decode!(row, idx, JsonValue, |v| v);
        return JsonValue::Null;
    }
    if lower == "uuid" {
        try_decode!(row, idx, sqlx::types::Uuid, |v: sqlx::types::Uuid| {
            JsonValue::String(v.to_string())
        });
        return JsonValue::Null;
    }

    try_decode!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
    try_decode!(row, idx, i32, |v: i32| JsonValue::Number(v.into()));
    try_decode!(row, idx, i16, |v: i16| JsonValue::Number(v.into()));
    try_decode!(row, idx, f64, float_to_json);
    try_decode!(row, idx, f32, |v: f32| float_to_json(v as f64));
    try_decode!(row, idx, bool, JsonValue::Bool);
    try_decode!(row, idx, String, JsonValue::String);
    try_decode!(
        row,
        idx,
        chrono::DateTime<chrono::Utc>,
        |v: chrono::DateTime<chrono::Utc>| JsonValue::String(v.to_rfc3339())
    );
    try_decode!(row, idx, chrono::NaiveDateTime, |v: chrono::NaiveDateTime| {
        JsonValue::String(v.to_string())
    });
    try_decode!(row, idx, chrono::NaiveDate, |v: chrono::NaiveDate| {
        JsonValue::String(v.to_string())
    });
    try_decode!(row, idx, Vec<u8>, |v: Vec<u8>| bytes_to_json(&v));

    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_json_finite() {
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
    }

    #[test]
    fn test_float_to_json_nan_falls_back_to_string() {
        let value = float_to_json(f64::NAN);
        assert!(value.is_string());
    }

    #[test]
    fn test_bytes_to_json_utf8_and_binary() {
        assert_eq!(bytes_to_json(b"hello"), serde_json::json!("hello"));
        let encoded = bytes_to_json(&[0xff, 0xfe]);
        assert_eq!(encoded, serde_json::json!(STANDARD.encode([0xff, 0xfe])));
    }
}
