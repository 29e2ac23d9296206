//! MongoDB-backed document driver.
//!
//! The structured settings carry the first host:port pair for logging and
//! diagnostics, but the client always connects with the verbatim original
//! URL when one is available, so multi-host and `+srv` deployments keep
//! their full topology.

use crate::db::driver::{DocumentDriver, ResultSet};
use crate::error::{GatewayError, GatewayResult};
use crate::models::ConnectionSettings;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::Client;
use mongodb::bson::Document;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::debug;

/// Document driver over cached MongoDB clients.
pub struct MongoDocumentDriver {
    clients: RwLock<HashMap<String, Client>>,
}

impl MongoDocumentDriver {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn connection_uri(settings: &ConnectionSettings) -> String {
        if let Some(raw) = &settings.raw_url {
            return raw.clone();
        }
        if settings.user.is_empty() {
            format!(
                "mongodb://{}:{}/{}",
                settings.host, settings.port, settings.database
            )
        } else {
            format!(
                "mongodb://{}:{}@{}:{}/{}",
                settings.user, settings.password, settings.host, settings.port, settings.database
            )
        }
    }

    async fn client_for(
        &self,
        database: &str,
        settings: &ConnectionSettings,
    ) -> GatewayResult<Client> {
        if let Some(client) = self.clients.read().await.get(database) {
            return Ok(client.clone());
        }
        let uri = Self::connection_uri(settings);
        let client = Client::with_uri_str(&uri)
            .await
            .map_err(|e| GatewayError::execution(format!("mongodb connect: {e}"), true))?;
        self.clients
            .write()
            .await
            .entry(database.to_string())
            .or_insert(client.clone());
        Ok(client)
    }
}

impl Default for MongoDocumentDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn to_document(value: &JsonValue) -> GatewayResult<Document> {
    mongodb::bson::to_document(value)
        .map_err(|e| GatewayError::execution(format!("filter is not a document: {e}"), false))
}

fn doc_to_json(doc: Document) -> JsonValue {
    serde_json::to_value(&doc).unwrap_or(JsonValue::Null)
}

#[async_trait]
impl DocumentDriver for MongoDocumentDriver {
    async fn find(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        collection: &str,
        filter: &JsonValue,
        limit: u32,
        call_timeout: Duration,
    ) -> GatewayResult<ResultSet> {
        let start = Instant::now();
        let client = self.client_for(database, settings).await?;
        let coll = client
            .database(&settings.database)
            .collection::<Document>(collection);
        let filter = to_document(filter)?;

        debug!(database = %database, collection = %collection, limit, "Executing document find");

        // Fetch one document past the limit so truncation is detectable.
        let fetch = async {
            let mut cursor = coll.find(filter).limit(limit as i64 + 1).await?;
            let mut docs = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                docs.push(doc_to_json(doc));
            }
            Ok::<_, mongodb::error::Error>(docs)
        };

        let docs = match timeout(call_timeout, fetch).await {
            Ok(result) => result
                .map_err(|e| GatewayError::execution(format!("mongodb find: {e}"), false))?,
            Err(_) => {
                return Err(GatewayError::timeout("document find", call_timeout.as_secs()));
            }
        };

        let truncated = docs.len() > limit as usize;
        Ok(ResultSet {
            rows: docs.into_iter().take(limit as usize).collect(),
            truncated,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn aggregate(
        &self,
        database: &str,
        settings: &ConnectionSettings,
        collection: &str,
        stages: &[JsonValue],
        limit: u32,
        call_timeout: Duration,
    ) -> GatewayResult<ResultSet> {
        let start = Instant::now();
        let client = self.client_for(database, settings).await?;
        let coll = client
            .database(&settings.database)
            .collection::<Document>(collection);

        let mut pipeline = stages
            .iter()
            .map(to_document)
            .collect::<GatewayResult<Vec<_>>>()?;
        // The ceiling goes into the pipeline itself so the server never
        // materializes more than limit + 1 results.
        pipeline.push(to_document(&serde_json::json!({"$limit": limit + 1}))?);

        debug!(
            database = %database,
            collection = %collection,
            stages = pipeline.len(),
            "Executing document aggregation"
        );

        let fetch = async {
            let mut cursor = coll.aggregate(pipeline).await?;
            let mut docs = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                docs.push(doc_to_json(doc));
            }
            Ok::<_, mongodb::error::Error>(docs)
        };

        let docs = match timeout(call_timeout, fetch).await {
            Ok(result) => result
                .map_err(|e| GatewayError::execution(format!("mongodb aggregate: {e}"), false))?,
            Err(_) => {
                return Err(GatewayError::timeout(
                    "document aggregation",
                    call_timeout.as_secs(),
                ));
            }
        };

        let truncated = docs.len() > limit as usize;
        Ok(ResultSet {
            rows: docs.into_iter().take(limit as usize).collect(),
            truncated,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoreKind;
    use std::collections::BTreeMap;

    fn settings(raw_url: Option<&str>) -> ConnectionSettings {
        ConnectionSettings {
            kind: StoreKind::Document,
            flavor: None,
            host: "mongo1".into(),
            port: 27017,
            user: "app".into(),
            password: "pw".into(),
            database: "operations".into(),
            socket: None,
            tls: None,
            auth_source: None,
            replica_set: None,
            options: BTreeMap::new(),
            raw_url: raw_url.map(String::from),
        }
    }

    #[test]
    fn test_connection_uri_prefers_raw_url() {
        let raw = "mongodb://app:pw@mongo1:27017,mongo2:27017/operations?replicaSet=rs0";
        assert_eq!(
            MongoDocumentDriver::connection_uri(&settings(Some(raw))),
            raw
        );
    }

    #[test]
    fn test_connection_uri_built_from_settings() {
        assert_eq!(
            MongoDocumentDriver::connection_uri(&settings(None)),
            "mongodb://app:pw@mongo1:27017/operations"
        );
    }
}
