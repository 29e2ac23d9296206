//! Interpretation service integration.
//!
//! The natural-language interpretation model is an opaque external service:
//! it takes a prompt and returns free-form text that may contain a
//! structured payload somewhere inside it. This module defines the client
//! trait, a chat-completions HTTP implementation, and the typed query
//! specification that [`parser`] output is decoded into.
//!
//! Timeout handling is the caller's job: the gateway wraps `interpret` in
//! `tokio::time::timeout` and fails closed, so a partial or cancelled
//! interpretation never reaches execution.

pub mod parser;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{QueryCandidate, StoreKind};
use async_trait::async_trait;
use parser::ResponseSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Client for the external interpretation service.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Send a prompt and return the raw free-form response text.
    async fn interpret(&self, prompt: &str) -> GatewayResult<String>;
}

/// Chat-completions-compatible HTTP client.
pub struct HttpInterpreter {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpInterpreter {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Interpreter for HttpInterpreter {
    async fn interpret(&self, prompt: &str) -> GatewayResult<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.0
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::execution(format!("interpreter request failed: {e}"), true))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GatewayError::execution(
                format!("interpreter returned HTTP {status}"),
                status.is_server_error(),
            ));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| GatewayError::parse_failure(format!("interpreter response: {e}")))?;

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(GatewayError::parse_failure("interpreter returned no text"));
        }
        Ok(text)
    }
}

/// Stand-in used when no interpretation service is configured. Template
/// resolution still works; interpreted requests fail with a clear error.
pub struct DisabledInterpreter;

#[async_trait]
impl Interpreter for DisabledInterpreter {
    async fn interpret(&self, _prompt: &str) -> GatewayResult<String> {
        Err(GatewayError::execution(
            "no interpretation service configured",
            false,
        ))
    }
}

const SYSTEM_PROMPT: &str = "\
You translate business questions into database queries. Reply with a single \
JSON object and nothing else. For a relational target reply \
{\"kind\": \"sql\", \"query\": \"...\"}. For a document target reply \
{\"kind\": \"filter\", \"collection\": \"...\", \"filter\": {...}} or \
{\"kind\": \"pipeline\", \"collection\": \"...\", \"pipeline\": [...]}. \
Read-only queries only.";

/// Build the user prompt for one request: store context plus the question.
pub fn build_prompt(question: &str, target: &str, kind: StoreKind) -> String {
    format!(
        "Target database: {target} ({kind} store).\nQuestion: {question}"
    )
}

/// Typed query specification the interpreter is asked to produce.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuerySpec {
    Sql {
        query: String,
    },
    Filter {
        collection: String,
        filter: JsonValue,
    },
    Pipeline {
        collection: String,
        pipeline: Vec<JsonValue>,
    },
}

impl QuerySpec {
    pub fn into_candidate(self, target: &str) -> QueryCandidate {
        match self {
            Self::Sql { query } => QueryCandidate::sql(target, query),
            Self::Filter { collection, filter } => {
                QueryCandidate::filter(target, collection, filter)
            }
            Self::Pipeline {
                collection,
                pipeline,
            } => QueryCandidate::pipeline(target, collection, pipeline),
        }
    }
}

/// Schema handed to the parser when extracting a [`QuerySpec`].
pub fn candidate_schema() -> ResponseSchema {
    ResponseSchema::required(&["kind"])
}

/// Reduce raw interpreter output to a query candidate for `target`.
///
/// Returns the candidate plus any parser fallback warnings.
pub fn parse_candidate(
    raw: &str,
    target: &str,
) -> GatewayResult<(QueryCandidate, Vec<String>)> {
    let schema = candidate_schema();
    let parsed = parser::parse(raw, Some(&schema))?;
    let spec: QuerySpec = serde_json::from_value(parsed.value)
        .map_err(|e| GatewayError::parse_failure(format!("query specification: {e}")))?;
    Ok((spec.into_candidate(target), parsed.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryBody;

    #[test]
    fn test_parse_candidate_sql() {
        let raw = r#"{"kind": "sql", "query": "SELECT 1"}"#;
        let (candidate, warnings) = parse_candidate(raw, "analytics").unwrap();
        assert_eq!(candidate.target, "analytics");
        assert!(matches!(candidate.body, QueryBody::Sql { .. }));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_candidate_filter_from_noisy_text() {
        let raw = "Here you go:\n```json\n{\"kind\": \"filter\", \"collection\": \"bookings\", \"filter\": {\"partner\": \"glovo\"}}\n```";
        let (candidate, warnings) = parse_candidate(raw, "ops").unwrap();
        match candidate.body {
            QueryBody::Filter { collection, .. } => assert_eq!(collection, "bookings"),
            other => panic!("unexpected body: {other:?}"),
        }
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_parse_candidate_unknown_kind_fails() {
        let raw = r#"{"kind": "graphql", "query": "{}"}"#;
        assert!(matches!(
            parse_candidate(raw, "ops"),
            Err(GatewayError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_build_prompt_mentions_target_and_kind() {
        let prompt = build_prompt("how many bookings", "ops", StoreKind::Document);
        assert!(prompt.contains("ops"));
        assert!(prompt.contains("document"));
        assert!(prompt.contains("how many bookings"));
    }
}
