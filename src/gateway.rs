//! The gateway: routing, validation, permission gating, and execution
//! composed behind one `answer` entry point.
//!
//! The order of checks is fixed and security-relevant: the validator runs
//! before the permission gate, and a blocked candidate is denied regardless
//! of what the target's permission set would have allowed. Only a candidate
//! that passed both reaches a store driver, and always with the result
//! ceiling applied.

use crate::db::{DocumentDriver, RelationalDriver, ResultSet};
use crate::error::{GatewayError, GatewayResult};
use crate::interpret::{self, Interpreter};
use crate::models::{
    ExecutionDecision, QueryBody, QueryCandidate, RequiredOperations, RoutingDecision, StoreKind,
    Strategy, ValidationResult,
};
use crate::registry::{RegistryEntry, RegistryHandle};
use crate::router::{Mode, Router};
use crate::templates::TemplateCatalog;
use crate::validator::{self, DocumentValidatorConfig, SqlValidatorConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Tunables for one gateway instance.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub interpret_timeout: Duration,
    pub query_timeout: Duration,
    /// Ceiling on rows/documents per answer.
    pub max_rows: u32,
    pub sql: SqlValidatorConfig,
    pub document: DocumentValidatorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interpret_timeout: Duration::from_secs(20),
            query_timeout: Duration::from_secs(30),
            max_rows: 500,
            sql: SqlValidatorConfig::default(),
            document: DocumentValidatorConfig::default(),
        }
    }
}

/// A successful answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: Uuid,
    pub rows: Vec<JsonValue>,
    pub truncated: bool,
    pub routing: RoutingDecision,
    /// Non-sensitive notes accumulated along the way (parser fallbacks,
    /// validator warnings).
    pub warnings: Vec<String>,
    pub execution_time_ms: u64,
    pub answered_at: DateTime<Utc>,
}

/// The multi-database access layer.
pub struct Gateway {
    registry: RegistryHandle,
    router: Router,
    templates: TemplateCatalog,
    interpreter: Arc<dyn Interpreter>,
    relational: Arc<dyn RelationalDriver>,
    document: Arc<dyn DocumentDriver>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        registry: RegistryHandle,
        router: Router,
        interpreter: Arc<dyn Interpreter>,
        relational: Arc<dyn RelationalDriver>,
        document: Arc<dyn DocumentDriver>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            registry,
            router,
            templates: TemplateCatalog::new(),
            interpreter,
            relational,
            document,
            config,
        }
    }

    /// Answer one natural-language request.
    pub async fn answer(&self, text: &str, mode: Mode) -> GatewayResult<Answer> {
        let request_id = Uuid::new_v4();
        let registry = self.registry.load();

        let routing = self.router.route(text, mode, &registry).map_err(|err| {
            warn!(request_id = %request_id, error = %err, "Routing failed");
            err
        })?;
        info!(
            request_id = %request_id,
            target = %routing.target,
            strategy = ?routing.strategy,
            signal = %routing.matched_signal,
            "Routed request"
        );

        let entry = registry
            .get(&routing.target)
            .ok_or_else(|| GatewayError::unknown_database(&routing.target))?;

        let mut warnings = Vec::new();
        let candidate = self
            .resolve_candidate(text, &routing, entry, &mut warnings)
            .await?;

        let (validation, required) = self.validate(&candidate, entry);
        for warning in &validation.warnings {
            warnings.push(warning.clone());
        }

        let decision = gate(&validation, &required, entry, &routing.target);
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_default();
            warn!(
                request_id = %request_id,
                target = %routing.target,
                risk = ?validation.risk,
                reason = %reason,
                "Candidate denied"
            );
            return Err(if validation.is_safe() {
                required
                    .first_denied(&entry.permissions)
                    .map(|op| GatewayError::permission_denied(&routing.target, op.name()))
                    .unwrap_or_else(|| GatewayError::permission_denied(&routing.target, reason))
            } else {
                GatewayError::validation_rejection(validation.blocked.clone())
            });
        }

        let result = self
            .execute(&candidate, entry, required.is_read_only())
            .await?;

        info!(
            request_id = %request_id,
            rows = result.row_count(),
            truncated = result.truncated,
            elapsed_ms = result.execution_time_ms,
            "Answered request"
        );

        Ok(Answer {
            request_id,
            rows: result.rows,
            truncated: result.truncated,
            routing,
            warnings,
            execution_time_ms: result.execution_time_ms,
            answered_at: Utc::now(),
        })
    }

    /// Produce a candidate via the routed strategy: template instantiation
    /// or interpretation plus parsing.
    async fn resolve_candidate(
        &self,
        text: &str,
        routing: &RoutingDecision,
        entry: &RegistryEntry,
        warnings: &mut Vec<String>,
    ) -> GatewayResult<QueryCandidate> {
        if let Strategy::FixedTemplate { template } = &routing.strategy {
            if let Some(partner) = self.router.matched_partner(text, template) {
                if let Some(candidate) =
                    self.templates
                        .instantiate(template, &routing.target, &partner)
                {
                    return Ok(candidate);
                }
            }
            // A template id with no catalog entry is a rules/catalog skew;
            // the interpreted path still answers the request.
            warn!(template = %template, "Template not instantiable, falling back to interpretation");
            warnings.push(format!("template {template} unavailable"));
        }

        let prompt = interpret::build_prompt(text, &routing.target, entry.settings.kind);
        let raw = match timeout(
            self.config.interpret_timeout,
            self.interpreter.interpret(&prompt),
        )
        .await
        {
            Ok(result) => result?,
            // Fail closed: a timed-out interpretation never yields a query.
            Err(_) => {
                return Err(GatewayError::timeout(
                    "interpretation",
                    self.config.interpret_timeout.as_secs(),
                ));
            }
        };

        let (candidate, parse_warnings) = interpret::parse_candidate(&raw, &routing.target)?;
        warnings.extend(parse_warnings);
        Ok(candidate)
    }

    /// Run the store-appropriate validator and infer required operations.
    fn validate(
        &self,
        candidate: &QueryCandidate,
        entry: &RegistryEntry,
    ) -> (ValidationResult, RequiredOperations) {
        match (&candidate.body, entry.settings.kind) {
            (QueryBody::Sql { text }, StoreKind::Relational) => (
                validator::validate_sql(text, &self.config.sql),
                validator::sql::required_operations(text),
            ),
            (QueryBody::Filter { collection, document }, StoreKind::Document) => (
                validator::validate_query(document, collection, &self.config.document),
                RequiredOperations::read_only(),
            ),
            (QueryBody::Pipeline { collection, stages }, StoreKind::Document) => (
                validator::validate_pipeline(stages, collection, &self.config.document),
                validator::document::required_operations(stages),
            ),
            // A candidate whose form does not match the target store kind
            // cannot be validated, so it cannot run.
            _ => {
                let mut findings = crate::models::Findings::new();
                findings.block(
                    crate::models::RiskLevel::High,
                    "candidate-form-mismatch",
                );
                (findings.finish(), RequiredOperations::read_only())
            }
        }
    }

    /// Dispatch to the store driver with the result ceiling applied.
    /// Read-only candidates are retried once on retryable failures.
    async fn execute(
        &self,
        candidate: &QueryCandidate,
        entry: &RegistryEntry,
        read_only: bool,
    ) -> GatewayResult<ResultSet> {
        match self.dispatch(candidate, entry, read_only).await {
            Err(err) if read_only && err.is_retryable() => {
                warn!(error = %err, "Read-only query failed, retrying once");
                self.dispatch(candidate, entry, read_only).await
            }
            other => other,
        }
    }

    async fn dispatch(
        &self,
        candidate: &QueryCandidate,
        entry: &RegistryEntry,
        read_only: bool,
    ) -> GatewayResult<ResultSet> {
        let settings = &entry.settings;
        let limit = self.config.max_rows;
        let call_timeout = self.config.query_timeout;

        match &candidate.body {
            QueryBody::Sql { text } => {
                // The LIMIT rewrite only makes sense for row-returning SQL.
                let clamped = if read_only {
                    validator::enforce_row_limit(text, limit)
                } else {
                    text.clone()
                };
                self.relational
                    .query(&candidate.target, settings, &clamped, limit, call_timeout)
                    .await
            }
            QueryBody::Filter { collection, document } => {
                self.document
                    .find(
                        &candidate.target,
                        settings,
                        collection,
                        document,
                        limit,
                        call_timeout,
                    )
                    .await
            }
            QueryBody::Pipeline { collection, stages } => {
                self.document
                    .aggregate(
                        &candidate.target,
                        settings,
                        collection,
                        stages,
                        limit,
                        call_timeout,
                    )
                    .await
            }
        }
    }
}

/// Derive the execution decision from a validation verdict and the target's
/// permission set. Pure and deterministic: unsafe always denies, then every
/// required operation must be permitted.
pub fn gate(
    validation: &ValidationResult,
    required: &RequiredOperations,
    entry: &RegistryEntry,
    target: &str,
) -> ExecutionDecision {
    if !validation.is_safe() {
        return ExecutionDecision::deny(format!(
            "unsafe query ({})",
            validation.blocked.join(", ")
        ));
    }
    if let Some(op) = required.first_denied(&entry.permissions) {
        return ExecutionDecision::deny(format!("operation '{op}' not permitted on '{target}'"));
    }
    ExecutionDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConnectionSettings, Findings, Operation, PermissionSet, RelationalFlavor, RiskLevel,
    };

    fn entry(permissions: PermissionSet) -> RegistryEntry {
        RegistryEntry {
            settings: ConnectionSettings {
                kind: StoreKind::Relational,
                flavor: Some(RelationalFlavor::MySql),
                host: "h".into(),
                port: 3306,
                user: "u".into(),
                password: "p".into(),
                database: "d".into(),
                socket: None,
                tls: None,
                auth_source: None,
                replica_set: None,
                options: Default::default(),
                raw_url: None,
            },
            permissions,
            is_default: false,
        }
    }

    #[test]
    fn test_gate_denies_unsafe_regardless_of_permissions() {
        let mut findings = Findings::new();
        findings.block(RiskLevel::Critical, "ddl-statement");
        let validation = findings.finish();

        let all = PermissionSet {
            insert: true,
            update: true,
            delete: true,
            schema_change: true,
        };
        let decision = gate(
            &validation,
            &RequiredOperations::read_only(),
            &entry(all),
            "sales",
        );
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("unsafe"));
    }

    #[test]
    fn test_gate_denies_missing_permission() {
        let validation = Findings::new().finish();
        let mut required = RequiredOperations::read_only();
        required.insert(Operation::Insert);

        let decision = gate(
            &validation,
            &required,
            &entry(PermissionSet::DENY_ALL),
            "sales",
        );
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("insert"));
    }

    #[test]
    fn test_gate_allows_safe_and_permitted() {
        let validation = Findings::new().finish();
        let decision = gate(
            &validation,
            &RequiredOperations::read_only(),
            &entry(PermissionSet::DENY_ALL),
            "sales",
        );
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }
}
