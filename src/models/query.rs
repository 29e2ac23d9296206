//! Query-related data models.
//!
//! Routing decisions, query candidates, validation verdicts, and execution
//! decisions. All of these are created per request, never mutated after
//! construction, and safe to share across tasks.

use crate::models::{Operation, PermissionSet};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// How a routed request is resolved into a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A pre-built, parameterized query known to match the request shape.
    FixedTemplate { template: String },
    /// The request is sent to the external interpretation service.
    Interpreted,
}

/// Outcome of routing one incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Target database name, as registered (lowercase).
    pub target: String,
    pub strategy: Strategy,
    /// Which keyword or rule fired, for observability.
    pub matched_signal: String,
}

/// Body of a candidate query, tagged by form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum QueryBody {
    /// Textual SQL for a relational target.
    Sql { text: String },
    /// A filter document for one collection.
    Filter {
        collection: String,
        document: JsonValue,
    },
    /// An aggregation pipeline for one collection.
    Pipeline {
        collection: String,
        stages: Vec<JsonValue>,
    },
}

/// A candidate query produced by a template or by interpretation, not yet
/// validated or authorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCandidate {
    /// Target database name from the originating routing decision.
    pub target: String,
    pub body: QueryBody,
}

impl QueryCandidate {
    pub fn sql(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: QueryBody::Sql { text: text.into() },
        }
    }

    pub fn filter(
        target: impl Into<String>,
        collection: impl Into<String>,
        document: JsonValue,
    ) -> Self {
        Self {
            target: target.into(),
            body: QueryBody::Filter {
                collection: collection.into(),
                document,
            },
        }
    }

    pub fn pipeline(
        target: impl Into<String>,
        collection: impl Into<String>,
        stages: Vec<JsonValue>,
    ) -> Self {
        Self {
            target: target.into(),
            body: QueryBody::Pipeline {
                collection: collection.into(),
                stages,
            },
        }
    }
}

/// Ordered risk classification for a validated query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// Verdict of a validation pass over one query candidate.
///
/// Invariants, enforced by [`Findings`]:
/// - `is_safe()` is true iff `blocked` is empty
/// - `risk` is the highest severity among all findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub risk: RiskLevel,
    /// Reasons the query is blocked, in discovery order. Category strings
    /// only - suitable for operator logs.
    pub blocked: Vec<String>,
    /// Non-blocking findings, in discovery order.
    pub warnings: Vec<String>,
    /// A defensively rewritten candidate, when the validator produced one.
    pub sanitized: Option<QueryCandidate>,
}

impl ValidationResult {
    pub fn is_safe(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// Accumulator for validation findings. The only way to construct a
/// [`ValidationResult`], so the risk/blocked invariants hold by construction.
#[derive(Debug, Default)]
pub struct Findings {
    risk: RiskLevel,
    blocked: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blocking finding at the given severity. A blocked result is
    /// never `Safe`, whatever severity the caller passed.
    pub fn block(&mut self, risk: RiskLevel, category: impl Into<String>) {
        self.risk = self.risk.max(risk.max(RiskLevel::Low));
        self.blocked.push(category.into());
    }

    /// Record a non-blocking finding. Warnings never raise risk past Medium.
    pub fn warn(&mut self, risk: RiskLevel, message: impl Into<String>) {
        self.risk = self.risk.max(risk.min(RiskLevel::Medium));
        self.warnings.push(message.into());
    }

    pub fn has_blocks(&self) -> bool {
        !self.blocked.is_empty()
    }

    pub fn finish(self) -> ValidationResult {
        self.finish_with(None)
    }

    pub fn finish_with(self, sanitized: Option<QueryCandidate>) -> ValidationResult {
        ValidationResult {
            risk: self.risk,
            blocked: self.blocked,
            warnings: self.warnings,
            sanitized,
        }
    }
}

/// The set of operations a candidate requires of its target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredOperations(BTreeSet<Operation>);

impl RequiredOperations {
    pub fn read_only() -> Self {
        let mut ops = BTreeSet::new();
        ops.insert(Operation::Read);
        Self(ops)
    }

    pub fn insert(&mut self, op: Operation) {
        self.0.insert(op);
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.0.contains(&op)
    }

    /// True when the candidate performs no writes or schema changes.
    pub fn is_read_only(&self) -> bool {
        self.0.iter().all(|op| *op == Operation::Read)
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }

    /// First required operation the permission set denies, if any.
    pub fn first_denied(&self, permissions: &PermissionSet) -> Option<Operation> {
        self.0.iter().copied().find(|op| !permissions.allows(*op))
    }
}

/// Final authorization verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExecutionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}
