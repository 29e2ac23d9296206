//! Data models for the query gateway.
//!
//! This module defines the core types shared across the loader, router,
//! validators, and executor.

pub mod connection;
pub mod query;

pub use connection::{
    ConnectionSettings, DOCUMENT_DEFAULT_PORT, Operation, PermissionSet, RelationalFlavor,
    StoreKind,
};
pub use query::{
    ExecutionDecision, Findings, QueryBody, QueryCandidate, RequiredOperations, RiskLevel,
    RoutingDecision, Strategy, ValidationResult,
};
