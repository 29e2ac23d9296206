//! Connection-related data models.
//!
//! This module defines the per-database connection identity and the
//! operation permissions attached to it. Both are immutable once loaded;
//! the only way to change them is to rebuild the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of backing store a connection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Tabular store queried with SQL text (MySQL/MariaDB or PostgreSQL).
    Relational,
    /// Schema-flexible store queried with filter documents or pipelines.
    Document,
}

impl StoreKind {
    /// Get the display name for this store kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Relational engine flavor, used to pick the canonical default port and the
/// SQL dialect for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationalFlavor {
    /// Includes MariaDB
    MySql,
    Postgres,
}

impl RelationalFlavor {
    /// Canonical port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

/// Canonical port for document stores (mongod).
pub const DOCUMENT_DEFAULT_PORT: u16 = 27017;

/// Connection identity for one named backing store.
///
/// Parsed once by the configuration loader and owned by the registry.
/// `raw_url` preserves the original connection string verbatim for drivers
/// that understand more than the structured fields (multi-host document
/// URLs in particular).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub kind: StoreKind,
    /// Set for relational connections, `None` for document stores.
    pub flavor: Option<RelationalFlavor>,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    /// Unix socket path for socket-variant relational URLs.
    pub socket: Option<String>,
    pub tls: Option<bool>,
    /// Document stores only: authSource lifted out of the query string.
    pub auth_source: Option<String>,
    /// Document stores only: replicaSet lifted out of the query string.
    pub replica_set: Option<String>,
    /// Remaining driver options, preserved in order.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Original connection string, kept verbatim for driver use.
    /// Contains credentials - never log.
    #[serde(skip_serializing)]
    pub raw_url: Option<String>,
}

impl ConnectionSettings {
    /// Get a display-safe identity string (credentials masked).
    pub fn masked(&self) -> String {
        if let Some(socket) = &self.socket {
            return format!("{}@[socket]{}/{}", self.user, socket, self.database);
        }
        format!(
            "{}:****@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// The four independent write capabilities granted to a database.
///
/// Read access is implicit; everything else is deny-by-default and must be
/// granted explicitly in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
    pub schema_change: bool,
}

impl PermissionSet {
    /// A permission set with every capability denied.
    pub const DENY_ALL: Self = Self {
        insert: false,
        update: false,
        delete: false,
        schema_change: false,
    };

    /// Check whether a named operation is permitted.
    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Read => true,
            Operation::Insert => self.insert,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
            Operation::SchemaChange => self.schema_change,
        }
    }
}

/// Operations a query may require of its target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
    SchemaChange,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SchemaChange => "schema_change",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
