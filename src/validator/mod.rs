//! Static query safety validation.
//!
//! Two validators, one per store kind. Both are pure functions over
//! immutable inputs: they classify a candidate query by risk and produce a
//! [`crate::models::ValidationResult`] without touching any connection.
//!
//! The SQL validator works on query text; the document validator works on
//! filter documents and aggregation pipelines. Their blocking policies
//! differ deliberately - see each module's docs.

pub mod document;
pub mod sql;

pub use document::{DocumentValidatorConfig, sanitize, validate_pipeline, validate_query};
pub use sql::{SqlValidatorConfig, enforce_row_limit, validate as validate_sql};
