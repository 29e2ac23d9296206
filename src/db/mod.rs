//! Store drivers.
//!
//! Driver traits plus the shipped implementations: sqlx for relational
//! targets, mongodb for document targets. The executor only ever sees the
//! traits.

pub mod document;
pub mod driver;
pub mod relational;

pub use document::MongoDocumentDriver;
pub use driver::{DocumentDriver, RelationalDriver, ResultSet};
pub use relational::SqlxRelationalDriver;
