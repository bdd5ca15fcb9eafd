//! SQLite persistence for per-source rules.

mod rules;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, StoredRules};
