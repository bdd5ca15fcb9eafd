use thiserror::Error;

use crate::rules::SourceRules;

// ============================================================================
// Error Types
// ============================================================================

/// Errors opening the rules database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The rules database is locked by another sitefeed process. Wait for it to finish and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Maps lock-related sqlx errors to [`DatabaseError::InstanceLocked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// A persisted rule set and the source it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRules {
    /// Canonicalized source URL (the storage key).
    pub source_url: String,
    pub rules: SourceRules,
    /// SQLite `datetime('now')` at the last write, UTC.
    pub updated_at: String,
}
