use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of ondoku appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored record could not be encoded or decoded
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN, as primary result codes.
const LOCK_CODES: [u32; 3] = [5, 6, 14];

/// `code` is SQLite's extended result code; its low byte is the primary code.
fn is_lock_code(code: &str) -> bool {
    code.parse::<u32>()
        .is_ok_and(|c| LOCK_CODES.contains(&(c & 0xff)))
}

fn is_lock_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_lock_code(&code)),
        _ => false,
    }
}

impl DatabaseError {
    /// Map a sqlx error, reporting lock contention as `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::InstanceLocked
        } else {
            DatabaseError::Other(err)
        }
    }

    /// Like [`from_sqlx`](Self::from_sqlx), with other failures reported as
    /// `Migration`.
    pub(crate) fn from_migration(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::InstanceLocked
        } else {
            DatabaseError::Migration(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_codes_include_extended_variants() {
        assert!(is_lock_code("5"));
        assert!(is_lock_code("517")); // SQLITE_BUSY_SNAPSHOT
        assert!(is_lock_code("6"));
        assert!(is_lock_code("14"));
        assert!(!is_lock_code("1"));
        assert!(!is_lock_code("2067")); // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_lock_code("busy"));
    }

    #[test]
    fn test_non_database_errors_are_not_locks() {
        assert!(matches!(
            DatabaseError::from_sqlx(sqlx::Error::RowNotFound),
            DatabaseError::Other(_)
        ));
        assert!(matches!(
            DatabaseError::from_migration(sqlx::Error::PoolTimedOut),
            DatabaseError::Migration(_)
        ));
    }
}
