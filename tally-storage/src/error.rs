//! SQLite driver errors mapped into the shared error taxonomy.

use tally_core::{StorageError, TallyError};

/// Convert a driver error at the storage boundary. Use with `map_err`.
pub(crate) fn sqlite(e: rusqlite::Error) -> TallyError {
    let code = e.sqlite_error_code().map(|code| format!("{code:?}"));
    TallyError::Storage(StorageError::Sqlite {
        code,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_constraint_violation_keeps_code() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL)")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t (v) VALUES (NULL)", [])
            .map_err(sqlite)
            .unwrap_err();
        match err {
            TallyError::Storage(StorageError::Sqlite { code, reason }) => {
                assert_eq!(code.as_deref(), Some("ConstraintViolation"));
                assert!(reason.contains("NOT NULL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_engine_error_has_no_code() {
        let err = sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(
            err,
            TallyError::Storage(StorageError::Sqlite { code: None, .. })
        ));
    }
}
