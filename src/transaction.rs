// Transaction Manager - all-or-nothing ledger writes
//
// Each balance-affecting operation runs inside one IMMEDIATE transaction:
// the write lock is taken at BEGIN, so the read-modify-write of an operation
// cannot interleave with another writer. The closure's writes are committed
// together; every other exit path (error, early return, panic) drops the
// transaction and SQLite rolls it back.

use crate::db::Database;
use crate::error::{PayrollError, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

impl Database {
    /// Run `f` as one atomic unit. Errors from `f` roll everything back and
    /// are returned unchanged; connection, BEGIN and COMMIT failures are
    /// reported as storage errors for `operation`.
    pub fn atomically<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connect().map_err(PayrollError::storage(operation))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(PayrollError::storage(operation))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(PayrollError::storage(operation))?;
                Ok(value)
            }
            Err(e) => {
                debug!(operation, error = %e, "rolling back");
                // A failed rollback must not mask `e`
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    /// Run a read-only query on a fresh connection
    pub fn read<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.connect().map_err(PayrollError::storage(operation))?;
        f(&conn).map_err(PayrollError::storage(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("ledger.db"), Duration::from_secs(5));
        database.initialize().unwrap();
        (dir, database)
    }

    #[test]
    fn test_commit_applies_all_writes() {
        let (_dir, database) = create_test_database();

        database
            .atomically("top up balance", |tx| {
                db::insert_top_up(tx, 100.0, Utc::now()).map_err(PayrollError::storage("top up balance"))?;
                db::adjust_balance(tx, 100.0).map_err(PayrollError::storage("update balance"))?;
                Ok(())
            })
            .unwrap();

        let balance = database.read("read balance", db::get_balance).unwrap();
        let top_ups = database.read("list top-ups", db::get_top_ups).unwrap();
        assert_eq!(balance, 100.0);
        assert_eq!(top_ups.len(), 1);
    }

    #[test]
    fn test_error_rolls_back_earlier_writes() {
        let (_dir, database) = create_test_database();

        let result: Result<()> = database.atomically("top up balance", |tx| {
            db::insert_top_up(tx, 100.0, Utc::now()).map_err(PayrollError::storage("top up balance"))?;
            Err(PayrollError::Validation("abort after insert".to_string()))
        });

        assert!(matches!(result, Err(PayrollError::Validation(_))));
        let top_ups = database.read("list top-ups", db::get_top_ups).unwrap();
        assert!(top_ups.is_empty());
    }

    #[test]
    fn test_missing_database_directory_is_storage_error() {
        let database = Database::new("/nonexistent/dir/ledger.db", Duration::from_millis(10));

        let result = database.read("read balance", db::get_balance);

        assert!(matches!(
            result,
            Err(PayrollError::Storage { operation: "read balance", .. })
        ));
    }
}
