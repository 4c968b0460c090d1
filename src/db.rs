use crate::entities::{Deduction, Employee, LedgerEntry, LedgerTotals, Position, TopUp, Withdrawal};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to the ledger database.
///
/// Holds no open connection: every operation checks one out with
/// [`Database::connect`] and drops it when the operation ends. Concurrent
/// writers are serialised by SQLite itself (WAL + busy timeout).
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a configured connection
    pub fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Create the schema if needed (idempotent)
    pub fn initialize(&self) -> rusqlite::Result<()> {
        let conn = self.connect()?;
        setup_database(&conn)
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets readers proceed while a writer holds the lock
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    // ==========================================================================
    // Company (singleton row holding the balance)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS company (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            balance REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute("INSERT OR IGNORE INTO company (id, balance) VALUES (1, 0)", [])?;

    // ==========================================================================
    // Ledger tables (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS top_up (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL CHECK (amount > 0),
            \"transaction\" TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS deduction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL CHECK (amount > 0),
            \"transaction\" TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Positions & employees
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS position (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            salary REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS employee (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            secret_id TEXT NOT NULL,
            withdrawn INTEGER NOT NULL DEFAULT 0,
            last_month TEXT,
            position_id INTEGER NOT NULL REFERENCES position(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS withdrawal (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_id INTEGER NOT NULL REFERENCES employee(id),
            amount REAL NOT NULL,
            \"transaction\" TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_withdrawal_employee ON withdrawal(employee_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Timestamps are stored as RFC 3339 text
// ============================================================================

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// Balance
// ============================================================================

pub fn get_balance(conn: &Connection) -> rusqlite::Result<f64> {
    conn.query_row("SELECT balance FROM company WHERE id = 1", [], |row| row.get(0))
}

/// Apply a relative change to the company balance.
/// The update is relative so concurrent transactions never overwrite each other.
pub fn adjust_balance(conn: &Connection, delta: f64) -> rusqlite::Result<()> {
    let updated = conn.execute(
        "UPDATE company SET balance = balance + ?1 WHERE id = 1",
        params![delta],
    )?;

    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }

    Ok(())
}

// ============================================================================
// Ledger writes
// ============================================================================

pub fn insert_top_up(conn: &Connection, amount: f64, at: DateTime<Utc>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO top_up (amount, \"transaction\") VALUES (?1, ?2)",
        params![amount, at.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_deduction(conn: &Connection, amount: f64, at: DateTime<Utc>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO deduction (amount, \"transaction\") VALUES (?1, ?2)",
        params![amount, at.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_withdrawal(
    conn: &Connection,
    employee_id: i64,
    amount: f64,
    at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO withdrawal (employee_id, amount, \"transaction\") VALUES (?1, ?2, ?3)",
        params![employee_id, amount, at.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

// ============================================================================
// Ledger reads
// ============================================================================

pub fn get_top_ups(conn: &Connection) -> rusqlite::Result<Vec<TopUp>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, \"transaction\" FROM top_up ORDER BY \"transaction\" DESC, id DESC",
    )?;

    let records = stmt
        .query_map([], |row| {
            let at: String = row.get(2)?;
            Ok(TopUp {
                id: row.get(0)?,
                amount: row.get(1)?,
                transaction: parse_timestamp(2, &at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_deductions(conn: &Connection) -> rusqlite::Result<Vec<Deduction>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, \"transaction\" FROM deduction ORDER BY \"transaction\" DESC, id DESC",
    )?;

    let records = stmt
        .query_map([], |row| {
            let at: String = row.get(2)?;
            Ok(Deduction {
                id: row.get(0)?,
                amount: row.get(1)?,
                transaction: parse_timestamp(2, &at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_withdrawals(conn: &Connection) -> rusqlite::Result<Vec<Withdrawal>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_id, amount, \"transaction\"
         FROM withdrawal
         ORDER BY \"transaction\" DESC, id DESC",
    )?;

    let records = stmt
        .query_map([], |row| {
            let at: String = row.get(3)?;
            Ok(Withdrawal {
                id: row.get(0)?,
                employee_id: row.get(1)?,
                amount: row.get(2)?,
                transaction: parse_timestamp(3, &at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// All ledger records merged, newest first
pub fn get_ledger(conn: &Connection) -> rusqlite::Result<Vec<LedgerEntry>> {
    let mut entries: Vec<LedgerEntry> = get_top_ups(conn)?
        .into_iter()
        .map(LedgerEntry::from)
        .chain(get_deductions(conn)?.into_iter().map(LedgerEntry::from))
        .chain(get_withdrawals(conn)?.into_iter().map(LedgerEntry::from))
        .collect();

    entries.sort_by(|a, b| b.transaction.cmp(&a.transaction));
    Ok(entries)
}

pub fn get_ledger_totals(conn: &Connection) -> rusqlite::Result<LedgerTotals> {
    conn.query_row(
        "SELECT
            (SELECT COALESCE(SUM(amount), 0) FROM top_up),
            (SELECT COALESCE(SUM(amount), 0) FROM deduction),
            (SELECT COALESCE(SUM(amount), 0) FROM withdrawal)",
        [],
        |row| {
            Ok(LedgerTotals {
                top_ups: row.get(0)?,
                deductions: row.get(1)?,
                withdrawals: row.get(2)?,
            })
        },
    )
}

// ============================================================================
// Employees
// ============================================================================

pub fn find_employee(conn: &Connection, employee_id: i64) -> rusqlite::Result<Option<Employee>> {
    conn.query_row(
        "SELECT e.id, e.name, e.secret_id, e.withdrawn, e.last_month, p.id, p.name, p.salary
         FROM employee AS e
         INNER JOIN position AS p ON e.position_id = p.id
         WHERE e.id = ?1",
        params![employee_id],
        |row| {
            let last_month: Option<String> = row.get(4)?;
            Ok(Employee {
                id: row.get(0)?,
                name: row.get(1)?,
                secret_id: row.get(2)?,
                withdrawn: row.get(3)?,
                last_month: last_month.as_deref().map(|s| parse_timestamp(4, s)).transpose()?,
                position: Position {
                    id: row.get(5)?,
                    name: row.get(6)?,
                    salary: row.get(7)?,
                },
            })
        },
    )
    .optional()
}

pub fn mark_withdrawn(conn: &Connection, employee_id: i64, at: DateTime<Utc>) -> rusqlite::Result<()> {
    let updated = conn.execute(
        "UPDATE employee SET withdrawn = 1, last_month = ?1 WHERE id = ?2",
        params![at.to_rfc3339(), employee_id],
    )?;

    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }

    Ok(())
}

// Provisioning helpers. Position and employee management has no HTTP surface;
// these exist for seeding and tests.

pub fn insert_position(conn: &Connection, name: &str, salary: f64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO position (name, salary) VALUES (?1, ?2)",
        params![name, salary],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_employee(
    conn: &Connection,
    name: &str,
    secret_id: &str,
    position_id: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO employee (name, secret_id, position_id) VALUES (?1, ?2, ?3)",
        params![name, secret_id, position_id],
    )?;
    Ok(conn.last_insert_rowid())
}
