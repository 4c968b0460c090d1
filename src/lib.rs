// Payroll Ledger - Core Library
// Company balance ledger with monthly salary withdrawals, shared by the
// admin CLI, the HTTP server, and the tests.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod logging;
pub mod reconciliation;
pub mod service;
pub mod transaction;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_database, Database};
pub use entities::{
    Deduction, Employee, LedgerEntry, LedgerKind, LedgerTotals, Position, TopUp, Withdrawal,
};
pub use error::PayrollError;
pub use reconciliation::{ReconciliationResult, Reconciler};
pub use service::PayrollService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
