// Entity Models
// Ledger records are immutable once written; employees carry the only
// mutable per-person state (the monthly withdrawal flag).

pub mod employee;
pub mod ledger;

pub use employee::{same_calendar_month, Employee, Position};
pub use ledger::{Deduction, LedgerEntry, LedgerKind, LedgerTotals, TopUp, Withdrawal};
