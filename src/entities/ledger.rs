// 📒 Ledger Records - immutable balance-affecting events
//
// Every change to the company balance leaves exactly one record behind:
// a top-up, a deduction, or a salary withdrawal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopUp {
    pub id: i64,
    pub amount: f64,
    pub transaction: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub id: i64,
    pub amount: f64,
    pub transaction: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub employee_id: i64,
    pub amount: f64,
    pub transaction: DateTime<Utc>,
}

// ============================================================================
// LEDGER ENTRY (merged view)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    TopUp,
    Deduction,
    Withdrawal,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::TopUp => "top_up",
            LedgerKind::Deduction => "deduction",
            LedgerKind::Withdrawal => "withdrawal",
        }
    }

    /// +1 for money coming in, -1 for money going out
    pub fn sign(&self) -> f64 {
        match self {
            LedgerKind::TopUp => 1.0,
            LedgerKind::Deduction | LedgerKind::Withdrawal => -1.0,
        }
    }
}

/// One row of the combined ledger, as listed by the API and exported as CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: LedgerKind,
    pub id: i64,
    pub amount: f64,
    pub transaction: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<i64>,
}

impl LedgerEntry {
    /// Effect of this entry on the company balance
    pub fn signed_amount(&self) -> f64 {
        self.kind.sign() * self.amount
    }
}

impl From<TopUp> for LedgerEntry {
    fn from(record: TopUp) -> Self {
        Self {
            kind: LedgerKind::TopUp,
            id: record.id,
            amount: record.amount,
            transaction: record.transaction,
            employee_id: None,
        }
    }
}

impl From<Deduction> for LedgerEntry {
    fn from(record: Deduction) -> Self {
        Self {
            kind: LedgerKind::Deduction,
            id: record.id,
            amount: record.amount,
            transaction: record.transaction,
            employee_id: None,
        }
    }
}

impl From<Withdrawal> for LedgerEntry {
    fn from(record: Withdrawal) -> Self {
        Self {
            kind: LedgerKind::Withdrawal,
            id: record.id,
            amount: record.amount,
            transaction: record.transaction,
            employee_id: Some(record.employee_id),
        }
    }
}

/// Sums of each ledger table
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub top_ups: f64,
    pub deductions: f64,
    pub withdrawals: f64,
}

impl LedgerTotals {
    /// Balance implied by the ledger alone
    pub fn expected_balance(&self) -> f64 {
        self.top_ups - self.deductions - self.withdrawals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_amount() {
        let now = Utc::now();
        let top_up: LedgerEntry = TopUp { id: 1, amount: 50.0, transaction: now }.into();
        let withdrawal: LedgerEntry = Withdrawal {
            id: 2,
            employee_id: 9,
            amount: 20.0,
            transaction: now,
        }
        .into();

        assert_eq!(top_up.signed_amount(), 50.0);
        assert_eq!(withdrawal.signed_amount(), -20.0);
        assert_eq!(withdrawal.employee_id, Some(9));
    }

    #[test]
    fn test_expected_balance() {
        let totals = LedgerTotals {
            top_ups: 1500.0,
            deductions: 200.0,
            withdrawals: 300.0,
        };

        assert_eq!(totals.expected_balance(), 1000.0);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&LedgerKind::TopUp).unwrap();
        assert_eq!(json, "\"top_up\"");
        assert_eq!(LedgerKind::Withdrawal.as_str(), "withdrawal");
    }
}
