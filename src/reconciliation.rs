// ⚖️ Reconciliation - balance must match the ledger
//
// Following the formula:
//   Σ top_ups - Σ deductions - Σ withdrawals = company balance
//
// Every write goes through the transaction manager, so a discrepancy means
// the balance was edited outside the service.

use crate::entities::LedgerTotals;
use serde::{Deserialize, Serialize};

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconciliationResult {
    /// Balance equals what the ledger implies
    Balanced {
        total_top_ups: f64,
        total_deductions: f64,
        total_withdrawals: f64,
        balance: f64,
    },

    /// Balance and ledger disagree by more than the tolerance
    Discrepancy {
        expected_balance: f64,
        actual_balance: f64,
        difference: f64,
    },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn difference(&self) -> f64 {
        match self {
            ReconciliationResult::Balanced { .. } => 0.0,
            ReconciliationResult::Discrepancy { difference, .. } => *difference,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ReconciliationResult::Balanced { balance, .. } => {
                format!("Balanced: {:.2}", balance)
            }
            ReconciliationResult::Discrepancy {
                expected_balance,
                actual_balance,
                difference,
            } => format!(
                "Discrepancy: expected {:.2}, actual {:.2} (off by {:.2})",
                expected_balance, actual_balance, difference
            ),
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct Reconciler {
    /// Accepted floating-point drift
    tolerance: f64,
}

impl Reconciler {
    pub fn new() -> Self {
        Reconciler { tolerance: 0.01 }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Reconciler { tolerance }
    }

    pub fn reconcile(&self, totals: &LedgerTotals, actual_balance: f64) -> ReconciliationResult {
        let expected_balance = totals.expected_balance();
        let difference = actual_balance - expected_balance;

        if difference.abs() <= self.tolerance {
            ReconciliationResult::Balanced {
                total_top_ups: totals.top_ups,
                total_deductions: totals.deductions,
                total_withdrawals: totals.withdrawals,
                balance: actual_balance,
            }
        } else {
            ReconciliationResult::Discrepancy {
                expected_balance,
                actual_balance,
                difference,
            }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
