// Payroll Service - top-ups, deductions and salary withdrawals
//
// Each mutating operation validates its input, then runs its writes through
// `Database::atomically`, so a ledger record and the balance change it
// implies are never visible apart.

use crate::db::{self, Database};
use crate::entities::{Deduction, LedgerEntry, LedgerTotals, TopUp, Withdrawal};
use crate::error::{PayrollError, Result};
use crate::reconciliation::{ReconciliationResult, Reconciler};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

pub struct PayrollService {
    db: Database,
    reconciler: Reconciler,
}

impl PayrollService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            reconciler: Reconciler::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // TOP-UP / DEDUCTION
    // ========================================================================

    pub fn top_up(&self, amount: f64) -> Result<TopUp> {
        self.top_up_at(amount, Utc::now())
    }

    /// Record a top-up and raise the balance by `amount`
    pub fn top_up_at(&self, amount: f64, now: DateTime<Utc>) -> Result<TopUp> {
        validate_amount(amount)?;

        let id = self.db.atomically("top up balance", |tx| {
            let id = db::insert_top_up(tx, amount, now)
                .map_err(PayrollError::storage("top up balance"))?;
            apply_balance_change(tx, amount)?;
            Ok(id)
        })?;

        info!(id, amount, "balance topped up");

        Ok(TopUp {
            id,
            amount,
            transaction: now,
        })
    }

    pub fn deduct(&self, amount: f64) -> Result<Deduction> {
        self.deduct_at(amount, Utc::now())
    }

    /// Record a deduction and lower the balance by `amount`.
    /// The resulting balance may go negative.
    pub fn deduct_at(&self, amount: f64, now: DateTime<Utc>) -> Result<Deduction> {
        validate_amount(amount)?;

        let id = self.db.atomically("deduct balance", |tx| {
            let id = db::insert_deduction(tx, amount, now)
                .map_err(PayrollError::storage("deduct balance"))?;
            apply_balance_change(tx, -amount)?;
            Ok(id)
        })?;

        info!(id, amount, "balance deducted");

        Ok(Deduction {
            id,
            amount,
            transaction: now,
        })
    }

    // ========================================================================
    // SALARY WITHDRAWAL
    // ========================================================================

    pub fn withdraw(&self, employee_id: i64, secret_id: &str) -> Result<Withdrawal> {
        self.withdraw_at(employee_id, secret_id, Utc::now())
    }

    /// Pay out the employee's salary once per calendar month.
    ///
    /// Lookup, checks and writes share one transaction: a second concurrent
    /// withdrawal for the same employee waits for the first to commit and then
    /// sees `withdrawn = true`.
    pub fn withdraw_at(
        &self,
        employee_id: i64,
        secret_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let withdrawal = self.db.atomically("withdraw salary", |tx| {
            let employee = db::find_employee(tx, employee_id)
                .map_err(PayrollError::storage("find employee"))?
                .ok_or(PayrollError::NotFound(employee_id))?;

            if !employee.verify_secret(secret_id) {
                warn!(employee_id, "withdrawal rejected: secret mismatch");
                return Err(PayrollError::Unauthorized);
            }

            if employee.has_withdrawn_in(now) {
                warn!(employee_id, "withdrawal rejected: already withdrawn this month");
                return Err(PayrollError::AlreadyWithdrawn);
            }

            let salary = employee.salary();
            apply_balance_change(tx, -salary)?;
            db::mark_withdrawn(tx, employee.id, now)
                .map_err(PayrollError::storage("update employee status"))?;
            let id = db::insert_withdrawal(tx, employee.id, salary, now)
                .map_err(PayrollError::storage("record withdrawal"))?;

            Ok(Withdrawal {
                id,
                employee_id: employee.id,
                amount: salary,
                transaction: now,
            })
        })?;

        info!(
            employee_id,
            amount = withdrawal.amount,
            "salary withdrawn"
        );

        Ok(withdrawal)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn balance(&self) -> Result<f64> {
        self.db.read("read balance", db::get_balance)
    }

    pub fn top_ups(&self) -> Result<Vec<TopUp>> {
        self.db.read("list top-ups", db::get_top_ups)
    }

    pub fn deductions(&self) -> Result<Vec<Deduction>> {
        self.db.read("list deductions", db::get_deductions)
    }

    pub fn withdrawals(&self) -> Result<Vec<Withdrawal>> {
        self.db.read("list withdrawals", db::get_withdrawals)
    }

    /// Every ledger record, newest first
    pub fn ledger(&self) -> Result<Vec<LedgerEntry>> {
        self.db.read("list ledger", db::get_ledger)
    }

    /// Compare the stored balance with the sum of the ledger.
    /// Both are read from the same snapshot.
    pub fn reconcile(&self) -> Result<ReconciliationResult> {
        let (totals, balance) = self.db.read("reconcile ledger", |conn| {
            let tx = conn.unchecked_transaction()?;
            let totals = db::get_ledger_totals(&tx)?;
            let balance = db::get_balance(&tx)?;
            Ok((totals, balance))
        })?;

        Ok(self.check(&totals, balance))
    }

    /// Ledger entries and their reconciliation, read from one snapshot so a
    /// concurrent write cannot land between the two
    pub fn ledger_report(&self) -> Result<(Vec<LedgerEntry>, ReconciliationResult)> {
        let (entries, totals, balance) = self.db.read("list ledger", |conn| {
            let tx = conn.unchecked_transaction()?;
            let entries = db::get_ledger(&tx)?;
            let totals = db::get_ledger_totals(&tx)?;
            let balance = db::get_balance(&tx)?;
            Ok((entries, totals, balance))
        })?;

        Ok((entries, self.check(&totals, balance)))
    }

    fn check(&self, totals: &LedgerTotals, balance: f64) -> ReconciliationResult {
        let result = self.reconciler.reconcile(totals, balance);
        if !result.is_balanced() {
            warn!(difference = result.difference(), "ledger does not reconcile");
        }
        result
    }
}

/// Apply `delta` to the balance, refusing any change whose result is not a
/// finite number. An infinite balance can never be brought back in line with
/// the ledger.
fn apply_balance_change(conn: &Connection, delta: f64) -> Result<()> {
    let balance = db::get_balance(conn).map_err(PayrollError::storage("update balance"))?;

    if !(balance + delta).is_finite() {
        return Err(PayrollError::Validation(format!(
            "balance {} cannot absorb a change of {}",
            balance, delta
        )));
    }

    db::adjust_balance(conn, delta).map_err(PayrollError::storage("update balance"))
}

/// Amounts must be finite and strictly positive
fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(PayrollError::Validation(format!(
            "amount must be a finite number, got {}",
            amount
        )));
    }

    if amount <= 0.0 {
        return Err(PayrollError::Validation(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_service() -> (TempDir, PayrollService) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("payroll.db"), Duration::from_secs(5));
        database.initialize().unwrap();
        (dir, PayrollService::new(database))
    }

    fn hire(service: &PayrollService, salary: f64, secret: &str) -> i64 {
        let conn = service.database().connect().unwrap();
        let position_id = db::insert_position(&conn, "Engineer", salary).unwrap();
        db::insert_employee(&conn, "Dewi", secret, position_id).unwrap()
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(10.5).is_ok());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-1.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn test_top_up_returns_record() {
        let (_dir, service) = create_test_service();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let record = service.top_up_at(250.0, now).unwrap();

        assert_eq!(record.amount, 250.0);
        assert_eq!(record.transaction, now);
        assert_eq!(service.top_ups().unwrap(), vec![record]);
    }

    #[test]
    fn test_invalid_amount_writes_nothing() {
        let (_dir, service) = create_test_service();

        assert!(matches!(service.top_up(-5.0), Err(PayrollError::Validation(_))));
        assert!(matches!(service.deduct(0.0), Err(PayrollError::Validation(_))));

        assert_eq!(service.balance().unwrap(), 0.0);
        assert!(service.ledger().unwrap().is_empty());
    }

    #[test]
    fn test_deduct_may_go_negative() {
        let (_dir, service) = create_test_service();

        service.deduct(75.0).unwrap();

        assert_eq!(service.balance().unwrap(), -75.0);
        assert_eq!(service.deductions().unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw_unknown_employee() {
        let (_dir, service) = create_test_service();

        let result = service.withdraw(99, "anything");

        assert!(matches!(result, Err(PayrollError::NotFound(99))));
    }

    #[test]
    fn test_withdraw_records_ledger_entry() {
        let (_dir, service) = create_test_service();
        let employee_id = hire(&service, 300.0, "pw");
        service.top_up(1000.0).unwrap();

        let withdrawal = service.withdraw(employee_id, "pw").unwrap();

        assert_eq!(withdrawal.amount, 300.0);
        assert_eq!(service.withdrawals().unwrap(), vec![withdrawal]);
        assert!(service.reconcile().unwrap().is_balanced());
    }

    #[test]
    fn test_withdraw_again_next_month() {
        let (_dir, service) = create_test_service();
        let employee_id = hire(&service, 300.0, "pw");
        let march = Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2024, 4, 1, 1, 0, 0).unwrap();

        service.withdraw_at(employee_id, "pw", march).unwrap();
        service.withdraw_at(employee_id, "pw", april).unwrap();

        assert_eq!(service.balance().unwrap(), -600.0);
    }

    #[test]
    fn test_reconcile_detects_out_of_band_edit() {
        let (_dir, service) = create_test_service();
        service.top_up(100.0).unwrap();

        let conn = service.database().connect().unwrap();
        conn.execute("UPDATE company SET balance = 500 WHERE id = 1", [])
            .unwrap();

        let result = service.reconcile().unwrap();
        assert!(!result.is_balanced());
        assert_eq!(result.difference(), 400.0);
    }

    #[test]
    fn test_overflowing_top_up_is_rejected() {
        let (_dir, service) = create_test_service();
        service.top_up(f64::MAX).unwrap();

        let result = service.top_up(f64::MAX);

        assert!(matches!(result, Err(PayrollError::Validation(_))));
        assert_eq!(service.balance().unwrap(), f64::MAX);
        assert_eq!(service.top_ups().unwrap().len(), 1);
        assert!(service.reconcile().unwrap().is_balanced());
    }

    #[test]
    fn test_overflowing_deduction_is_rejected() {
        let (_dir, service) = create_test_service();
        service.deduct(f64::MAX).unwrap();

        let result = service.deduct(f64::MAX);

        assert!(matches!(result, Err(PayrollError::Validation(_))));
        assert_eq!(service.balance().unwrap(), -f64::MAX);
        assert_eq!(service.deductions().unwrap().len(), 1);
    }

    #[test]
    fn test_ledger_report_matches_entries() {
        let (_dir, service) = create_test_service();
        service.top_up(500.0).unwrap();
        service.deduct(120.0).unwrap();

        let (entries, reconciliation) = service.ledger_report().unwrap();

        assert_eq!(entries.len(), 2);
        let sum: f64 = entries.iter().map(|e| e.signed_amount()).sum();
        assert_eq!(
            reconciliation,
            ReconciliationResult::Balanced {
                total_top_ups: 500.0,
                total_deductions: 120.0,
                total_withdrawals: 0.0,
                balance: sum,
            }
        );
    }
}
