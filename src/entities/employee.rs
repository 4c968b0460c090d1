// 👤 Employee Entity - salary source and monthly withdrawal state
//
// An employee draws their position's salary at most once per calendar month.
// `withdrawn` is never reset by any operation; `last_month` decides whether the
// flag still applies to the current month.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// POSITION
// ============================================================================

/// Job position; read-only for ledger operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub name: String,
    pub salary: f64,
}

// ============================================================================
// EMPLOYEE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub position: Position,

    /// Shared secret presented on withdrawal. Never serialized outward.
    #[serde(skip)]
    pub secret_id: String,

    pub withdrawn: bool,

    /// When the last withdrawal happened (None = never withdrew)
    pub last_month: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn salary(&self) -> f64 {
        self.position.salary
    }

    /// Check the supplied secret without short-circuiting on the first
    /// differing byte
    pub fn verify_secret(&self, supplied: &str) -> bool {
        constant_time_eq(supplied, &self.secret_id)
    }

    /// True when a withdrawal was already applied in the calendar month of `now`
    pub fn has_withdrawn_in(&self, now: DateTime<Utc>) -> bool {
        match self.last_month {
            Some(last) => self.withdrawn && same_calendar_month(last, now),
            None => false,
        }
    }
}

/// Year and month must both match, judged in UTC. Comparing the month alone
/// would lock an employee out exactly twelve months after their last
/// withdrawal.
pub fn same_calendar_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

// Digests have a fixed length, so neither the comparison time nor an early
// length check reveals anything about the stored secret.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());

    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_employee(withdrawn: bool, last_month: Option<DateTime<Utc>>) -> Employee {
        Employee {
            id: 1,
            name: "Siti".to_string(),
            position: Position {
                id: 10,
                name: "Engineer".to_string(),
                salary: 300.0,
            },
            secret_id: "s3cret".to_string(),
            withdrawn,
            last_month,
        }
    }

    #[test]
    fn test_verify_secret() {
        let employee = create_test_employee(false, None);

        assert!(employee.verify_secret("s3cret"));
        assert!(!employee.verify_secret("s3cre"));
        assert!(!employee.verify_secret("S3CRET"));
        assert!(!employee.verify_secret(""));
    }

    #[test]
    fn test_never_withdrawn_is_eligible() {
        let employee = create_test_employee(false, None);
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();

        assert!(!employee.has_withdrawn_in(now));
    }

    #[test]
    fn test_same_month_blocks_withdrawal() {
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        let employee = create_test_employee(true, Some(last));

        assert!(employee.has_withdrawn_in(now));
    }

    #[test]
    fn test_same_month_previous_year_is_eligible() {
        let last = Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let employee = create_test_employee(true, Some(last));

        assert!(!employee.has_withdrawn_in(now));
    }

    #[test]
    fn test_next_month_is_eligible_even_with_flag_set() {
        let last = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let employee = create_test_employee(true, Some(last));

        assert!(!employee.has_withdrawn_in(now));
    }

    #[test]
    fn test_month_boundary_is_utc() {
        let last = Utc.with_ymd_and_hms(2024, 3, 31, 23, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 10, 0).unwrap();
        let employee = create_test_employee(true, Some(last));

        assert!(!same_calendar_month(last, now));
        assert!(!employee.has_withdrawn_in(now));
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let employee = create_test_employee(false, None);
        let json = serde_json::to_string(&employee).unwrap();

        assert!(!json.contains("s3cret"));
        assert!(!json.contains("secret_id"));
        assert!(json.contains("\"salary\":300.0"));
    }
}
