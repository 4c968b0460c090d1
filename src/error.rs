// Payroll error taxonomy
// Every failure of a ledger operation is one of these variants. The API layer
// maps them 1:1 onto HTTP statuses; nothing here is fatal to the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayrollError {
    /// Malformed or missing input (client fault)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Referenced employee does not exist
    #[error("Employee not found: {0}")]
    NotFound(i64),

    /// Supplied secret does not match the stored one
    #[error("Unauthorized")]
    Unauthorized,

    /// Employee already withdrew a salary this calendar month
    #[error("Salary already withdrawn this month")]
    AlreadyWithdrawn,

    /// Datastore operation failed; the whole operation was rolled back
    #[error("Failed to {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl PayrollError {
    /// Wrap a rusqlite error with the operation it interrupted
    pub fn storage(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> PayrollError {
        move |source| PayrollError::Storage { operation, source }
    }

    /// Message safe to hand to a client (no datastore internals)
    pub fn public_message(&self) -> String {
        match self {
            PayrollError::Validation(_) => "Invalid request".to_string(),
            PayrollError::NotFound(_) => "Employee not found".to_string(),
            PayrollError::Unauthorized => "Unauthorized".to_string(),
            PayrollError::AlreadyWithdrawn => "Salary already withdrawn this month".to_string(),
            PayrollError::Storage { operation, .. } => format!("Failed to {}", operation),
        }
    }
}

pub type Result<T> = std::result::Result<T, PayrollError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_storage_details() {
        let err = PayrollError::Storage {
            operation: "top up balance",
            source: rusqlite::Error::QueryReturnedNoRows,
        };

        assert_eq!(err.public_message(), "Failed to top up balance");
        assert!(err.to_string().contains("Query returned no rows"));
    }

    #[test]
    fn test_public_messages() {
        assert_eq!(PayrollError::NotFound(7).public_message(), "Employee not found");
        assert_eq!(PayrollError::Unauthorized.public_message(), "Unauthorized");
        assert_eq!(
            PayrollError::AlreadyWithdrawn.public_message(),
            "Salary already withdrawn this month"
        );
        assert_eq!(
            PayrollError::Validation("amount must be positive".into()).public_message(),
            "Invalid request"
        );
    }
}
