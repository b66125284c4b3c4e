//! Error types for Banknote protocol operations

use crate::types::{BankNodeId, LoanId, LoanRequestId, TokenId};
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur in protocol operations.
///
/// Every operation is fail-fast: validation happens before the first state
/// mutation, so an `Err` means the attempted operation had no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // === Validation ===
    /// Bad input: zero/negative amount, duration, or payment count
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Caller is not the operator/admin required for this operation
    #[error("Caller is not authorized: {0}")]
    NotAuthorized(String),

    // === Pool accounting ===
    /// Requested value exceeds the pool's non-loaned funds
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    /// Bond below the minimum, or an unbond would cross the 75% floor
    #[error("Insufficient bond: required {required}, actual {actual}")]
    InsufficientBond { required: u128, actual: u128 },

    // === Lifecycle ===
    /// Operation against a request/loan not in the required status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Overdue report before the grace period has elapsed
    #[error("Loan is not yet reportable: due at {due}, now {now}")]
    NotYetDue { due: i64, now: i64 },

    /// Lendable token disabled or never registered
    #[error("Token not configured for lending: {0}")]
    Unconfigured(TokenId),

    // === Token interface ===
    /// Transfer exceeds the sender's balance
    #[error("Insufficient token balance: required {required}, actual {actual}")]
    InsufficientBalance { required: u128, actual: u128 },

    /// transfer_from exceeds the spender's allowance
    #[error("Insufficient allowance: required {required}, actual {actual}")]
    InsufficientAllowance { required: u128, actual: u128 },

    // === Lookup ===
    /// Unknown token ledger
    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),

    /// Unknown bank node id
    #[error("Bank node not found: {0}")]
    NodeNotFound(BankNodeId),

    /// Unknown loan id
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Unknown loan request id
    #[error("Loan request not found: {0}")]
    LoanRequestNotFound(LoanRequestId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::InsufficientLiquidity {
            requested: 100,
            available: 40,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Insufficient liquidity"));
        assert!(msg.contains("100"));

        let err = ProtocolError::NotYetDue { due: 500, now: 400 };
        assert!(format!("{}", err).contains("due at 500"));
    }
}
