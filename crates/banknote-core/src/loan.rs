//! Loan ledger data model
//!
//! A `LoanRequest` is a transient application (Pending until the node
//! operator approves or denies it). A `Loan` is created at approval and
//! amortizes over a fixed number of equal payments until Completed, or is
//! flipped to Defaulted by an overdue report.
//!
//! Amortization is simple interest on the full principal per payment:
//!
//! ```text
//! amount_per_payment = floor(loan_amount / n) + floor(loan_amount * rate / 10^18)
//! ```
//!
//! The per-payment amount is fixed for the life of the loan. Principal
//! retirement floors per payment, with the final payment absorbing the
//! remainder so the full principal is retired exactly.

use crate::constants::ONE_TOKEN;
use crate::error::{ProtocolError, Result};
use crate::pool::mul_div_floor;
use crate::types::{Address, LoanId, LoanRequestId};
use serde::{Deserialize, Serialize};

/// Status of a loan application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanRequestStatus {
    /// Awaiting operator decision
    Pending,
    /// Approved; carries the funded loan's id
    Approved(LoanId),
    /// Denied by the operator, no funds moved
    Denied,
}

/// Status of a funded loan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Amortizing, payments expected
    Active,
    /// All scheduled payments made
    Completed,
    /// Missed a payment past the grace period
    Defaulted,
}

/// An unapproved loan application
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: LoanRequestId,
    pub borrower: Address,
    pub amount: u128,
    /// Total duration in seconds
    pub duration: i64,
    pub number_of_payments: u32,
    /// Interest per payment on the full principal, 10^18-scaled
    pub interest_rate_per_payment: u128,
    pub message: String,
    pub status: LoanRequestStatus,
}

/// An approved, amortizing loan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: Address,
    pub loan_amount: u128,
    pub total_loan_duration: i64,
    pub number_of_payments: u32,
    pub interest_rate_per_payment: u128,
    pub amount_per_payment: u128,
    pub total_amount_paid: u128,
    pub number_of_payments_made: u32,
    pub next_due_date: i64,
    pub status: LoanStatus,
    /// Operator fee already credited for this loan, cumulative
    pub operator_fees_accrued: u128,
}

/// Fixed per-payment amount for a given principal, rate and payment count.
///
/// Errors if the schedule floors to zero (principal too small for the
/// payment count).
pub fn amount_per_payment(
    loan_amount: u128,
    interest_rate_per_payment: u128,
    number_of_payments: u32,
) -> Result<u128> {
    let principal_part = loan_amount / number_of_payments as u128;
    let interest_part = mul_div_floor(loan_amount, interest_rate_per_payment, ONE_TOKEN);
    let per_payment = principal_part + interest_part;
    if per_payment == 0 {
        return Err(ProtocolError::Validation(
            "loan amount too small for payment schedule".to_string(),
        ));
    }
    Ok(per_payment)
}

impl Loan {
    /// Seconds between scheduled payments
    pub fn payment_interval(&self) -> i64 {
        self.total_loan_duration / self.number_of_payments as i64
    }

    /// Principal retired so far, flooring per payment with the final
    /// payment absorbing the remainder.
    pub fn principal_paid(&self) -> u128 {
        let per_payment = self.loan_amount / self.number_of_payments as u128;
        if self.number_of_payments_made >= self.number_of_payments {
            self.loan_amount
        } else {
            per_payment * self.number_of_payments_made as u128
        }
    }

    /// Principal still outstanding
    pub fn principal_outstanding(&self) -> u128 {
        self.loan_amount - self.principal_paid()
    }

    /// Interest received so far (payments in excess of retired principal).
    ///
    /// Each installment retires `loan_amount / n` principal, so interest is
    /// recognized per payment rather than only after cumulative payments
    /// exceed the full principal. At completion this equals
    /// `total_amount_paid - loan_amount` exactly.
    pub fn interest_paid(&self) -> u128 {
        self.total_amount_paid.saturating_sub(self.principal_paid())
    }
}
