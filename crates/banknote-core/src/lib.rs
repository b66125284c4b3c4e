//! banknote-core: accounting core for a peer-operated lending protocol
//!
//! The protocol is a network of operator-run bank nodes. Each node pools a
//! base asset from lenders, funds installment loans its operator approves,
//! and is backed by a protocol-token staking pool whose bonded collateral is
//! slashed on default. All state lives in plain structs over an in-memory
//! token ledger; there is no I/O and time enters only as explicit UNIX
//! timestamps.
//!
//! Module map:
//!
//! - [`token`] — fungible-token ledgers and the token bank
//! - [`pool`] — floor-division share/asset conversion math
//! - [`venue`] — the unused-funds venue idle liquidity is parked at
//! - [`loan`] — loan request and loan data model, amortization schedule
//! - [`staking`] — per-node collateral pool, bonding and slashing
//! - [`node`] — the bank node lending pool and loan lifecycle
//! - [`registry`] — protocol configuration and node creation
//! - [`service`] — a mutex-guarded facade over the whole protocol state

pub mod error;
pub mod loan;
pub mod node;
pub mod pool;
pub mod registry;
pub mod service;
pub mod staking;
pub mod token;
pub mod types;
pub mod venue;

pub use error::{ProtocolError, Result};
pub use node::{BankNode, BankNodeMeta};
pub use registry::{BankNodeRegistry, LendableTokenConfig, ProtocolConfig};
pub use service::ProtocolService;
pub use staking::StakingPool;
pub use token::{TokenBank, TokenLedger};
pub use types::{Address, BankNodeId, LoanId, LoanRequestId, TokenId};
pub use venue::UnusedFundsVenue;

/// Protocol-wide constants. Amounts are in 10^18-scaled token units,
/// durations in seconds.
pub mod constants {
    /// One whole token at 18 decimals
    pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

    /// Default operator bond required to create a bank node
    pub const DEFAULT_MIN_BONDING_AMOUNT: u128 = 100_000 * ONE_TOKEN;

    /// One week in seconds
    pub const ONE_WEEK: i64 = 7 * 24 * 3600;

    /// Seconds past a loan's due date before an overdue report is accepted
    pub const LOAN_OVERDUE_GRACE_PERIOD: i64 = ONE_WEEK;

    /// Lockup between unstaking and withdrawal from a staking pool
    pub const UNSTAKE_LOCKUP_PERIOD: i64 = ONE_WEEK;

    /// Default reward streaming period
    pub const DEFAULT_REWARD_DURATION: i64 = ONE_WEEK;

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_constants_are_consistent() {
            assert_eq!(ONE_TOKEN, 10u128.pow(18));
            assert_eq!(LOAN_OVERDUE_GRACE_PERIOD, 604_800);
            assert!(DEFAULT_MIN_BONDING_AMOUNT % ONE_TOKEN == 0);
        }
    }
}
