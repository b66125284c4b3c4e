//! Bank node: per-node lending pool and loan lifecycle
//!
//! A bank node pools one base asset from lenders, funds borrower loans
//! approved by its operator, and keeps its books in three buckets:
//!
//! - `base_token_balance` — base tokens held at the node's vault address,
//! - `accounts_receivable_from_loans` — principal out on active loans,
//! - unused-funds venue deposits — idle liquidity parked externally.
//!
//! Invariant at all times:
//! `pool_total_assets_value == base_token_balance +
//!  accounts_receivable_from_loans + value_of_unused_funds_deposits`.
//!
//! Accrued operator fees are tracked in `operator_balance` and are excluded
//! from pool value (the tokens sit at the vault but belong to the operator).
//!
//! Every operation validates fully before its first mutation, so an error
//! leaves no partial state.

use crate::error::{ProtocolError, Result};
use crate::loan::{amount_per_payment, Loan, LoanRequest, LoanRequestStatus, LoanStatus};
use crate::pool::{assets_for_withdraw, mul_div_floor, shares_for_deposit};
use crate::staking::StakingPool;
use crate::token::TokenBank;
use crate::types::{Address, BankNodeId, LoanId, LoanRequestId, TokenId};
use crate::venue::UnusedFundsVenue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operator fee: one tenth of interest received, accrued cumulatively.
pub const OPERATOR_FEE_DIVISOR: u128 = 10;

/// Descriptive metadata recorded at node creation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankNodeMeta {
    pub name: String,
    pub website: String,
    pub config_uri: String,
}

/// One operator-run lending pool for a single base asset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankNode {
    pub id: BankNodeId,
    pub operator: Address,
    pub meta: BankNodeMeta,

    /// The node's vault account on the base-token ledger
    address: Address,

    /// Base asset this node lends
    base_token: TokenId,

    /// Liquidity share token minted to lenders
    pool_token: TokenId,

    /// Base tokens held at the vault and owned by the pool
    base_token_balance: u128,

    /// Principal out on active loans
    accounts_receivable_from_loans: u128,

    /// Accrued operator fee, claimable, excluded from pool value
    operator_balance: u128,

    /// Next loan request id (strictly sequential, no gaps)
    loan_request_index: LoanRequestId,

    /// Next loan id (strictly sequential, no gaps)
    loan_index: LoanId,

    loan_requests: BTreeMap<LoanRequestId, LoanRequest>,
    loans: BTreeMap<LoanId, Loan>,

    /// Seconds past a due date before an overdue report is accepted
    grace_period: i64,

    /// Base-token units -> protocol-token value, 10^18-scaled over
    /// 10^decimals base units
    value_multiplier: u128,

    /// Base token decimals, for the value conversion above
    base_decimals: u8,

    /// Destination for slashed collateral
    treasury: Address,

    /// Collateral pool backing this node
    pub staking: StakingPool,
}

impl BankNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BankNodeId,
        operator: Address,
        base_token: TokenId,
        pool_token: TokenId,
        meta: BankNodeMeta,
        grace_period: i64,
        value_multiplier: u128,
        base_decimals: u8,
        treasury: Address,
        staking: StakingPool,
    ) -> Self {
        Self {
            id,
            operator,
            meta,
            address: Address::derive(&format!("banknote/bank-node/{id}")),
            base_token,
            pool_token,
            base_token_balance: 0,
            accounts_receivable_from_loans: 0,
            operator_balance: 0,
            loan_request_index: 0,
            loan_index: 0,
            loan_requests: BTreeMap::new(),
            loans: BTreeMap::new(),
            grace_period,
            value_multiplier,
            base_decimals,
            treasury,
            staking,
        }
    }

    // === Read-only views ===

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn base_token(&self) -> TokenId {
        self.base_token
    }

    pub fn pool_token(&self) -> TokenId {
        self.pool_token
    }

    pub fn base_token_balance(&self) -> u128 {
        self.base_token_balance
    }

    pub fn accounts_receivable_from_loans(&self) -> u128 {
        self.accounts_receivable_from_loans
    }

    pub fn operator_balance(&self) -> u128 {
        self.operator_balance
    }

    pub fn loan_request_index(&self) -> LoanRequestId {
        self.loan_request_index
    }

    pub fn loan_index(&self) -> LoanId {
        self.loan_index
    }

    pub fn loan_request(&self, id: LoanRequestId) -> Result<&LoanRequest> {
        self.loan_requests
            .get(&id)
            .ok_or(ProtocolError::LoanRequestNotFound(id))
    }

    pub fn loan(&self, id: LoanId) -> Result<&Loan> {
        self.loans.get(&id).ok_or(ProtocolError::LoanNotFound(id))
    }

    /// Idle liquidity parked at the unused-funds venue
    pub fn value_of_unused_funds_deposits(&self, venue: &UnusedFundsVenue) -> u128 {
        venue.balance_of(self.address, self.base_token)
    }

    /// Everything the pool owns: vault balance + receivable + venue deposits
    pub fn pool_total_assets_value(&self, venue: &UnusedFundsVenue) -> u128 {
        self.base_token_balance
            + self.accounts_receivable_from_loans
            + self.value_of_unused_funds_deposits(venue)
    }

    /// Non-loaned funds available for withdrawal or new loans
    pub fn pool_total_liquid_assets_value(&self, venue: &UnusedFundsVenue) -> u128 {
        self.base_token_balance + self.value_of_unused_funds_deposits(venue)
    }

    /// Circulating liquidity shares
    pub fn pool_tokens_circulating(&self, bank: &TokenBank) -> Result<u128> {
        Ok(bank.ledger(self.pool_token)?.total_supply())
    }

    /// Shares minted for a deposit of `amount`
    pub fn pool_deposit_conversion(
        &self,
        bank: &TokenBank,
        venue: &UnusedFundsVenue,
        amount: u128,
    ) -> Result<u128> {
        Ok(shares_for_deposit(
            self.pool_total_assets_value(venue),
            self.pool_tokens_circulating(bank)?,
            amount,
        ))
    }

    /// Assets returned for redeeming `shares`
    pub fn pool_withdraw_conversion(
        &self,
        bank: &TokenBank,
        venue: &UnusedFundsVenue,
        shares: u128,
    ) -> Result<u128> {
        Ok(assets_for_withdraw(
            self.pool_total_assets_value(venue),
            self.pool_tokens_circulating(bank)?,
            shares,
        ))
    }

    // === Internal fund movement ===

    /// Park all vault-held pool funds at the venue. Operator fees stay at
    /// the vault; only `base_token_balance` is pool money.
    fn sweep_idle_funds(&mut self, bank: &mut TokenBank, venue: &mut UnusedFundsVenue) -> Result<()> {
        let idle = self.base_token_balance;
        if idle > 0 {
            venue.deposit(bank, self.base_token, self.address, idle)?;
            self.base_token_balance = 0;
        }
        Ok(())
    }

    /// Pull funds back from the venue until the vault covers `amount`.
    /// Callers must have verified `amount <= pool_total_liquid_assets_value`.
    fn ensure_vault_covers(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        amount: u128,
    ) -> Result<()> {
        if self.base_token_balance < amount {
            let needed = amount - self.base_token_balance;
            venue.withdraw(bank, self.base_token, self.address, needed)?;
            self.base_token_balance += needed;
        }
        Ok(())
    }

    // === Lender operations ===

    /// Deposit base tokens, minting liquidity shares against pool value.
    pub fn add_liquidity(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        caller: Address,
        amount: u128,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(ProtocolError::Validation("deposit must be > 0".to_string()));
        }
        let shares = self.pool_deposit_conversion(bank, venue, amount)?;
        bank.ledger_mut(self.base_token)?
            .transfer(caller, self.address, amount)?;
        self.base_token_balance += amount;
        bank.ledger_mut(self.pool_token)?.mint(caller, shares);
        self.sweep_idle_funds(bank, venue)?;
        log::debug!("node {}: +{} liquidity, {} shares", self.id, amount, shares);
        Ok(shares)
    }

    /// Redeem liquidity shares for base tokens.
    pub fn remove_liquidity(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        caller: Address,
        shares: u128,
    ) -> Result<u128> {
        if shares == 0 {
            return Err(ProtocolError::Validation("shares must be > 0".to_string()));
        }
        let held = bank.ledger(self.pool_token)?.balance_of(caller);
        if held < shares {
            return Err(ProtocolError::InsufficientBalance {
                required: shares,
                actual: held,
            });
        }
        let value = self.pool_withdraw_conversion(bank, venue, shares)?;
        let liquid = self.pool_total_liquid_assets_value(venue);
        if value > liquid {
            return Err(ProtocolError::InsufficientLiquidity {
                requested: value,
                available: liquid,
            });
        }
        self.ensure_vault_covers(bank, venue, value)?;
        bank.ledger_mut(self.pool_token)?.burn(caller, shares)?;
        bank.ledger_mut(self.base_token)?
            .transfer(self.address, caller, value)?;
        self.base_token_balance -= value;
        Ok(value)
    }

    /// Permissionless value injection without share minting; used to
    /// recapitalize a pool after a default.
    pub fn donate(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        caller: Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Err(ProtocolError::Validation("donation must be > 0".to_string()));
        }
        bank.ledger_mut(self.base_token)?
            .transfer(caller, self.address, amount)?;
        self.base_token_balance += amount;
        self.sweep_idle_funds(bank, venue)
    }

    // === Borrower operations ===

    /// File a loan application. Ids are strictly sequential with no gaps.
    pub fn request_loan(
        &mut self,
        bank: &TokenBank,
        caller: Address,
        amount: u128,
        duration: i64,
        number_of_payments: u32,
        interest_rate_per_payment: u128,
        message: &str,
    ) -> Result<LoanRequestId> {
        if amount == 0 {
            return Err(ProtocolError::Validation("loan amount must be > 0".to_string()));
        }
        if duration <= 0 {
            return Err(ProtocolError::Validation("loan duration must be > 0".to_string()));
        }
        if number_of_payments == 0 {
            return Err(ProtocolError::Validation(
                "number of payments must be > 0".to_string(),
            ));
        }
        // A node whose operator bond has fallen below the floor stops
        // originating; existing loans are unaffected.
        if !self.staking.meets_bond_floor(bank)? {
            return Err(ProtocolError::InsufficientBond {
                required: self.staking.bond_floor(),
                actual: self.staking.bonded_value(bank)?,
            });
        }
        // Validates the schedule is payable.
        amount_per_payment(amount, interest_rate_per_payment, number_of_payments)?;

        let id = self.loan_request_index;
        self.loan_request_index += 1;
        self.loan_requests.insert(
            id,
            LoanRequest {
                id,
                borrower: caller,
                amount,
                duration,
                number_of_payments,
                interest_rate_per_payment,
                message: message.to_string(),
                status: LoanRequestStatus::Pending,
            },
        );
        Ok(id)
    }

    // === Operator operations ===

    /// Fund a pending request: principal to the borrower, receivable up by
    /// exactly the loan amount.
    pub fn approve_loan_request(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        caller: Address,
        request_id: LoanRequestId,
        now: i64,
    ) -> Result<LoanId> {
        if caller != self.operator {
            return Err(ProtocolError::NotAuthorized(
                "only the node operator approves loans".to_string(),
            ));
        }
        let request = self
            .loan_requests
            .get(&request_id)
            .ok_or(ProtocolError::LoanRequestNotFound(request_id))?;
        if request.status != LoanRequestStatus::Pending {
            return Err(ProtocolError::InvalidState(format!(
                "loan request {request_id} is not pending"
            )));
        }
        let liquid = self.pool_total_liquid_assets_value(venue);
        if request.amount > liquid {
            return Err(ProtocolError::InsufficientLiquidity {
                requested: request.amount,
                available: liquid,
            });
        }
        if !self.staking.meets_bond_floor(bank)? {
            return Err(ProtocolError::InsufficientBond {
                required: self.staking.bond_floor(),
                actual: self.staking.bonded_value(bank)?,
            });
        }
        let amount = request.amount;
        let borrower = request.borrower;
        let duration = request.duration;
        let n = request.number_of_payments;
        let rate = request.interest_rate_per_payment;
        let per_payment = amount_per_payment(amount, rate, n)?;

        self.ensure_vault_covers(bank, venue, amount)?;
        bank.ledger_mut(self.base_token)?
            .transfer(self.address, borrower, amount)?;
        self.base_token_balance -= amount;
        self.accounts_receivable_from_loans += amount;

        let loan_id = self.loan_index;
        self.loan_index += 1;
        self.loans.insert(
            loan_id,
            Loan {
                id: loan_id,
                borrower,
                loan_amount: amount,
                total_loan_duration: duration,
                number_of_payments: n,
                interest_rate_per_payment: rate,
                amount_per_payment: per_payment,
                total_amount_paid: 0,
                number_of_payments_made: 0,
                next_due_date: now + duration / n as i64,
                status: LoanStatus::Active,
                operator_fees_accrued: 0,
            },
        );
        if let Some(request) = self.loan_requests.get_mut(&request_id) {
            request.status = LoanRequestStatus::Approved(loan_id);
        }
        log::info!("node {}: loan {} funded for {}", self.id, loan_id, amount);
        Ok(loan_id)
    }

    /// Reject a pending request. No funds move.
    pub fn deny_loan_request(&mut self, caller: Address, request_id: LoanRequestId) -> Result<()> {
        if caller != self.operator {
            return Err(ProtocolError::NotAuthorized(
                "only the node operator denies loans".to_string(),
            ));
        }
        let request = self
            .loan_requests
            .get_mut(&request_id)
            .ok_or(ProtocolError::LoanRequestNotFound(request_id))?;
        if request.status != LoanRequestStatus::Pending {
            return Err(ProtocolError::InvalidState(format!(
                "loan request {request_id} is not pending"
            )));
        }
        request.status = LoanRequestStatus::Denied;
        Ok(())
    }

    /// Claim accrued operator fees.
    pub fn withdraw_operator_balance(
        &mut self,
        bank: &mut TokenBank,
        caller: Address,
        amount: u128,
        to: Address,
    ) -> Result<()> {
        if caller != self.operator {
            return Err(ProtocolError::NotAuthorized(
                "only the node operator withdraws fees".to_string(),
            ));
        }
        if amount > self.operator_balance {
            return Err(ProtocolError::InsufficientBalance {
                required: amount,
                actual: self.operator_balance,
            });
        }
        bank.ledger_mut(self.base_token)?
            .transfer(self.address, to, amount)?;
        self.operator_balance -= amount;
        Ok(())
    }

    // === Payment and default ===

    /// Pay one installment. Anyone may pay on a borrower's behalf; the fixed
    /// `amount_per_payment` is pulled from the caller.
    pub fn make_loan_payment(
        &mut self,
        bank: &mut TokenBank,
        venue: &mut UnusedFundsVenue,
        caller: Address,
        loan_id: LoanId,
    ) -> Result<()> {
        let (per_payment, principal_delta, fee_delta, completed) = {
            let loan = self.loans.get_mut(&loan_id).ok_or(ProtocolError::LoanNotFound(loan_id))?;
            if loan.status != LoanStatus::Active {
                return Err(ProtocolError::InvalidState(format!(
                    "loan {loan_id} is not active"
                )));
            }
            let per_payment = loan.amount_per_payment;
            bank.ledger_mut(self.base_token)?
                .transfer(caller, self.address, per_payment)?;

            let principal_before = loan.principal_paid();
            loan.total_amount_paid += per_payment;
            loan.number_of_payments_made += 1;
            let principal_delta = loan.principal_paid() - principal_before;

            // Fee is recomputed cumulatively from interest received so far
            // (payments in excess of retired principal), so per-payment floor
            // dust never drifts the operator's cut. This credits the fee as
            // interest arrives with each installment rather than only once
            // total payments exceed the principal; both views settle to
            // floor((total_amount_paid - loan_amount) / 10) at completion.
            let fee_target = loan.interest_paid() / OPERATOR_FEE_DIVISOR;
            let fee_delta = fee_target.saturating_sub(loan.operator_fees_accrued);
            loan.operator_fees_accrued = loan.operator_fees_accrued.max(fee_target);

            let completed = loan.number_of_payments_made == loan.number_of_payments;
            if completed {
                loan.status = LoanStatus::Completed;
            } else {
                loan.next_due_date += loan.payment_interval();
            }
            (per_payment, principal_delta, fee_delta, completed)
        };

        self.accounts_receivable_from_loans -= principal_delta;
        self.operator_balance += fee_delta;
        self.base_token_balance += per_payment - fee_delta;
        self.sweep_idle_funds(bank, venue)?;
        if completed {
            log::info!("node {}: loan {} completed", self.id, loan_id);
        }
        Ok(())
    }

    /// Report a loan overdue past the grace period. Permissionless by design:
    /// this is the protocol's incentive-driven default trigger.
    ///
    /// Flips the loan to Defaulted, writes off the unpaid receivable, and
    /// slashes the staking pool for its protocol-token value.
    pub fn report_overdue_loan(
        &mut self,
        bank: &mut TokenBank,
        loan_id: LoanId,
        now: i64,
    ) -> Result<u128> {
        let unpaid = {
            let loan = self.loans.get_mut(&loan_id).ok_or(ProtocolError::LoanNotFound(loan_id))?;
            if loan.status != LoanStatus::Active {
                return Err(ProtocolError::InvalidState(format!(
                    "loan {loan_id} is not active"
                )));
            }
            let reportable_after = loan.next_due_date + self.grace_period;
            if now <= reportable_after {
                return Err(ProtocolError::NotYetDue {
                    due: reportable_after,
                    now,
                });
            }
            loan.status = LoanStatus::Defaulted;
            loan.principal_outstanding()
        };
        self.accounts_receivable_from_loans -= unpaid;

        let slash_value = mul_div_floor(
            unpaid,
            self.value_multiplier,
            10u128.pow(self.base_decimals as u32),
        );
        let slashed = self.staking.slash(bank, self.treasury, slash_value)?;
        log::info!(
            "node {}: loan {} defaulted, wrote off {}, slashed {}",
            self.id,
            loan_id,
            unpaid,
            slashed
        );
        Ok(slashed)
    }
}
