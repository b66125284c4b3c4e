//! Node collateral staking pool
//!
//! Each bank node carries a staking pool denominated in the protocol token.
//! One share supply covers two labeled sub-balances:
//!
//! - **bonded** — the operator's first-loss collateral. Bonded shares are
//!   tracked internally and never minted to the ledger, so they are locked
//!   by construction and excluded from `pool_tokens_circulating`.
//! - **staked** — third-party collateral. Staked shares are ordinary ledger
//!   tokens; exit goes through a lockup timer.
//!
//! Slashing reduces pool value without burning staker shares: bonded shares
//! are burned at the pre-slash price until exhausted (first-loss), then any
//! remaining loss falls pro-rata on all holders.

use crate::error::{ProtocolError, Result};
use crate::pool::{assets_for_withdraw, mul_div_floor, shares_for_deposit};
use crate::token::TokenBank;
use crate::types::{Address, BankNodeId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unbond floor: bonded value may not drop below 75% of the minimum bond.
pub const UNBOND_FLOOR_NUMERATOR: u128 = 75;
pub const UNBOND_FLOOR_DENOMINATOR: u128 = 100;

/// Shares escrowed for withdrawal, claimable after the lockup elapses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingUnstake {
    pub shares: u128,
    pub unlock_at: i64,
}

/// Staking pool state for one bank node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakingPool {
    /// The pool's ledger account
    address: Address,

    /// Operator allowed to bond/unbond
    operator: Address,

    /// Protocol token the pool is denominated in
    protocol_token: TokenId,

    /// Share token minted to third-party stakers
    share_token: TokenId,

    /// Total protocol-token asset value (bonded + staked + donated - slashed)
    base_token_balance: u128,

    /// Operator's locked shares, counted in conversion supply but never
    /// minted to the ledger
    bonded_shares: u128,

    /// Total protocol tokens ever bonded by the operator
    tokens_bonded_all_time: u128,

    /// Seconds between unstake and withdrawal
    unstake_lockup_period: i64,

    /// Minimum bond configured at node creation
    min_bonding_amount: u128,

    /// Escrowed exits per staker
    pending_unstakes: HashMap<Address, Vec<PendingUnstake>>,
}

impl StakingPool {
    pub fn new(
        node_id: BankNodeId,
        operator: Address,
        protocol_token: TokenId,
        share_token: TokenId,
        min_bonding_amount: u128,
        unstake_lockup_period: i64,
    ) -> Self {
        Self {
            address: Address::derive(&format!("banknote/staking-pool/{node_id}")),
            operator,
            protocol_token,
            share_token,
            base_token_balance: 0,
            bonded_shares: 0,
            tokens_bonded_all_time: 0,
            unstake_lockup_period,
            min_bonding_amount,
            pending_unstakes: HashMap::new(),
        }
    }

    // === Views ===

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn share_token(&self) -> TokenId {
        self.share_token
    }

    /// Total protocol-token value backing the pool
    pub fn pool_total_assets_value(&self) -> u128 {
        self.base_token_balance
    }

    /// Share supply used for conversions: ledger shares plus locked bonded shares
    fn conversion_supply(&self, bank: &TokenBank) -> Result<u128> {
        Ok(bank.ledger(self.share_token)?.total_supply() + self.bonded_shares)
    }

    /// Third-party shares in circulation (bonded shares are locked, not circulating)
    pub fn pool_tokens_circulating(&self, bank: &TokenBank) -> Result<u128> {
        Ok(bank.ledger(self.share_token)?.total_supply())
    }

    /// Protocol tokens currently locked in the pool
    pub fn total_tokens_locked(&self) -> u128 {
        self.base_token_balance
    }

    pub fn tokens_bonded_all_time(&self) -> u128 {
        self.tokens_bonded_all_time
    }

    pub fn unstake_lockup_period(&self) -> i64 {
        self.unstake_lockup_period
    }

    /// Shares minted for a deposit of `amount`
    pub fn pool_deposit_conversion(&self, bank: &TokenBank, amount: u128) -> Result<u128> {
        Ok(shares_for_deposit(
            self.base_token_balance,
            self.conversion_supply(bank)?,
            amount,
        ))
    }

    /// Assets returned for redeeming `shares`
    pub fn pool_withdraw_conversion(&self, bank: &TokenBank, shares: u128) -> Result<u128> {
        Ok(assets_for_withdraw(
            self.base_token_balance,
            self.conversion_supply(bank)?,
            shares,
        ))
    }

    /// Current value of the operator's bonded shares
    pub fn bonded_value(&self, bank: &TokenBank) -> Result<u128> {
        self.pool_withdraw_conversion(bank, self.bonded_shares)
    }

    /// Minimum bonded value below which unbonding and new loan activity stop
    pub fn bond_floor(&self) -> u128 {
        mul_div_floor(
            self.min_bonding_amount,
            UNBOND_FLOOR_NUMERATOR,
            UNBOND_FLOOR_DENOMINATOR,
        )
    }

    /// Whether bonded collateral clears the 75% floor (gates new loans)
    pub fn meets_bond_floor(&self, bank: &TokenBank) -> Result<bool> {
        Ok(self.bonded_value(bank)? >= self.bond_floor())
    }

    // === Operations ===

    /// Lock operator collateral. Shares are tracked internally, never minted.
    pub fn bond_tokens(&mut self, bank: &mut TokenBank, caller: Address, amount: u128) -> Result<u128> {
        if caller != self.operator {
            return Err(ProtocolError::NotAuthorized(
                "only the node operator may bond".to_string(),
            ));
        }
        if amount == 0 {
            return Err(ProtocolError::Validation("bond amount must be > 0".to_string()));
        }
        let shares = self.pool_deposit_conversion(bank, amount)?;
        bank.ledger_mut(self.protocol_token)?
            .transfer(caller, self.address, amount)?;
        self.base_token_balance += amount;
        self.bonded_shares += shares;
        self.tokens_bonded_all_time += amount;
        log::debug!("operator bonded {} ({} shares)", amount, shares);
        Ok(shares)
    }

    /// Third-party stake; mints circulating shares.
    pub fn stake_tokens(&mut self, bank: &mut TokenBank, caller: Address, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Err(ProtocolError::Validation("stake amount must be > 0".to_string()));
        }
        let shares = self.pool_deposit_conversion(bank, amount)?;
        bank.ledger_mut(self.protocol_token)?
            .transfer(caller, self.address, amount)?;
        self.base_token_balance += amount;
        bank.ledger_mut(self.share_token)?.mint(caller, shares);
        Ok(shares)
    }

    /// Operator releases bonded shares, immediately, down to the 75% floor.
    pub fn unbond_tokens(&mut self, bank: &mut TokenBank, caller: Address, shares: u128) -> Result<u128> {
        if caller != self.operator {
            return Err(ProtocolError::NotAuthorized(
                "only the node operator may unbond".to_string(),
            ));
        }
        if shares == 0 || shares > self.bonded_shares {
            return Err(ProtocolError::Validation(format!(
                "unbond shares out of range: {shares} of {}",
                self.bonded_shares
            )));
        }
        let value = self.pool_withdraw_conversion(bank, shares)?;
        let bonded_value = self.bonded_value(bank)?;
        let remaining = bonded_value - value;
        if remaining < self.bond_floor() {
            return Err(ProtocolError::InsufficientBond {
                required: self.bond_floor(),
                actual: remaining,
            });
        }
        bank.ledger_mut(self.protocol_token)?
            .transfer(self.address, caller, value)?;
        self.bonded_shares -= shares;
        self.base_token_balance -= value;
        Ok(value)
    }

    /// Escrow staker shares and start the lockup timer.
    pub fn unstake_tokens(
        &mut self,
        bank: &mut TokenBank,
        caller: Address,
        shares: u128,
        now: i64,
    ) -> Result<()> {
        if shares == 0 {
            return Err(ProtocolError::Validation("unstake shares must be > 0".to_string()));
        }
        // Escrow at the pool address so the shares cannot move during lockup.
        bank.ledger_mut(self.share_token)?
            .transfer(caller, self.address, shares)?;
        self.pending_unstakes
            .entry(caller)
            .or_default()
            .push(PendingUnstake {
                shares,
                unlock_at: now + self.unstake_lockup_period,
            });
        Ok(())
    }

    /// Redeem every matured escrow entry at the current share price.
    pub fn complete_unstake(
        &mut self,
        bank: &mut TokenBank,
        caller: Address,
        now: i64,
    ) -> Result<u128> {
        let pending = self.pending_unstakes.entry(caller).or_default();
        let mut matured: u128 = 0;
        pending.retain(|entry| {
            if entry.unlock_at <= now {
                matured += entry.shares;
                false
            } else {
                true
            }
        });
        if matured == 0 {
            return Err(ProtocolError::InvalidState(
                "no unstake past its lockup period".to_string(),
            ));
        }
        // Valuation happens at completion, so slashes during the lockup are
        // borne by the exiting staker as well.
        let value = self.pool_withdraw_conversion(bank, matured)?;
        bank.ledger_mut(self.share_token)?.burn(self.address, matured)?;
        bank.ledger_mut(self.protocol_token)?
            .transfer(self.address, caller, value)?;
        self.base_token_balance -= value;
        Ok(value)
    }

    /// Permissionless value injection without share minting.
    pub fn donate(&mut self, bank: &mut TokenBank, caller: Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(ProtocolError::Validation("donation must be > 0".to_string()));
        }
        bank.ledger_mut(self.protocol_token)?
            .transfer(caller, self.address, amount)?;
        self.base_token_balance += amount;
        Ok(())
    }

    /// Reduce pool value by up to `amount`, bonded collateral first.
    ///
    /// Burning bonded shares at the pre-slash price keeps the share price
    /// flat for stakers until the bond is exhausted; after that the loss is
    /// socialized pro-rata. Slashed tokens move to `recipient`. Returns the
    /// value actually slashed.
    pub fn slash(
        &mut self,
        bank: &mut TokenBank,
        recipient: Address,
        amount: u128,
    ) -> Result<u128> {
        let loss = amount.min(self.base_token_balance);
        if loss == 0 {
            return Ok(0);
        }
        let supply = self.conversion_supply(bank)?;
        let bonded_value = self.bonded_value(bank)?;
        if loss >= bonded_value {
            self.bonded_shares = 0;
        } else {
            let shares_burned = mul_div_floor(loss, supply, self.base_token_balance);
            self.bonded_shares -= shares_burned.min(self.bonded_shares);
        }
        bank.ledger_mut(self.protocol_token)?
            .transfer(self.address, recipient, loss)?;
        self.base_token_balance -= loss;
        log::info!("staking pool slashed for {}", loss);
        Ok(loss)
    }
}
