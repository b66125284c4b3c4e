//! Unused-funds lending venue
//!
//! External yield sink for idle pool liquidity. The venue is opaque: it
//! holds deposits per (depositor, token) and hands them back on demand.
//! Yield accrual, if any, arrives through `donate` on the pool side and is
//! out of scope here.

use crate::error::{ProtocolError, Result};
use crate::token::TokenBank;
use crate::types::{Address, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque external venue holding idle pool funds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnusedFundsVenue {
    /// The venue's own ledger account
    address: Address,

    /// (depositor, token) -> amount on deposit
    deposits: HashMap<(Address, TokenId), u128>,
}

impl Default for UnusedFundsVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl UnusedFundsVenue {
    pub fn new() -> Self {
        Self {
            address: Address::derive("banknote/unused-funds-venue"),
            deposits: HashMap::new(),
        }
    }

    /// The venue's ledger account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Amount a depositor has parked for a token
    pub fn balance_of(&self, depositor: Address, token: TokenId) -> u128 {
        self.deposits
            .get(&(depositor, token))
            .copied()
            .unwrap_or(0)
    }

    /// Park `amount` of `token` from the depositor's ledger account
    pub fn deposit(
        &mut self,
        bank: &mut TokenBank,
        token: TokenId,
        depositor: Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        bank.ledger_mut(token)?
            .transfer(depositor, self.address, amount)?;
        *self.deposits.entry((depositor, token)).or_insert(0) += amount;
        Ok(())
    }

    /// Return `amount` of `token` to the depositor's ledger account
    pub fn withdraw(
        &mut self,
        bank: &mut TokenBank,
        token: TokenId,
        depositor: Address,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let held = self.balance_of(depositor, token);
        if held < amount {
            return Err(ProtocolError::InsufficientLiquidity {
                requested: amount,
                available: held,
            });
        }
        bank.ledger_mut(token)?
            .transfer(self.address, depositor, amount)?;
        self.deposits.insert((depositor, token), held - amount);
        Ok(())
    }
}
