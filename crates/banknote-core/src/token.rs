//! In-memory fungible token ledgers
//!
//! The protocol consumes a standard fungible-token interface (`balance_of`,
//! `transfer`, `transfer_from`, `approve`) with safe-transfer semantics:
//! every transfer either fully succeeds or returns an error with no effect.
//!
//! `TokenBank` owns every ledger the protocol touches — base assets, the
//! protocol token, and the two share tokens each bank node allocates.

use crate::error::{ProtocolError, Result};
use crate::types::{Address, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Balances and allowances for one fungible token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Token symbol, e.g. "NOTE" or "pUSDX"
    pub symbol: String,

    /// Decimal places
    pub decimals: u8,

    /// Total minted supply
    total_supply: u128,

    /// Account balances
    balances: HashMap<Address, u128>,

    /// (owner, spender) -> remaining allowance
    allowances: HashMap<(Address, Address), u128>,
}

impl TokenLedger {
    /// Create an empty ledger
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Balance of an account
    pub fn balance_of(&self, who: Address) -> u128 {
        self.balances.get(&who).copied().unwrap_or(0)
    }

    /// Total minted supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    /// Mint new tokens to an account
    pub fn mint(&mut self, to: Address, amount: u128) {
        *self.balances.entry(to).or_insert(0) += amount;
        self.total_supply += amount;
    }

    /// Burn tokens from an account
    pub fn burn(&mut self, from: Address, amount: u128) -> Result<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(ProtocolError::InsufficientBalance {
                required: amount,
                actual: balance,
            });
        }
        self.balances.insert(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Move tokens between accounts
    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<()> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(ProtocolError::InsufficientBalance {
                required: amount,
                actual: from_balance,
            });
        }
        self.balances.insert(from, from_balance - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s balance
    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.allowances.insert((owner, spender), amount);
    }

    /// Spend an allowance: move `amount` from `from` to `to` on behalf of `spender`
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(ProtocolError::InsufficientAllowance {
                required: amount,
                actual: allowed,
            });
        }
        // Balance is checked inside transfer before any mutation.
        self.transfer(from, to, amount)?;
        self.allowances.insert((from, spender), allowed - amount);
        Ok(())
    }
}

/// Arena of all token ledgers, indexed by `TokenId`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenBank {
    ledgers: Vec<TokenLedger>,
}

impl TokenBank {
    /// Create an empty token bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token ledger
    pub fn create_token(&mut self, symbol: &str, decimals: u8) -> TokenId {
        let id = TokenId(self.ledgers.len() as u32);
        self.ledgers.push(TokenLedger::new(symbol, decimals));
        log::debug!("created token {} ({})", id, symbol);
        id
    }

    /// Look up a ledger
    pub fn ledger(&self, id: TokenId) -> Result<&TokenLedger> {
        self.ledgers
            .get(id.0 as usize)
            .ok_or(ProtocolError::TokenNotFound(id))
    }

    /// Look up a ledger mutably
    pub fn ledger_mut(&mut self, id: TokenId) -> Result<&mut TokenLedger> {
        self.ledgers
            .get_mut(id.0 as usize)
            .ok_or(ProtocolError::TokenNotFound(id))
    }

    /// Number of registered tokens
    pub fn token_count(&self) -> usize {
        self.ledgers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut ledger = TokenLedger::new("NOTE", 18);
        ledger.mint(addr(1), 1000);

        assert_eq!(ledger.total_supply(), 1000);
        assert_eq!(ledger.balance_of(addr(1)), 1000);

        ledger.transfer(addr(1), addr(2), 400).unwrap();
        assert_eq!(ledger.balance_of(addr(1)), 600);
        assert_eq!(ledger.balance_of(addr(2)), 400);
        assert_eq!(ledger.total_supply(), 1000);
    }

    #[test]
    fn test_transfer_insufficient_balance_has_no_effect() {
        let mut ledger = TokenLedger::new("NOTE", 18);
        ledger.mint(addr(1), 100);

        let err = ledger.transfer(addr(1), addr(2), 101).unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(addr(1)), 100);
        assert_eq!(ledger.balance_of(addr(2)), 0);
    }

    #[test]
    fn test_transfer_from_respects_allowance() {
        let mut ledger = TokenLedger::new("USDX", 18);
        ledger.mint(addr(1), 1000);
        ledger.approve(addr(1), addr(9), 300);

        ledger.transfer_from(addr(9), addr(1), addr(2), 250).unwrap();
        assert_eq!(ledger.balance_of(addr(2)), 250);
        assert_eq!(ledger.allowance(addr(1), addr(9)), 50);

        let err = ledger
            .transfer_from(addr(9), addr(1), addr(2), 51)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_failed_transfer_from_does_not_consume_allowance() {
        let mut ledger = TokenLedger::new("USDX", 18);
        ledger.mint(addr(1), 10);
        ledger.approve(addr(1), addr(9), 100);

        // Allowance covers it but the balance does not.
        let err = ledger
            .transfer_from(addr(9), addr(1), addr(2), 50)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientBalance { .. }));
        assert_eq!(ledger.allowance(addr(1), addr(9)), 100);
    }

    #[test]
    fn test_burn() {
        let mut ledger = TokenLedger::new("pUSDX", 18);
        ledger.mint(addr(1), 500);
        ledger.burn(addr(1), 200).unwrap();

        assert_eq!(ledger.balance_of(addr(1)), 300);
        assert_eq!(ledger.total_supply(), 300);

        assert!(ledger.burn(addr(1), 301).is_err());
    }

    #[test]
    fn test_random_transfers_conserve_supply() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut ledger = TokenLedger::new("USDX", 18);
        let accounts: Vec<Address> = (1..=8).map(addr).collect();
        for account in &accounts {
            ledger.mint(*account, 1000);
        }

        for _ in 0..500 {
            let from = accounts[rng.gen_range(0..accounts.len())];
            let to = accounts[rng.gen_range(0..accounts.len())];
            let amount = rng.gen_range(0..1500);
            // Failed transfers are fine; they just must not move anything.
            let _ = ledger.transfer(from, to, amount);
        }

        let held: u128 = accounts.iter().map(|a| ledger.balance_of(*a)).sum();
        assert_eq!(held, 8000);
        assert_eq!(ledger.total_supply(), 8000);
    }

    #[test]
    fn test_token_bank_lookup() {
        let mut bank = TokenBank::new();
        let note = bank.create_token("NOTE", 18);
        let usdx = bank.create_token("USDX", 18);

        assert_eq!(note, TokenId(0));
        assert_eq!(usdx, TokenId(1));
        assert_eq!(bank.ledger(note).unwrap().symbol, "NOTE");
        assert!(matches!(
            bank.ledger(TokenId(5)),
            Err(ProtocolError::TokenNotFound(_))
        ));
    }
}
