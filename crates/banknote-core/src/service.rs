//! Serialized facade over the whole protocol state
//!
//! Core operations thread `&mut TokenBank` and `&mut UnusedFundsVenue`
//! explicitly; `ProtocolService` bundles them with the registry behind one
//! `parking_lot::Mutex` so callers get a single serialization point instead
//! of juggling three borrows.

use crate::registry::{BankNodeRegistry, ProtocolConfig};
use crate::token::TokenBank;
use crate::venue::UnusedFundsVenue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Snapshot format version. Bump on any breaking change to the state
/// structs; loading an older snapshot requires an explicit migration.
pub const STATE_VERSION: u32 = 1;

/// All mutable protocol state, as one unit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolState {
    pub version: u32,
    pub bank: TokenBank,
    pub venue: UnusedFundsVenue,
    pub registry: BankNodeRegistry,
}

/// Thread-safe handle to the protocol state
pub struct ProtocolService {
    state: Mutex<ProtocolState>,
}

impl ProtocolService {
    pub fn new(bank: TokenBank, config: ProtocolConfig) -> Self {
        Self {
            state: Mutex::new(ProtocolState {
                version: STATE_VERSION,
                bank,
                venue: UnusedFundsVenue::new(),
                registry: BankNodeRegistry::new(config),
            }),
        }
    }

    /// Run `f` with exclusive access to the protocol state.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProtocolState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Snapshot the current state.
    pub fn snapshot(&self) -> ProtocolState {
        self.state.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        DEFAULT_MIN_BONDING_AMOUNT, LOAN_OVERDUE_GRACE_PERIOD, ONE_TOKEN, UNSTAKE_LOCKUP_PERIOD,
    };
    use crate::registry::LendableTokenConfig;
    use crate::types::Address;

    #[test]
    fn test_full_flow_through_the_facade() {
        let mut bank = TokenBank::new();
        let note = bank.create_token("NOTE", 18);
        let usdx = bank.create_token("USDX", 18);
        let configurator = Address::new([1u8; 32]);
        let operator = Address::new([2u8; 32]);
        let lender = Address::new([3u8; 32]);
        bank.ledger_mut(note)
            .unwrap()
            .mint(operator, 1_000_000 * ONE_TOKEN);
        bank.ledger_mut(usdx)
            .unwrap()
            .mint(lender, 1_000_000 * ONE_TOKEN);

        let service = ProtocolService::new(
            bank,
            ProtocolConfig {
                protocol_token: note,
                configurator,
                treasury: Address::derive("banknote/treasury"),
                min_bonding_amount: DEFAULT_MIN_BONDING_AMOUNT,
                loan_overdue_grace_period: LOAN_OVERDUE_GRACE_PERIOD,
                unstake_lockup_period: UNSTAKE_LOCKUP_PERIOD,
            },
        );

        let node_id = service.with(|state| {
            state
                .registry
                .add_lendable_token(
                    configurator,
                    LendableTokenConfig {
                        token: usdx,
                        enabled: true,
                        swap_market: Address::derive("banknote/test/swap-market"),
                        swap_market_pool_fee: 3000,
                        decimals: 18,
                        value_multiplier: ONE_TOKEN,
                        unused_funds_lending_mode: 1,
                    },
                )
                .unwrap();
            state
                .registry
                .create_bonded_bank_node(
                    &mut state.bank,
                    operator,
                    DEFAULT_MIN_BONDING_AMOUNT,
                    usdx,
                    "Node",
                    "https://example.com",
                    "https://example.com/config.json",
                )
                .unwrap()
        });

        service.with(|state| {
            let ProtocolState {
                bank,
                venue,
                registry,
                ..
            } = state;
            let node = registry.node_mut(node_id).unwrap();
            node.add_liquidity(bank, venue, lender, 50_000 * ONE_TOKEN)
                .unwrap();
            assert_eq!(node.pool_total_assets_value(venue), 50_000 * ONE_TOKEN);
        });

        let snapshot = service.snapshot();
        assert_eq!(snapshot.version, STATE_VERSION);
        assert_eq!(snapshot.registry.node_count(), 1);
    }
}
