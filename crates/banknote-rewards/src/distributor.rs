//! Protocol-wide reward distribution across bank nodes
//!
//! The distributor splits each reward tranche across nodes in proportion to
//! their staking pools' protocol-token value, then streams each node's share
//! to holders of that node's liquidity share token.

use crate::stream::RewardStream;
use banknote_core::error::{ProtocolError, Result};
use banknote_core::pool::mul_div_floor;
use banknote_core::registry::BankNodeRegistry;
use banknote_core::token::TokenBank;
use banknote_core::types::{Address, BankNodeId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardsDistributor {
    /// The distributor's ledger account; holds staked pool tokens and
    /// undripped rewards
    address: Address,

    /// Token paid out as rewards
    reward_token: TokenId,

    /// Account allowed to distribute and tune durations
    admin: Address,

    /// Streaming period applied to newly seen nodes
    default_duration: i64,

    /// One stream per bank node, in node-id order
    streams: BTreeMap<BankNodeId, RewardStream>,
}

impl RewardsDistributor {
    pub fn new(reward_token: TokenId, admin: Address, default_duration: i64) -> Self {
        Self {
            address: Address::derive("banknote/rewards-distributor"),
            reward_token,
            admin,
            default_duration,
            streams: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn stream(&self, node_id: BankNodeId) -> Option<&RewardStream> {
        self.streams.get(&node_id)
    }

    pub fn earned(&self, node_id: BankNodeId, account: Address, now: i64) -> u128 {
        self.streams
            .get(&node_id)
            .map(|s| s.earned(account, now))
            .unwrap_or(0)
    }

    /// Per-node share of `total`: `floor(total * w_i / sum(w))` with `w_i`
    /// the node's staking-pool value. Flooring loses dust; the undistributed
    /// remainder simply stays with the caller.
    pub fn token_distribution(
        &self,
        registry: &BankNodeRegistry,
        total: u128,
    ) -> Vec<(BankNodeId, u128)> {
        let weights: Vec<(BankNodeId, u128)> = registry
            .nodes()
            .map(|node| (node.id, node.staking.pool_total_assets_value()))
            .collect();
        let sum: u128 = weights.iter().map(|(_, w)| w).sum();
        weights
            .into_iter()
            .map(|(id, w)| (id, mul_div_floor(total, w, sum)))
            .collect()
    }

    /// Pull `total` reward tokens from the caller and fold each node's share
    /// into its stream.
    pub fn distribute(
        &mut self,
        bank: &mut TokenBank,
        registry: &BankNodeRegistry,
        caller: Address,
        total: u128,
        now: i64,
    ) -> Result<()> {
        if caller != self.admin {
            return Err(ProtocolError::NotAuthorized(
                "only the rewards admin distributes".to_string(),
            ));
        }
        let shares = self.token_distribution(registry, total);
        let streamed: u128 = shares.iter().map(|(_, s)| s).sum();
        if streamed == 0 {
            return Err(ProtocolError::Validation(
                "nothing to distribute: no staked node value".to_string(),
            ));
        }
        // Only the streamed portion is pulled; flooring dust never leaves
        // the caller.
        bank.ledger_mut(self.reward_token)?
            .transfer(caller, self.address, streamed)?;
        for (node_id, share) in shares {
            if share == 0 {
                continue;
            }
            self.streams
                .entry(node_id)
                .or_insert_with(|| RewardStream::new(self.default_duration))
                .notify_reward_amount(share, now)?;
        }
        log::info!("distributed {} reward tokens across nodes", streamed);
        Ok(())
    }

    /// Stake a node's liquidity share tokens to earn its stream.
    pub fn stake(
        &mut self,
        bank: &mut TokenBank,
        registry: &BankNodeRegistry,
        caller: Address,
        node_id: BankNodeId,
        amount: u128,
        now: i64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(ProtocolError::Validation("stake amount must be > 0".to_string()));
        }
        let pool_token = registry.node(node_id)?.pool_token();
        bank.ledger_mut(pool_token)?
            .transfer(caller, self.address, amount)?;
        self.streams
            .entry(node_id)
            .or_insert_with(|| RewardStream::new(self.default_duration))
            .record_stake(caller, amount, now);
        Ok(())
    }

    /// Withdraw staked pool tokens; accrued rewards stay claimable.
    pub fn withdraw(
        &mut self,
        bank: &mut TokenBank,
        registry: &BankNodeRegistry,
        caller: Address,
        node_id: BankNodeId,
        amount: u128,
        now: i64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(ProtocolError::Validation(
                "withdraw amount must be > 0".to_string(),
            ));
        }
        let pool_token = registry.node(node_id)?.pool_token();
        let stream = self
            .streams
            .get_mut(&node_id)
            .ok_or(ProtocolError::NodeNotFound(node_id))?;
        stream.record_withdraw(caller, amount, now)?;
        bank.ledger_mut(pool_token)?
            .transfer(self.address, caller, amount)?;
        Ok(())
    }

    /// Claim everything earned so far on a node's stream.
    pub fn get_reward(
        &mut self,
        bank: &mut TokenBank,
        caller: Address,
        node_id: BankNodeId,
        now: i64,
    ) -> Result<u128> {
        let stream = self
            .streams
            .get_mut(&node_id)
            .ok_or(ProtocolError::NodeNotFound(node_id))?;
        let reward = stream.take_reward(caller, now);
        if reward > 0 {
            bank.ledger_mut(self.reward_token)?
                .transfer(self.address, caller, reward)?;
        }
        Ok(reward)
    }

    /// Withdraw the full stake and claim rewards in one call.
    pub fn exit(
        &mut self,
        bank: &mut TokenBank,
        registry: &BankNodeRegistry,
        caller: Address,
        node_id: BankNodeId,
        now: i64,
    ) -> Result<u128> {
        let staked = self
            .streams
            .get(&node_id)
            .ok_or(ProtocolError::NodeNotFound(node_id))?
            .balance_of(caller);
        if staked > 0 {
            self.withdraw(bank, registry, caller, node_id, staked, now)?;
        }
        self.get_reward(bank, caller, node_id, now)
    }

    /// Change a node's streaming period. Only between periods.
    pub fn set_rewards_duration(
        &mut self,
        caller: Address,
        node_id: BankNodeId,
        duration: i64,
        now: i64,
    ) -> Result<()> {
        if caller != self.admin {
            return Err(ProtocolError::NotAuthorized(
                "only the rewards admin sets durations".to_string(),
            ));
        }
        self.streams
            .get_mut(&node_id)
            .ok_or(ProtocolError::NodeNotFound(node_id))?
            .set_duration(duration, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banknote_core::constants::{
        DEFAULT_MIN_BONDING_AMOUNT, DEFAULT_REWARD_DURATION, LOAN_OVERDUE_GRACE_PERIOD, ONE_TOKEN,
        UNSTAKE_LOCKUP_PERIOD,
    };
    use banknote_core::registry::{LendableTokenConfig, ProtocolConfig};
    use banknote_core::venue::UnusedFundsVenue;
    use proptest::prelude::*;

    const ONE: u128 = ONE_TOKEN;
    const WEEK: i64 = DEFAULT_REWARD_DURATION;

    struct Fixture {
        bank: TokenBank,
        venue: UnusedFundsVenue,
        registry: BankNodeRegistry,
        note: TokenId,
        admin: Address,
        operator: Address,
        lender: Address,
    }

    fn setup(node_bonds: &[u128]) -> Fixture {
        let mut bank = TokenBank::new();
        let note = bank.create_token("NOTE", 18);
        let usdx = bank.create_token("USDX", 18);
        let admin = Address::new([1u8; 32]);
        let operator = Address::new([2u8; 32]);
        let lender = Address::new([3u8; 32]);
        bank.ledger_mut(note).unwrap().mint(admin, 100_000_000 * ONE);
        bank.ledger_mut(note).unwrap().mint(operator, 100_000_000 * ONE);
        bank.ledger_mut(usdx).unwrap().mint(lender, 1_000_000 * ONE);

        let mut registry = BankNodeRegistry::new(ProtocolConfig {
            protocol_token: note,
            configurator: admin,
            treasury: Address::derive("banknote/treasury"),
            min_bonding_amount: DEFAULT_MIN_BONDING_AMOUNT,
            loan_overdue_grace_period: LOAN_OVERDUE_GRACE_PERIOD,
            unstake_lockup_period: UNSTAKE_LOCKUP_PERIOD,
        });
        registry
            .add_lendable_token(
                admin,
                LendableTokenConfig {
                    token: usdx,
                    enabled: true,
                    swap_market: Address::derive("banknote/test/swap-market"),
                    swap_market_pool_fee: 3000,
                    decimals: 18,
                    value_multiplier: ONE,
                    unused_funds_lending_mode: 1,
                },
            )
            .unwrap();
        for bond in node_bonds {
            registry
                .create_bonded_bank_node(
                    &mut bank,
                    operator,
                    *bond,
                    usdx,
                    "Node",
                    "https://example.com",
                    "https://example.com/config.json",
                )
                .unwrap();
        }
        Fixture {
            bank,
            venue: UnusedFundsVenue::new(),
            registry,
            note,
            admin,
            operator,
            lender,
        }
    }

    #[test]
    fn test_distribution_is_proportional_to_staking_pool_value() {
        let f = setup(&[300_000 * ONE, 100_000 * ONE]);
        let distributor = RewardsDistributor::new(f.note, f.admin, WEEK);

        let shares = distributor.token_distribution(&f.registry, 1000 * ONE);
        assert_eq!(shares, vec![(1, 750 * ONE), (2, 250 * ONE)]);
    }

    #[test]
    fn test_distribute_requires_admin_and_staked_value() {
        let mut f = setup(&[100_000 * ONE]);
        let mut distributor = RewardsDistributor::new(f.note, f.admin, WEEK);

        let err = distributor
            .distribute(&mut f.bank, &f.registry, f.operator, 1000 * ONE, 0)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotAuthorized(_)));

        let empty = setup(&[]);
        let err = distributor
            .distribute(&mut f.bank, &empty.registry, f.admin, 1000 * ONE, 0)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn test_stake_earn_claim_lifecycle() {
        let mut f = setup(&[100_000 * ONE]);
        let mut distributor = RewardsDistributor::new(f.note, f.admin, WEEK);

        // Lender provides pool liquidity, then stakes the pool tokens.
        let shares = {
            let node = f.registry.node_mut(1).unwrap();
            node.add_liquidity(&mut f.bank, &mut f.venue, f.lender, 50_000 * ONE)
                .unwrap()
        };
        distributor
            .stake(&mut f.bank, &f.registry, f.lender, 1, shares, 0)
            .unwrap();
        // Pool tokens now sit at the distributor.
        let pool_token = f.registry.node(1).unwrap().pool_token();
        assert_eq!(f.bank.ledger(pool_token).unwrap().balance_of(f.lender), 0);

        distributor
            .distribute(&mut f.bank, &f.registry, f.admin, 700 * ONE, 0)
            .unwrap();

        // Up to the accumulator's flooring dust, the sole staker earns the
        // whole drip.
        let earned = distributor.earned(1, f.lender, WEEK);
        let dripped = distributor.stream(1).unwrap().reward_rate() * WEEK as u128;
        assert!(earned > 0);
        assert!(earned <= dripped);
        assert!(dripped - earned < ONE);

        let claimed = distributor
            .get_reward(&mut f.bank, f.lender, 1, WEEK)
            .unwrap();
        assert_eq!(claimed, earned);
        assert_eq!(f.bank.ledger(f.note).unwrap().balance_of(f.lender), claimed);
        assert_eq!(distributor.earned(1, f.lender, WEEK), 0);
    }

    #[test]
    fn test_exit_returns_stake_and_rewards() {
        let mut f = setup(&[100_000 * ONE]);
        let mut distributor = RewardsDistributor::new(f.note, f.admin, WEEK);
        let shares = {
            let node = f.registry.node_mut(1).unwrap();
            node.add_liquidity(&mut f.bank, &mut f.venue, f.lender, 50_000 * ONE)
                .unwrap()
        };
        distributor
            .stake(&mut f.bank, &f.registry, f.lender, 1, shares, 0)
            .unwrap();
        distributor
            .distribute(&mut f.bank, &f.registry, f.admin, 700 * ONE, 0)
            .unwrap();

        let reward = distributor
            .exit(&mut f.bank, &f.registry, f.lender, 1, WEEK)
            .unwrap();
        assert!(reward > 0);
        let pool_token = f.registry.node(1).unwrap().pool_token();
        assert_eq!(
            f.bank.ledger(pool_token).unwrap().balance_of(f.lender),
            shares
        );
        assert_eq!(distributor.stream(1).unwrap().total_staked(), 0);
    }

    proptest! {
        /// The split matches an independent floor-division reference and
        /// never exceeds the total.
        #[test]
        fn prop_distribution_matches_floor_reference(
            bond_a in DEFAULT_MIN_BONDING_AMOUNT..10_000_000 * ONE,
            bond_b in DEFAULT_MIN_BONDING_AMOUNT..10_000_000 * ONE,
            total in 0u128..1_000_000 * ONE,
        ) {
            let f = setup(&[bond_a, bond_b]);
            let distributor = RewardsDistributor::new(f.note, f.admin, WEEK);
            let shares = distributor.token_distribution(&f.registry, total);

            let sum = bond_a + bond_b;
            let reference = |w: u128| {
                (primitive_types::U256::from(total) * primitive_types::U256::from(w)
                    / primitive_types::U256::from(sum))
                .as_u128()
            };
            prop_assert_eq!(shares[0], (1, reference(bond_a)));
            prop_assert_eq!(shares[1], (2, reference(bond_b)));
            prop_assert!(shares[0].1 + shares[1].1 <= total);
        }
    }
}
