//! Protocol registry: configuration, lendable tokens and node creation
//!
//! The registry owns every bank node and the protocol-level configuration.
//! Node ids are sequential from 1 and never reused; the distributor relies on
//! the ascending-id iteration order being stable.

use crate::error::{ProtocolError, Result};
use crate::node::{BankNode, BankNodeMeta};
use crate::staking::StakingPool;
use crate::token::TokenBank;
use crate::types::{Address, BankNodeId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Protocol-level configuration fixed at genesis
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Token staking pools are denominated in
    pub protocol_token: TokenId,
    /// Account allowed to manage lendable tokens
    pub configurator: Address,
    /// Destination for slashed collateral
    pub treasury: Address,
    /// Minimum operator bond to create a node
    pub min_bonding_amount: u128,
    /// Seconds past due before an overdue report is accepted
    pub loan_overdue_grace_period: i64,
    /// Staking pool exit lockup
    pub unstake_lockup_period: i64,
}

/// Per-asset lending configuration
///
/// The swap market fields are valuation metadata carried for off-protocol
/// consumers; core accounting only reads `decimals` and `value_multiplier`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LendableTokenConfig {
    pub token: TokenId,
    pub enabled: bool,
    pub swap_market: Address,
    pub swap_market_pool_fee: u32,
    pub decimals: u8,
    /// 10^18-scaled protocol-token value of 10^decimals base units
    pub value_multiplier: u128,
    pub unused_funds_lending_mode: u16,
}

/// Root protocol state: configuration, lendable tokens and all bank nodes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankNodeRegistry {
    config: ProtocolConfig,
    lendable_tokens: HashMap<TokenId, LendableTokenConfig>,
    nodes: BTreeMap<BankNodeId, BankNode>,
    next_node_id: BankNodeId,
}

impl BankNodeRegistry {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            lendable_tokens: HashMap::new(),
            nodes: BTreeMap::new(),
            next_node_id: 1,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn lendable_token(&self, token: TokenId) -> Result<&LendableTokenConfig> {
        self.lendable_tokens
            .get(&token)
            .ok_or(ProtocolError::Unconfigured(token))
    }

    /// Register or overwrite a lendable token. Disabling only gates new node
    /// creation; nodes already lending the token are unaffected.
    pub fn add_lendable_token(
        &mut self,
        caller: Address,
        config: LendableTokenConfig,
    ) -> Result<()> {
        if caller != self.config.configurator {
            return Err(ProtocolError::NotAuthorized(
                "only the configurator manages lendable tokens".to_string(),
            ));
        }
        if config.value_multiplier == 0 {
            return Err(ProtocolError::Validation(
                "value multiplier must be > 0".to_string(),
            ));
        }
        log::info!(
            "lendable token {} registered (enabled: {})",
            config.token,
            config.enabled
        );
        self.lendable_tokens.insert(config.token, config);
        Ok(())
    }

    /// Create a bank node with its staking pool and both share tokens, and
    /// perform the operator's initial bond.
    #[allow(clippy::too_many_arguments)]
    pub fn create_bonded_bank_node(
        &mut self,
        bank: &mut TokenBank,
        operator: Address,
        bond_amount: u128,
        lendable_token: TokenId,
        name: &str,
        website: &str,
        config_uri: &str,
    ) -> Result<BankNodeId> {
        let token_config = self.lendable_token(lendable_token)?;
        if !token_config.enabled {
            return Err(ProtocolError::Unconfigured(lendable_token));
        }
        if bond_amount < self.config.min_bonding_amount {
            return Err(ProtocolError::InsufficientBond {
                required: self.config.min_bonding_amount,
                actual: bond_amount,
            });
        }
        if bond_amount == 0 {
            return Err(ProtocolError::Validation("bond amount must be > 0".to_string()));
        }
        let decimals = token_config.decimals;
        let value_multiplier = token_config.value_multiplier;

        // The bond transfer is the last fallible step; check it up front so
        // a failed creation allocates nothing.
        let held = bank
            .ledger(self.config.protocol_token)?
            .balance_of(operator);
        if held < bond_amount {
            return Err(ProtocolError::InsufficientBalance {
                required: bond_amount,
                actual: held,
            });
        }

        let id = self.next_node_id;
        let pool_token =
            bank.create_token(&format!("bPOOL-{id}"), decimals);
        let stake_token = bank.create_token(&format!("bSTAKE-{id}"), 18);

        let mut staking = StakingPool::new(
            id,
            operator,
            self.config.protocol_token,
            stake_token,
            self.config.min_bonding_amount,
            self.config.unstake_lockup_period,
        );
        staking.bond_tokens(bank, operator, bond_amount)?;

        let node = BankNode::new(
            id,
            operator,
            lendable_token,
            pool_token,
            BankNodeMeta {
                name: name.to_string(),
                website: website.to_string(),
                config_uri: config_uri.to_string(),
            },
            self.config.loan_overdue_grace_period,
            value_multiplier,
            decimals,
            self.config.treasury,
            staking,
        );
        self.next_node_id += 1;
        self.nodes.insert(id, node);
        log::info!("bank node {id} created by {operator}");
        Ok(id)
    }

    pub fn node(&self, id: BankNodeId) -> Result<&BankNode> {
        self.nodes.get(&id).ok_or(ProtocolError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: BankNodeId) -> Result<&mut BankNode> {
        self.nodes
            .get_mut(&id)
            .ok_or(ProtocolError::NodeNotFound(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &BankNode> {
        self.nodes.values()
    }
}
