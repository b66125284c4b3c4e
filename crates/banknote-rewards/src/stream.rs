//! Linear reward stream for one bank node
//!
//! Rewards drip at a fixed rate over a period. Accounting is the classic
//! accumulator scheme: `reward_per_token_stored` integrates
//! `rate / total_staked` over time at 10^18 precision, and every mutation
//! checkpoints the accumulator first so balance changes never retroactively
//! apply to past time.

use banknote_core::error::{ProtocolError, Result};
use banknote_core::pool::mul_div_floor;
use banknote_core::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PRECISION: u128 = 1_000_000_000_000_000_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardStream {
    /// Length of a streaming period in seconds
    duration: i64,
    /// End of the current period
    period_finish: i64,
    /// Reward tokens dripped per second
    reward_rate: u128,
    last_update_time: i64,
    /// Accumulated reward per staked token, 10^18-scaled
    reward_per_token_stored: u128,
    total_staked: u128,
    balances: HashMap<Address, u128>,
    user_reward_per_token_paid: HashMap<Address, u128>,
    rewards: HashMap<Address, u128>,
}

impl RewardStream {
    pub fn new(duration: i64) -> Self {
        Self {
            duration,
            period_finish: 0,
            reward_rate: 0,
            last_update_time: 0,
            reward_per_token_stored: 0,
            total_staked: 0,
            balances: HashMap::new(),
            user_reward_per_token_paid: HashMap::new(),
            rewards: HashMap::new(),
        }
    }

    // === Views ===

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn period_finish(&self) -> i64 {
        self.period_finish
    }

    pub fn reward_rate(&self) -> u128 {
        self.reward_rate
    }

    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn last_time_reward_applicable(&self, now: i64) -> i64 {
        now.min(self.period_finish)
    }

    /// Accumulator value as of `now`
    pub fn reward_per_token(&self, now: i64) -> u128 {
        if self.total_staked == 0 {
            return self.reward_per_token_stored;
        }
        let elapsed =
            (self.last_time_reward_applicable(now) - self.last_update_time).max(0) as u128;
        // Saturating: a dust-sized total_staked can clamp the accumulator at
        // u128::MAX and further accrual must not wrap.
        self.reward_per_token_stored
            .saturating_add(mul_div_floor(
                elapsed * self.reward_rate,
                PRECISION,
                self.total_staked,
            ))
    }

    /// Reward claimable by `account` as of `now`
    pub fn earned(&self, account: Address, now: i64) -> u128 {
        let paid = self
            .user_reward_per_token_paid
            .get(&account)
            .copied()
            .unwrap_or(0);
        let accrued = mul_div_floor(
            self.balance_of(account),
            self.reward_per_token(now).saturating_sub(paid),
            PRECISION,
        );
        accrued.saturating_add(self.rewards.get(&account).copied().unwrap_or(0))
    }

    // === Mutations ===

    fn checkpoint(&mut self, account: Option<Address>, now: i64) {
        self.reward_per_token_stored = self.reward_per_token(now);
        self.last_update_time = self.last_time_reward_applicable(now);
        if let Some(account) = account {
            let earned = self.earned(account, now);
            self.rewards.insert(account, earned);
            self.user_reward_per_token_paid
                .insert(account, self.reward_per_token_stored);
        }
    }

    /// Fold `amount` into the stream: a fresh period, or the remainder of an
    /// in-progress one plus its undripped leftover.
    pub fn notify_reward_amount(&mut self, amount: u128, now: i64) -> Result<()> {
        if self.duration <= 0 {
            return Err(ProtocolError::Validation(
                "reward duration must be > 0".to_string(),
            ));
        }
        self.checkpoint(None, now);
        if now >= self.period_finish {
            self.reward_rate = amount / self.duration as u128;
        } else {
            let remaining = (self.period_finish - now) as u128;
            let leftover = remaining * self.reward_rate;
            self.reward_rate = (amount + leftover) / self.duration as u128;
        }
        self.last_update_time = now;
        self.period_finish = now + self.duration;
        Ok(())
    }

    pub fn record_stake(&mut self, account: Address, amount: u128, now: i64) {
        self.checkpoint(Some(account), now);
        self.total_staked += amount;
        *self.balances.entry(account).or_insert(0) += amount;
    }

    pub fn record_withdraw(&mut self, account: Address, amount: u128, now: i64) -> Result<()> {
        let held = self.balance_of(account);
        if amount > held {
            return Err(ProtocolError::InsufficientBalance {
                required: amount,
                actual: held,
            });
        }
        self.checkpoint(Some(account), now);
        self.total_staked -= amount;
        self.balances.insert(account, held - amount);
        Ok(())
    }

    /// Settle and zero the account's claimable reward, returning it.
    pub fn take_reward(&mut self, account: Address, now: i64) -> u128 {
        self.checkpoint(Some(account), now);
        self.rewards.remove(&account).unwrap_or(0)
    }

    /// Duration changes only apply between periods.
    pub fn set_duration(&mut self, duration: i64, now: i64) -> Result<()> {
        if duration <= 0 {
            return Err(ProtocolError::Validation(
                "reward duration must be > 0".to_string(),
            ));
        }
        if now <= self.period_finish {
            return Err(ProtocolError::InvalidState(
                "reward period still in progress".to_string(),
            ));
        }
        self.duration = duration;
        Ok(())
    }
}
