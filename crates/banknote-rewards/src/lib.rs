//! banknote-rewards: proportional reward streaming for bank nodes
//!
//! Reward tranches are split across bank nodes by staking-pool value, and
//! each node's share is streamed linearly to stakers of that node's
//! liquidity share token. State is plain structs over `banknote-core`'s
//! ledger; time enters as explicit UNIX timestamps, same as the core.

pub mod distributor;
pub mod stream;

pub use distributor::RewardsDistributor;
pub use stream::RewardStream;
