//! Centralized cache keys
//!
//! Every on-chain quantity the API caches is named here, so the cache, the
//! chain reader and the supply formulas agree on one set of keys.

use std::fmt;

// On-chain quantities
pub const TOTAL_SUPPLY: &str = "total_supply";
pub const STAKED_SUPPLY: &str = "staked_supply";
pub const STAKED_BALANCE: &str = "staked_balance";
pub const REWARD_ESCROWED_BALANCE: &str = "reward_escrowed_balance";
pub const TRADING_REWARDS_BALANCE: &str = "trading_rewards_balance";
pub const TREASURY_BALANCE: &str = "treasury_balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    /// `totalSupply()` of the token
    TotalSupply,
    /// `totalSupply()` of the staking pool, escrowed stake included
    StakedSupply,
    /// Token balance held directly by the staking pool
    StakedBalance,
    RewardEscrowedBalance,
    TradingRewardsBalance,
    TreasuryBalance,
}

impl MetricKey {
    pub const COUNT: usize = 6;

    pub const ALL: [MetricKey; MetricKey::COUNT] = [
        MetricKey::TotalSupply,
        MetricKey::StakedSupply,
        MetricKey::StakedBalance,
        MetricKey::RewardEscrowedBalance,
        MetricKey::TradingRewardsBalance,
        MetricKey::TreasuryBalance,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TotalSupply => TOTAL_SUPPLY,
            MetricKey::StakedSupply => STAKED_SUPPLY,
            MetricKey::StakedBalance => STAKED_BALANCE,
            MetricKey::RewardEscrowedBalance => REWARD_ESCROWED_BALANCE,
            MetricKey::TradingRewardsBalance => TRADING_REWARDS_BALANCE,
            MetricKey::TreasuryBalance => TREASURY_BALANCE,
        }
    }

    /// Position of the key in [`MetricKey::ALL`].
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
