//! Derived supply metrics
//!
//! Every exposed quantity is a fixed linear combination of cached on-chain
//! values. Formulas are pure: they read a [`MetricValues`] snapshot and never
//! touch the cache or the chain themselves.

use std::{fmt, str::FromStr};

use alloy_primitives::U256;

use crate::{cache::MetricValues, cache_keys::MetricKey, error::Error};

/// Which set of formulas `circulating` follows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SupplyFormula {
    /// `total - (escrowed + trading rewards)`
    V0,
    /// `total - (escrowed + trading rewards + treasury + vesting allocation)`
    #[default]
    V1,
}

impl FromStr for SupplyFormula {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "v0" => Ok(SupplyFormula::V0),
            "v1" => Ok(SupplyFormula::V1),
            other => Err(format!("unknown supply formula {}", other)),
        }
    }
}

impl fmt::Display for SupplyFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplyFormula::V0 => f.write_str("v0"),
            SupplyFormula::V1 => f.write_str("v1"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyMetric {
    Total,
    Circulating,
    Liquid,
    Locked,
    Staked,
    StakedCirculating,
    StakedLocked,
}

impl SupplyMetric {
    pub const ALL: [SupplyMetric; 7] = [
        SupplyMetric::Total,
        SupplyMetric::Circulating,
        SupplyMetric::Liquid,
        SupplyMetric::Locked,
        SupplyMetric::Staked,
        SupplyMetric::StakedCirculating,
        SupplyMetric::StakedLocked,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SupplyMetric::Total => "supply-total",
            SupplyMetric::Circulating => "supply-circulating",
            SupplyMetric::Liquid => "supply-liquid",
            SupplyMetric::Locked => "supply-locked",
            SupplyMetric::Staked => "supply-staked",
            SupplyMetric::StakedCirculating => "supply-staked-circulating",
            SupplyMetric::StakedLocked => "supply-staked-locked",
        }
    }
}

impl fmt::Display for SupplyMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SupplyCalculator {
    formula: SupplyFormula,
    /// Scaled to the token's decimals
    vesting_allocation: U256,
}

impl SupplyCalculator {
    pub fn new(formula: SupplyFormula, vesting_allocation: U256) -> Self {
        Self {
            formula,
            vesting_allocation,
        }
    }

    pub fn formula(&self) -> SupplyFormula {
        self.formula
    }

    /// Cached keys `metric` reads; exactly these must be fresh before
    /// [`SupplyCalculator::compute`].
    pub fn dependencies(&self, metric: SupplyMetric) -> &'static [MetricKey] {
        use MetricKey::*;

        match metric {
            SupplyMetric::Total => &[TotalSupply],
            SupplyMetric::Circulating => match self.formula {
                SupplyFormula::V0 => &[
                    TotalSupply,
                    RewardEscrowedBalance,
                    TradingRewardsBalance,
                ],
                SupplyFormula::V1 => &[
                    TotalSupply,
                    RewardEscrowedBalance,
                    TradingRewardsBalance,
                    TreasuryBalance,
                ],
            },
            SupplyMetric::Liquid => &[
                TotalSupply,
                RewardEscrowedBalance,
                TradingRewardsBalance,
            ],
            SupplyMetric::Locked => {
                &[RewardEscrowedBalance, TradingRewardsBalance]
            },
            SupplyMetric::Staked => &[StakedSupply],
            SupplyMetric::StakedCirculating => &[StakedBalance],
            SupplyMetric::StakedLocked => &[StakedSupply, StakedBalance],
        }
    }

    /// Every key read by at least one metric under this formula.
    pub fn keys(&self) -> Vec<MetricKey> {
        MetricKey::ALL
            .into_iter()
            .filter(|key| {
                SupplyMetric::ALL
                    .iter()
                    .any(|metric| self.dependencies(*metric).contains(key))
            })
            .collect()
    }

    pub fn compute(
        &self,
        metric: SupplyMetric,
        values: &MetricValues,
    ) -> Result<U256, Error> {
        match metric {
            SupplyMetric::Total => Ok(self.total(values)),
            SupplyMetric::Circulating => self.circulating(values),
            SupplyMetric::Liquid => self.liquid(values),
            SupplyMetric::Locked => self.locked(values),
            SupplyMetric::Staked => Ok(self.staked_total(values)),
            SupplyMetric::StakedCirculating => Ok(self.staked_liquid(values)),
            SupplyMetric::StakedLocked => self.staked_locked(values),
        }
    }

    pub fn total(&self, values: &MetricValues) -> U256 {
        values.get(MetricKey::TotalSupply)
    }

    pub fn locked(&self, values: &MetricValues) -> Result<U256, Error> {
        add(
            "locked",
            values.get(MetricKey::RewardEscrowedBalance),
            values.get(MetricKey::TradingRewardsBalance),
        )
    }

    pub fn circulating(&self, values: &MetricValues) -> Result<U256, Error> {
        let mut deducted = self.locked(values)?;

        if self.formula == SupplyFormula::V1 {
            deducted = add(
                "circulating",
                deducted,
                values.get(MetricKey::TreasuryBalance),
            )?;
            deducted = add("circulating", deducted, self.vesting_allocation)?;
        }

        sub("circulating", self.total(values), deducted)
    }

    /// Total minus locked, whatever the formula version.
    pub fn liquid(&self, values: &MetricValues) -> Result<U256, Error> {
        sub("liquid", self.total(values), self.locked(values)?)
    }

    pub fn staked_total(&self, values: &MetricValues) -> U256 {
        values.get(MetricKey::StakedSupply)
    }

    pub fn staked_liquid(&self, values: &MetricValues) -> U256 {
        values.get(MetricKey::StakedBalance)
    }

    pub fn staked_locked(&self, values: &MetricValues) -> Result<U256, Error> {
        sub(
            "staked locked",
            self.staked_total(values),
            self.staked_liquid(values),
        )
    }
}

fn add(metric: &str, a: U256, b: U256) -> Result<U256, Error> {
    a.checked_add(b).ok_or_else(|| {
        Error::ArithmeticOverflow(format!("{}: {} + {}", metric, a, b))
    })
}

fn sub(metric: &str, a: U256, b: U256) -> Result<U256, Error> {
    a.checked_sub(b).ok_or_else(|| {
        Error::ArithmeticUnderflow(format!("{}: {} - {}", metric, a, b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tokens;

    fn balances(
        total: u64,
        escrowed: u64,
        trading: u64,
        treasury: u64,
    ) -> MetricValues {
        MetricValues::default()
            .with(MetricKey::TotalSupply, tokens(total))
            .with(MetricKey::RewardEscrowedBalance, tokens(escrowed))
            .with(MetricKey::TradingRewardsBalance, tokens(trading))
            .with(MetricKey::TreasuryBalance, tokens(treasury))
    }

    fn calculator(formula: SupplyFormula) -> SupplyCalculator {
        SupplyCalculator::new(formula, tokens(47_000))
    }

    #[test]
    fn test_circulating_with_treasury_and_allocation() {
        let values = balances(1_000_000, 100, 50, 20);

        let circulating =
            calculator(SupplyFormula::V1).circulating(&values).unwrap();

        assert_eq!(circulating, tokens(952_830));
    }

    #[test]
    fn test_circulating_without_allocation_deduction() {
        let values = balances(1_000_000, 100, 50, 20);

        let circulating =
            calculator(SupplyFormula::V0).circulating(&values).unwrap();

        assert_eq!(circulating, tokens(999_850));
    }

    #[test]
    fn test_circulating_success_path_with_small_allocation() {
        let values = balances(1_000_000, 100, 50, 20);
        let calculator = SupplyCalculator::new(SupplyFormula::V1, U256::ZERO);

        assert_eq!(calculator.circulating(&values).unwrap(), tokens(999_830));
    }

    #[test]
    fn test_circulating_underflow_is_an_error() {
        let values = balances(1_000, 100, 50, 20);

        let result = calculator(SupplyFormula::V1).circulating(&values);

        assert!(matches!(result, Err(Error::ArithmeticUnderflow(_))));
    }

    #[test]
    fn test_locked_and_liquid() {
        let values = balances(1_000, 100, 50, 20);
        let calculator = calculator(SupplyFormula::V1);

        assert_eq!(calculator.locked(&values).unwrap(), tokens(150));
        // treasury and allocation are never deducted from liquid
        assert_eq!(calculator.liquid(&values).unwrap(), tokens(850));
    }

    #[test]
    fn test_staked_locked() {
        let values = MetricValues::default()
            .with(MetricKey::StakedSupply, tokens(500))
            .with(MetricKey::StakedBalance, tokens(300));
        let calculator = calculator(SupplyFormula::V1);

        assert_eq!(calculator.staked_total(&values), tokens(500));
        assert_eq!(calculator.staked_liquid(&values), tokens(300));
        assert_eq!(calculator.staked_locked(&values).unwrap(), tokens(200));
    }

    #[test]
    fn test_staked_locked_underflow_when_balance_exceeds_supply() {
        let values = MetricValues::default()
            .with(MetricKey::StakedSupply, tokens(300))
            .with(MetricKey::StakedBalance, tokens(301));

        let result = calculator(SupplyFormula::V0).staked_locked(&values);

        assert!(matches!(result, Err(Error::ArithmeticUnderflow(_))));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let values = MetricValues::default()
            .with(MetricKey::RewardEscrowedBalance, U256::MAX)
            .with(MetricKey::TradingRewardsBalance, U256::from(1));

        let result = calculator(SupplyFormula::V0).locked(&values);

        assert!(matches!(result, Err(Error::ArithmeticOverflow(_))));
    }

    #[test]
    fn test_dependencies_cover_every_key_read() {
        // a key left out of the dependencies reads as zero in compute
        let full = balances(1_000_000, 100, 50, 20)
            .with(MetricKey::StakedSupply, tokens(500))
            .with(MetricKey::StakedBalance, tokens(300));

        for formula in [SupplyFormula::V0, SupplyFormula::V1] {
            let calculator = calculator(formula);
            for metric in SupplyMetric::ALL {
                let mut partial = MetricValues::default();
                for key in calculator.dependencies(metric) {
                    partial.set(*key, full.get(*key));
                }

                assert_eq!(
                    calculator.compute(metric, &partial).unwrap(),
                    calculator.compute(metric, &full).unwrap(),
                    "{} under {}",
                    metric,
                    formula
                );
            }
        }
    }

    #[test]
    fn test_treasury_only_read_by_v1() {
        let v0 = calculator(SupplyFormula::V0);
        let v1 = calculator(SupplyFormula::V1);

        assert!(!v0
            .dependencies(SupplyMetric::Circulating)
            .contains(&MetricKey::TreasuryBalance));
        assert!(v1
            .dependencies(SupplyMetric::Circulating)
            .contains(&MetricKey::TreasuryBalance));
    }

    #[test]
    fn test_keys_per_formula() {
        let v1 = calculator(SupplyFormula::V1).keys();
        assert_eq!(v1, MetricKey::ALL.to_vec());

        let v0 = calculator(SupplyFormula::V0).keys();
        assert_eq!(v0.len(), MetricKey::COUNT - 1);
        assert!(!v0.contains(&MetricKey::TreasuryBalance));
    }

    #[test]
    fn test_formula_parsing() {
        assert_eq!("v0".parse::<SupplyFormula>(), Ok(SupplyFormula::V0));
        assert_eq!("V1".parse::<SupplyFormula>(), Ok(SupplyFormula::V1));
        assert!("v2".parse::<SupplyFormula>().is_err());
    }
}
