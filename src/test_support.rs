//! Stub chain reader and manual clock shared by unit tests

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::U256;
use alloy_transport::TransportErrorKind;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    cache::{Clock, MetricValues},
    cache_keys::MetricKey,
    configuration::{AppState, Config, State},
    error::Error,
    provider::ChainReader,
    supply::SupplyFormula,
};

/// `amount` whole tokens at 18 decimals
pub fn tokens(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn test_config(formula: SupplyFormula) -> Config {
    let formula = formula.to_string();
    Config::from_lookup(|key| {
        let value = match key {
            "RPC_URL" => "http://localhost:8545",
            "TREASURY_CONTRACT" => "0x82d2242257115351899894eF384f779b5ba8c695",
            "PUBLIC_URL" => "https://supply.example",
            "SUPPLY_FORMULA" => formula.as_str(),
            _ => return None,
        };
        Some(value.to_owned())
    })
    .unwrap()
}

pub fn test_state(
    chain: Arc<StubChain>,
    clock: Arc<ManualClock>,
    formula: SupplyFormula,
) -> AppState<State> {
    AppState::new(State::with_clock(test_config(formula), chain, clock))
}

#[derive(Default)]
pub struct StubChain {
    values: RwLock<MetricValues>,
    calls: [AtomicUsize; MetricKey::COUNT],
    failing: AtomicBool,
    fail_next: AtomicUsize,
    delay: Duration,
}

impl StubChain {
    pub fn new(values: MetricValues) -> Self {
        Self {
            values: RwLock::new(values),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, key: MetricKey, value: U256) {
        self.values.write().set(key, value);
    }

    pub fn calls(&self, key: MetricKey) -> usize {
        self.calls[key.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        MetricKey::ALL.iter().map(|key| self.calls(*key)).sum()
    }

    /// Fail every fetch until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `count` fetches, whatever the key.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for StubChain {
    async fn fetch(&self, key: MetricKey) -> Result<U256, Error> {
        self.calls[key.index()].fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scheduled_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();

        if scheduled_failure || self.failing.load(Ordering::SeqCst) {
            let err = TransportErrorKind::custom_str("node unreachable");
            return Err(err.into());
        }

        Ok(self.values.read().get(key))
    }
}

pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
