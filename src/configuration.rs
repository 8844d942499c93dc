use std::{
    env, fmt, ops::Deref, path::Path, str::FromStr, sync::Arc, time::Duration,
};

use alloy_primitives::{address, utils::parse_units, Address, U256};
use anyhow::{anyhow, Context};
use tracing::info;
use url::Url;

use crate::{
    cache::{Clock, MetricCache, SystemClock},
    error::Error,
    provider::ChainReader,
    supply::{SupplyCalculator, SupplyFormula},
};

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4200;
pub const DEFAULT_CACHE_REFRESH_DELAY: u64 = 3600;
pub const DEFAULT_TIMEOUT: u64 = 10;
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;
/// Vesting allocation not held by any queryable contract, in whole tokens
pub const DEFAULT_VESTING_ALLOCATION: u64 = 47_000;

pub const DEFAULT_TOKEN_CONTRACT: Address =
    address!("920Cf626a271321C151D027030D5d08aF699456b");
pub const DEFAULT_STAKING_REWARDS_CONTRACT: Address =
    address!("6e56A5D49F775BA08041e28030bc7826b13489e0");
pub const DEFAULT_REWARD_ESCROW_CONTRACT: Address =
    address!("1066A8eB3d90Af0Ad3F89839b974658577e75BE2");
pub const DEFAULT_TRADING_REWARDS_CONTRACT: Address =
    address!("f486A72E8c8143ACd9F65A104A16990fDb38be14");

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub cache: MetricCache,
    pub calculator: SupplyCalculator,
}

impl State {
    pub fn new(config: Config, reader: Arc<dyn ChainReader>) -> State {
        Self::with_clock(config, reader, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        reader: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
    ) -> State {
        let calculator = SupplyCalculator::new(
            config.supply_formula,
            config.vesting_allocation,
        );
        let cache = MetricCache::new(
            reader,
            clock,
            Duration::from_secs(config.cache_refresh_delay),
            Duration::from_secs(config.timeout),
        )
        .with_keys(calculator.keys());

        Self {
            config,
            cache,
            calculator,
        }
    }
}

/// Addresses of the contracts every metric is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    pub token: Address,
    pub staking_rewards: Address,
    pub reward_escrow: Address,
    pub trading_rewards: Address,
    /// Only read by the v1 circulating formula
    pub treasury: Option<Address>,
}

#[derive(Clone)]
pub struct Config {
    pub rpc_url: Url,
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub public_url: String,
    pub cache_refresh_delay: u64,
    pub timeout: u64,
    pub token_decimals: u8,
    pub vesting_allocation: U256,
    pub supply_formula: SupplyFormula,
    pub warm_cache: bool,
    pub contracts: Contracts,
}

impl Config {
    /// Build a configuration from a variable lookup; `get_configuration`
    /// passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::parse(&lookup)
            .map_err(|e| Error::ConfigurationError(format!("{:#}", e)))
    }

    fn parse<F>(lookup: &F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = required(lookup, "RPC_URL")?;
        let rpc_url =
            Url::parse(&rpc_url).context("RPC_URL is not a valid url")?;

        let server_host = lookup("SERVER_HOST")
            .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_owned());
        let port = optional(lookup, "PORT", DEFAULT_PORT)?;
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| String::from("*"))
            .split(',')
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect::<Vec<String>>();
        let public_url = lookup("PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or_default();

        let cache_refresh_delay = optional(
            lookup,
            "CACHE_REFRESH_DELAY",
            DEFAULT_CACHE_REFRESH_DELAY,
        )?;
        let timeout = optional(lookup, "TIMEOUT", DEFAULT_TIMEOUT)?;
        if timeout == 0 {
            return Err(anyhow!("TIMEOUT must be greater than zero"));
        }

        let token_decimals =
            optional(lookup, "TOKEN_DECIMALS", DEFAULT_TOKEN_DECIMALS)?;
        let vesting_allocation: u64 = optional(
            lookup,
            "VESTING_ALLOCATION",
            DEFAULT_VESTING_ALLOCATION,
        )?;
        let vesting_allocation =
            parse_units(&vesting_allocation.to_string(), token_decimals)
                .context("VESTING_ALLOCATION does not fit TOKEN_DECIMALS")?
                .get_absolute();

        let supply_formula =
            optional(lookup, "SUPPLY_FORMULA", SupplyFormula::default())?;
        let warm_cache = optional(lookup, "WARM_CACHE", false)?;

        let contracts = Contracts {
            token: optional(lookup, "TOKEN_CONTRACT", DEFAULT_TOKEN_CONTRACT)?,
            staking_rewards: optional(
                lookup,
                "STAKING_REWARDS_CONTRACT",
                DEFAULT_STAKING_REWARDS_CONTRACT,
            )?,
            reward_escrow: optional(
                lookup,
                "REWARD_ESCROW_CONTRACT",
                DEFAULT_REWARD_ESCROW_CONTRACT,
            )?,
            trading_rewards: optional(
                lookup,
                "TRADING_REWARDS_CONTRACT",
                DEFAULT_TRADING_REWARDS_CONTRACT,
            )?,
            treasury: treasury(lookup, supply_formula)?,
        };

        Ok(Config {
            rpc_url,
            server_host,
            port,
            allowed_origins,
            public_url,
            cache_refresh_delay,
            timeout,
            token_decimals,
            vesting_allocation,
            supply_formula,
            warm_cache,
            contracts,
        })
    }
}

// the node url usually embeds an API key
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &"<redacted>")
            .field("server_host", &self.server_host)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("public_url", &self.public_url)
            .field("cache_refresh_delay", &self.cache_refresh_delay)
            .field("timeout", &self.timeout)
            .field("token_decimals", &self.token_decimals)
            .field("vesting_allocation", &self.vesting_allocation)
            .field("supply_formula", &self.supply_formula)
            .field("warm_cache", &self.warm_cache)
            .field("contracts", &self.contracts)
            .finish()
    }
}

fn treasury<F>(
    lookup: &F,
    formula: SupplyFormula,
) -> anyhow::Result<Option<Address>>
where
    F: Fn(&str) -> Option<String>,
{
    let treasury = match formula {
        SupplyFormula::V0 => lookup("TREASURY_CONTRACT")
            .filter(|value| !value.trim().is_empty()),
        SupplyFormula::V1 => Some(required(lookup, "TREASURY_CONTRACT")?),
    };

    treasury
        .map(|value| {
            value
                .trim()
                .parse::<Address>()
                .context("TREASURY_CONTRACT is not a valid address")
        })
        .transpose()
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{} is required", key))
}

fn optional<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}: {}", key, e)),
        _ => Ok(default),
    }
}

pub fn get_configuration() -> Result<Config, Error> {
    Config::from_lookup(|key| env::var(key).ok())
}

/// Load variables from `.env` in the working directory, if present.
/// Variables already set in the environment take precedence.
pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";

    if !Path::new(config_file).exists() {
        return Ok(());
    }

    dotenvy::from_filename(config_file)
        .map_err(|e| Error::ConfigurationError(e.to_string()))?;
    info!("Loaded configuration from {}", config_file);

    Ok(())
}
