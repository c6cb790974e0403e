use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

pub const BROKER_ADDRESS: &str = "BROKER_ADDRESS";
pub const PENDING_TRANSACTIONS_TOPIC: &str = "PENDING_TRANSACTIONS_TOPIC";
pub const TRANSACTION_RESULTS_TOPIC: &str = "TRANSACTION_RESULTS_TOPIC";
pub const CONSUMER_GROUP_ID: &str = "CONSUMER_GROUP_ID";
pub const HIGH_VALUE_THRESHOLD: &str = "HIGH_VALUE_THRESHOLD";
pub const API_KEY_CACHE_CAPACITY: &str = "API_KEY_CACHE_CAPACITY";

pub const DEFAULT_HIGH_VALUE_THRESHOLD: i64 = 10_000;
pub const DEFAULT_API_KEY_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: [{key}] has invalid value [{value}]: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String
    }
}

/// Where review traffic flows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BrokerConfig {
    pub address: String,
    pub pending_transactions_topic: String,
    pub transaction_results_topic: String,
    pub consumer_group: String
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:9092".to_string(),
            pending_transactions_topic: "pending_transactions".to_string(),
            transaction_results_topic: "transactions_result".to_string(),
            consumer_group: "gateway".to_string()
        }
    }
}

/// Settings handed to every component at construction time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GatewayConfig {
    pub broker: BrokerConfig,
    /// Amounts strictly above this go through fraud review.
    pub high_value_threshold: Decimal,
    pub api_key_cache_capacity: u64
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            high_value_threshold: Decimal::from(DEFAULT_HIGH_VALUE_THRESHOLD),
            api_key_cache_capacity: DEFAULT_API_KEY_CACHE_CAPACITY
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, falling back to the defaults for every
    /// key it does not provide. Blank values count as not provided.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        let defaults = GatewayConfig::default();

        let high_value_threshold = match lookup(HIGH_VALUE_THRESHOLD) {
            Some(value) => parse_threshold(&value)?,
            None => defaults.high_value_threshold
        };

        let api_key_cache_capacity = match lookup(API_KEY_CACHE_CAPACITY) {
            Some(value) => value.parse::<u64>().map_err(|error| ConfigError::InvalidValue {
                key: API_KEY_CACHE_CAPACITY,
                value: value.clone(),
                reason: error.to_string()
            })?,
            None => defaults.api_key_cache_capacity
        };

        Ok(Self {
            broker: BrokerConfig {
                address: lookup(BROKER_ADDRESS).unwrap_or(defaults.broker.address),
                pending_transactions_topic: lookup(PENDING_TRANSACTIONS_TOPIC).unwrap_or(defaults.broker.pending_transactions_topic),
                transaction_results_topic: lookup(TRANSACTION_RESULTS_TOPIC).unwrap_or(defaults.broker.transaction_results_topic),
                consumer_group: lookup(CONSUMER_GROUP_ID).unwrap_or(defaults.broker.consumer_group)
            },
            high_value_threshold,
            api_key_cache_capacity
        })
    }
}

fn parse_threshold(value: &str) -> Result<Decimal, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: HIGH_VALUE_THRESHOLD,
        value: value.to_string(),
        reason
    };

    let threshold = Decimal::from_str(value).map_err(|error| invalid(error.to_string()))?;

    if threshold <= Decimal::ZERO {
        return Err(invalid("must be positive".to_string()));
    }

    Ok(threshold)
}
