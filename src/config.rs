use crate::domain::{Address, Decimal};
use std::collections::HashMap;
use thiserror::Error;

/// Default ceiling for impermanent and reward period yields.
pub const DEFAULT_MAX_REWARD_YIELD: &str = "2.0";
/// Default ceiling for fee period yields.
pub const DEFAULT_MAX_FEES_YIELD: &str = "2.0";
/// Negative fee deltas down to this magnitude are rounding noise.
pub const DEFAULT_FEE_NOISE_TOLERANCE: &str = "0.000001";
/// Relative supply drift tolerated within one period.
pub const DEFAULT_SUPPLY_TOLERANCE: &str = "0.000001";

#[derive(Debug, Clone)]
pub struct Config {
    pub input_path: String,
    pub output_path: Option<String>,
    pub vaults: Vec<Address>,
    pub engine: EngineConfig,
}

/// Thresholds and exemptions the engine runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_reward_yield: Decimal,
    pub max_fees_yield: Decimal,
    pub fee_noise_tolerance: Decimal,
    pub supply_tolerance: Decimal,
    /// Vaults whose supply drift is logged instead of failing the period.
    pub supply_check_exemptions: Vec<Address>,
}

impl EngineConfig {
    pub fn is_supply_exempt(&self, address: &Address) -> bool {
        self.supply_check_exemptions.contains(address)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reward_yield: constant(DEFAULT_MAX_REWARD_YIELD),
            max_fees_yield: constant(DEFAULT_MAX_FEES_YIELD),
            fee_noise_tolerance: constant(DEFAULT_FEE_NOISE_TOLERANCE),
            supply_tolerance: constant(DEFAULT_SUPPLY_TOLERANCE),
            supply_check_exemptions: Vec::new(),
        }
    }
}

fn constant(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let input_path = env_map
            .get("YIELD_INPUT_PATH")
            .cloned()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv("YIELD_INPUT_PATH".to_string()))?;

        let output_path = env_map
            .get("YIELD_OUTPUT_PATH")
            .cloned()
            .filter(|s| !s.trim().is_empty());

        let vaults = parse_address_list(&env_map, "YIELD_VAULTS");

        let engine = EngineConfig {
            max_reward_yield: parse_positive(&env_map, "MAX_REWARD_YIELD", DEFAULT_MAX_REWARD_YIELD)?,
            max_fees_yield: parse_positive(&env_map, "MAX_FEES_YIELD", DEFAULT_MAX_FEES_YIELD)?,
            fee_noise_tolerance: parse_positive(
                &env_map,
                "FEE_NOISE_TOLERANCE",
                DEFAULT_FEE_NOISE_TOLERANCE,
            )?,
            supply_tolerance: parse_positive(&env_map, "SUPPLY_TOLERANCE", DEFAULT_SUPPLY_TOLERANCE)?,
            supply_check_exemptions: parse_address_list(&env_map, "SUPPLY_CHECK_EXEMPT"),
        };

        Ok(Config {
            input_path,
            output_path,
            vaults,
            engine,
        })
    }

    /// The engine settings for a run.
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone()
    }
}

fn parse_positive(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    let value = Decimal::from_str_canonical(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })?;
    if !value.is_positive() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be greater than zero, got {}", raw),
        ));
    }
    Ok(value)
}

fn parse_address_list(env_map: &HashMap<String, String>, key: &str) -> Vec<Address> {
    env_map
        .get(key)
        .map(|s| {
            s.split(',')
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .map(Address::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("YIELD_INPUT_PATH".to_string(), "/tmp/vaults.json".to_string());
        map
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_defaults_keep_exact_thresholds() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.engine.max_reward_yield, d("2.0"));
        assert_eq!(config.engine.max_fees_yield, d("2.0"));
        assert_eq!(config.engine.fee_noise_tolerance, d("0.000001"));
        assert_eq!(config.engine.supply_tolerance, d("0.000001"));
        assert!(config.engine.supply_check_exemptions.is_empty());
        assert!(config.output_path.is_none());
        assert!(config.vaults.is_empty());
        assert_eq!(config.engine(), EngineConfig::default());
    }

    #[test]
    fn test_missing_input_path() {
        let mut env_map = setup_required_env();
        env_map.remove("YIELD_INPUT_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "YIELD_INPUT_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_max_fees_yield() {
        let mut env_map = setup_required_env();
        env_map.insert("MAX_FEES_YIELD".to_string(), "lots".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_FEES_YIELD"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("SUPPLY_TOLERANCE".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SUPPLY_TOLERANCE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_address_lists_parsed_and_normalized() {
        let mut env_map = setup_required_env();
        env_map.insert("YIELD_VAULTS".to_string(), "0xAAA, ,0xbbb".to_string());
        env_map.insert("SUPPLY_CHECK_EXEMPT".to_string(), "0xCCC".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.vaults, vec![Address::from("0xaaa"), Address::from("0xbbb")]);
        assert!(config.engine.is_supply_exempt(&Address::from("0xccc")));
        assert!(!config.engine.is_supply_exempt(&Address::from("0xaaa")));
    }
}
