//! Process configuration read from `VAULT_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::history::SortOrder;
use crate::prices::fallback::{DEFAULT_CACHE_TTL, DEFAULT_FAILURE_THRESHOLD};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PRICE_CURRENCY: &str = "usd";
pub const DEFAULT_PRICE_SYMBOLS: &str = "bitcoin,ethereum,tether,chainlink,binancecoin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub bind_addr: SocketAddr,
    pub history_order: SortOrder,
    pub price_currency: String,
    pub price_failure_threshold: u32,
    pub price_symbols: Vec<String>,
    /// Reuse window for live price responses; zero disables the cache.
    pub price_cache_ttl: Duration,
    /// CoinGecko pro key; only read by the `coingecko` price source.
    pub coingecko_api_key: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            history_order: SortOrder::Descending,
            price_currency: DEFAULT_PRICE_CURRENCY.to_string(),
            price_failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            price_symbols: parse_symbols(DEFAULT_PRICE_SYMBOLS),
            price_cache_ttl: DEFAULT_CACHE_TTL,
            coingecko_api_key: None,
        }
    }
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Unset and blank values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("VAULT_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("VAULT_BIND_ADDR", e.to_string()))?;

        let history_order = match get("VAULT_HISTORY_ORDER") {
            Some(v) => v
                .parse::<SortOrder>()
                .map_err(|e| ConfigError::invalid("VAULT_HISTORY_ORDER", e.to_string()))?,
            None => SortOrder::Descending,
        };

        let price_currency = get("VAULT_PRICE_CURRENCY")
            .unwrap_or_else(|| DEFAULT_PRICE_CURRENCY.to_string())
            .to_ascii_lowercase();

        let price_failure_threshold = match get("VAULT_PRICE_FAILURE_THRESHOLD") {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => return Err(ConfigError::invalid("VAULT_PRICE_FAILURE_THRESHOLD", "must be at least 1")),
                Err(e) => return Err(ConfigError::invalid("VAULT_PRICE_FAILURE_THRESHOLD", e.to_string())),
            },
            None => DEFAULT_FAILURE_THRESHOLD,
        };

        let price_symbols = parse_symbols(&get("VAULT_PRICE_SYMBOLS").unwrap_or_else(|| DEFAULT_PRICE_SYMBOLS.to_string()));
        if price_symbols.is_empty() {
            return Err(ConfigError::invalid("VAULT_PRICE_SYMBOLS", "no symbols listed"));
        }

        let price_cache_ttl = match get("VAULT_PRICE_CACHE_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::invalid("VAULT_PRICE_CACHE_SECS", e.to_string()))?,
            None => DEFAULT_CACHE_TTL,
        };

        Ok(Self {
            bind_addr,
            history_order,
            price_currency,
            price_failure_threshold,
            price_symbols,
            price_cache_ttl,
            coingecko_api_key: get("VAULT_COINGECKO_API_KEY"),
        })
    }
}

/// Split a comma-separated id list, dropping blanks and duplicates.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for id in raw.split(',').map(|s| s.trim().to_ascii_lowercase()) {
        if !id.is_empty() && !symbols.contains(&id) {
            symbols.push(id);
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<VaultConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        VaultConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.history_order, SortOrder::Descending);
        assert_eq!(config.price_currency, "usd");
        assert_eq!(config.price_failure_threshold, 3);
        assert_eq!(
            config.price_symbols,
            vec!["bitcoin", "ethereum", "tether", "chainlink", "binancecoin"]
        );
        assert_eq!(config.price_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.coingecko_api_key, None);
        assert_eq!(config, VaultConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("VAULT_BIND_ADDR", "127.0.0.1:9000"),
            ("VAULT_HISTORY_ORDER", "asc"),
            ("VAULT_PRICE_CURRENCY", "EUR"),
            ("VAULT_PRICE_FAILURE_THRESHOLD", "5"),
            ("VAULT_PRICE_SYMBOLS", " solana, near ,solana,"),
            ("VAULT_COINGECKO_API_KEY", "cg-key"),
            ("VAULT_PRICE_CACHE_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.history_order, SortOrder::Ascending);
        assert_eq!(config.price_currency, "eur");
        assert_eq!(config.price_failure_threshold, 5);
        assert_eq!(config.price_symbols, vec!["solana", "near"]);
        assert_eq!(config.coingecko_api_key.as_deref(), Some("cg-key"));
        assert!(config.price_cache_ttl.is_zero());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("VAULT_HISTORY_ORDER", "  "), ("VAULT_PRICE_CURRENCY", "")]).unwrap();
        assert_eq!(config.history_order, SortOrder::Descending);
        assert_eq!(config.price_currency, "usd");
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let zero = load(&[("VAULT_PRICE_FAILURE_THRESHOLD", "0")]).unwrap_err();
        assert!(matches!(zero, ConfigError::Invalid { var: "VAULT_PRICE_FAILURE_THRESHOLD", .. }));

        let addr = load(&[("VAULT_BIND_ADDR", "not-an-addr")]).unwrap_err();
        assert!(matches!(addr, ConfigError::Invalid { var: "VAULT_BIND_ADDR", .. }));

        let order = load(&[("VAULT_HISTORY_ORDER", "random")]).unwrap_err();
        assert!(matches!(order, ConfigError::Invalid { var: "VAULT_HISTORY_ORDER", .. }));

        let ttl = load(&[("VAULT_PRICE_CACHE_SECS", "-1")]).unwrap_err();
        assert!(matches!(ttl, ConfigError::Invalid { var: "VAULT_PRICE_CACHE_SECS", .. }));

        let symbols = load(&[("VAULT_PRICE_SYMBOLS", " , ,")]).unwrap_err();
        assert!(matches!(symbols, ConfigError::Invalid { var: "VAULT_PRICE_SYMBOLS", .. }));
    }
}
