// ===============================
// src/config.rs
// ===============================
use std::env;

use ahash::AHashMap as HashMap;
use dotenvy::dotenv;
use thiserror::Error;

/// Where trade executions come from.
#[derive(Clone, Debug)]
pub enum EngineMode {
    /// Local random-walk generator, no external process needed.
    Mock,
    /// Persistent TCP link to the external strategy engine.
    Tcp,
}

impl EngineMode {
    pub fn from_env(key: &str, default_mode: EngineMode) -> EngineMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock" => EngineMode::Mock,
            "tcp" => EngineMode::Tcp,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Mock => "mock",
            EngineMode::Tcp => "tcp",
        }
    }
}

/// One configured currency: starting balance and fixed rate relative to the
/// base unit. Only the base currency's balance is ever tracked at runtime;
/// the other balances are accepted for completeness of the table.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrencySpec {
    pub initial_balance: f64,
    pub rate: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bad currency entry {0:?}: expected CODE:BALANCE:RATE")]
    BadCurrencyEntry(String),
    #[error("currency table is empty")]
    EmptyCurrencies,
    #[error("history capacity must be at least 1")]
    BadCapacity,
}

#[derive(Clone, Debug)]
pub struct Args {
    // engine link
    pub engine_mode: EngineMode,
    pub engine_addr: String,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,

    // session state
    pub history_capacity: usize,
    pub base_currency: String,
    pub currencies: HashMap<String, CurrencySpec>,
}

/// Default table mirrors the session's stock setup:
/// USD is the tracked base, EUR and BTC are display conversions.
pub const DEFAULT_CURRENCIES: &str = "USD:10000.15:1.0,EUR:8000.00:1.1,BTC:0.5:45000.0";

pub fn load() -> Result<Args, ConfigError> {
    // Read .env first so ENGINE_ADDR, CURRENCIES, etc. are picked up.
    let _ = dotenv();

    let engine_mode = EngineMode::from_env("ENGINE_MODE", EngineMode::Tcp);
    let engine_addr =
        env::var("ENGINE_ADDR").unwrap_or_else(|_| "localhost:12346".to_string());

    // RECORD_FILE="" disables the trade log entirely.
    let record_file = match env::var("RECORD_FILE") {
        Ok(s) if s.trim().is_empty() => None,
        Ok(s) => Some(s),
        Err(_) => Some("trades.log".to_string()),
    };

    let metrics_port = env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);

    let history_capacity = env::var("HISTORY_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    if history_capacity == 0 {
        return Err(ConfigError::BadCapacity);
    }

    let base_currency = env::var("BASE_CURRENCY")
        .unwrap_or_else(|_| "USD".to_string())
        .to_ascii_uppercase();

    let table = env::var("CURRENCIES").unwrap_or_else(|_| DEFAULT_CURRENCIES.to_string());
    let currencies = parse_currencies(&table)?;
    if currencies.is_empty() {
        return Err(ConfigError::EmptyCurrencies);
    }

    Ok(Args {
        engine_mode,
        engine_addr,
        record_file,
        metrics_port,
        history_capacity,
        base_currency,
        currencies,
    })
}

/// CURRENCIES=USD:10000.15:1.0,EUR:8000.00:1.1,BTC:0.5:45000.0
fn parse_currencies(s: &str) -> Result<HashMap<String, CurrencySpec>, ConfigError> {
    let mut out = HashMap::new();
    for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let bad = || ConfigError::BadCurrencyEntry(entry.to_string());
        let mut parts = entry.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(code), Some(balance), Some(rate), None) if !code.trim().is_empty() => {
                let initial_balance: f64 = balance.trim().parse().map_err(|_| bad())?;
                let rate: f64 = rate.trim().parse().map_err(|_| bad())?;
                out.insert(
                    code.trim().to_ascii_uppercase(),
                    CurrencySpec { initial_balance, rate },
                );
            }
            _ => return Err(bad()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_table() {
        let table = parse_currencies(DEFAULT_CURRENCIES).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table["USD"],
            CurrencySpec { initial_balance: 10000.15, rate: 1.0 }
        );
        assert_eq!(table["EUR"].rate, 1.1);
        assert_eq!(table["BTC"].rate, 45000.0);
    }

    #[test]
    fn normalizes_codes_and_tolerates_spacing() {
        let table = parse_currencies(" usd:1:1.0 , eur:0:2.5 ").unwrap();
        assert!(table.contains_key("USD"));
        assert_eq!(table["EUR"].rate, 2.5);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(parse_currencies("USD:1").is_err());
        assert!(parse_currencies("USD:abc:1.0").is_err());
        assert!(parse_currencies("USD:1:1.0:extra").is_err());
        assert!(parse_currencies(":1:1.0").is_err());
    }

    #[test]
    fn empty_table_parses_to_empty_map() {
        assert!(parse_currencies("").unwrap().is_empty());
    }
}
