// ===============================
// src/wallet.rs
// ===============================
//
// Multi-currency wallet view over a single tracked balance:
// - The engine reports one authoritative balance in the base currency.
// - Every other supported currency is a fixed-rate display conversion,
//   never an independently tracked balance.
// - The supported set is fixed at construction and never grows.
//
use ahash::AHashMap as HashMap;
use thiserror::Error;

use crate::config::CurrencySpec;
use crate::metrics::WALLET_BALANCE;

#[derive(Debug, Error, PartialEq)]
pub enum WalletError {
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("base currency {0} missing from the currency table")]
    BaseMissing(String),
    #[error("base currency {base} must have rate 1.0, got {rate}")]
    BaseRate { base: String, rate: f64 },
    #[error("currency {code} has a non-positive or non-finite rate: {rate}")]
    BadRate { code: String, rate: f64 },
}

#[derive(Debug, Clone)]
pub struct Wallet {
    base: String,
    /// Raw balance in the base currency. The engine is trusted: updates are
    /// applied unconditionally and may drive this negative.
    balance: f64,
    rates: HashMap<String, f64>,
}

impl Wallet {
    /// Builds the wallet from the injected currency table. Validated once
    /// here; after this the currency set never changes.
    pub fn new(
        base: String,
        table: HashMap<String, CurrencySpec>,
    ) -> Result<Self, WalletError> {
        let base_spec = table
            .get(&base)
            .ok_or_else(|| WalletError::BaseMissing(base.clone()))?;
        if base_spec.rate != 1.0 {
            return Err(WalletError::BaseRate { base, rate: base_spec.rate });
        }
        for (code, spec) in table.iter() {
            if !spec.rate.is_finite() || spec.rate <= 0.0 {
                return Err(WalletError::BadRate { code: code.clone(), rate: spec.rate });
            }
        }

        let balance = base_spec.initial_balance;
        let rates = table.into_iter().map(|(code, spec)| (code, spec.rate)).collect();
        WALLET_BALANCE.set(balance);
        Ok(Self { base, balance, rates })
    }

    /// Unconditional replace of the tracked base balance. No sign or
    /// magnitude checks; the engine already settled the trade.
    pub fn update_balance(&mut self, new_raw: f64) {
        self.balance = new_raw;
        WALLET_BALANCE.set(new_raw);
    }

    /// Tracked balance converted into `currency`.
    pub fn balance_in(&self, currency: &str) -> Result<f64, WalletError> {
        let rate = self
            .rates
            .get(currency)
            .ok_or_else(|| WalletError::UnknownCurrency(currency.to_string()))?;
        Ok(self.balance * rate)
    }

    pub fn supports(&self, currency: &str) -> bool {
        self.rates.contains_key(currency)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn raw_balance(&self) -> f64 {
        self.balance
    }
}
