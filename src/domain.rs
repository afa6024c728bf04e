// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel company shown before the operator picks one. Executions that
/// arrive while it is active are filed under this label.
pub const NO_COMPANY: &str = "none selected";

/// One executed trade as recorded in the ledger. Immutable once built.
/// `action` is an open label set defined by the engine ("BUY", "SELL", ...);
/// `timestamp` is engine-supplied and never parsed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub company: String,
    pub action: String,
    pub price: f64,
    pub amount: i64,
    pub timestamp: String,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Trade] {} | {} | ${} | {} units | {}",
            self.company, self.action, self.price, self.amount, self.timestamp
        )
    }
}

/// The four write entry points the presentation layer has into the session.
#[derive(Debug, Clone)]
pub enum UiEvent {
    CompanyChanged(String),
    StrategyChanged(String),
    CurrencyChanged(String),
    UndoRequested,
}

/// Which view a snapshot publication invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    Wallet,
    Trades,
    Both,
}

/// Read side of the presentation boundary. Published over a watch channel
/// after every state change; each publication is the refresh signal.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub company: String,
    pub currency: String,
    /// Wallet balance converted into `currency`.
    pub balance: f64,
    /// Full per-company record for `company`, append order.
    pub trades: Vec<Trade>,
    /// Bounded global view, oldest first.
    pub recent: Vec<Trade>,
    pub refresh: RefreshScope,
}

/// Recorder envelope.
#[derive(Debug, Clone)]
pub enum Event {
    Exec(Trade),
    Undo(Trade),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Exec(t) => write!(f, "{t}"),
            Event::Undo(t) => write!(
                f,
                "[Undo] {} | {} | ${} | {} units | {}",
                t.company, t.action, t.price, t.amount, t.timestamp
            ),
        }
    }
}
