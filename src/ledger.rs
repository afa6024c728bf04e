// ===============================
// src/ledger.rs
// ===============================
//
// Trade history with two views:
// - `recent`: the bounded "recent activity across all companies" window,
//   FIFO-evicted at capacity.
// - `by_company`: the complete per-company record for the session,
//   unbounded, never pruned by eviction.
//
// Undo reverses the most recent append *globally* (not per selected
// company) and pops both tails. It cannot resurrect an evicted trade.
//
use std::collections::VecDeque;

use ahash::AHashMap as HashMap;

use crate::domain::Trade;

#[derive(Debug)]
pub struct Ledger {
    recent: VecDeque<Trade>,
    by_company: HashMap<String, Vec<Trade>>,
    capacity: usize,
}

impl Ledger {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            by_company: HashMap::new(),
            capacity,
        }
    }

    /// Append to both views. Always succeeds; at capacity the oldest entry
    /// leaves the bounded view only.
    pub fn add_trade(&mut self, trade: Trade) {
        if self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.by_company
            .entry(trade.company.clone())
            .or_default()
            .push(trade.clone());
        self.recent.push_back(trade);
    }

    /// Pop the most recent global append from both tails. No-op on an empty
    /// bounded view, even when some company index still holds evicted trades.
    pub fn undo_last_trade(&mut self) -> Option<Trade> {
        let trade = self.recent.pop_back()?;
        if let Some(index) = self.by_company.get_mut(&trade.company) {
            index.pop();
        }
        Some(trade)
    }

    /// Full per-company record, append order. Unknown companies get an empty
    /// slice, never an error.
    pub fn trades_for(&self, company: &str) -> &[Trade] {
        self.by_company
            .get(company)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Bounded global view, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Trade> {
        self.recent.iter()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
