// ===============================
// src/session.rs
// ===============================
//
// The session controller owns all mutable trading state (wallet, ledger,
// selection) on one dispatch task. UI events and engine executions
// multiplex onto the same select loop, so every mutation is applied
// whole before the next event is looked at. The handlers themselves are
// plain functions over state; `run` is just the channel plumbing.
//
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::{Event, RefreshScope, SessionSnapshot, Trade, UiEvent, NO_COMPANY};
use crate::ledger::Ledger;
use crate::metrics::{RECORD_DROPPED, TRADES, TRADES_UNDONE};
use crate::protocol::{ExecutionMsg, OutboundMsg};
use crate::wallet::Wallet;

/// The operator's current choices. Mutated only by UI events.
#[derive(Debug, Clone)]
pub struct Selection {
    pub company: String,
    pub currency: String,
}

/// Everything a UI event can cause besides the state change itself.
#[derive(Debug, Default)]
pub struct UiOutcome {
    pub outbound: Option<OutboundMsg>,
    pub refresh: Option<RefreshScope>,
    pub undone: Option<Trade>,
}

pub struct Session {
    wallet: Wallet,
    ledger: Ledger,
    selection: Selection,
}

impl Session {
    pub fn new(wallet: Wallet, ledger: Ledger) -> Self {
        let selection = Selection {
            company: NO_COMPANY.to_string(),
            currency: wallet.base().to_string(),
        };
        Self { wallet, ledger, selection }
    }

    /// UI-originated events: update selection state, decide what goes out
    /// to the engine and which view went stale.
    pub fn on_ui(&mut self, ev: UiEvent) -> UiOutcome {
        match ev {
            UiEvent::CompanyChanged(company) => {
                self.selection.company = company.clone();
                UiOutcome {
                    outbound: Some(OutboundMsg::Company(company)),
                    refresh: Some(RefreshScope::Trades),
                    undone: None,
                }
            }
            UiEvent::StrategyChanged(strategy) => UiOutcome {
                // no local state: the strategy lives entirely in the engine
                outbound: Some(OutboundMsg::Strategy(strategy)),
                refresh: None,
                undone: None,
            },
            UiEvent::CurrencyChanged(currency) => {
                if !self.wallet.supports(&currency) {
                    warn!(%currency, "ignoring switch to unsupported currency");
                    return UiOutcome::default();
                }
                self.selection.currency = currency;
                UiOutcome {
                    outbound: None,
                    refresh: Some(RefreshScope::Wallet),
                    undone: None,
                }
            }
            UiEvent::UndoRequested => {
                let undone = self.ledger.undo_last_trade();
                if let Some(t) = &undone {
                    TRADES_UNDONE.inc();
                    info!(company = %t.company, "trade undone");
                }
                UiOutcome {
                    outbound: None,
                    refresh: Some(RefreshScope::Trades),
                    undone,
                }
            }
        }
    }

    /// Apply one engine execution atomically: wallet first, then ledger.
    /// The trade is filed under the company selected right now; the
    /// protocol does not echo one back.
    pub fn on_execution(&mut self, msg: ExecutionMsg) -> Trade {
        let trade = Trade {
            company: self.selection.company.clone(),
            action: msg.action,
            price: msg.price,
            amount: msg.amount,
            timestamp: msg.timestamp,
        };
        self.wallet.update_balance(msg.balance);
        self.ledger.add_trade(trade.clone());
        TRADES.inc();
        trade
    }

    pub fn snapshot(&self, refresh: RefreshScope) -> SessionSnapshot {
        // the selected currency is validated on every change, so the
        // conversion only misses if the wallet itself is gone wrong
        let balance = self
            .wallet
            .balance_in(&self.selection.currency)
            .unwrap_or_default();
        SessionSnapshot {
            company: self.selection.company.clone(),
            currency: self.selection.currency.clone(),
            balance,
            trades: self.ledger.trades_for(&self.selection.company).to_vec(),
            recent: self.ledger.recent().cloned().collect(),
            refresh,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// The dispatch task. Recorder sends are try_send: a full or missing
/// queue drops the record, never the trade.
pub async fn run(
    mut session: Session,
    mut ui_rx: mpsc::Receiver<UiEvent>,
    mut exec_rx: mpsc::Receiver<ExecutionMsg>,
    out_tx: mpsc::Sender<OutboundMsg>,
    rec_tx: mpsc::Sender<Event>,
    snap_tx: watch::Sender<SessionSnapshot>,
) {
    let mut engine_open = true;
    loop {
        tokio::select! {
            maybe = ui_rx.recv() => match maybe {
                Some(ev) => {
                    debug!(?ev, "ui event");
                    let outcome = session.on_ui(ev);
                    if let Some(msg) = outcome.outbound {
                        if out_tx.send(msg).await.is_err() {
                            warn!("outbound channel closed, selection not forwarded");
                        }
                    }
                    if let Some(trade) = outcome.undone {
                        if rec_tx.try_send(Event::Undo(trade)).is_err() {
                            RECORD_DROPPED.inc();
                        }
                    }
                    if let Some(scope) = outcome.refresh {
                        let _ = snap_tx.send(session.snapshot(scope));
                    }
                }
                None => {
                    info!("ui channel closed, session task stopping");
                    break;
                }
            },
            maybe = exec_rx.recv(), if engine_open => match maybe {
                Some(msg) => {
                    let trade = session.on_execution(msg);
                    debug!(%trade, "execution applied");
                    if rec_tx.try_send(Event::Exec(trade)).is_err() {
                        RECORD_DROPPED.inc();
                    }
                    let _ = snap_tx.send(session.snapshot(RefreshScope::Both));
                }
                None => {
                    // engine gone; keep serving UI events (inspect/undo)
                    warn!("engine execution channel closed");
                    engine_open = false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap as HashMap;

    use crate::config::CurrencySpec;

    fn wallet() -> Wallet {
        let mut t = HashMap::new();
        t.insert("USD".to_string(), CurrencySpec { initial_balance: 10000.15, rate: 1.0 });
        t.insert("EUR".to_string(), CurrencySpec { initial_balance: 8000.0, rate: 1.1 });
        t.insert("BTC".to_string(), CurrencySpec { initial_balance: 0.5, rate: 45000.0 });
        Wallet::new("USD".to_string(), t).unwrap()
    }

    fn session() -> Session {
        Session::new(wallet(), Ledger::new(10))
    }

    fn exec(balance: f64) -> ExecutionMsg {
        ExecutionMsg {
            balance,
            action: "SELL".to_string(),
            price: 150.25,
            amount: 10,
            timestamp: "T1".to_string(),
        }
    }

    #[test]
    fn starts_with_the_sentinel_company_and_base_currency() {
        let s = session();
        assert_eq!(s.selection().company, NO_COMPANY);
        assert_eq!(s.selection().currency, "USD");
    }

    #[test]
    fn company_change_updates_selection_and_notifies_the_engine() {
        let mut s = session();
        let outcome = s.on_ui(UiEvent::CompanyChanged("AAPL".to_string()));
        assert_eq!(s.selection().company, "AAPL");
        assert_eq!(outcome.outbound, Some(OutboundMsg::Company("AAPL".to_string())));
        assert_eq!(outcome.refresh, Some(RefreshScope::Trades));
    }

    #[test]
    fn strategy_change_is_outbound_only() {
        let mut s = session();
        let before = s.selection().clone();
        let outcome = s.on_ui(UiEvent::StrategyChanged("EMA".to_string()));
        assert_eq!(outcome.outbound, Some(OutboundMsg::Strategy("EMA".to_string())));
        assert_eq!(outcome.refresh, None);
        assert_eq!(s.selection().company, before.company);
        assert_eq!(s.selection().currency, before.currency);
    }

    #[test]
    fn currency_change_refreshes_the_wallet_view_only() {
        let mut s = session();
        let outcome = s.on_ui(UiEvent::CurrencyChanged("EUR".to_string()));
        assert_eq!(s.selection().currency, "EUR");
        assert_eq!(outcome.outbound, None);
        assert_eq!(outcome.refresh, Some(RefreshScope::Wallet));
        assert_eq!(s.snapshot(RefreshScope::Wallet).balance, 10000.15 * 1.1);
    }

    #[test]
    fn unsupported_currency_is_rejected_without_state_change() {
        let mut s = session();
        let outcome = s.on_ui(UiEvent::CurrencyChanged("GBP".to_string()));
        assert_eq!(s.selection().currency, "USD");
        assert_eq!(outcome.outbound, None);
        assert_eq!(outcome.refresh, None);
    }

    #[test]
    fn execution_applies_under_the_selected_company() {
        let mut s = session();
        s.on_ui(UiEvent::CompanyChanged("AAPL".to_string()));
        let trade = s.on_execution(exec(9500.0));
        assert_eq!(trade.company, "AAPL");
        assert_eq!(trade.action, "SELL");
        assert_eq!(trade.price, 150.25);
        assert_eq!(trade.amount, 10);
        assert_eq!(trade.timestamp, "T1");
        assert_eq!(s.wallet().raw_balance(), 9500.0);
        assert_eq!(s.ledger().trades_for("AAPL").len(), 1);
    }

    #[test]
    fn execution_before_any_selection_files_under_the_sentinel() {
        let mut s = session();
        let trade = s.on_execution(exec(9500.0));
        assert_eq!(trade.company, NO_COMPANY);
        assert_eq!(s.ledger().trades_for(NO_COMPANY).len(), 1);
    }

    #[test]
    fn undo_round_trip_reaches_the_ledger() {
        let mut s = session();
        s.on_ui(UiEvent::CompanyChanged("AAPL".to_string()));
        s.on_execution(exec(9500.0));

        let outcome = s.on_ui(UiEvent::UndoRequested);
        assert!(outcome.undone.is_some());
        assert_eq!(outcome.refresh, Some(RefreshScope::Trades));
        assert!(s.ledger().is_empty());

        // empty ledger: still refreshes the (now empty) view, nothing undone
        let outcome = s.on_ui(UiEvent::UndoRequested);
        assert!(outcome.undone.is_none());
        assert_eq!(outcome.refresh, Some(RefreshScope::Trades));
    }

    #[test]
    fn snapshot_tracks_the_selected_company() {
        let mut s = session();
        s.on_ui(UiEvent::CompanyChanged("AAPL".to_string()));
        s.on_execution(exec(9000.0));
        s.on_ui(UiEvent::CompanyChanged("MSFT".to_string()));
        s.on_execution(exec(8000.0));

        let snap = s.snapshot(RefreshScope::Both);
        assert_eq!(snap.company, "MSFT");
        assert_eq!(snap.trades.len(), 1);
        assert_eq!(snap.recent.len(), 2);
        assert_eq!(snap.balance, 8000.0);
    }

    #[tokio::test]
    async fn dispatch_task_routes_events_end_to_end() {
        let session = session();
        let (ui_tx, ui_rx) = mpsc::channel(8);
        let (exec_tx, exec_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (rec_tx, mut rec_rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) =
            watch::channel(session.snapshot(RefreshScope::Both));
        tokio::spawn(run(session, ui_rx, exec_rx, out_tx, rec_tx, snap_tx));

        ui_tx
            .send(UiEvent::CompanyChanged("AAPL".to_string()))
            .await
            .unwrap();
        assert_eq!(
            out_rx.recv().await.unwrap(),
            OutboundMsg::Company("AAPL".to_string())
        );
        snap_rx.changed().await.unwrap();
        assert_eq!(snap_rx.borrow().company, "AAPL");

        exec_tx.send(exec(9500.0)).await.unwrap();
        match rec_rx.recv().await.unwrap() {
            Event::Exec(t) => assert_eq!(t.company, "AAPL"),
            other => panic!("expected an exec record, got {other:?}"),
        }
        snap_rx.changed().await.unwrap();
        {
            let snap = snap_rx.borrow();
            assert_eq!(snap.refresh, RefreshScope::Both);
            assert_eq!(snap.balance, 9500.0);
            assert_eq!(snap.trades.len(), 1);
        }

        ui_tx.send(UiEvent::UndoRequested).await.unwrap();
        match rec_rx.recv().await.unwrap() {
            Event::Undo(t) => assert_eq!(t.company, "AAPL"),
            other => panic!("expected an undo record, got {other:?}"),
        }
        snap_rx.changed().await.unwrap();
        assert!(snap_rx.borrow().trades.is_empty());
    }
}
