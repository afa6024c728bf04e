// ===============================
// src/main.rs
// ===============================
/*
=============================================================================
Project : tradedesk_rust, operator console core for a strategy-driven
          trading session

Summary : Keeps a bounded trade ledger and a multi-currency wallet view in
          sync with an external strategy engine over a persistent JSON/TCP
          link (or a local mock), forwards operator selections back to the
          engine, publishes display snapshots for a UI layer, exposes
          Prometheus metrics, and appends a best-effort trade log.
=============================================================================
*/
mod bridge;
mod config;
mod domain;
mod ledger;
mod metrics;
mod protocol;
mod recorder;
mod session;
mod wallet;

use tokio::{
    select,
    sync::{mpsc, watch},
    time::Duration,
};
use tracing::{debug, error, info};

use crate::domain::{Event, RefreshScope, UiEvent};
use crate::ledger::Ledger;
use crate::protocol::{ExecutionMsg, OutboundMsg};
use crate::session::Session;
use crate::wallet::Wallet;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config (validated once, fatal only here) ----
    let args = match config::load() {
        Ok(a) => a,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(2);
        }
    };

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    // ---- Session state ----
    let wallet = match Wallet::new(args.base_currency.clone(), args.currencies.clone()) {
        Ok(w) => w,
        Err(e) => {
            error!(%e, "invalid wallet configuration");
            std::process::exit(2);
        }
    };
    let ledger = Ledger::new(args.history_capacity);

    // ---- Human-friendly startup info + export config to metrics ----
    info!(
        engine_mode = args.engine_mode.as_str(),
        engine_addr = %args.engine_addr,
        base = %args.base_currency,
        currencies = args.currencies.len(),
        history_capacity = args.history_capacity,
        record_file = ?args.record_file,
        "startup config"
    );
    metrics::CONFIG_ENGINE_MODE
        .with_label_values(&[args.engine_mode.as_str()])
        .set(1);
    for (code, spec) in args.currencies.iter() {
        metrics::CONFIG_CURRENCY_RATE
            .with_label_values(&[code])
            .set(spec.rate);
    }

    // ---- Buses ----
    let (ui_tx, ui_rx) = mpsc::channel::<UiEvent>(256);
    let (out_tx, out_rx) = mpsc::channel::<OutboundMsg>(256);
    let (exec_tx, exec_rx) = mpsc::channel::<ExecutionMsg>(1024);
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);

    // ---- Recorder (best-effort trade log) ----
    if let Some(path) = args.record_file.clone() {
        tokio::spawn(recorder::run(rec_rx, path));
    }

    // ---- Engine link ----
    match args.engine_mode {
        config::EngineMode::Mock => {
            tokio::spawn(bridge::run_mock(exec_tx));
            tokio::spawn(bridge::run_disconnected(out_rx));
        }
        config::EngineMode::Tcp => {
            tokio::spawn(bridge::run_tcp(args.engine_addr.clone(), out_rx, exec_tx));
        }
    }

    // ---- Session dispatcher ----
    let session = Session::new(wallet, ledger);
    let (snap_tx, mut snap_rx) = watch::channel(session.snapshot(RefreshScope::Both));
    tokio::spawn(session::run(session, ui_rx, exec_rx, out_tx, rec_tx, snap_tx));

    // ui_tx is the write entry point for the presentation layer (company /
    // strategy / currency changes, undo). No UI ships in this binary; hold
    // the sender so the channel stays open for one to attach.
    let _ui_tx = ui_tx;

    // ---- Heartbeat + refresh watcher ----
    loop {
        select! {
            res = snap_rx.changed() => match res {
                Ok(()) => {
                    let snap = snap_rx.borrow();
                    debug!(
                        refresh = ?snap.refresh,
                        company = %snap.company,
                        balance = snap.balance,
                        "view refresh"
                    );
                }
                Err(_) => {
                    error!("session task stopped");
                    break;
                }
            },
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                let snap = snap_rx.borrow();
                info!(
                    company = %snap.company,
                    currency = %snap.currency,
                    balance = snap.balance,
                    trades = metrics::TRADES.get(),
                    "heartbeat"
                );
            }
        }
    }
}
