// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Session metrics --------
pub static TRADES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("trades_total", "executions applied to the ledger").unwrap());

pub static TRADES_UNDONE: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("trades_undone_total", "trades removed by undo").unwrap());

pub static WALLET_BALANCE: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("wallet_balance_base", "raw wallet balance in the base currency").unwrap()
});

// -------- Engine link metrics --------
pub static MSGS_MALFORMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "engine_messages_malformed_total",
        "inbound payloads dropped as undecodable",
    )
    .unwrap()
});

pub static OUTBOUND_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("outbound_messages_total", "selection messages written to the engine"),
        &["kind"],
    )
    .unwrap()
});

pub static ENGINE_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("engine_connected", "1 while the engine TCP link is up").unwrap()
});

// -------- Recorder --------
pub static RECORD_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "record_events_dropped_total",
        "trade log events dropped because the recorder queue was unavailable",
    )
    .unwrap()
});

// ---- Config visibility (engine mode / currency table) ----
pub static CONFIG_ENGINE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_engine_mode", "engine mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_CURRENCY_RATE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "config_currency_rate",
            "configured currencies (label: code) — value = rate vs base",
        ),
        &["code"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(TRADES.clone())),
        REGISTRY.register(Box::new(TRADES_UNDONE.clone())),
        REGISTRY.register(Box::new(WALLET_BALANCE.clone())),
        REGISTRY.register(Box::new(MSGS_MALFORMED.clone())),
        REGISTRY.register(Box::new(OUTBOUND_SENT.clone())),
        REGISTRY.register(Box::new(ENGINE_CONNECTED.clone())),
        REGISTRY.register(Box::new(RECORD_DROPPED.clone())),
        REGISTRY.register(Box::new(CONFIG_ENGINE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_CURRENCY_RATE.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("metrics bind {addr} failed: {e}");
                return;
            }
        };
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {e}"),
            }
        }
    });
}
