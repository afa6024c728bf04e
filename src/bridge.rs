// ===============================
// src/bridge.rs
// ===============================
//
// Engine link adapters:
// - run_tcp  : persistent JSON stream to the strategy engine. Connects
//              once; on loss, outbound messages degrade to logged no-ops.
//              Reconnecting is the supervisor's job, not ours.
// - run_mock : local stand-in generating executions (~1 every 2s) so the
//              session runs without the external process.
//
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::metrics::{ENGINE_CONNECTED, MSGS_MALFORMED, OUTBOUND_SENT};
use crate::protocol::{encode_outbound, Decoder, ExecutionMsg, OutboundMsg};

/// Bidirectional pump over one TCP connection. Inbound bytes go through
/// the decoder into the execution channel; outbound selection messages go
/// onto the socket. Malformed inbound chunks are dropped and counted.
pub async fn run_tcp(
    addr: String,
    mut out_rx: mpsc::Receiver<OutboundMsg>,
    exec_tx: mpsc::Sender<ExecutionMsg>,
) {
    info!(%addr, "connecting to strategy engine");
    let stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(e) => {
            error!(?e, %addr, "engine connect failed, outbound messages become no-ops");
            run_disconnected(out_rx).await;
            return;
        }
    };
    info!(%addr, "engine link up");
    ENGINE_CONNECTED.set(1);

    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = Decoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            res = reader.read(&mut read_buf) => match res {
                Ok(0) => {
                    info!("engine closed the connection");
                    break;
                }
                Ok(n) => {
                    decoder.push(&read_buf[..n]);
                    let drained = decoder.drain();
                    if drained.dropped > 0 {
                        MSGS_MALFORMED.inc_by(drained.dropped as u64);
                        warn!(dropped = drained.dropped, "undecodable engine payload dropped");
                    }
                    for msg in drained.msgs {
                        if exec_tx.send(msg).await.is_err() {
                            // session gone, nothing left to feed
                            ENGINE_CONNECTED.set(0);
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!(?e, "engine read error");
                    break;
                }
            },
            maybe = out_rx.recv() => match maybe {
                Some(msg) => {
                    let kind = msg.kind();
                    if let Err(e) = writer.write_all(&encode_outbound(&msg)).await {
                        error!(?e, kind, "engine write failed");
                        break;
                    }
                    OUTBOUND_SENT.with_label_values(&[kind]).inc();
                }
                None => {
                    info!("outbound channel closed, engine link stopping");
                    ENGINE_CONNECTED.set(0);
                    return;
                }
            },
        }
    }

    ENGINE_CONNECTED.set(0);
    // keep draining so UI selection events never block on a dead link
    run_disconnected(out_rx).await;
}

/// No engine reachable: accept and drop outbound messages.
pub async fn run_disconnected(mut out_rx: mpsc::Receiver<OutboundMsg>) {
    while let Some(msg) = out_rx.recv().await {
        debug!(kind = msg.kind(), "no engine link, outbound message dropped");
    }
}

const MOCK_PERIOD: Duration = Duration::from_secs(2);

/// Random-walk stand-in for the engine: price walks around a slow mean,
/// BUY above it, SELL below, with a running balance. Emits the same
/// execution schema as the real engine.
pub async fn run_mock(exec_tx: mpsc::Sender<ExecutionMsg>) {
    info!("mock engine started");
    let mut px_cents: i64 = 150_00;
    let mut mean_cents: f64 = 150_00.0;
    let mut balance: f64 = 10_000.0;

    loop {
        // do not hold ThreadRng across an .await
        let step = rand::thread_rng().gen_range(-150..=150);
        px_cents = (px_cents + step).max(1_00);
        mean_cents = mean_cents * 0.9 + px_cents as f64 * 0.1;

        let price = px_cents as f64 / 100.0;
        let amount: i64 = 10;
        let action = if (px_cents as f64) > mean_cents { "BUY" } else { "SELL" };
        match action {
            "BUY" => balance -= price * amount as f64,
            _ => balance += price * amount as f64,
        }

        let msg = ExecutionMsg {
            balance,
            action: action.to_string(),
            price,
            amount,
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        if exec_tx.send(msg).await.is_err() {
            info!("mock engine stopped, session gone");
            return;
        }
        sleep(MOCK_PERIOD).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn exec(balance: f64) -> ExecutionMsg {
        ExecutionMsg {
            balance,
            action: "SELL".to_string(),
            price: 150.25,
            amount: 10,
            timestamp: "T1".to_string(),
        }
    }

    #[tokio::test]
    async fn tcp_link_decodes_inbound_and_writes_outbound() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (out_tx, out_rx) = mpsc::channel(8);
        let (exec_tx, mut exec_rx) = mpsc::channel(8);
        tokio::spawn(run_tcp(addr, out_rx, exec_tx));

        let (mut peer, _) = listener.accept().await.unwrap();

        // two executions coalesced into one write still both arrive
        let mut bytes = serde_json::to_vec(&exec(1.0)).unwrap();
        bytes.extend(serde_json::to_vec(&exec(2.0)).unwrap());
        peer.write_all(&bytes).await.unwrap();

        let m1 = timeout(Duration::from_secs(2), exec_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let m2 = timeout(Duration::from_secs(2), exec_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m1.balance, 1.0);
        assert_eq!(m2.balance, 2.0);

        // outbound selection messages show up on the socket as bare JSON
        out_tx
            .send(OutboundMsg::Company("AAPL".to_string()))
            .await
            .unwrap();
        let mut buf = [0u8; 256];
        let n = timeout(Duration::from_secs(2), peer.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(v, serde_json::json!({"type": "company", "value": "AAPL"}));
    }

    #[tokio::test]
    async fn malformed_inbound_is_dropped_without_mutating_anything() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (_out_tx, out_rx) = mpsc::channel(8);
        let (exec_tx, mut exec_rx) = mpsc::channel(8);
        tokio::spawn(run_tcp(addr, out_rx, exec_tx));

        let (mut peer, _) = listener.accept().await.unwrap();
        peer.write_all(br#"{"type":"noise"}"#).await.unwrap();
        peer.write_all(&serde_json::to_vec(&exec(7.0)).unwrap())
            .await
            .unwrap();

        // only the well-formed execution comes through
        let m = timeout(Duration::from_secs(2), exec_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.balance, 7.0);
    }

    #[tokio::test]
    async fn mock_engine_emits_valid_executions() {
        let (exec_tx, mut exec_rx) = mpsc::channel(8);
        tokio::spawn(run_mock(exec_tx));

        let msg = timeout(Duration::from_secs(2), exec_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(msg.action == "BUY" || msg.action == "SELL");
        assert!(msg.price > 0.0);
        assert_eq!(msg.amount, 10);
        assert!(!msg.timestamp.is_empty());
    }
}
