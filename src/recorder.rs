// ===============================
// src/recorder.rs
// ===============================
//
// Best-effort trade log:
// - One human-readable line per event, appended to a plain text file.
// - Buffered with BufWriter, flushed periodically and on shutdown.
// - Any failure (open or write) is logged and swallowed; a line that
//   cannot be written after one reopen is dropped. The ledger never
//   hears about it.
//
use std::path::Path;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::domain::Event;

async fn open_writer(path: &str) -> Option<BufWriter<tokio::fs::File>> {
    // Make sure the parent directory exists (when there is one)
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!(?e, %path, "recorder: create_dir_all failed");
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(path).await {
        Ok(file) => Some(BufWriter::new(file)),
        Err(e) => {
            warn!(?e, %path, "recorder: open failed, trade log unavailable");
            None
        }
    }
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    info!(%path, "recorder: started");
    let mut writer = open_writer(&path).await;

    // Periodic flush (every 1s) + count-based flush
    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;
    const FLUSH_EVERY_N_EVENTS: u32 = 16;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let line = format!("{ev}\n");

                        if writer.is_none() {
                            writer = open_writer(&path).await;
                        }
                        let Some(w) = writer.as_mut() else {
                            // still unwritable: drop the line, keep running
                            continue;
                        };

                        if let Err(e) = w.write_all(line.as_bytes()).await {
                            error!(?e, "recorder: write failed, attempting reopen");
                            writer = open_writer(&path).await;
                            // one retry after reopen, then drop the line
                            if let Some(w2) = writer.as_mut() {
                                if let Err(e2) = w2.write_all(line.as_bytes()).await {
                                    error!(?e2, "recorder: write failed again after reopen, drop line");
                                }
                            }
                            continue;
                        }

                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                            let _ = w.flush().await;
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        // Channel closed: flush and exit
                        if let Some(w) = writer.as_mut() {
                            let _ = w.flush().await;
                        }
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                if let Some(w) = writer.as_mut() {
                    let _ = w.flush().await;
                }
                since_last_flush = 0;
            }
        }
    }
}
