// ===============================
// src/protocol.rs
// ===============================
//
// Wire types and decode for the engine link. The peer sends bare JSON
// objects on a persistent stream with no framing, so the decoder
// accumulates bytes and extracts every complete object: split reads wait
// for the rest, coalesced reads all come out, garbage is skipped to the
// next '{' and counted. The wire format itself is unchanged.
//
use serde::{Deserialize, Serialize};

/// Selection notifications sent to the engine, fire-and-forget:
/// {"type":"company","value":"AAPL"} / {"type":"strategy","value":"EMA"}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OutboundMsg {
    Company(String),
    Strategy(String),
}

impl OutboundMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMsg::Company(_) => "company",
            OutboundMsg::Strategy(_) => "strategy",
        }
    }
}

/// One trade execution as the engine reports it. The company is NOT echoed
/// back; the session fills it in from the current selection. Unknown extra
/// fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMsg {
    pub balance: f64,
    pub action: String,
    pub price: f64,
    pub amount: i64,
    pub timestamp: String,
}

pub fn encode_outbound(msg: &OutboundMsg) -> Vec<u8> {
    // serde_json::to_vec on these variants cannot fail
    serde_json::to_vec(msg).unwrap_or_default()
}

/// Complete messages extracted from the byte stream so far. `dropped`
/// counts undecodable chunks (bad syntax or wrong shape) that were skipped.
#[derive(Debug, Default)]
pub struct Drained {
    pub msgs: Vec<ExecutionMsg>,
    pub dropped: usize,
}

/// Byte accumulator for the unframed inbound stream.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull out everything decodable right now. An incomplete object at the
    /// tail stays buffered for the next read; a complete object that is not
    /// an execution, or a stretch of non-JSON bytes, is dropped fail-open.
    pub fn drain(&mut self) -> Drained {
        let mut out = Drained::default();
        let mut consumed = 0usize;

        loop {
            let slice = &self.buf[consumed..];
            let mut stream =
                serde_json::Deserializer::from_slice(slice).into_iter::<serde_json::Value>();
            match stream.next() {
                Some(Ok(value)) => {
                    consumed += stream.byte_offset();
                    match serde_json::from_value::<ExecutionMsg>(value) {
                        Ok(msg) => out.msgs.push(msg),
                        Err(_) => out.dropped += 1,
                    }
                }
                // incomplete tail: keep it and wait for more bytes
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(_)) => {
                    out.dropped += 1;
                    // resync to the next candidate object start
                    match self.buf[consumed + 1..].iter().position(|&b| b == b'{') {
                        Some(idx) => consumed += 1 + idx,
                        None => {
                            consumed = self.buf.len();
                            break;
                        }
                    }
                }
                None => {
                    consumed = self.buf.len();
                    break;
                }
            }
        }

        self.buf.drain(..consumed);
        out
    }
}
