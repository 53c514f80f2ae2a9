use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::stream::{parse_sse_line, SseParsed, StreamEvent};

/// Parse Anthropic streaming SSE response and emit StreamEvents.
pub async fn process_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    process_byte_stream(resp.bytes_stream(), tx).await;
}

/// Reads raw SSE bytes, splits them into lines, emits events.
///
/// Lines are split on raw bytes before UTF-8 decoding so a multi-byte
/// character straddling two network chunks is never lost.
pub async fn process_byte_stream<S, B, E>(byte_stream: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut state = StreamState::default();
    let mut line_buf: Vec<u8> = Vec::new();

    futures_util::pin_mut!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        line_buf.extend_from_slice(chunk.as_ref());

        // keep the incomplete last line in the buffer
        while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = line_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(parsed) = parse_sse_line(line) {
                match parsed {
                    SseParsed::Event(ev) => state.current_event = ev,
                    SseParsed::Data(data) => {
                        if let Some(event) = state.parse_data_block(&data) {
                            if tx.send(event).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                    }
                }
            }
        }
    }

    // emit final Done event
    let _ = tx
        .send(StreamEvent::Done {
            model: state.model,
            tokens_in: state.tokens_in,
            tokens_out: state.tokens_out,
            stop_reason: state.stop_reason,
        })
        .await;
}

#[derive(Default)]
struct StreamState {
    current_event: String,
    model: String,
    tokens_in: u32,
    tokens_out: u32,
    stop_reason: String,
}

impl StreamState {
    /// Parse a single SSE data block based on the current event type.
    fn parse_data_block(&mut self, data: &str) -> Option<StreamEvent> {
        match self.current_event.as_str() {
            "message_start" => {
                if let Ok(msg) = serde_json::from_str::<MessageStart>(data) {
                    self.model = msg.message.model;
                    self.tokens_in = msg.message.usage.input_tokens;
                }
                None
            }

            "content_block_delta" => {
                let delta = serde_json::from_str::<ContentBlockDelta>(data).ok()?;
                match delta.delta.delta_type.as_str() {
                    "text_delta" => {
                        let text = delta.delta.text?;
                        debug!(len = text.len(), "stream text delta");
                        Some(StreamEvent::TextDelta { text })
                    }
                    // server tool input (web search queries) and citations
                    other => {
                        debug!(delta_type = other, "unhandled delta type");
                        None
                    }
                }
            }

            "message_delta" => {
                if let Ok(delta) = serde_json::from_str::<MessageDelta>(data) {
                    self.tokens_out = delta.usage.output_tokens;
                    if let Some(reason) = delta.delta.stop_reason {
                        self.stop_reason = reason;
                    }
                }
                None
            }

            "error" => {
                warn!(data, "anthropic stream error");
                Some(StreamEvent::Error {
                    message: data.to_string(),
                })
            }

            // content_block_start/stop, message_stop, ping: no action needed
            _ => None,
        }
    }
}

// Anthropic SSE data types (private, deserialization only)

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    model: String,
    usage: InputUsage,
}

#[derive(Deserialize)]
struct InputUsage {
    input_tokens: u32,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaContent,
}

#[derive(Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaInner,
    usage: OutputUsage,
}

#[derive(Deserialize)]
struct MessageDeltaInner {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct OutputUsage {
    output_tokens: u32,
}
