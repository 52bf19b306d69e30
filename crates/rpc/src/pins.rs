//! Incremental listing of locally pinned content.

use crate::error::{Result, RpcError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::VecDeque;

use stowage_types::ContentId;

/// A pass over the pinned content identifiers. Finite or unbounded;
/// dropping the stream stops the pass.
pub type ContentStream = BoxStream<'static, Result<ContentId>>;

/// Content-pin lookup capability.
///
/// Each call begins a fresh, restartable pass; consumers read
/// incrementally and may stop mid-sequence.
#[async_trait]
pub trait PinLookup: Send + Sync {
    async fn pinned_content(&self) -> Result<ContentStream>;
}

#[derive(Debug, Deserialize)]
struct PinLsLine {
    #[serde(rename = "Cid")]
    cid: String,
}

fn parse_pin_line(line: &str) -> Result<ContentId> {
    let parsed: PinLsLine = serde_json::from_str(line)?;
    ContentId::new(parsed.cid)
        .map_err(|err| RpcError::InvalidPayload(format!("pin listing: {err}")))
}

/// Pin lookup backed by an IPFS-style HTTP API using the streaming
/// `pin/ls` endpoint (one JSON object per line).
#[derive(Debug, Clone)]
pub struct HttpPinLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPinLookup {
    /// Lookup against an API endpoint, e.g. `http://127.0.0.1:5001`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/v0/pin/ls?stream=true",
            self.base_url.trim_end_matches('/')
        )
    }
}

struct LineSplitter<S> {
    body: S,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl PinLookup for HttpPinLookup {
    async fn pinned_content(&self) -> Result<ContentStream> {
        let response = self.client.post(self.endpoint()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status));
        }

        let splitter = LineSplitter {
            body: response.bytes_stream().boxed(),
            buf: String::new(),
            pending: VecDeque::new(),
            done: false,
        };
        let stream = futures::stream::unfold(splitter, |mut state| async move {
            loop {
                if let Some(line) = state.pending.pop_front() {
                    return Some((parse_pin_line(&line), state));
                }
                if state.done {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        state.buf.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = state.buf.find('\n') {
                            let line = state.buf[..pos].trim().to_string();
                            state.buf.drain(..=pos);
                            if !line.is_empty() {
                                state.pending.push_back(line);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(RpcError::Transport(err)), state));
                    }
                    None => {
                        state.done = true;
                        let rest = state.buf.trim().to_string();
                        state.buf.clear();
                        if !rest.is_empty() {
                            state.pending.push_back(rest);
                        }
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}
