//! Streaming wire protocol decoding.
//!
//! The backend streams `data: <json>` records terminated by a blank line.
//! Record payloads are tagged: `user_message` (echo of the submitted
//! message), `ai_message` (one delta of assistant text), `done` (finalized
//! assistant content), `error` (server-side failure). The decoder turns
//! raw transport chunks into [`StreamEvent`]s; it never emits from an
//! incomplete record, so chunk boundaries — including ones that split a
//! UTF-8 sequence — cannot affect the decoded sequence.

use serde::Deserialize;

use crate::ChatError;

/// One decoded unit of a streaming call. Transient: exists only for the
/// duration of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An increment of assistant-generated text.
    Delta { text: String },
    /// Terminal: the finalized assistant message content.
    Done { message: String },
    /// Terminal: the server reported a failure mid-stream.
    Error { reason: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// Lifecycle of one streaming call. Terminal phases are entered exactly
/// once and are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Aborted,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Failed | StreamPhase::Aborted
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    UserMessage,
    AiMessage { content: String },
    Done {
        #[serde(default)]
        content: String,
    },
    Error { message: String },
}

/// Incremental record parser with retained partial-record state.
///
/// Chunks are appended to an internal buffer; each complete blank-line
/// terminated record is parsed and emitted in order, and consumed bytes
/// are dropped. A malformed record terminates the stream with a decode
/// error — events decoded before it stand.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
    terminated: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a terminal record (or a decode failure) was seen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one transport chunk; returns the events completed by it, in
    /// wire order. At most one `Err` is produced, always last.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, ChatError>> {
        let mut out = Vec::new();
        if self.terminated {
            return out;
        }
        self.buf.extend_from_slice(chunk);

        while let Some((end, consumed)) = record_boundary(&self.buf) {
            let raw: Vec<u8> = self.buf[..end].to_vec();
            self.buf.drain(..consumed);

            match parse_record(&raw) {
                Ok(None) => continue,
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    out.push(Ok(event));
                    if terminal {
                        self.terminated = true;
                        break;
                    }
                }
                Err(e) => {
                    out.push(Err(e));
                    self.terminated = true;
                    break;
                }
            }
        }
        out
    }

    /// Signal end of input. A close without a prior terminal record is an
    /// incomplete stream.
    pub fn finish(&mut self) -> Result<(), ChatError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        Err(ChatError::IncompleteStream)
    }
}

/// Find the next complete record: returns (record end, bytes consumed
/// including the delimiter). Handles both `\n\n` and `\r\n\r\n` framing.
fn record_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1] == b'\n' {
                return Some((i, i + 2));
            }
            if buf[i + 1] == b'\r' && i + 2 < buf.len() && buf[i + 2] == b'\n' {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}

fn parse_record(raw: &[u8]) -> Result<Option<StreamEvent>, ChatError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ChatError::Decode(format!("invalid utf-8 in stream record: {e}")))?;

    let mut data = String::new();
    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("data: ") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest);
        }
        // Other fields (event:, id:, retry:, comments) are ignored.
    }
    if data.is_empty() {
        return Ok(None);
    }

    let wire: WireEvent = serde_json::from_str(&data)
        .map_err(|e| ChatError::Decode(format!("malformed stream record: {e}")))?;

    Ok(match wire {
        // Echo of the message the caller just sent; the caller already
        // owns it, so it produces no event.
        WireEvent::UserMessage => None,
        WireEvent::AiMessage { content } => Some(StreamEvent::Delta { text: content }),
        WireEvent::Done { content } => Some(StreamEvent::Done { message: content }),
        WireEvent::Error { message } => Some(StreamEvent::Error { reason: message }),
    })
}
