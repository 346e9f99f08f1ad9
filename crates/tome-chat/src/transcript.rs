//! Caller-side transcript state.
//!
//! Both delivery modes normalize into this append contract: a buffered
//! response is applied atomically; a stream accumulates pending assistant
//! content that becomes an immutable message only on a terminal event.

use chrono::Utc;
use tracing::warn;

use tome_common::new_id;

use crate::dispatch::SendResponse;
use crate::session::SessionWithMessages;
use crate::streaming::StreamEvent;
use crate::{ChatMessage, Role};

pub struct Transcript {
    session_id: String,
    messages: Vec<ChatMessage>,
    /// Assistant content under construction during a stream. Mutable until
    /// a terminal event; discarded on abort.
    pending: Option<String>,
}

impl Transcript {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            pending: None,
        }
    }

    /// Seed from a fetched session; the backend's creation order is kept.
    pub fn from_session(session: &SessionWithMessages) -> Self {
        Self {
            session_id: session.session.id.clone(),
            messages: session.messages.clone(),
            pending: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Assistant content decoded so far in an active stream, if any.
    pub fn pending_content(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Append the caller's own message optimistically (streaming path; the
    /// buffered path gets the echoed copy back from the server instead).
    pub fn push_user(&mut self, content: impl Into<String>) {
        let message = ChatMessage {
            id: new_id(),
            session_id: self.session_id.clone(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            incomplete: false,
        };
        self.messages.push(message);
    }

    /// Apply a buffered response atomically: all new messages or none.
    pub fn apply_send_response(&mut self, response: SendResponse) {
        if response.session_id != self.session_id {
            warn!(
                expected = %self.session_id,
                got = %response.session_id,
                "send response for a different session, ignoring"
            );
            return;
        }
        self.messages.extend(response.messages);
    }

    /// Apply one streaming event to the assistant message under
    /// construction.
    pub fn apply_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Delta { text } => {
                self.pending.get_or_insert_with(String::new).push_str(text);
            }
            StreamEvent::Done { message } => {
                // The terminal record carries the authoritative final
                // content; an empty one falls back to the accumulated
                // deltas.
                let accumulated = self.pending.take().unwrap_or_default();
                let content = if message.is_empty() {
                    accumulated
                } else {
                    message.clone()
                };
                self.push_assistant(content, false);
            }
            StreamEvent::Error { .. } => self.fail_stream(),
        }
    }

    /// The stream failed. Content decoded so far is kept as a message
    /// flagged incomplete; a failure before the first delta leaves the
    /// transcript untouched.
    pub fn fail_stream(&mut self) {
        if let Some(content) = self.pending.take() {
            if !content.is_empty() {
                self.push_assistant(content, true);
            }
        }
    }

    /// The caller aborted. The partial buffer is discarded, never
    /// persisted; the transcript stays at its last confirmed state.
    pub fn abort_stream(&mut self) {
        self.pending = None;
    }

    fn push_assistant(&mut self, content: String, incomplete: bool) {
        let message = ChatMessage {
            id: new_id(),
            session_id: self.session_id.clone(),
            role: Role::Assistant,
            content,
            created_at: Utc::now(),
            incomplete,
        };
        self.messages.push(message);
    }
}
