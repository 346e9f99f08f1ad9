//! Notebook chat delivery layer.
//!
//! Session lifecycle, context assembly, and dual-mode message delivery
//! against the notebook backend:
//! - buffered: one round-trip, the complete set of new messages in the
//!   response
//! - streaming: a long-lived connection delivering the assistant reply
//!   incrementally, decoded record by record
//!
//! UI callers consume [`ChatService`]; rendering, UI state persistence,
//! and dictionary resolution stay with the host application.

pub mod auth;
pub mod client;
pub mod context;
pub mod dispatch;
pub mod session;
pub mod streaming;
pub mod transcript;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use auth::AuthStore;
pub use client::ApiClient;
pub use context::{ContextBlock, ContextBuilder, ContextReference, ResolvedContext};
pub use dispatch::{ChatStream, MessageDispatcher, SendResponse};
pub use session::{
    CreateSessionRequest, SessionManager, SessionWithMessages, UpdateSessionRequest,
};
pub use streaming::{StreamDecoder, StreamEvent, StreamPhase};
pub use transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in a session transcript. Immutable once appended; the only
/// exception is the assistant message under construction during a stream,
/// which lives in [`Transcript`] as pending content until a terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Client-side only: the message was finalized by a stream failure and
    /// holds whatever content had been decoded up to that point.
    #[serde(skip)]
    pub incomplete: bool,
}

/// A notebook-scoped conversation container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub notebook_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Network failure before any response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success status; the message comes from the server's structured
    /// error payload when present.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// A streaming record could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),

    /// The connection closed before a terminal event.
    #[error("stream ended before a terminal event")]
    IncompleteStream,

    #[error("not found: {0}")]
    NotFound(String),

    /// The session already has an in-flight request.
    #[error("session is busy with another request")]
    Busy,
}

/// Everything a UI caller needs: session CRUD, context building, and both
/// send paths, wired from one config and one auth store.
pub struct ChatService {
    sessions: SessionManager,
    context: ContextBuilder,
    dispatch: MessageDispatcher,
}

impl ChatService {
    pub fn new(config: &tome_config::TomeConfig, auth: AuthStore) -> Self {
        let api = ApiClient::from_config(config, auth.clone());
        let context = ContextBuilder::new(api.clone());
        let dispatch = MessageDispatcher::new(api.clone(), context.clone(), auth, &config.api);
        Self {
            sessions: SessionManager::new(api),
            context,
            dispatch,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_error_display() {
        let err = ChatError::Transport("connection refused".into());
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = ChatError::Http {
            status: 500,
            message: "Error executing chat: model unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "http 500: Error executing chat: model unavailable"
        );

        let err = ChatError::Decode("malformed stream record".into());
        assert_eq!(err.to_string(), "decode error: malformed stream record");

        let err = ChatError::IncompleteStream;
        assert_eq!(err.to_string(), "stream ended before a terminal event");

        let err = ChatError::NotFound("Session not found".into());
        assert_eq!(err.to_string(), "not found: Session not found");

        let err = ChatError::Busy;
        assert_eq!(err.to_string(), "session is busy with another request");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn chat_message_incomplete_flag_stays_client_side() {
        let json = r#"{
            "id": "m1",
            "session_id": "s1",
            "role": "assistant",
            "content": "partial",
            "created_at": "2025-06-01T10:00:00Z"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert!(!msg.incomplete);

        let out = serde_json::to_string(&msg).unwrap();
        assert!(!out.contains("incomplete"));
    }

    #[test]
    fn chat_session_optional_fields_default() {
        let json = r#"{
            "id": "s1",
            "notebook_id": "n1",
            "title": "Research",
            "created_at": "2025-06-01T10:00:00Z",
            "updated_at": "2025-06-01T10:05:00Z"
        }"#;
        let session: ChatSession = serde_json::from_str(json).unwrap();
        assert!(session.message_count.is_none());
        assert!(session.model_override.is_none());
    }
}
