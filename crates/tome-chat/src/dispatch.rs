//! Message dispatch: buffered and streaming delivery.
//!
//! Both modes carry the same payload to `/chat/execute`. The buffered
//! path goes through the ambient API client and returns the complete set
//! of new messages in one response. The streaming path opens a long-lived
//! connection directly against the backend origin (the reverse proxy in
//! front of the API buffers response bodies) with a bearer token read
//! fresh from the auth store, and hands the caller a [`ChatStream`] as
//! soon as headers arrive.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tome_common::new_request_id;
use tome_config::ApiConfig;

use crate::auth::AuthStore;
use crate::client::{self, ApiClient};
use crate::context::{ContextBuilder, ContextReference, ResolvedContext};
use crate::streaming::{StreamDecoder, StreamEvent, StreamPhase};
use crate::{ChatError, ChatMessage};

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    session_id: &'a str,
    message: &'a str,
    context: &'a ResolvedContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_override: Option<&'a str>,
}

/// The buffered response: every newly created message, applied by the
/// caller in one step or not at all.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

type BusySet = Arc<Mutex<HashSet<String>>>;

/// Marks a session as having an in-flight request; released on drop, so
/// an early return or a dropped stream handle always frees the session.
pub(crate) struct SessionGuard {
    set: BusySet,
    session_id: String,
}

impl SessionGuard {
    fn acquire(set: &BusySet, session_id: &str) -> Result<Self, ChatError> {
        let mut held = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(session_id.to_string()) {
            return Err(ChatError::Busy);
        }
        Ok(Self {
            set: Arc::clone(set),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut held = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.session_id);
    }
}

pub struct MessageDispatcher {
    api: ApiClient,
    context: ContextBuilder,
    auth: AuthStore,
    backend_origin: String,
    // Connect timeout only: the response body outlives any per-request
    // deadline, and stall handling belongs to the caller.
    stream_http: reqwest::Client,
    busy: BusySet,
}

impl MessageDispatcher {
    pub fn new(
        api: ApiClient,
        context: ContextBuilder,
        auth: AuthStore,
        api_config: &ApiConfig,
    ) -> Self {
        Self {
            api,
            context,
            auth,
            backend_origin: api_config.backend_origin.trim_end_matches('/').to_string(),
            stream_http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(api_config.connect_timeout_secs))
                .build()
                .expect("failed to build HTTP client"),
            busy: BusySet::default(),
        }
    }

    /// Buffered send: one round-trip carrying the message plus resolved
    /// context; the full set of new messages comes back, or an error and
    /// no messages at all.
    pub async fn send(
        &self,
        session_id: &str,
        content: &str,
        references: &[ContextReference],
        model_override: Option<&str>,
    ) -> Result<SendResponse, ChatError> {
        let _guard = SessionGuard::acquire(&self.busy, session_id)?;
        let request_id = new_request_id();
        let context = self.context.build(references).await?;

        debug!(%request_id, session_id, "buffered chat send");
        self.api
            .post_json(
                "/chat/execute",
                &ExecuteRequest {
                    session_id,
                    message: content,
                    context: &context,
                    model_override,
                },
            )
            .await
    }

    /// Streaming send. Returns once the connection is established and the
    /// status line is in; the body is consumed through the returned
    /// handle. A non-success status here is a hard failure — no handle,
    /// no events, no assistant message.
    pub async fn send_streaming(
        &self,
        session_id: &str,
        content: &str,
        references: &[ContextReference],
        model_override: Option<&str>,
    ) -> Result<ChatStream, ChatError> {
        let guard = SessionGuard::acquire(&self.busy, session_id)?;
        let request_id = new_request_id();
        let context = self.context.build(references).await?;

        // Fresh read per call: a rotated token applies to the next stream
        // without restarting the application.
        let token = self.auth.resolve_token();
        let url = format!("{}/api/chat/execute", self.backend_origin);
        debug!(
            %request_id,
            session_id,
            authenticated = token.is_some(),
            "streaming chat send"
        );

        let mut request = self.stream_http.post(&url).json(&ExecuteRequest {
            session_id,
            message: content,
            context: &context,
            model_override,
        });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(client::error_from_status(status.as_u16(), &body));
        }

        Ok(ChatStream::from_byte_stream(
            response
                .bytes_stream()
                .map(|result| {
                    result
                        .map(|bytes| bytes.to_vec())
                        .map_err(|e| ChatError::Transport(e.to_string()))
                })
                .boxed(),
            Some(guard),
        ))
    }
}

/// Caller-owned handle over one streaming call.
///
/// Events come out strictly in the order the transport emitted them. The
/// caller may [`abort`](ChatStream::abort) at any point; an abort is a
/// contained action, not an error, and the partially decoded content is
/// simply abandoned.
pub struct ChatStream {
    inner: BoxStream<'static, Result<Vec<u8>, ChatError>>,
    decoder: StreamDecoder,
    queued: VecDeque<Result<StreamEvent, ChatError>>,
    phase: StreamPhase,
    _guard: Option<SessionGuard>,
}

impl ChatStream {
    pub(crate) fn from_byte_stream(
        inner: BoxStream<'static, Result<Vec<u8>, ChatError>>,
        guard: Option<SessionGuard>,
    ) -> Self {
        Self {
            inner,
            decoder: StreamDecoder::new(),
            queued: VecDeque::new(),
            phase: StreamPhase::Connecting,
            _guard: guard,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Next event, in transport order. `None` once the stream is over:
    /// after a terminal event, a yielded error, or an abort.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ChatError>> {
        loop {
            if let Some(item) = self.queued.pop_front() {
                match &item {
                    Ok(StreamEvent::Done { .. }) => self.phase = StreamPhase::Completed,
                    Ok(StreamEvent::Error { .. }) | Err(_) => self.phase = StreamPhase::Failed,
                    Ok(StreamEvent::Delta { .. }) => {}
                }
                return Some(item);
            }
            if self.phase.is_terminal() {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    if self.phase == StreamPhase::Connecting {
                        self.phase = StreamPhase::Streaming;
                    }
                    self.queued.extend(self.decoder.feed(&chunk));
                }
                Some(Err(e)) => {
                    self.phase = StreamPhase::Failed;
                    return Some(Err(e));
                }
                None => match self.decoder.finish() {
                    Ok(()) => {
                        self.phase = StreamPhase::Completed;
                        return None;
                    }
                    Err(e) => {
                        self.phase = StreamPhase::Failed;
                        return Some(Err(e));
                    }
                },
            }
        }
    }

    /// Drop the connection and stop producing events.
    pub fn abort(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = StreamPhase::Aborted;
        }
        self.inner = stream::empty().boxed();
        self.queued.clear();
        debug!("chat stream aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(chunks: Vec<&str>) -> BoxStream<'static, Result<Vec<u8>, ChatError>> {
        let owned: Vec<Result<Vec<u8>, ChatError>> = chunks
            .into_iter()
            .map(|c| Ok(c.as_bytes().to_vec()))
            .collect();
        stream::iter(owned).boxed()
    }

    fn delta(text: &str) -> String {
        format!("data: {{\"type\":\"ai_message\",\"content\":\"{text}\"}}\n\n")
    }

    fn done(text: &str) -> String {
        format!("data: {{\"type\":\"done\",\"content\":\"{text}\"}}\n\n")
    }

    #[test]
    fn execute_request_shape() {
        let context = ResolvedContext::default();
        let request = ExecuteRequest {
            session_id: "s1",
            message: "hello",
            context: &context,
            model_override: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "session_id": "s1",
                "message": "hello",
                "context": {"blocks": [], "token_count": 0, "char_count": 0}
            })
        );
    }

    #[test]
    fn execute_request_carries_model_override() {
        let context = ResolvedContext::default();
        let request = ExecuteRequest {
            session_id: "s1",
            message: "hello",
            context: &context,
            model_override: Some("small"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model_override"], "small");
    }

    #[test]
    fn send_response_deserializes() {
        let json = r#"{
            "session_id": "s1",
            "messages": [
                {"id": "m1", "session_id": "s1", "role": "user",
                 "content": "hello", "created_at": "2025-06-01T10:00:00Z"},
                {"id": "m2", "session_id": "s1", "role": "assistant",
                 "content": "hi", "created_at": "2025-06-01T10:00:02Z"}
            ]
        }"#;
        let response: SendResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.session_id, "s1");
        assert_eq!(response.messages.len(), 2);
    }

    #[test]
    fn session_guard_blocks_second_acquire() {
        let set = BusySet::default();
        let guard = SessionGuard::acquire(&set, "s1").unwrap();
        assert!(matches!(
            SessionGuard::acquire(&set, "s1"),
            Err(ChatError::Busy)
        ));
        // A different session is unaffected.
        let _other = SessionGuard::acquire(&set, "s2").unwrap();

        drop(guard);
        assert!(SessionGuard::acquire(&set, "s1").is_ok());
    }

    #[tokio::test]
    async fn streams_events_in_transport_order() {
        let mut chat_stream = ChatStream::from_byte_stream(
            byte_stream(vec![&delta("He"), &delta("llo"), &done("Hello")]),
            None,
        );
        assert_eq!(chat_stream.phase(), StreamPhase::Connecting);

        let e1 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(e1, StreamEvent::Delta { text: "He".into() });
        assert_eq!(chat_stream.phase(), StreamPhase::Streaming);

        let e2 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(e2, StreamEvent::Delta { text: "llo".into() });

        let e3 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(
            e3,
            StreamEvent::Done {
                message: "Hello".into()
            }
        );
        assert_eq!(chat_stream.phase(), StreamPhase::Completed);

        assert!(chat_stream.next_event().await.is_none());
        assert_eq!(chat_stream.phase(), StreamPhase::Completed);
    }

    #[tokio::test]
    async fn split_chunks_yield_the_same_events() {
        let body = format!("{}{}{}", delta("He"), delta("llo"), done("Hello"));
        let halves = body.split_at(body.len() / 2);
        let mut chat_stream =
            ChatStream::from_byte_stream(byte_stream(vec![halves.0, halves.1]), None);

        let mut events = Vec::new();
        while let Some(event) = chat_stream.next_event().await {
            events.push(event.unwrap());
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta { text: "He".into() },
                StreamEvent::Delta { text: "llo".into() },
                StreamEvent::Done {
                    message: "Hello".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn close_without_done_fails_as_incomplete() {
        let mut chat_stream =
            ChatStream::from_byte_stream(byte_stream(vec![&delta("partial")]), None);

        let e1 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(
            e1,
            StreamEvent::Delta {
                text: "partial".into()
            }
        );

        let e2 = chat_stream.next_event().await.unwrap();
        assert!(matches!(e2, Err(ChatError::IncompleteStream)));
        assert_eq!(chat_stream.phase(), StreamPhase::Failed);
        assert!(chat_stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn malformed_record_fails_after_prior_deltas() {
        let body = format!("{}data: {{nope\n\n", delta("keep"));
        let mut chat_stream = ChatStream::from_byte_stream(byte_stream(vec![&body]), None);

        let e1 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(e1, StreamEvent::Delta { text: "keep".into() });

        let e2 = chat_stream.next_event().await.unwrap();
        assert!(matches!(e2, Err(ChatError::Decode(_))));
        assert_eq!(chat_stream.phase(), StreamPhase::Failed);
    }

    #[tokio::test]
    async fn transport_error_mid_stream_fails() {
        let items: Vec<Result<Vec<u8>, ChatError>> = vec![
            Ok(delta("a").into_bytes()),
            Err(ChatError::Transport("connection reset".into())),
        ];
        let mut chat_stream = ChatStream::from_byte_stream(stream::iter(items).boxed(), None);

        let e1 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(e1, StreamEvent::Delta { text: "a".into() });

        let e2 = chat_stream.next_event().await.unwrap();
        assert!(matches!(e2, Err(ChatError::Transport(_))));
        assert_eq!(chat_stream.phase(), StreamPhase::Failed);
    }

    #[tokio::test]
    async fn abort_ends_the_stream_silently() {
        let mut chat_stream = ChatStream::from_byte_stream(
            byte_stream(vec![&delta("He"), &delta("llo"), &done("Hello")]),
            None,
        );

        let e1 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(e1, StreamEvent::Delta { text: "He".into() });

        chat_stream.abort();
        assert_eq!(chat_stream.phase(), StreamPhase::Aborted);
        assert!(chat_stream.next_event().await.is_none());
        // Terminal phases are final.
        assert_eq!(chat_stream.phase(), StreamPhase::Aborted);
    }

    #[tokio::test]
    async fn abort_after_completion_keeps_completed_phase() {
        let mut chat_stream =
            ChatStream::from_byte_stream(byte_stream(vec![&done("fin")]), None);
        while chat_stream.next_event().await.is_some() {}
        assert_eq!(chat_stream.phase(), StreamPhase::Completed);

        chat_stream.abort();
        assert_eq!(chat_stream.phase(), StreamPhase::Completed);
    }

    #[tokio::test]
    async fn guard_releases_when_stream_drops() {
        let set = BusySet::default();
        let guard = SessionGuard::acquire(&set, "s1").unwrap();
        let chat_stream =
            ChatStream::from_byte_stream(byte_stream(vec![&done("fin")]), Some(guard));
        assert!(matches!(
            SessionGuard::acquire(&set, "s1"),
            Err(ChatError::Busy)
        ));

        drop(chat_stream);
        assert!(SessionGuard::acquire(&set, "s1").is_ok());
    }

    #[tokio::test]
    async fn error_event_marks_stream_failed() {
        let body = format!(
            "{}data: {{\"type\":\"error\",\"message\":\"model unavailable\"}}\n\n",
            delta("part")
        );
        let mut chat_stream = ChatStream::from_byte_stream(byte_stream(vec![&body]), None);

        let _ = chat_stream.next_event().await.unwrap().unwrap();
        let e2 = chat_stream.next_event().await.unwrap().unwrap();
        assert_eq!(
            e2,
            StreamEvent::Error {
                reason: "model unavailable".into()
            }
        );
        assert_eq!(chat_stream.phase(), StreamPhase::Failed);
        assert!(chat_stream.next_event().await.is_none());
    }
}
