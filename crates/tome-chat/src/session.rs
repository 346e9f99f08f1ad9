//! Chat session CRUD.
//!
//! Every operation is a remote call against the backend's single source of
//! truth; there is no local cache and no retry. Failures surface as
//! `ChatError` to the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ApiClient;
use crate::{ChatError, ChatMessage, ChatSession};

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub notebook_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

impl CreateSessionRequest {
    pub fn new(notebook_id: impl Into<String>) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            title: None,
            model_override: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }
}

/// Partial update; unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

/// A session plus its full transcript, messages in creation order.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionWithMessages {
    #[serde(flatten)]
    pub session: ChatSession,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

pub struct SessionManager {
    api: ApiClient,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// All sessions owned by a notebook.
    pub async fn list(&self, notebook_id: &str) -> Result<Vec<ChatSession>, ChatError> {
        debug!(notebook_id, "listing chat sessions");
        self.api
            .get_json("/chat/sessions", &[("notebook_id", notebook_id)])
            .await
    }

    pub async fn create(&self, request: &CreateSessionRequest) -> Result<ChatSession, ChatError> {
        debug!(notebook_id = %request.notebook_id, "creating chat session");
        self.api.post_json("/chat/sessions", request).await
    }

    /// Session plus transcript. The backend returns messages in creation
    /// order; that order is preserved as-is.
    pub async fn get(&self, session_id: &str) -> Result<SessionWithMessages, ChatError> {
        debug!(session_id, "fetching chat session");
        self.api
            .get_json(&format!("/chat/sessions/{session_id}"), &[])
            .await
    }

    pub async fn update(
        &self,
        session_id: &str,
        patch: &UpdateSessionRequest,
    ) -> Result<ChatSession, ChatError> {
        debug!(session_id, "updating chat session");
        self.api
            .put_json(&format!("/chat/sessions/{session_id}"), patch)
            .await
    }

    /// Delete a session. A second delete of the same id surfaces the
    /// backend's not-found error, never a crash.
    pub async fn delete(&self, session_id: &str) -> Result<(), ChatError> {
        debug!(session_id, "deleting chat session");
        self.api
            .delete(&format!("/chat/sessions/{session_id}"))
            .await
    }
}
