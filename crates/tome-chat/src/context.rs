//! Context assembly.
//!
//! Callers select notebook and source references; the backend resolves
//! them into text blocks for the model. References that fail to resolve
//! are dropped server-side — the selector UI is responsible for not
//! offering unresolvable ids in the first place.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ApiClient;
use crate::ChatError;

/// A caller-chosen pointer to content to include in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContextReference {
    Notebook { id: String },
    Source { id: String },
}

impl ContextReference {
    pub fn notebook(id: impl Into<String>) -> Self {
        Self::Notebook { id: id.into() }
    }

    pub fn source(id: impl Into<String>) -> Self {
        Self::Source { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Notebook { id } | Self::Source { id } => id,
        }
    }
}

/// One resolved text block, paired with the reference it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub reference: ContextReference,
    pub text: String,
}

/// The backend's answer: resolved blocks in request order, plus size
/// estimates for the quota display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContext {
    #[serde(default)]
    pub blocks: Vec<ContextBlock>,
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub char_count: u64,
}

impl ResolvedContext {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Clone)]
pub struct ContextBuilder {
    api: ApiClient,
}

impl ContextBuilder {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Resolve references into context blocks, preserving input order and
    /// multiplicity. An empty selection resolves to an empty context
    /// without a network call.
    pub async fn build(
        &self,
        references: &[ContextReference],
    ) -> Result<ResolvedContext, ChatError> {
        if references.is_empty() {
            return Ok(ResolvedContext::default());
        }
        debug!(count = references.len(), "resolving context references");
        self.api.post_json("/chat/context", references).await
    }
}
