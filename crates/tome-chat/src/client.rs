//! Ambient authenticated API client.
//!
//! Wraps a reqwest client with the API base URL, bearer injection from the
//! auth store, JSON encode/decode, and error normalization. The buffered
//! send path, session CRUD, and context building all go through here; the
//! streaming path talks to the backend origin directly (see `dispatch`).

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::AuthStore;
use crate::ChatError;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    auth: AuthStore,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: AuthStore,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            auth,
            http: reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .timeout(request_timeout)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    pub fn from_config(config: &tome_config::TomeConfig, auth: AuthStore) -> Self {
        Self::new(
            config.api.base_url.clone(),
            auth,
            Duration::from_secs(config.api.connect_timeout_secs),
            Duration::from_secs(config.api.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.resolve_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ChatError> {
        let request = self.apply_auth(self.http.get(self.url(path)).query(query));
        Self::read_json(Self::send(request).await?).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ChatError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.apply_auth(self.http.post(self.url(path)).json(body));
        Self::read_json(Self::send(request).await?).await
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ChatError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.apply_auth(self.http.put(self.url(path)).json(body));
        Self::read_json(Self::send(request).await?).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ChatError> {
        let request = self.apply_auth(self.http.delete(self.url(path)));
        Self::send(request).await?;
        Ok(())
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ChatError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_status(status.as_u16(), &body))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ChatError> {
        response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))
    }
}

/// Normalize a non-success response into a `ChatError`.
///
/// The backend wraps error messages as `{"detail": "..."}`; that message is
/// surfaced verbatim when present, otherwise a generic one is used.
pub(crate) fn error_from_status(status: u16, body: &str) -> ChatError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| format!("request failed with status {status}"));

    if status == 404 {
        ChatError::NotFound(message)
    } else {
        ChatError::Http { status, message }
    }
}
