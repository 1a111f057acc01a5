use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ApiEnvelope, ErrorResponse};
use std::sync::Arc;
use std::time::Duration;

use super::transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use crate::helpers::auth_store::AuthStore;
use crate::helpers::backoff::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("response interrupted: {0}")]
    Interrupted(String),

    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        retry_after: Option<String>,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<&str> {
        match self {
            HttpError::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }

    /// No response came back. From a browser host this is also how a
    /// blocked cross-origin request looks.
    pub fn is_network(&self) -> bool {
        matches!(self, HttpError::Network(_))
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

impl From<TransportError> for HttpError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(message) => HttpError::Network(message),
            TransportError::Timeout => HttpError::Timeout,
            TransportError::Interrupted(message) => HttpError::Interrupted(message),
        }
    }
}

impl Retryable for HttpError {
    fn status(&self) -> Option<u16> {
        HttpError::status(self)
    }

    fn retry_after(&self) -> Option<&str> {
        HttpError::retry_after(self)
    }
}

/// Per-request behavior switches
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Do not attach `x-graph-token`
    pub omit_graph_token: bool,
    /// The endpoint needs a valid Outlook token; auth failures mean
    /// "re-authenticate Outlook", not "session expired"
    pub graph_required: bool,
    /// Auth failures never clear the stored credentials
    pub preserve_session: bool,
    /// Non-2xx statuses handed back as responses instead of errors
    pub accept: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Adds a query parameter; `None` is skipped
    pub fn query<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.query.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, HttpError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn accept(mut self, status: u16) -> Self {
        self.options.accept.push(status);
        self
    }

    pub fn omit_graph_token(mut self) -> Self {
        self.options.omit_graph_token = true;
        self
    }

    pub fn graph_required(mut self) -> Self {
        self.options.graph_required = true;
        self
    }

    pub fn preserve_session(mut self) -> Self {
        self.options.preserve_session = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Backend API client. Attaches credentials from the [`AuthStore`] and turns
/// failed responses into [`HttpError`]s, signing the user out when the
/// backend rejects the session.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    auth: AuthStore,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>, auth: AuthStore) -> Self {
        Self { transport, auth }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub async fn send(&self, request: ApiRequest) -> Result<TransportResponse, HttpError> {
        let ApiRequest {
            method,
            path,
            query,
            mut headers,
            body,
            timeout,
            options,
        } = request;

        let state = self.auth.state();
        if let Some(jwt) = &state.jwt {
            headers.push(("Authorization".to_string(), format!("Bearer {jwt}")));
        }
        if !options.omit_graph_token {
            if let Some(graph_token) = &state.graph_token {
                headers.push(("x-graph-token".to_string(), graph_token.clone()));
            }
        }

        let response = self
            .transport
            .send(TransportRequest {
                method,
                path: path.clone(),
                query,
                headers,
                body,
                timeout,
            })
            .await?;

        if response.is_success() || options.accept.contains(&response.status) {
            return Ok(response);
        }

        Err(self.reject(&path, &options, response))
    }

    /// Sends and decodes the whole body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, HttpError> {
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Sends and unwraps the `{ success, data }` envelope
    pub async fn send_data<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, HttpError> {
        let envelope: ApiEnvelope<T> = self.send_json(request).await?;
        Ok(envelope.data)
    }

    fn reject(&self, path: &str, options: &RequestOptions, response: TransportResponse) -> HttpError {
        let status = response.status;

        match status {
            401 | 403 if options.graph_required => {
                tracing::warn!(
                    path,
                    status,
                    "Outlook authentication required: please re-authenticate Outlook to continue"
                );
            }
            401 | 403 if options.preserve_session => {
                tracing::debug!(path, status, "Request rejected by auth; keeping session");
            }
            401 | 403 => {
                tracing::warn!(path, status, "Session expired: please sign in again");
                self.auth.clear();
            }
            429 => {
                tracing::warn!(path, "Rate limited: too many requests, retry shortly");
            }
            _ => {}
        }

        let message = serde_json::from_slice::<ErrorResponse>(&response.body)
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| format!("request to {path} failed"));

        HttpError::Status {
            status,
            retry_after: response.header("retry-after").map(str::to_string),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::session_store::MemoryStore;
    use crate::integrations::testing::{interrupted, network_failure, reply, ScriptedTransport};

    fn client(transport: Arc<ScriptedTransport>) -> HttpClient {
        let auth = AuthStore::new(Arc::new(MemoryStore::new()));
        auth.set_jwt(Some("jwt-1".to_string()));
        auth.set_graph_token(Some("graph-1".to_string()));
        HttpClient::new(transport, auth)
    }

    #[tokio::test]
    async fn test_attaches_credentials() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(200, "{}")]));
        let http = client(transport.clone());

        http.send(ApiRequest::get("/health/status")).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("authorization"), Some("Bearer jwt-1"));
        assert_eq!(sent[0].header("x-graph-token"), Some("graph-1"));
    }

    #[tokio::test]
    async fn test_omit_graph_token() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(200, "{}")]));
        let http = client(transport.clone());

        http.send(ApiRequest::get("/changes").omit_graph_token())
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("authorization"), Some("Bearer jwt-1"));
        assert_eq!(sent[0].header("x-graph-token"), None);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(401, "")]));
        let http = client(transport);

        let err = http.send(ApiRequest::get("/emails")).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!http.auth().is_authenticated());
    }

    #[tokio::test]
    async fn test_graph_required_keeps_session() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(403, "")]));
        let http = client(transport);

        let err = http
            .send(ApiRequest::get("/categories").graph_required())
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
        assert!(http.auth().is_authenticated());
    }

    #[tokio::test]
    async fn test_preserve_session_keeps_credentials() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(401, "")]));
        let http = client(transport);

        http.send(ApiRequest::get("/changes").preserve_session())
            .await
            .unwrap_err();
        assert!(http.auth().has_tokens());
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(
            400,
            r#"{"error":{"message":"categoryId is required"}}"#,
        )]));
        let http = client(transport);

        let err = http.send(ApiRequest::post("/emails/x/move")).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400: categoryId is required");
    }

    #[tokio::test]
    async fn test_accepted_status_is_not_an_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(304, "")]));
        let http = client(transport);

        let response = http
            .send(ApiRequest::get("/emails").accept(304))
            .await
            .unwrap();
        assert_eq!(response.status, 304);
    }

    #[tokio::test]
    async fn test_retry_after_is_captured() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            reply(503, "").with_header("Retry-After", "3"),
        ]));
        let http = client(transport);

        let err = http.send(ApiRequest::get("/emails")).await.unwrap_err();
        assert_eq!(err.retry_after(), Some("3"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network() {
        let transport = Arc::new(ScriptedTransport::new(vec![network_failure()]));
        let http = client(transport);

        let err = http.send(ApiRequest::get("/emails")).await.unwrap_err();
        assert!(err.is_network());
        assert!(http.auth().is_authenticated());
    }

    #[tokio::test]
    async fn test_cut_off_body_is_not_network() {
        let transport = Arc::new(ScriptedTransport::new(vec![interrupted()]));
        let http = client(transport);

        let err = http.send(ApiRequest::get("/changes")).await.unwrap_err();
        assert!(matches!(err, HttpError::Interrupted(_)));
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn test_send_data_unwraps_envelope() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(
            200,
            r#"{"success":true,"data":[1,2,3]}"#,
        )]));
        let http = client(transport.clone());

        let data: Vec<u32> = http
            .send_data(ApiRequest::get("/emails").query("top", Some(3)).query::<u32>("skip", None))
            .await
            .unwrap();
        assert_eq!(data, vec![1, 2, 3]);

        let sent = transport.requests();
        assert_eq!(sent[0].query_param("top"), Some("3"));
        assert_eq!(sent[0].query_param("skip"), None);
    }
}
