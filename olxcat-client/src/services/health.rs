use serde_json::Value;

use crate::integrations::{ApiRequest, HttpClient, HttpError};

#[derive(Clone)]
pub struct HealthService {
    http: HttpClient,
}

impl HealthService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Raw `/health/status` body
    pub async fn status(&self) -> Result<Value, HttpError> {
        self.http.send_json(ApiRequest::get("/health/status")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::auth_store::AuthStore;
    use crate::helpers::session_store::MemoryStore;
    use crate::integrations::testing::{reply, ScriptedTransport};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_returns_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(
            200,
            r#"{"status":"ok","db":"up"}"#,
        )]));
        let auth = AuthStore::new(Arc::new(MemoryStore::new()));
        let health = HealthService::new(HttpClient::new(transport.clone(), auth));

        let status = health.status().await.unwrap();
        assert_eq!(status["status"], "ok");
        assert_eq!(transport.requests()[0].header("authorization"), None);
    }
}
