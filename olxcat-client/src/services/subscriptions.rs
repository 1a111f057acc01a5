use serde_json::{json, Value};
use shared_types::{CreateSubscriptionRequest, MailSubscription, SubscriptionSchedulerStatus};

use crate::integrations::{ApiRequest, HttpClient, HttpError};

const SUBSCRIPTIONS_PATH: &str = "/subscriptions";

/// Backend-held Graph mailbox subscriptions and their renewal scheduler
#[derive(Clone)]
pub struct SubscriptionService {
    http: HttpClient,
}

impl SubscriptionService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<MailSubscription>, HttpError> {
        self.http
            .send_data(ApiRequest::get(SUBSCRIPTIONS_PATH))
            .await
    }

    /// Registers a mailbox subscription with Graph, so the Outlook token is required
    pub async fn create(
        &self,
        params: &CreateSubscriptionRequest,
    ) -> Result<MailSubscription, HttpError> {
        let request = ApiRequest::post(SUBSCRIPTIONS_PATH)
            .json(params)?
            .graph_required();
        self.http.send_data(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value, HttpError> {
        let path = format!("{SUBSCRIPTIONS_PATH}/{}", urlencoding::encode(id));
        self.http.send_json(ApiRequest::delete(path)).await
    }

    pub async fn status(&self) -> Result<SubscriptionSchedulerStatus, HttpError> {
        self.http
            .send_data(ApiRequest::get(format!("{SUBSCRIPTIONS_PATH}/status")))
            .await
    }

    /// Renews every subscription now instead of waiting for the scheduler
    pub async fn rotate(&self) -> Result<Value, HttpError> {
        let request = ApiRequest::post(format!("{SUBSCRIPTIONS_PATH}/rotate"))
            .json(&json!({}))?
            .graph_required();
        self.http.send_json(request).await
    }
}
