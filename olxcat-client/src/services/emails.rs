use serde_json::Value;
use shared_types::{
    BackendEmailMessage, BulkMoveRequest, BulkMoveResponse, CategorizeRequest, CategoryPrediction,
    FeedbackRequest, MoveRequest, PredictionResult,
};
use std::sync::Arc;

use crate::helpers::backoff::{with_backoff, BackoffOptions};
use crate::helpers::etag_cache::{cache_key, EtagCache};
use crate::integrations::{ApiRequest, HttpClient, HttpError};

const EMAILS_PATH: &str = "/emails";
const SEARCH_PATH: &str = "/emails/search";

fn email_path(id: &str, action: &str) -> String {
    format!("{EMAILS_PATH}/{}{action}", urlencoding::encode(id))
}

/// Typed client for `/emails`. List and search reads are conditional: a
/// `304` hands back the cached page itself.
#[derive(Clone)]
pub struct EmailService {
    http: HttpClient,
    cache: Arc<EtagCache<BackendEmailMessage>>,
    backoff: BackoffOptions,
}

impl EmailService {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            cache: Arc::new(EtagCache::new()),
            backoff: BackoffOptions::default(),
        }
    }

    pub fn with_backoff_options(mut self, backoff: BackoffOptions) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn list(
        &self,
        top: Option<u32>,
        skip: Option<u32>,
    ) -> Result<Arc<[BackendEmailMessage]>, HttpError> {
        let params = [
            ("top", top.map(|v| v.to_string())),
            ("skip", skip.map(|v| v.to_string())),
        ];
        with_backoff(|| self.fetch_page(EMAILS_PATH, &params), &self.backoff).await
    }

    pub async fn search(
        &self,
        q: &str,
        top: Option<u32>,
        skip: Option<u32>,
    ) -> Result<Arc<[BackendEmailMessage]>, HttpError> {
        let params = [
            ("q", Some(q.to_string())),
            ("top", top.map(|v| v.to_string())),
            ("skip", skip.map(|v| v.to_string())),
        ];
        with_backoff(|| self.fetch_page(SEARCH_PATH, &params), &self.backoff).await
    }

    async fn fetch_page(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
    ) -> Result<Arc<[BackendEmailMessage]>, HttpError> {
        let key = cache_key(path, params);
        let cached = self.cache.get(&key);

        let mut request = ApiRequest::get(path);
        for (name, value) in params {
            request = request.query(name, value.as_ref());
        }
        if let Some(page) = &cached {
            request = request.header("If-None-Match", page.etag.as_str()).accept(304);
        }

        let response = self.http.send(request).await?;
        if response.status == 304 {
            if let Some(page) = cached {
                tracing::debug!(key = %key, "Email page not modified");
                return Ok(page.data.clone());
            }
        }

        let envelope: shared_types::ApiEnvelope<Vec<BackendEmailMessage>> =
            serde_json::from_slice(&response.body)?;
        match response.header("etag") {
            Some(etag) => Ok(self.cache.store(key, etag.to_string(), envelope.data)),
            None => {
                // the old validator would now revalidate a replaced payload
                self.cache.remove(&key);
                Ok(Arc::from(envelope.data))
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<BackendEmailMessage, HttpError> {
        self.http
            .send_data(ApiRequest::get(email_path(id, "")))
            .await
    }

    pub async fn categorize(&self, id: &str, categories: Vec<String>) -> Result<Value, HttpError> {
        let request = ApiRequest::post(email_path(id, "/categorize"))
            .json(&CategorizeRequest { categories })?;
        self.http.send_json(request).await
    }

    pub async fn mark_read(&self, id: &str) -> Result<Value, HttpError> {
        self.http
            .send_json(ApiRequest::post(email_path(id, "/read")))
            .await
    }

    pub async fn predict_category(&self, id: &str) -> Result<Vec<CategoryPrediction>, HttpError> {
        let result: Option<PredictionResult> = self
            .http
            .send_data(ApiRequest::post(email_path(id, "/predict-category")))
            .await?;
        Ok(result.map(|r| r.predictions).unwrap_or_default())
    }

    pub async fn move_to_category(&self, id: &str, category_id: &str) -> Result<Value, HttpError> {
        let request = ApiRequest::post(email_path(id, "/move"))
            .json(&MoveRequest {
                category_id: category_id.to_string(),
            })?;
        self.http.send_json(request).await
    }

    pub async fn bulk_move(&self, request: &BulkMoveRequest) -> Result<BulkMoveResponse, HttpError> {
        let request = ApiRequest::post(format!("{EMAILS_PATH}/bulk-move")).json(request)?;
        self.http.send_json(request).await
    }

    /// Tells the backend which category was right. Needs the Outlook token
    /// since the backend may move the message.
    pub async fn feedback(
        &self,
        id: &str,
        category_id: &str,
        auto_move: bool,
    ) -> Result<Value, HttpError> {
        let request = ApiRequest::post(email_path(id, "/feedback"))
            .json(&FeedbackRequest {
                category_id: category_id.to_string(),
                auto_move,
            })?
            .graph_required();
        self.http.send_json(request).await
    }
}
