use serde_json::Value;
use shared_types::{
    ApiEnvelope, BackendCategory, CreateCategoryRequest, OneOrMany, OutlookSyncResult,
    PredictCategoryRequest, UpdateCategoryRequest,
};

use crate::integrations::{ApiRequest, HttpClient, HttpError};

const CATEGORIES_PATH: &str = "/categories";

fn category_path(id: &str) -> String {
    format!("{CATEGORIES_PATH}/{}", urlencoding::encode(id))
}

/// Fields for a new category
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub keywords: Option<Vec<String>>,
    /// Also create a linked Outlook folder
    pub link_folder: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct CategoryService {
    http: HttpClient,
}

impl CategoryService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// The backend answers with a bare object when there is only one category
    pub async fn list(&self) -> Result<Vec<BackendCategory>, HttpError> {
        let data: OneOrMany<BackendCategory> = self
            .http
            .send_data(ApiRequest::get(CATEGORIES_PATH).graph_required())
            .await?;
        Ok(data.into_vec())
    }

    pub async fn defaults(&self) -> Result<Vec<BackendCategory>, HttpError> {
        self.http
            .send_data(ApiRequest::get(format!("{CATEGORIES_PATH}/defaults")))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<BackendCategory, HttpError> {
        self.http
            .send_data(ApiRequest::get(category_path(id)))
            .await
    }

    /// Creates a category. The Outlook token only goes along when a folder
    /// is linked, and then an auth failure means Outlook needs signing in.
    pub async fn create(&self, category: NewCategory) -> Result<BackendCategory, HttpError> {
        let link_folder = category.link_folder;
        let body = CreateCategoryRequest {
            name: category.name,
            color: category.color,
            keywords: category.keywords.map(|k| k.join(", ")),
            link_folder,
        };

        let mut request = ApiRequest::post(CATEGORIES_PATH).json(&body)?;
        request = if link_folder {
            request.graph_required()
        } else {
            request.omit_graph_token()
        };
        self.http.send_data(request).await
    }

    pub async fn update(
        &self,
        id: &str,
        update: CategoryUpdate,
    ) -> Result<BackendCategory, HttpError> {
        let body = UpdateCategoryRequest {
            name: update.name,
            color: update.color,
            keywords: update.keywords.map(|k| k.join(", ")),
        };
        let request =
            ApiRequest::put(category_path(id)).json(&body)?;
        self.http.send_data(request).await
    }

    pub async fn delete(&self, id: &str, hard: bool) -> Result<Value, HttpError> {
        let request = ApiRequest::delete(category_path(id))
            .query("hard", hard.then_some(true));
        self.http.send_json(request).await
    }

    pub async fn predict(&self, content: &str) -> Result<Value, HttpError> {
        let request = ApiRequest::post(format!("{CATEGORIES_PATH}/predict")).json(
            &PredictCategoryRequest {
                content: content.to_string(),
            },
        )?;
        self.http.send_json(request).await
    }

    /// Imports Outlook folders as categories
    pub async fn sync_from_outlook(&self) -> Result<OutlookSyncResult, HttpError> {
        let envelope: ApiEnvelope<OutlookSyncResult> = self
            .http
            .send_json(ApiRequest::post(format!("{CATEGORIES_PATH}/sync-from-outlook")).graph_required())
            .await?;
        tracing::info!(
            processed = envelope.data.processed,
            total_folders = envelope.data.total_folders,
            "Synced categories from Outlook"
        );
        Ok(envelope.data)
    }
}
