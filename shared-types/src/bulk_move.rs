use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Where a bulk move sends messages. A single id moves everything to one
/// category; a list maps message ids to categories pairwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum CategoryTarget {
    Single(String),
    Mapping(Vec<String>),
}

/// Request for `POST /emails/bulk-move`. Without a `category_id` the backend
/// runs in predictive mode and uses `min_confidence`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkMoveRequest {
    pub message_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl BulkMoveRequest {
    pub fn to_category(message_ids: Vec<String>, category_id: impl Into<String>) -> Self {
        Self {
            message_ids,
            category_id: Some(CategoryTarget::Single(category_id.into())),
            ..Default::default()
        }
    }

    pub fn mode(&self) -> BulkMoveMode {
        match self.category_id {
            Some(CategoryTarget::Single(_)) => BulkMoveMode::Single,
            Some(CategoryTarget::Mapping(_)) => BulkMoveMode::Mapping,
            None => BulkMoveMode::Predictive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BulkMoveMode {
    Single,
    Mapping,
    Predictive,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkMoveResult {
    pub message_id: String,
    pub ok: bool,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub predicted_category_id: Option<String>,
    #[serde(default)]
    pub destination_folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMove {
    pub destination_folder_id: String,
    pub count: u32,
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkMoveResponse {
    pub mode: BulkMoveMode,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub planned: Option<PlannedMove>,
    #[serde(default)]
    pub results: Vec<BulkMoveResult>,
}

impl BulkMoveResponse {
    pub fn failed(&self) -> impl Iterator<Item = &BulkMoveResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}
