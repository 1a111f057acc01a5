use serde::{Deserialize, Serialize};

pub mod admin;
pub mod bulk_move;
pub mod category;
pub mod change;
pub mod email;
pub mod report;
pub mod subscription;

pub use admin::CreatePresetRequest;
pub use bulk_move::{
    BulkMoveMode, BulkMoveRequest, BulkMoveResponse, BulkMoveResult, CategoryTarget, PlannedMove,
};
pub use category::{
    normalize_hex_color, BackendCategory, Category, CreateCategoryRequest, Keywords, OneOrMany,
    OutlookSyncItem, OutlookSyncResult, PredictCategoryRequest, UpdateCategoryRequest,
};
pub use change::{ChangeItem, ChangesResponse, EmailBulkMoved, EmailMoved, OpaqueChange};
pub use email::{
    BackendEmailBody, BackendEmailMessage, BackendRecipient, BodyContentType, CategorizeRequest,
    CategoryPrediction, Email, EmailAddress, FeedbackRequest, MoveRequest, PredictionResult,
};
pub use report::{CategoryUsageRow, ServerCategoryUsage};
pub use subscription::{CreateSubscriptionRequest, MailSubscription, SubscriptionSchedulerStatus};

/// Every backend endpoint wraps its payload as `{ success, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
}

/// Error body, `{ error: { message } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
