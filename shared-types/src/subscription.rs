use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Graph change-notification subscription held by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MailSubscription {
    pub id: String,
    pub resource: String,
    pub change_type: String,
    pub expiration_date_time: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub resource: String,
    pub change_type: String,
    pub expiration_date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_state: Option<String>,
}

/// Renewal scheduler state, `GET /subscriptions/status`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSchedulerStatus {
    pub enabled: bool,
    #[ts(type = "number")]
    pub interval_ms: u64,
    pub lookahead_hours: u32,
    pub extend_days: u32,
    #[serde(default)]
    pub last_run_at: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}
