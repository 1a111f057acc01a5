use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Organization-wide category preset
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePresetRequest {
    pub organization_id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub keywords: Option<String>,
    pub is_default: bool,
    pub locked: bool,
}
