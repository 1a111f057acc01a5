use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One row of the category usage report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUsageRow {
    pub category_id: String,
    pub category_name: String,
    #[ts(type = "number")]
    pub message_count: u64,
}

/// Row shape of `/reports/category-usage-server`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ServerCategoryUsage {
    pub category_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[ts(type = "number")]
    pub count: u64,
}

impl From<ServerCategoryUsage> for CategoryUsageRow {
    fn from(row: ServerCategoryUsage) -> Self {
        Self {
            category_id: row.category_id,
            category_name: row.name,
            message_count: row.count,
        }
    }
}
