use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Keywords arrive either as a list or as one comma-separated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum Keywords {
    List(Vec<String>),
    Joined(String),
}

impl Keywords {
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Keywords::List(list) => list.clone(),
            Keywords::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackendCategory {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub outlook_folder_id: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub keywords: Option<Keywords>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Client-side view of a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub outlook_folder_id: Option<String>,
    pub keywords: Vec<String>,
    pub is_active: bool,
}

impl From<BackendCategory> for Category {
    fn from(backend: BackendCategory) -> Self {
        Self {
            color: normalize_hex_color(&backend.color),
            keywords: backend
                .keywords
                .as_ref()
                .map(Keywords::to_list)
                .unwrap_or_default(),
            is_active: !backend.is_deleted,
            id: backend.id,
            name: backend.name,
            outlook_folder_id: backend.outlook_folder_id,
        }
    }
}

/// Expands `#abc` shorthand to `#aabbcc`; any other value is returned as-is
pub fn normalize_hex_color(color: &str) -> String {
    let digits = match color.strip_prefix('#') {
        Some(digits) if digits.len() == 3 && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            digits
        }
        _ => return color.to_string(),
    };

    let mut expanded = String::with_capacity(7);
    expanded.push('#');
    for c in digits.chars() {
        expanded.push(c);
        expanded.push(c);
    }
    expanded
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: String,
    /// Sent joined with ", "
    pub keywords: Option<String>,
    pub link_folder: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PredictCategoryRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OutlookSyncItem {
    pub id: String,
    pub name: String,
    pub folder_id: String,
    pub created: bool,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OutlookSyncResult {
    pub total_folders: u32,
    pub total_categories: u32,
    pub processed: u32,
    #[serde(default)]
    pub items: Vec<OutlookSyncItem>,
}

/// `/categories` answers with either a single category or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(keywords: Option<Keywords>) -> BackendCategory {
        BackendCategory {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            name: "Finance".to_string(),
            color: "#0f8".to_string(),
            outlook_folder_id: None,
            is_default: false,
            is_deleted: false,
            keywords,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_normalize_hex_color() {
        assert_eq!(normalize_hex_color("#abc"), "#aabbcc");
        assert_eq!(normalize_hex_color("#A1b"), "#AA11bb");
        assert_eq!(normalize_hex_color("#aabbcc"), "#aabbcc");
        assert_eq!(normalize_hex_color("#xyz"), "#xyz");
        assert_eq!(normalize_hex_color("red"), "red");
    }

    #[test]
    fn test_joined_keywords_are_split() {
        let category = Category::from(backend(Some(Keywords::Joined(
            "invoice, receipt,, billing ".to_string(),
        ))));

        assert_eq!(category.keywords, vec!["invoice", "receipt", "billing"]);
        assert_eq!(category.color, "#00ff88");
        assert!(category.is_active);
    }

    #[test]
    fn test_missing_keywords() {
        let mut raw = backend(None);
        raw.is_deleted = true;
        let category = Category::from(raw);

        assert!(category.keywords.is_empty());
        assert!(!category.is_active);
    }

    #[test]
    fn test_keywords_wire_forms() {
        let list: BackendCategory = serde_json::from_str(
            r#"{"id":"c","name":"n","keywords":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(list.keywords, Some(Keywords::List(vec!["a".into(), "b".into()])));

        let joined: BackendCategory =
            serde_json::from_str(r#"{"id":"c","name":"n","keywords":"a, b"}"#).unwrap();
        assert_eq!(joined.keywords, Some(Keywords::Joined("a, b".into())));

        let null: BackendCategory =
            serde_json::from_str(r#"{"id":"c","name":"n","keywords":null}"#).unwrap();
        assert_eq!(null.keywords, None);
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<u32> = serde_json::from_str("3").unwrap();
        assert_eq!(one.into_vec(), vec![3]);

        let many: OneOrMany<u32> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(many.into_vec(), vec![1, 2]);
    }
}
