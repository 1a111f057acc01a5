use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use ts_rs::TS;

pub const EMAIL_MOVED: &str = "email:moved";
pub const EMAIL_BULK_MOVED: &str = "email:bulk-moved";

/// A single email was moved, usually into a category folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EmailMoved {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[ts(type = "number")]
    pub ts: i64, // epoch ms
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EmailBulkMoved {
    #[ts(type = "number")]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[ts(type = "number")]
    pub ts: i64,
}

/// Event type the client does not understand. The raw object, including its
/// `type` field, is kept so it can be forwarded untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueChange {
    pub kind: String,
    pub payload: Map<String, Value>,
}

/// One entry of the `/changes` feed.
///
/// On the wire every item is an object with a `type` discriminator. Known
/// types whose fields do not match degrade to [`ChangeItem::Other`] instead of
/// failing the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeItem {
    EmailMoved(EmailMoved),
    EmailBulkMoved(EmailBulkMoved),
    Other(OpaqueChange),
}

impl ChangeItem {
    pub fn kind(&self) -> &str {
        match self {
            ChangeItem::EmailMoved(_) => EMAIL_MOVED,
            ChangeItem::EmailBulkMoved(_) => EMAIL_BULK_MOVED,
            ChangeItem::Other(opaque) => &opaque.kind,
        }
    }

    pub fn ts(&self) -> Option<i64> {
        match self {
            ChangeItem::EmailMoved(moved) => Some(moved.ts),
            ChangeItem::EmailBulkMoved(moved) => Some(moved.ts),
            ChangeItem::Other(opaque) => opaque.payload.get("ts").and_then(Value::as_i64),
        }
    }

    /// Converts one raw feed entry; fails only when there is no string `type`
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(payload) => Self::from_object(payload),
            other => Err(format!("change item must be an object, got {other}")),
        }
    }

    fn from_object(payload: Map<String, Value>) -> Result<Self, String> {
        let kind = match payload.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(format!("change item type must be a string, got {other}")),
            None => return Err("change item is missing its type".to_string()),
        };

        let known = match kind.as_str() {
            EMAIL_MOVED => serde_json::from_value(Value::Object(payload.clone()))
                .ok()
                .map(ChangeItem::EmailMoved),
            EMAIL_BULK_MOVED => serde_json::from_value(Value::Object(payload.clone()))
                .ok()
                .map(ChangeItem::EmailBulkMoved),
            _ => None,
        };

        Ok(known.unwrap_or(ChangeItem::Other(OpaqueChange { kind, payload })))
    }
}

impl Serialize for ChangeItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            ChangeItem::EmailMoved(moved) => serde_json::to_value(moved),
            ChangeItem::EmailBulkMoved(moved) => serde_json::to_value(moved),
            ChangeItem::Other(opaque) => Ok(Value::Object(opaque.payload.clone())),
        }
        .map_err(S::Error::custom)?;

        let mut object = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        object.insert("type".to_string(), Value::String(self.kind().to_string()));

        object.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChangeItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = Map::<String, Value>::deserialize(deserializer)?;
        ChangeItem::from_object(payload).map_err(D::Error::custom)
    }
}

/// Body of a `200 OK` from `GET /changes`.
///
/// Items stay raw so one bad entry cannot reject the whole batch; see
/// [`ChangesResponse::into_items`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl ChangesResponse {
    /// Splits the batch into usable items and the reasons others were rejected
    pub fn into_items(self) -> (Vec<ChangeItem>, Vec<String>) {
        let mut items = Vec::with_capacity(self.items.len());
        let mut rejected = Vec::new();
        for raw in self.items {
            match ChangeItem::from_value(raw) {
                Ok(item) => items.push(item),
                Err(reason) => rejected.push(reason),
            }
        }
        (items, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_email_moved() {
        let item: ChangeItem = serde_json::from_value(json!({
            "type": "email:moved",
            "messageId": "m1",
            "categoryId": "c1",
            "ts": 1000
        }))
        .unwrap();

        assert_eq!(
            item,
            ChangeItem::EmailMoved(EmailMoved {
                message_id: "m1".to_string(),
                destination_folder_id: None,
                category_id: Some("c1".to_string()),
                ts: 1000,
            })
        );
        assert_eq!(item.kind(), EMAIL_MOVED);
        assert_eq!(item.ts(), Some(1000));
    }

    #[test]
    fn test_parse_bulk_moved() {
        let item: ChangeItem = serde_json::from_value(json!({
            "type": "email:bulk-moved",
            "count": 12,
            "ts": 2000
        }))
        .unwrap();

        match item {
            ChangeItem::EmailBulkMoved(moved) => {
                assert_eq!(moved.count, 12);
                assert_eq!(moved.category_id, None);
            }
            other => panic!("Expected bulk move, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let raw = json!({ "type": "category:renamed", "categoryId": "c9", "name": "Invoices" });
        let item: ChangeItem = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(item.kind(), "category:renamed");
        assert!(matches!(item, ChangeItem::Other(_)));
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_malformed_known_type_degrades() {
        // messageId missing
        let item: ChangeItem =
            serde_json::from_value(json!({ "type": "email:moved", "ts": 5 })).unwrap();

        match item {
            ChangeItem::Other(opaque) => {
                assert_eq!(opaque.kind, EMAIL_MOVED);
                assert_eq!(opaque.payload.get("ts"), Some(&json!(5)));
            }
            other => panic!("Expected opaque item, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let result = serde_json::from_value::<ChangeItem>(json!({ "messageId": "m1" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_known_item_carries_type() {
        let item = ChangeItem::EmailMoved(EmailMoved {
            message_id: "m1".to_string(),
            destination_folder_id: Some("f1".to_string()),
            category_id: None,
            ts: 1000,
        });

        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({ "type": "email:moved", "messageId": "m1", "destinationFolderId": "f1", "ts": 1000 })
        );
    }

    #[test]
    fn test_untyped_item_does_not_reject_batch() {
        let body: ChangesResponse = serde_json::from_value(json!({
            "success": true,
            "version": 6,
            "items": [
                { "type": "email:moved", "messageId": "m1", "ts": 1000 },
                { "messageId": "m2" },
                "garbage"
            ]
        }))
        .unwrap();

        let (items, rejected) = body.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind(), EMAIL_MOVED);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_changes_response_defaults() {
        let body: ChangesResponse = serde_json::from_str(r#"{"success":true,"version":7}"#).unwrap();
        assert_eq!(body.version, Some(7));
        assert!(body.items.is_empty());
    }
}
