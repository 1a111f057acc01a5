use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Graph-style recipient, `{ emailAddress: { address, name } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackendRecipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EmailAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BodyContentType {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackendEmailBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: BodyContentType,
}

/// Message as returned by `/emails` and `/emails/search`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackendEmailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: BackendEmailBody,
    #[serde(default)]
    pub from: Option<BackendRecipient>,
    #[serde(default)]
    pub to_recipients: Vec<BackendRecipient>,
    #[serde(default)]
    pub received_date_time: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPrediction {
    pub category_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    #[serde(default)]
    pub email_id: String,
    #[serde(default)]
    pub predictions: Vec<CategoryPrediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategorizeRequest {
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub category_id: String,
    pub auto_move: bool,
}

/// Client-side view of a message
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub received_date: Option<DateTime<Utc>>,
    pub category_id: Option<String>,
    pub is_processed: bool,
}

impl From<&BackendEmailMessage> for Email {
    fn from(backend: &BackendEmailMessage) -> Self {
        let sender = backend
            .from
            .as_ref()
            .map(|from| {
                let address = &from.email_address;
                if address.name.is_empty() {
                    address.address.clone()
                } else {
                    address.name.clone()
                }
            })
            .unwrap_or_default();

        Self {
            id: backend.id.clone(),
            subject: backend.subject.clone(),
            sender,
            body: backend.body.content.clone(),
            received_date: DateTime::parse_from_rfc3339(&backend.received_date_time)
                .ok()
                .map(|date| date.with_timezone(&Utc)),
            category_id: backend.categories.first().cloned(),
            is_processed: backend.is_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MESSAGE: &str = r#"{
        "id": "AAMk1",
        "subject": "Invoice March",
        "body": { "content": "<p>Hi</p>", "contentType": "html" },
        "from": { "emailAddress": { "address": "billing@acme.test", "name": "" } },
        "toRecipients": [],
        "receivedDateTime": "2024-03-01T10:15:00Z",
        "isRead": true,
        "categories": ["finance", "vendors"]
    }"#;

    #[test]
    fn test_parse_backend_message() {
        let message: BackendEmailMessage = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        assert_eq!(message.body.content_type, BodyContentType::Html);
        assert_eq!(message.parent_folder_id, None);
    }

    #[test]
    fn test_map_to_email() {
        let message: BackendEmailMessage = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let email = Email::from(&message);

        // empty display name falls back to the address
        assert_eq!(email.sender, "billing@acme.test");
        assert_eq!(email.category_id, Some("finance".to_string()));
        assert!(email.is_processed);
        assert_eq!(
            email.received_date.map(|d| d.to_rfc3339()),
            Some("2024-03-01T10:15:00+00:00".to_string())
        );
    }

    #[test]
    fn test_map_without_sender() {
        let message: BackendEmailMessage =
            serde_json::from_str(r#"{ "id": "x", "receivedDateTime": "not a date" }"#).unwrap();
        let email = Email::from(&message);

        assert_eq!(email.sender, "");
        assert_eq!(email.received_date, None);
        assert_eq!(email.category_id, None);
    }
}
