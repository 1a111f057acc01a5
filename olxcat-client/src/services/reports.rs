use shared_types::{CategoryUsageRow, ServerCategoryUsage};

use crate::integrations::{ApiRequest, HttpClient, HttpError};

#[derive(Clone)]
pub struct ReportsService {
    http: HttpClient,
}

impl ReportsService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Per-category message counts; this route answers with a bare list
    pub async fn category_usage(&self) -> Result<Vec<CategoryUsageRow>, HttpError> {
        self.http
            .send_json(ApiRequest::get("/reports/category-usage"))
            .await
    }

    /// Same report from the JWT-only route, which needs no Outlook token
    pub async fn category_usage_server(&self) -> Result<Vec<CategoryUsageRow>, HttpError> {
        let rows: Option<Vec<ServerCategoryUsage>> = self
            .http
            .send_data(ApiRequest::get("/reports/category-usage-server").omit_graph_token())
            .await?;

        Ok(rows
            .unwrap_or_default()
            .into_iter()
            .map(CategoryUsageRow::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::auth_store::AuthStore;
    use crate::helpers::session_store::MemoryStore;
    use crate::integrations::testing::{reply, ScriptedTransport};
    use std::sync::Arc;

    fn service(transport: Arc<ScriptedTransport>) -> ReportsService {
        let auth = AuthStore::new(Arc::new(MemoryStore::new()));
        auth.set_jwt(Some("jwt".to_string()));
        auth.set_graph_token(Some("graph".to_string()));
        ReportsService::new(HttpClient::new(transport, auth))
    }

    #[tokio::test]
    async fn test_category_usage_bare_list() {
        let transport = Arc::new(ScriptedTransport::new(vec![reply(
            200,
            r#"[{"categoryId":"c1","categoryName":"Invoices","messageCount":7}]"#,
        )]));
        let reports = service(transport.clone());

        let rows = reports.category_usage().await.unwrap();
        assert_eq!(rows[0].message_count, 7);
        assert_eq!(transport.requests()[0].header("x-graph-token"), Some("graph"));
    }

    #[tokio::test]
    async fn test_server_usage_is_mapped_without_graph_token() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            reply(
                200,
                r#"{"success":true,"data":[{"categoryId":"c1","name":"Invoices","count":3},
                    {"categoryId":"c2","name":"Travel","count":1}]}"#,
            ),
            reply(200, r#"{"success":true,"data":null}"#),
        ]));
        let reports = service(transport.clone());

        let rows = reports.category_usage_server().await.unwrap();
        assert_eq!(
            rows[0],
            CategoryUsageRow {
                category_id: "c1".to_string(),
                category_name: "Invoices".to_string(),
                message_count: 3,
            }
        );
        assert_eq!(rows.len(), 2);
        assert!(reports.category_usage_server().await.unwrap().is_empty());

        let sent = transport.requests();
        assert_eq!(sent[0].path, "/reports/category-usage-server");
        assert_eq!(sent[0].header("x-graph-token"), None);
        assert_eq!(sent[0].header("authorization"), Some("Bearer jwt"));
    }
}
