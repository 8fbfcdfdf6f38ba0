//! HTTP client for the expenses API.

use crate::api::HealthResponse;
use crate::db::{OperatorStats, Summary, TopOperator};
use crate::utils::error::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// Where the API listens by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self.http.get(&url).query(query).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/", &[]).await
    }

    /// `search` filters by company name; `limit` defaults to 10 on the server.
    pub async fn operators(&self, search: Option<&str>, limit: Option<u32>) -> Result<Vec<OperatorStats>> {
        let mut query = Vec::new();
        if let Some(search) = search {
            query.push(("busca", search.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.get_json("/operadoras", &query).await
    }

    pub async fn top_operators(&self) -> Result<Vec<TopOperator>> {
        self.get_json("/dashboard/top-10", &[]).await
    }

    pub async fn summary(&self) -> Result<Summary> {
        self.get_json("/dashboard/resumo", &[]).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared client on `DEFAULT_BASE_URL`, built on first use.
pub fn api() -> &'static ApiClient {
    static API: OnceLock<ApiClient> = OnceLock::new();
    API.get_or_init(ApiClient::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use httpmock::prelude::*;

    #[test]
    fn test_shared_client_base_url() {
        assert_eq!(api().base_url(), "http://localhost:8000");
        assert!(std::ptr::eq(api(), api()));
        assert_eq!(ApiClient::default().base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_operators_sends_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/operadoras")
                .query_param("busca", "unimed")
                .query_param("limit", "5");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"razao_social": "UNIMED X", "uf": "SP", "total_despesas": 12.5}
                ]));
        });

        let client = ApiClient::with_base_url(server.base_url());
        let result = client.operators(Some("unimed"), Some(5)).await.unwrap();

        mock.assert();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].razao_social, "UNIMED X");
        assert_eq!(result[0].total_despesas, 12.5);
    }

    #[tokio::test]
    async fn test_summary_with_empty_database() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/dashboard/resumo");
            then.status(200).json_body(serde_json::json!({
                "total_gasto_geral": null,
                "total_operadoras_analisadas": 0
            }));
        });

        let summary = ApiClient::with_base_url(server.base_url()).summary().await.unwrap();
        assert_eq!(summary.total_gasto_geral, None);
    }

    #[tokio::test]
    async fn test_http_error_status_surfaces() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/dashboard/top-10");
            then.status(500);
        });

        let err = ApiClient::with_base_url(server.base_url())
            .top_operators()
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::ApiError(ref e) if e.is_status()));
    }
}
