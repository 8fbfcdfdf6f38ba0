use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::db::{OperatorStats, Summary, TopOperator};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_LIMIT: i64 = 10;
pub const TOP_OPERATORS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OperatorQuery {
    pub busca: Option<String>,
    pub limit: Option<i64>,
}

/// GET /
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "ANS expenses API running".to_string(),
    })
}

/// GET /operadoras
pub async fn list_operators(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OperatorQuery>,
) -> ApiResult<Json<Vec<OperatorStats>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let limit = usize::try_from(limit)
        .map_err(|_| ApiError::InvalidRequest(format!("limit must be >= 0, got {}", limit)))?;
    let search = query.busca.as_deref().filter(|s| !s.is_empty());

    tracing::debug!("Operator search {:?} (limit {})", search, limit);
    Ok(Json(state.db.search_operators(search, limit)))
}

/// GET /dashboard/top-10
pub async fn top_operators(State(state): State<Arc<AppState>>) -> Json<Vec<TopOperator>> {
    Json(state.db.top_operators(TOP_OPERATORS))
}

/// GET /dashboard/resumo
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<Summary> {
    Json(state.db.summary())
}
