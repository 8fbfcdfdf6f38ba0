pub mod error;
pub mod handlers;

use crate::core::Storage;
use crate::db::ExpenseDatabase;
use crate::utils::error::Result;
use axum::{routing::get, Router};
use std::sync::Arc;

pub use error::ApiError;
pub use handlers::HealthResponse;

/// Shared, read-only state of the API.
#[derive(Debug, Default)]
pub struct AppState {
    pub db: ExpenseDatabase,
}

impl AppState {
    pub fn new(db: ExpenseDatabase) -> Self {
        Self { db }
    }

    pub async fn from_snapshot<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let db = ExpenseDatabase::load_or_default(storage, path).await?;
        tracing::info!(
            "Database loaded: {} operators, {} expenses, {} aggregates",
            db.operadoras.len(),
            db.despesas_detalhadas.len(),
            db.despesas_agregadas.len()
        );
        Ok(Self::new(db))
    }
}

/// Routes of the expenses API.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::health))
        .route("/operadoras", get(handlers::list_operators))
        .route("/dashboard/top-10", get(handlers::top_operators))
        .route("/dashboard/resumo", get(handlers::summary))
}
