use crate::api::AppState;
use crate::utils::error::{EtlError, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The API application: one instance, one router, mounted on one address.
pub struct App {
    state: Arc<AppState>,
    router: Option<Router<Arc<AppState>>>,
}

impl App {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            router: None,
        }
    }

    /// Attaches the routing layer. An application takes exactly one router.
    pub fn use_router(mut self, router: Router<Arc<AppState>>) -> Result<Self> {
        if self.router.is_some() {
            return Err(EtlError::config("a router is already attached to this app"));
        }
        self.router = Some(router);
        Ok(self)
    }

    pub fn has_router(&self) -> bool {
        self.router.is_some()
    }

    /// The finished service with state, tracing and CORS applied.
    pub fn into_service(self) -> Result<Router> {
        let router = self
            .router
            .ok_or_else(|| EtlError::config("cannot mount an app without a router"))?;

        Ok(router
            .with_state(self.state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http()))
    }

    /// Binds `addr` and serves until Ctrl-C.
    pub async fn mount(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.mount_listener(listener).await
    }

    pub async fn mount_listener(self, listener: TcpListener) -> Result<()> {
        let service = self.into_service()?;
        tracing::info!("🌐 API listening on http://{}", listener.local_addr()?);

        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("API stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
