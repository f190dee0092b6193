use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use bvp_core::{AppConfig, AssetDirectory, DataSourceDirectory, PowerStore};
use bvp_data::Repositories;
use bvp_pipeline::{v1_service_listing, IngestionPipeline, QueryPipeline, ServiceListing};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryPipeline,
    pub ingestion: IngestionPipeline,
    pub services: Arc<ServiceListing>,
}

impl AppState {
    #[must_use]
    pub fn new(repos: &Repositories, config: &AppConfig) -> Self {
        let assets: Arc<dyn AssetDirectory> = Arc::new(repos.assets.clone());
        let data_sources: Arc<dyn DataSourceDirectory> = Arc::new(repos.data_sources.clone());
        let power: Arc<dyn PowerStore> = Arc::new(repos.power.clone());

        Self {
            query: QueryPipeline::new(assets.clone(), data_sources.clone(), power.clone(), config),
            ingestion: IngestionPipeline::new(assets, data_sources, power, config),
            services: Arc::new(v1_service_listing()),
        }
    }
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/v1/getMeterData", get(handlers::get_meter_data))
            .route("/api/v1/postMeterData", post(handlers::post_meter_data))
            .route("/api/v1/getService", get(handlers::get_service))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
