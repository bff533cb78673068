//! HTTP surface: the `/api` catalog contract, the public storefront routes,
//! health and metrics.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod multipart;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::catalog_service::CatalogService;
use crate::app::enquiry::EnquiryUseCase;
use crate::app::list_cache::ListCache;
use crate::app::ports::{ListingPort, NotifierPort, SessionPort};
use crate::app::storefront::Storefront;
use crate::common::error::Result;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub enquiries: Arc<EnquiryUseCase>,
    pub storefront: Arc<Storefront>,
    pub sessions: Arc<dyn SessionPort>,
}

impl AppState {
    pub fn new(
        catalog: Arc<CatalogService>,
        notifier: Arc<dyn NotifierPort>,
        sessions: Arc<dyn SessionPort>,
        cache_ttl_minutes: i64,
    ) -> Self {
        let listing: Arc<dyn ListingPort> = catalog.clone();
        Self {
            enquiries: Arc::new(EnquiryUseCase::new(catalog.clone(), notifier)),
            storefront: Arc::new(Storefront::with_cache(
                listing,
                ListCache::new(),
                cache_ttl_minutes,
            )),
            catalog,
            sessions,
        }
    }
}

/// Build the router. Admin-only method routes sit behind `auth::require_admin`;
/// reads, enquiries and the storefront are public.
pub fn create_router(state: AppState, body_limit: usize, media_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let admin = middleware::from_fn_with_state(state.clone(), auth::require_admin);

    let api = Router::new()
        .route("/:kind", get(handlers::list_entities))
        .route(
            "/:kind/step1",
            post(handlers::create_step1).route_layer(admin.clone()),
        )
        .route(
            "/:kind/step2/:id",
            put(handlers::merge_specifications).route_layer(admin.clone()),
        )
        .route(
            "/:kind/step3/:id",
            put(handlers::merge_queries).route_layer(admin.clone()),
        )
        .route(
            "/:kind/check-name",
            get(handlers::check_name).route_layer(admin.clone()),
        )
        .route(
            "/:kind/:id",
            put(handlers::update_entity)
                .delete(handlers::delete_entity)
                .route_layer(admin)
                .get(handlers::get_entity),
        )
        .route("/:kind/:id/enquiry", post(handlers::submit_enquiry));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_text))
        .route("/storefront/:kind", get(handlers::storefront_listing))
        .route("/storefront/:kind/:slug", get(handlers::storefront_detail))
        .nest("/api", api);
    if let Some(dir) = media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
    body_limit: usize,
    media_dir: Option<&Path>,
) -> Result<()> {
    let router = create_router(state, body_limit, media_dir);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| crate::common::error::CatalogError::Config(format!("invalid bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Catalog server listening on http://{}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Catalog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
