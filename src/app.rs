use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::AppConfig;
use crate::routes::{gadget_routes, system_routes};
use crate::state::gadgets::GadgetStore;

/// Build the complete Axum application:
/// - /gadgets  (create, list, get, rent, return, delete)
/// - /system   (alive, version, stats)
pub fn build_app(store: GadgetStore, cfg: AppConfig) -> Router {
    Router::new()
        .nest("/gadgets", gadget_routes::routes(store.clone()))
        .nest("/system", system_routes::routes(cfg, store))
        // Logging middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
