use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::config::AppConfig;
use crate::services::gadget_service::{self, Stats};
use crate::state::gadgets::GadgetStore;

#[derive(Clone)]
pub struct SystemState {
    pub config: AppConfig,
    pub store: GadgetStore,
}

pub fn routes(config: AppConfig, store: GadgetStore) -> Router {
    Router::new()
        .route("/alive", get(is_alive))
        .route("/version", get(version))
        .route("/stats", get(stats))
        .with_state(SystemState { config, store })
}

/// GET /system/alive
async fn is_alive() -> &'static str {
    "OK"
}

/// GET /system/version
async fn version(State(state): State<SystemState>) -> Json<serde_json::Value> {
    Json(json!({
        "version": state.config.server_version
    }))
}

/// GET /system/stats
async fn stats(State(state): State<SystemState>) -> Json<Stats> {
    Json(gadget_service::stats(&state.store).await)
}
