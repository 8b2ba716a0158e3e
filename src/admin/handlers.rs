use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub cache_enabled: bool,
    pub blocklist_entries: usize,
}

#[derive(Serialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        cache_enabled: state.cache.is_enabled(),
        blocklist_entries: state.blocklist.len(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    let cleared = state.cache.len();
    state.cache.clear();
    tracing::info!(cleared, "Response cache cleared via admin API");
    Json(CacheCleared { cleared })
}
