//! Admin API: status and response cache management.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache).delete(clear_cache))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
