pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{any, get},
};

use crate::infra::http::RouterState;

pub const REVALIDATE_ROUTE: &str = "/api/revalidate";

pub fn build_api_router() -> Router<RouterState> {
    Router::new()
        .route("/api/libraries", get(handlers::list_libraries))
        .route("/api/libraries/{slug}", get(handlers::get_library))
        .route("/api/frameworks", get(handlers::list_frameworks))
        .route("/api/frameworks/{slug}", get(handlers::get_framework))
        .route("/api/stats/{*package}", get(handlers::package_stats))
        .route(REVALIDATE_ROUTE, any(handlers::revalidate))
}
