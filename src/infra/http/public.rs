use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use time::OffsetDateTime;
use uidir_api_types::TimestampResponse;

use super::{DatabaseHealth, RouterState, db_health_response};

pub const TIMESTAMP_ROUTE: &str = "/api/timestamp";

#[derive(Clone)]
pub struct HttpState {
    pub db: Arc<dyn DatabaseHealth>,
    pub environment: Arc<str>,
}

pub fn build_router() -> Router<RouterState> {
    Router::new()
        .route("/_health/db", get(public_health))
        .route(TIMESTAMP_ROUTE, get(timestamp))
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.check().await)
}

async fn timestamp(State(state): State<HttpState>) -> impl IntoResponse {
    Json(TimestampResponse {
        timestamp: OffsetDateTime::now_utc(),
        environment: state.environment.to_string(),
    })
}
