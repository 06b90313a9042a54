pub mod config;
pub mod modules;
pub mod services;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use modules::account::{account_routes, AccountService};
use modules::metrics::metrics_routes;
use services::metrics::{metrics_middleware, MetricsRegistry};
use services::rate_limit::{create_rate_limiter, RateLimitLayer};
use services::security::security_headers;

pub struct AppState {
    pub accounts: Arc<AccountService>,
}

pub fn create_app(accounts: Arc<AccountService>, metrics: Arc<MetricsRegistry>) -> Router {
    let state = Arc::new(AppState { accounts });

    // Rate limit: burst of 120, refilled at 600 per minute
    let rate_limiter = create_rate_limiter(600, 120);

    Router::new()
        .route("/", get(root))
        .nest("/user", account_routes())
        .with_state(state)
        .merge(metrics_routes(metrics.clone()))
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 16)) // 16KB max body
        .layer(RateLimitLayer::new(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> &'static str {
    "Account Service API"
}
