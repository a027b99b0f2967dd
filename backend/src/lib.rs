pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod queries;
pub mod routes;
pub mod store;
pub mod test_util;

pub use accounts::{AccountError, Accounts};
pub use auth::{AuthUser, TokenService};
pub use config::Config;
pub use error::ApiError;
pub use lifecycle::{LifecycleError, RequestLifecycle};
pub use queries::{SearchCriteria, TripQueries};
pub use store::{Store, StoreError};

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub tokens: TokenService,
}

impl AppState {
    /// Open the configured database and build the token service.
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let store = Store::new(&config.database.url)?;
        let tokens = TokenService::from_config(&config.auth);
        Ok(Self {
            config,
            store,
            tokens,
        })
    }
}

/// Full application: routes plus CORS, tracing and request logging.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors.origins);

    routes::router(state)
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
