//! Web application router and middleware setup.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::web::config::WebConfig;
use crate::web::handlers::{self, AppState};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::index))
        .route("/camera/current.jpg", get(handlers::current_jpg))
        .route("/api/camera/", get(handlers::api_camera))
        .route("/api/cpu/", get(handlers::api_cpu))
        .route(
            "/api/temperatureandhumidity",
            get(handlers::api_climate),
        )
        .route("/api/health", get(handlers::health_check))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
