//! HTTP API application wiring (axum router + service wiring).
//!
//! - `services/`: event store, dispatcher, read models and the use cases on top
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request bodies and JSON mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::ApiConfig;
use crate::middleware;
use crate::seed;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Replays the event log, seeds the bootstrap admin on an empty store, and
/// mounts the API under `/api` with uploaded photos served from `/uploads`.
pub fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config)?;
    seed::seed(&services, config).context("failed to seed initial data")?;
    let services = Arc::new(services);

    let auth_state = middleware::AuthState {
        services: services.clone(),
    };

    // Protected routes: require a valid, unrevoked token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let api = routes::public_router().merge(protected);

    Ok(Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(services.upload_dir()))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors_layer(&config.cors_origins))
                .layer(Extension(services)),
        ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
