use axum::{
    Router,
    routing::{get, post},
};

pub mod announcements;
pub mod auth;
pub mod cylinders;
pub mod orders;
pub mod ratings;
pub mod safety;
pub mod stats;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/stream", get(system::stream))
        .nest("/users", users::router())
        .nest("/cylinders", cylinders::router())
        .nest("/orders", orders::router())
        .nest("/safety", safety::router())
        .nest("/stats", stats::router())
        .nest("/announcements", announcements::router())
        .nest("/ratings", ratings::router())
}
