use std::sync::Arc;

use axum::{Router, extract::Extension, http::StatusCode, routing::get};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full application router.
///
/// Everything except `/health` sits behind the bearer-JWT middleware, which
/// derives the tenant and principal contexts from the token.
pub fn build_app(jwt_secret: String) -> Router {
    let jwt = Arc::new(defter_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = crate::middleware::AuthState { jwt };

    let services = Arc::new(services::AppServices::new());

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            crate::middleware::auth_middleware,
        ));

    Router::new().route("/health", get(health)).merge(protected)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
