use axum::{Router, routing::get};

pub mod accounts;
pub mod common;
pub mod dashboard;
pub mod invoices;
pub mod notifications;
pub mod parties;
pub mod products;
pub mod reports;
pub mod system;
pub mod transactions;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/products", products::router())
        .nest("/parties", parties::router())
        .nest("/invoices", invoices::router())
        .nest("/accounts", accounts::router())
        .nest("/transactions", transactions::router())
        .nest("/notifications", notifications::router())
        .nest("/dashboard", dashboard::router())
        .nest("/reports", reports::router())
}
