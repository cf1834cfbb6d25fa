use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/summary", get(summary))
}

/// Read-only aggregation, computed fresh per request. Sections degrade
/// independently: a missing section is omitted, never a failed response.
pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let summary = services
        .reports()
        .dashboard_summary(tenant.tenant_id(), Utc::now());
    (StatusCode::OK, Json(summary)).into_response()
}
