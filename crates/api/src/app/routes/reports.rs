use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use defter_infra::TenantStore;
use defter_products::ProductId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/stock-movements", get(stock_movements))
        .route("/receivables", get(receivables))
}

/// Movement history for one product, oldest first.
pub async fn stock_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::StockMovementsQuery>,
) -> axum::response::Response {
    let product_id = match common::parse_entity_id(&query.product_id, "product id") {
        Ok(v) => ProductId::new(v),
        Err(r) => return r,
    };
    if services
        .db()
        .products()
        .get(tenant.tenant_id(), &product_id)
        .is_none()
    {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    let items = services
        .reports()
        .stock_movements(tenant.tenant_id(), product_id)
        .iter()
        .map(dto::movement_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Per-customer outstanding balances from open sale invoices.
pub async fn receivables(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let rows = services.reports().receivables(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": rows }))).into_response()
}
