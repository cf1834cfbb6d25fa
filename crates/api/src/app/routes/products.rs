use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use defter_auth::Permission;
use defter_infra::{StockCount, TenantStore};
use defter_products::{ProductCreate, ProductId, ProductPatch};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/stock-count", post(import_stock_count))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProductCreate>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("products.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.ledger().create_product(tenant.tenant_id(), cmd.inner) {
        Ok(product) => {
            (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .db()
        .products()
        .list(tenant.tenant_id())
        .iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match common::parse_entity_id(&id, "product id") {
        Ok(v) => ProductId::new(v),
        Err(r) => return r,
    };
    match services.db().products().get(tenant.tenant_id(), &product_id) {
        Some(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ProductPatch>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("products.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let product_id = match common::parse_entity_id(&id, "product id") {
        Ok(v) => ProductId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .update_product(tenant.tenant_id(), product_id, cmd.inner)
    {
        Ok(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("products.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let product_id = match common::parse_entity_id(&id, "product id") {
        Ok(v) => ProductId::new(v),
        Err(r) => return r,
    };
    match services.ledger().delete_product(tenant.tenant_id(), product_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Bulk stock-count import: overwrites quantities, writes no movements.
pub async fn import_stock_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StockCountRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("products.stock_count")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let mut counts = Vec::with_capacity(body.counts.len());
    for row in &body.counts {
        let product_id = match common::parse_entity_id(&row.product_id, "product id") {
            Ok(v) => ProductId::new(v),
            Err(r) => return r,
        };
        counts.push(StockCount {
            product_id,
            counted_quantity: row.counted_quantity,
        });
    }

    match services
        .ledger()
        .import_stock_count(tenant.tenant_id(), counts, Utc::now())
    {
        Ok((products, notifications)) => {
            services.publish_notifications(tenant.tenant_id(), &notifications);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "updated": products.iter().map(dto::product_to_json).collect::<Vec<_>>(),
                })),
            )
                .into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
