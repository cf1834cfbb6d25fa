use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use defter_accounting::AccountId;
use defter_auth::Permission;
use defter_infra::{Settlement, TenantStore};
use defter_invoicing::{InvoiceCreate, InvoiceId, LineItem};
use defter_products::ProductId;

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/due-soon", get(due_soon))
        .route("/:id", get(get_invoice).delete(delete_invoice))
        .route("/:id/approve", post(approve_invoice))
        .route("/:id/revert", post(revert_invoice))
        .route("/:id/collect", post(collect_invoice))
        .route("/:id/pay", post(pay_invoice))
        .route("/:id/revert-to-approved", post(revert_to_approved))
        .route("/:id/status", patch(override_status))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("invoices.create")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let partner = match common::parse_partner(&body.partner) {
        Ok(p) => p,
        Err(r) => return r,
    };

    let mut line_items = Vec::with_capacity(body.line_items.len());
    for line in &body.line_items {
        let product_id = match common::parse_entity_id(&line.product_id, "product id") {
            Ok(v) => ProductId::new(v),
            Err(r) => return r,
        };
        line_items.push(LineItem {
            product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            tax_rate_bp: line.tax_rate_bp,
            discount: line.discount,
        });
    }

    let now = Utc::now();
    let date = match &body.date {
        Some(raw) => match common::parse_rfc3339(raw, "date") {
            Ok(v) => v,
            Err(r) => return r,
        },
        None => now,
    };
    let due_date = match common::parse_rfc3339(&body.due_date, "due_date") {
        Ok(v) => v,
        Err(r) => return r,
    };
    let currency = match common::parse_currency(body.currency.as_deref()) {
        Ok(v) => v,
        Err(r) => return r,
    };

    let input = InvoiceCreate {
        invoice_number: body.invoice_number,
        partner,
        kind: body.kind,
        line_items,
        currency,
        date,
        due_date,
    };

    match services
        .ledger()
        .create_invoice(tenant.tenant_id(), input, now)
    {
        Ok((invoice, notifications)) => {
            services.publish_notifications(tenant.tenant_id(), &notifications);
            (StatusCode::CREATED, Json(dto::invoice_to_json(&invoice))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .db()
        .invoices()
        .list(tenant.tenant_id())
        .iter()
        .map(dto::invoice_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services.db().invoices().get(tenant.tenant_id(), &invoice_id) {
        Some(invoice) => (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("invoices.delete")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .delete_invoice(tenant.tenant_id(), invoice_id, principal.is_admin())
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Admin-only: `draft → approved`, adjusting stock and writing movements.
pub async fn approve_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("invoices.approve")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .approve_invoice(tenant.tenant_id(), invoice_id, Utc::now())
    {
        Ok((invoice, notifications)) => {
            services.publish_notifications(tenant.tenant_id(), &notifications);
            (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Admin-only: `approved → draft`, reversing stock and deleting movements.
pub async fn revert_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("invoices.revert")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .revert_invoice(tenant.tenant_id(), invoice_id, Utc::now())
    {
        Ok((invoice, notifications)) => {
            services.publish_notifications(tenant.tenant_id(), &notifications);
            (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn collect_invoice(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    path: Path<String>,
    body: Json<dto::SettleInvoiceRequest>,
) -> axum::response::Response {
    settle(services, tenant, principal, path, body, Settlement::Collect).await
}

pub async fn pay_invoice(
    services: Extension<Arc<AppServices>>,
    tenant: Extension<TenantContext>,
    principal: Extension<PrincipalContext>,
    path: Path<String>,
    body: Json<dto::SettleInvoiceRequest>,
) -> axum::response::Response {
    settle(services, tenant, principal, path, body, Settlement::Pay).await
}

async fn settle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SettleInvoiceRequest>,
    settlement: Settlement,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("invoices.settle")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    let account_id = match common::parse_entity_id(&body.account_id, "account id") {
        Ok(v) => AccountId::new(v),
        Err(r) => return r,
    };

    match services.ledger().settle_invoice(
        tenant.tenant_id(),
        invoice_id,
        account_id,
        body.amount,
        settlement,
        body.description,
        Utc::now(),
    ) {
        Ok((invoice, account, transaction)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "invoice": dto::invoice_to_json(&invoice),
                "account": dto::account_to_json(&account),
                "transaction": dto::transaction_to_json(&transaction),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Admin-only: `paid → approved`, zeroing the paid amount. Settlement
/// transactions and balances stay as they are.
pub async fn revert_to_approved(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("invoices.revert_paid")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .revert_invoice_to_approved(tenant.tenant_id(), invoice_id)
    {
        Ok(invoice) => (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Admin-only: direct status override with no side effects.
pub async fn override_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OverrideStatusRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("invoices.override_status")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let invoice_id = match common::parse_entity_id(&id, "invoice id") {
        Ok(v) => InvoiceId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .override_invoice_status(tenant.tenant_id(), invoice_id, body.status)
    {
        Ok(invoice) => (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Sweep for invoices due soon, emitting deduplicated notifications.
pub async fn due_soon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let (due, notifications) = services
        .ledger()
        .due_soon_sweep(tenant.tenant_id(), Utc::now());
    services.publish_notifications(tenant.tenant_id(), &notifications);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "due": due,
            "notified": notifications.len(),
        })),
    )
        .into_response()
}
