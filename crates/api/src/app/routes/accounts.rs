use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use defter_accounting::{AccountCreate, AccountId};
use defter_auth::Permission;
use defter_infra::TenantStore;

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/transfer", post(transfer))
        .route("/:id", get(get_account))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("accounts.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let partner = match &body.partner {
        Some(p) => match common::parse_partner(p) {
            Ok(p) => Some(p),
            Err(r) => return r,
        },
        None => None,
    };
    let currency = match common::parse_currency(body.currency.as_deref()) {
        Ok(v) => v,
        Err(r) => return r,
    };

    let input = AccountCreate {
        name: body.name,
        kind: body.kind,
        partner,
        opening_balance: body.opening_balance,
        currency,
    };
    match services.ledger().create_account(tenant.tenant_id(), input) {
        Ok(account) => {
            (StatusCode::CREATED, Json(dto::account_to_json(&account))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .db()
        .accounts()
        .list(tenant.tenant_id())
        .iter()
        .map(dto::account_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match common::parse_entity_id(&id, "account id") {
        Ok(v) => AccountId::new(v),
        Err(r) => return r,
    };
    match services.db().accounts().get(tenant.tenant_id(), &account_id) {
        Some(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

/// Atomic transfer: debit source, credit target, one transaction.
pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("accounts.transfer")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let source_id = match common::parse_entity_id(&body.source_account_id, "source account id") {
        Ok(v) => AccountId::new(v),
        Err(r) => return r,
    };
    let target_id = match common::parse_entity_id(&body.target_account_id, "target account id") {
        Ok(v) => AccountId::new(v),
        Err(r) => return r,
    };

    match services.ledger().transfer(
        tenant.tenant_id(),
        source_id,
        target_id,
        body.amount,
        body.description,
        Utc::now(),
    ) {
        Ok((source, target, transaction)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "source": dto::account_to_json(&source),
                "target": dto::account_to_json(&target),
                "transaction": dto::transaction_to_json(&transaction),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
