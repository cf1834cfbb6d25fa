use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use defter_accounting::AccountId;
use defter_auth::Permission;
use defter_infra::TenantStore;

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/transfer", post(transfer))
        .route("/cari-transfer", post(cari_transfer))
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let mut transactions = services.db().transactions().list(tenant.tenant_id());
    transactions.sort_by_key(|t| std::cmp::Reverse(t.occurred_at()));
    let items = transactions
        .iter()
        .map(dto::transaction_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Direct ledger entry: income credits the account, expense debits it.
pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateTransactionRequest>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("transactions.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let body = cmd.inner;

    let account_id = match common::parse_entity_id(&body.account_id, "account id") {
        Ok(v) => AccountId::new(v),
        Err(r) => return r,
    };
    let partner = match &body.partner {
        Some(p) => match common::parse_partner(p) {
            Ok(p) => Some(p),
            Err(r) => return r,
        },
        None => None,
    };

    match services.ledger().record_transaction(
        tenant.tenant_id(),
        body.kind,
        account_id,
        body.amount,
        body.description,
        partner,
        Utc::now(),
    ) {
        Ok((account, transaction)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "account": dto::account_to_json(&account),
                "transaction": dto::transaction_to_json(&transaction),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    transfer_inner(services, tenant, principal, body, false).await
}

/// Transfer with a partner ("cari") account on either side: manual debt
/// adjustment recorded against the partner.
pub async fn cari_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    transfer_inner(services, tenant, principal, body, true).await
}

async fn transfer_inner(
    services: Arc<AppServices>,
    tenant: TenantContext,
    principal: PrincipalContext,
    body: dto::TransferRequest,
    cari: bool,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("transactions.write")],
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

    let result = if cari {
        services.ledger().cari_transfer(
            tenant.tenant_id(),
            source_id,
            target_id,
            body.amount,
            body.description,
            Utc::now(),
        )
    } else {
        services.ledger().transfer(
            tenant.tenant_id(),
            source_id,
            target_id,
            body.amount,
            body.description,
            Utc::now(),
        )
    };

    match result {
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
