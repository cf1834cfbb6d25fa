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
use defter_infra::TenantStore;
use defter_parties::{PartyCreate, PartyId, PartyKind, PartyPatch};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_party).get(list_parties))
        .route("/:id", get(get_party).put(update_party).delete(delete_party))
}

pub async fn create_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PartyCreate>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("parties.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.ledger().create_party(tenant.tenant_id(), cmd.inner) {
        Ok(party) => {
            (StatusCode::CREATED, Json(dto::party_to_json(&party, None))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .db()
        .parties()
        .list(tenant.tenant_id())
        .iter()
        .map(|p| dto::party_to_json(p, None))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Customer detail includes the on-demand credit standing; crossing the
/// limit emits the deduplicated credit-limit notification.
pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let party_id = match common::parse_entity_id(&id, "party id") {
        Ok(v) => PartyId::new(v),
        Err(r) => return r,
    };

    match services
        .ledger()
        .credit_status(tenant.tenant_id(), party_id, Utc::now())
    {
        Ok((party, credit, notifications)) => {
            services.publish_notifications(tenant.tenant_id(), &notifications);
            let credit = (party.kind() == PartyKind::Customer).then_some(&credit);
            (StatusCode::OK, Json(dto::party_to_json(&party, credit))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<PartyPatch>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: body,
        required: vec![Permission::new("parties.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let party_id = match common::parse_entity_id(&id, "party id") {
        Ok(v) => PartyId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .update_party(tenant.tenant_id(), party_id, cmd.inner)
    {
        Ok(party) => (StatusCode::OK, Json(dto::party_to_json(&party, None))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("parties.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let party_id = match common::parse_entity_id(&id, "party id") {
        Ok(v) => PartyId::new(v),
        Err(r) => return r,
    };
    match services.ledger().delete_party(tenant.tenant_id(), party_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
