use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use defter_auth::Permission;
use defter_infra::TenantStore;
use defter_notifications::NotificationId;

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_read))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let mut notifications = services.db().notifications().list(tenant.tenant_id());
    notifications.sort_by_key(|n| std::cmp::Reverse(n.created_at()));
    let items = notifications
        .iter()
        .map(dto::notification_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Marking a notification read re-arms its `(kind, related_id)` trigger.
pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = CmdAuth {
        inner: (),
        required: vec![Permission::new("notifications.write")],
    };
    if let Err(e) = authz::authorize_command(&tenant, &principal, &cmd) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let notification_id = match common::parse_entity_id(&id, "notification id") {
        Ok(v) => NotificationId::new(v),
        Err(r) => return r,
    };
    match services
        .ledger()
        .mark_notification_read(tenant.tenant_id(), notification_id)
    {
        Ok(notification) => {
            (StatusCode::OK, Json(dto::notification_to_json(&notification))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
