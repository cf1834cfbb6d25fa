use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    extract::Extension,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, Sse},
    },
};

use crate::app::services::{AppServices, tenant_sse_stream};
use crate::context::{PrincipalContext, TenantContext};

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "principal_id": principal.principal_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}

/// Per-tenant SSE feed of realtime messages (e.g. created notifications).
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    tenant_sse_stream(services, tenant.tenant_id())
}
