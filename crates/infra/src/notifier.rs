//! Notification emission policy.
//!
//! One rule everywhere: before creating a `(kind, related_id)` notification,
//! look for an existing **unread** one with the same pair in the tenant and
//! skip creation if found. Marking the existing record read re-arms the
//! trigger: the next threshold crossing notifies again.

use chrono::{DateTime, Utc};

use defter_core::{EntityId, TenantId};
use defter_invoicing::Invoice;
use defter_notifications::{Notification, NotificationId, NotificationKind};
use defter_parties::Party;
use defter_products::Product;

use crate::store::{Database, TenantStore};

/// Create a notification unless an unread one suppresses it.
pub fn emit_deduped(
    db: &Database,
    tenant_id: TenantId,
    kind: NotificationKind,
    related_id: EntityId,
    message: String,
    now: DateTime<Utc>,
) -> Option<Notification> {
    let suppressed = db
        .notifications()
        .list(tenant_id)
        .iter()
        .any(|n| n.suppresses(kind, related_id));
    if suppressed {
        return None;
    }

    let notification = Notification::new(
        tenant_id,
        NotificationId::new(EntityId::new()),
        kind,
        related_id,
        message,
        now,
    );
    db.notifications()
        .upsert(tenant_id, notification.id_typed(), notification.clone());
    tracing::debug!(%tenant_id, ?kind, %related_id, "notification created");
    Some(notification)
}

/// Critical-stock notification for a product whose quantity just changed.
pub fn critical_stock(
    db: &Database,
    tenant_id: TenantId,
    product: &Product,
    now: DateTime<Utc>,
) -> Option<Notification> {
    if !product.is_critical() {
        return None;
    }
    emit_deduped(
        db,
        tenant_id,
        NotificationKind::CriticalStock,
        product.id_typed().0,
        format!(
            "{} ({}) is at critical stock level: {} left",
            product.name(),
            product.sku(),
            product.quantity()
        ),
        now,
    )
}

/// Due-date notification for an invoice inside the lookahead window.
pub fn due_date(
    db: &Database,
    tenant_id: TenantId,
    invoice: &Invoice,
    now: DateTime<Utc>,
) -> Option<Notification> {
    emit_deduped(
        db,
        tenant_id,
        NotificationKind::DueDate,
        invoice.id_typed().0,
        format!(
            "invoice {} is due on {}",
            invoice.invoice_number(),
            invoice.due_date().format("%Y-%m-%d")
        ),
        now,
    )
}

/// Credit-limit notification for a customer whose unpaid total exceeds the
/// configured limit.
pub fn credit_limit(
    db: &Database,
    tenant_id: TenantId,
    customer: &Party,
    outstanding: i64,
    limit: i64,
    now: DateTime<Utc>,
) -> Option<Notification> {
    emit_deduped(
        db,
        tenant_id,
        NotificationKind::CreditLimit,
        customer.id_typed().0,
        format!(
            "{} exceeded the credit limit: {} outstanding against a limit of {}",
            customer.name(),
            outstanding,
            limit
        ),
        now,
    )
}
