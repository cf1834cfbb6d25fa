use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use defter_core::{Entity, EntityId, TenantId};

/// Notification identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub EntityId);

impl NotificationId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Notification trigger kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CriticalStock,
    DueDate,
    CreditLimit,
}

/// In-app notification record.
///
/// Dedup rule: a new `(kind, related_id)` notification is only created when
/// no *unread* one exists for the same pair in the tenant. Marking the
/// existing one read re-arms the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    tenant_id: TenantId,
    kind: NotificationKind,
    message: String,
    /// The entity that tripped the trigger (product, invoice, customer).
    related_id: EntityId,
    read: bool,
    created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: TenantId,
        id: NotificationId,
        kind: NotificationKind,
        related_id: EntityId,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            kind,
            message: message.into(),
            related_id,
            read: false,
            created_at,
        }
    }

    pub fn id_typed(&self) -> NotificationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn related_id(&self) -> EntityId {
        self.related_id
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }

    /// True when this record suppresses a new `(kind, related_id)` emission.
    pub fn suppresses(&self, kind: NotificationKind, related_id: EntityId) -> bool {
        !self.read && self.kind == kind && self.related_id == related_id
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_record_suppresses_same_pair_only() {
        let related = EntityId::new();
        let n = Notification::new(
            TenantId::new(),
            NotificationId::new(EntityId::new()),
            NotificationKind::CriticalStock,
            related,
            "stock low",
            Utc::now(),
        );

        assert!(n.suppresses(NotificationKind::CriticalStock, related));
        assert!(!n.suppresses(NotificationKind::DueDate, related));
        assert!(!n.suppresses(NotificationKind::CriticalStock, EntityId::new()));
    }

    #[test]
    fn read_record_re_arms_the_trigger() {
        let related = EntityId::new();
        let mut n = Notification::new(
            TenantId::new(),
            NotificationId::new(EntityId::new()),
            NotificationKind::CreditLimit,
            related,
            "limit exceeded",
            Utc::now(),
        );
        n.mark_read();
        assert!(!n.suppresses(NotificationKind::CreditLimit, related));
    }
}
