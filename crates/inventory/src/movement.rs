use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use defter_core::{DomainError, DomainResult, Entity, EntityId, TenantId};
use defter_invoicing::{InvoiceId, InvoiceKind};
use defter_products::ProductId;

/// Stock movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub EntityId);

impl MovementId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    /// Approving a sale ships stock out; approving a purchase receives it.
    pub fn for_approval(kind: InvoiceKind) -> Self {
        match kind {
            InvoiceKind::Sale => MovementDirection::Out,
            InvoiceKind::Purchase => MovementDirection::In,
        }
    }

    /// Signed product-quantity delta for a movement of `quantity` units.
    pub fn signed_delta(self, quantity: i64) -> i64 {
        match self {
            MovementDirection::In => quantity,
            MovementDirection::Out => -quantity,
        }
    }
}

/// Immutable, append-only audit record of one quantity change.
///
/// Created per line item on invoice approval; deleted en masse (matched by
/// `{product_id, invoice_id}`) on invoice reversion. Never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: MovementId,
    tenant_id: TenantId,
    product_id: ProductId,
    invoice_id: InvoiceId,
    direction: MovementDirection,
    quantity: i64,
    occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(
        tenant_id: TenantId,
        id: MovementId,
        product_id: ProductId,
        invoice_id: InvoiceId,
        direction: MovementDirection,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "movement quantity must be positive",
            ));
        }
        Ok(Self {
            id,
            tenant_id,
            product_id,
            invoice_id,
            direction,
            quantity,
            occurred_at,
        })
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn direction(&self) -> MovementDirection {
        self.direction
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
