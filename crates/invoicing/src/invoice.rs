use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use defter_core::{
    Currency, DomainError, DomainResult, Entity, EntityId, Revision, TenantId, Versioned,
};
use defter_parties::{PartnerRef, PartyKind};
use defter_products::ProductId;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub EntityId);

impl InvoiceId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale invoices bill customers; purchase invoices come from suppliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceKind {
    Sale,
    Purchase,
}

/// Invoice status lifecycle.
///
/// `Draft → Approved → Paid` with admin-only reversals; `Rejected` and
/// `Canceled` are terminal labels reachable through the status override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Approved,
    Paid,
    Rejected,
    Canceled,
}

/// One invoice line. Amounts in minor currency units; tax in basis points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(default)]
    pub tax_rate_bp: u32,
    #[serde(default)]
    pub discount: i64,
}

impl LineItem {
    /// Quantity × unit price − discount.
    pub fn net_amount(&self) -> DomainResult<i64> {
        let gross = self
            .quantity
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::invariant("line amount overflow"))?;
        let net = gross
            .checked_sub(self.discount)
            .ok_or_else(|| DomainError::invariant("line amount overflow"))?;
        if net < 0 {
            return Err(DomainError::validation(
                "discount exceeds line gross amount",
            ));
        }
        Ok(net)
    }

    /// Net amount plus tax (floor division on basis points).
    pub fn total_amount(&self) -> DomainResult<i64> {
        let net = self.net_amount()?;
        let tax = (net as i128 * self.tax_rate_bp as i128) / 10_000;
        i64::try_from(net as i128 + tax)
            .map_err(|_| DomainError::invariant("line amount overflow"))
    }

    fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if self.unit_price < 0 {
            return Err(DomainError::validation("unit_price must not be negative"));
        }
        if self.discount < 0 {
            return Err(DomainError::validation("discount must not be negative"));
        }
        if self.tax_rate_bp > 100_00 {
            return Err(DomainError::validation("tax_rate_bp must be at most 10000"));
        }
        self.net_amount().map(|_| ())
    }
}

/// Outcome of registering a settlement amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub paid_amount: i64,
    pub became_paid: bool,
}

/// Validated creation payload (typed; built by the API layer from the
/// request body after resolving identifiers).
#[derive(Debug, Clone)]
pub struct InvoiceCreate {
    pub invoice_number: String,
    pub partner: PartnerRef,
    pub kind: InvoiceKind,
    pub line_items: Vec<LineItem>,
    pub currency: Currency,
    pub date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Invoice entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: TenantId,
    invoice_number: String,
    partner: PartnerRef,
    kind: InvoiceKind,
    status: InvoiceStatus,
    line_items: Vec<LineItem>,
    total_amount: i64,
    paid_amount: i64,
    currency: Currency,
    date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    revision: Revision,
}

impl Invoice {
    /// Create a draft invoice. The total is computed from the lines, never
    /// taken from the caller.
    pub fn create(tenant_id: TenantId, id: InvoiceId, input: InvoiceCreate) -> DomainResult<Self> {
        if input.invoice_number.trim().is_empty() {
            return Err(DomainError::validation("invoice_number must not be empty"));
        }
        if input.line_items.is_empty() {
            return Err(DomainError::validation(
                "invoice must have at least one line item",
            ));
        }
        match (input.kind, input.partner.kind()) {
            (InvoiceKind::Sale, PartyKind::Customer) => {}
            (InvoiceKind::Purchase, PartyKind::Supplier) => {}
            (InvoiceKind::Sale, PartyKind::Supplier) => {
                return Err(DomainError::validation(
                    "sale invoices must reference a customer",
                ));
            }
            (InvoiceKind::Purchase, PartyKind::Customer) => {
                return Err(DomainError::validation(
                    "purchase invoices must reference a supplier",
                ));
            }
        }
        if input.due_date < input.date {
            return Err(DomainError::validation("due_date must not precede date"));
        }

        let mut total: i64 = 0;
        for line in &input.line_items {
            line.validate()?;
            total = total
                .checked_add(line.total_amount()?)
                .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        }

        Ok(Self {
            id,
            tenant_id,
            invoice_number: input.invoice_number.trim().to_string(),
            partner: input.partner,
            kind: input.kind,
            status: InvoiceStatus::Draft,
            line_items: input.line_items,
            total_amount: total,
            paid_amount: 0,
            currency: input.currency,
            date: input.date,
            due_date: input.due_date,
            revision: Revision::initial(),
        })
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn partner(&self) -> PartnerRef {
        self.partner
    }

    pub fn kind(&self) -> InvoiceKind {
        self.kind
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn paid_amount(&self) -> i64 {
        self.paid_amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Amount still owed. Zero when fully settled; overpayment clamps to zero.
    pub fn outstanding_amount(&self) -> i64 {
        (self.total_amount - self.paid_amount).max(0)
    }

    /// Counts toward a customer's unpaid total.
    pub fn is_open(&self) -> bool {
        !matches!(
            self.status,
            InvoiceStatus::Paid | InvoiceStatus::Rejected | InvoiceStatus::Canceled
        )
    }

    /// Due (or overdue) within the lookahead window and still unsettled.
    pub fn due_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        self.is_open() && self.due_date <= now + Duration::days(days)
    }

    pub fn ensure_can_approve(&self) -> DomainResult<()> {
        if self.status == InvoiceStatus::Approved {
            return Err(DomainError::invariant("invoice is already approved"));
        }
        Ok(())
    }

    /// Transition to `Approved`. Stock effects are the orchestrator's job and
    /// must be applied in the same atomic operation.
    pub fn mark_approved(&mut self) -> DomainResult<()> {
        self.ensure_can_approve()?;
        self.status = InvoiceStatus::Approved;
        Ok(())
    }

    pub fn ensure_can_revert(&self) -> DomainResult<()> {
        if self.status != InvoiceStatus::Approved {
            return Err(DomainError::invariant(
                "only approved invoices can be reverted",
            ));
        }
        Ok(())
    }

    /// Undo `Approved → Draft`. Inverse stock deltas are the orchestrator's
    /// job.
    pub fn mark_reverted(&mut self) -> DomainResult<()> {
        self.ensure_can_revert()?;
        self.status = InvoiceStatus::Draft;
        Ok(())
    }

    /// Accumulate a collect/pay amount. Flips to `Paid` once the running
    /// total covers the invoice; overpayment is accepted without a cap.
    pub fn register_settlement(&mut self, amount: i64) -> DomainResult<SettlementOutcome> {
        if self.status != InvoiceStatus::Approved {
            return Err(DomainError::invariant(
                "only approved invoices can be settled",
            ));
        }
        if amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        self.paid_amount = self
            .paid_amount
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("paid amount overflow"))?;

        let became_paid = self.paid_amount >= self.total_amount;
        if became_paid {
            self.status = InvoiceStatus::Paid;
        }

        Ok(SettlementOutcome {
            paid_amount: self.paid_amount,
            became_paid,
        })
    }

    /// Undo `Paid → Approved`, zeroing the paid amount. The settlement
    /// transactions and account balances are deliberately left untouched.
    pub fn mark_unpaid(&mut self) -> DomainResult<()> {
        if self.status != InvoiceStatus::Paid {
            return Err(DomainError::invariant(
                "only paid invoices can be reverted to approved",
            ));
        }
        self.paid_amount = 0;
        self.status = InvoiceStatus::Approved;
        Ok(())
    }

    /// Direct status override, bypassing every side effect.
    pub fn override_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }

    /// Non-admins cannot delete an approved invoice.
    pub fn ensure_deletable(&self, is_admin: bool) -> DomainResult<()> {
        if !is_admin && self.status == InvoiceStatus::Approved {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }
}

impl Versioned for Invoice {
    fn revision(&self) -> Revision {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.next();
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
