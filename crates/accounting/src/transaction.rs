use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use defter_core::{DomainError, DomainResult, Entity, EntityId, TenantId};
use defter_invoicing::InvoiceId;
use defter_parties::PartnerRef;

use crate::account::AccountId;

/// Transaction identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub EntityId);

impl TransactionId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

/// Immutable ledger record: the single source of truth for money movement.
/// Every balance change writes exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    tenant_id: TenantId,
    kind: TransactionKind,
    amount: i64,
    occurred_at: DateTime<Utc>,
    description: Option<String>,
    related_invoice: Option<InvoiceId>,
    partner: Option<PartnerRef>,
    source_account: Option<AccountId>,
    target_account: Option<AccountId>,
}

impl Transaction {
    fn base(
        tenant_id: TenantId,
        id: TransactionId,
        kind: TransactionKind,
        amount: i64,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(Self {
            id,
            tenant_id,
            kind,
            amount,
            occurred_at,
            description: None,
            related_invoice: None,
            partner: None,
            source_account: None,
            target_account: None,
        })
    }

    /// Money in: credits `target_account`.
    pub fn income(
        tenant_id: TenantId,
        id: TransactionId,
        amount: i64,
        target_account: AccountId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut tx = Self::base(tenant_id, id, TransactionKind::Income, amount, occurred_at)?;
        tx.target_account = Some(target_account);
        Ok(tx)
    }

    /// Money out: debits `source_account`.
    pub fn expense(
        tenant_id: TenantId,
        id: TransactionId,
        amount: i64,
        source_account: AccountId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut tx = Self::base(tenant_id, id, TransactionKind::Expense, amount, occurred_at)?;
        tx.source_account = Some(source_account);
        Ok(tx)
    }

    /// Movement between two accounts of the same tenant.
    pub fn transfer(
        tenant_id: TenantId,
        id: TransactionId,
        amount: i64,
        source_account: AccountId,
        target_account: AccountId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if source_account == target_account {
            return Err(DomainError::validation(
                "source and target accounts must differ",
            ));
        }
        let mut tx = Self::base(tenant_id, id, TransactionKind::Transfer, amount, occurred_at)?;
        tx.source_account = Some(source_account);
        tx.target_account = Some(target_account);
        Ok(tx)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_related_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.related_invoice = Some(invoice_id);
        self
    }

    pub fn with_partner(mut self, partner: PartnerRef) -> Self {
        self.partner = Some(partner);
        self
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn related_invoice(&self) -> Option<InvoiceId> {
        self.related_invoice
    }

    pub fn partner(&self) -> Option<PartnerRef> {
        self.partner
    }

    pub fn source_account(&self) -> Option<AccountId> {
        self.source_account
    }

    pub fn target_account(&self) -> Option<AccountId> {
        self.target_account
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
