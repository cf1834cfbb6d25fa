//! The ledger service: every mutation that touches more than one entity.
//!
//! Execution model: each operation takes the tenant's write lock, loads the
//! entities it needs, validates and mutates **clones**, and only then writes.
//! A failed validation therefore writes nothing, and two operations on the
//! same tenant can never interleave between a stock/balance check and the
//! corresponding write. Revision checks on save are a second line of defense
//! against writers that bypass the lock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use defter_accounting::{
    Account, AccountCreate, AccountId, Transaction, TransactionId, TransactionKind,
};
use defter_core::{DomainError, DomainResult, EntityId, ExpectedRevision, TenantId};
use defter_inventory::{MovementDirection, MovementId, StockMovement};
use defter_invoicing::{Invoice, InvoiceCreate, InvoiceId, InvoiceKind, InvoiceStatus};
use defter_notifications::{Notification, NotificationId};
use defter_parties::{PartnerRef, Party, PartyCreate, PartyId, PartyKind, PartyPatch};
use defter_products::{Product, ProductCreate, ProductId, ProductPatch};

use crate::notifier;
use crate::store::{Database, TenantStore, save_versioned};

/// Due-date lookahead applied when an invoice is created.
const CREATE_DUE_LOOKAHEAD_DAYS: i64 = 4;
/// Due-date lookahead applied by the explicit due-soon sweep.
const SWEEP_DUE_LOOKAHEAD_DAYS: i64 = 3;

/// Settlement direction: collecting a sale or paying a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Collect,
    Pay,
}

impl Settlement {
    fn expected_kind(self) -> InvoiceKind {
        match self {
            Settlement::Collect => InvoiceKind::Sale,
            Settlement::Pay => InvoiceKind::Purchase,
        }
    }
}

/// One row of a stock-count import.
#[derive(Debug, Clone)]
pub struct StockCount {
    pub product_id: ProductId,
    pub counted_quantity: i64,
}

/// Credit standing of a customer, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditStatus {
    pub outstanding: i64,
    pub limit: Option<i64>,
    pub exceeded: bool,
}

impl CreditStatus {
    fn none() -> Self {
        Self {
            outstanding: 0,
            limit: None,
            exceeded: false,
        }
    }
}

/// Orchestrates tenant-scoped mutations over the [`Database`].
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Arc<Database>,
}

impl Ledger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    fn guard(&self, tenant_id: TenantId) -> Arc<std::sync::Mutex<()>> {
        self.db.tenant_lock(tenant_id)
    }

    // ── invoices ────────────────────────────────────────────────────────

    /// Create a draft invoice. Emits a deduplicated due-date notification
    /// when the due date falls within the creation lookahead.
    pub fn create_invoice(
        &self,
        tenant_id: TenantId,
        input: InvoiceCreate,
        now: DateTime<Utc>,
    ) -> DomainResult<(Invoice, Vec<Notification>)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // The partner must resolve in-tenant and carry the kind the
        // reference claims.
        let party = self
            .db
            .parties()
            .get(tenant_id, &input.partner.party_id())
            .ok_or(DomainError::NotFound)?;
        if party.kind() != input.partner.kind() {
            return Err(DomainError::validation(format!(
                "partner {} is not a {:?}",
                party.id_typed(),
                input.partner.kind()
            )));
        }

        for line in &input.line_items {
            if self.db.products().get(tenant_id, &line.product_id).is_none() {
                return Err(DomainError::NotFound);
            }
        }

        if self.db.invoice_number_in_use(tenant_id, input.invoice_number.trim()) {
            return Err(DomainError::conflict(format!(
                "invoice number {} already in use",
                input.invoice_number.trim()
            )));
        }

        let invoice = Invoice::create(tenant_id, InvoiceId::new(EntityId::new()), input)?;
        self.db
            .invoices()
            .upsert(tenant_id, invoice.id_typed(), invoice.clone());

        let mut notifications = Vec::new();
        if invoice.due_within(now, CREATE_DUE_LOOKAHEAD_DAYS) {
            notifications.extend(notifier::due_date(&self.db, tenant_id, &invoice, now));
        }

        tracing::info!(%tenant_id, invoice_id = %invoice.id_typed(), "invoice created");
        Ok((invoice, notifications))
    }

    /// Approve a draft invoice, adjusting stock and writing one movement per
    /// line item. If any sale line exceeds available stock the whole
    /// operation fails and nothing is written.
    pub fn approve_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Invoice, Vec<Notification>)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        invoice.ensure_can_approve()?;

        let direction = MovementDirection::for_approval(invoice.kind());

        // Stage every product delta before writing anything. Repeated
        // products accumulate across lines.
        let mut staged: HashMap<ProductId, Product> = HashMap::new();
        for line in invoice.line_items() {
            let product = match staged.entry(line.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => {
                    let p = self
                        .db
                        .products()
                        .get(tenant_id, &line.product_id)
                        .ok_or(DomainError::NotFound)?;
                    v.insert(p)
                }
            };
            product.apply_stock_delta(direction.signed_delta(line.quantity))?;
        }

        let mut movements = Vec::with_capacity(invoice.line_items().len());
        for line in invoice.line_items() {
            movements.push(StockMovement::record(
                tenant_id,
                MovementId::new(EntityId::new()),
                line.product_id,
                invoice_id,
                direction,
                line.quantity,
                now,
            )?);
        }

        invoice.mark_approved()?;

        // Commit.
        let mut notifications = Vec::new();
        for (id, product) in staged {
            let expected = ExpectedRevision::Exact(product.revision());
            let saved = save_versioned(self.db.products(), tenant_id, id, product, expected)?;
            notifications.extend(notifier::critical_stock(&self.db, tenant_id, &saved, now));
        }
        for movement in movements {
            self.db
                .movements()
                .upsert(tenant_id, movement.id_typed(), movement);
        }
        let expected = ExpectedRevision::Exact(invoice.revision());
        let invoice = save_versioned(self.db.invoices(), tenant_id, invoice_id, invoice, expected)?;

        tracing::info!(%tenant_id, %invoice_id, "invoice approved");
        Ok((invoice, notifications))
    }

    /// Revert an approved invoice to draft: inverse stock deltas, delete the
    /// movements written by the approval.
    pub fn revert_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Invoice, Vec<Notification>)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        invoice.ensure_can_revert()?;

        let direction = MovementDirection::for_approval(invoice.kind());

        let mut staged: HashMap<ProductId, Product> = HashMap::new();
        for line in invoice.line_items() {
            let product = match staged.entry(line.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => {
                    let p = self
                        .db
                        .products()
                        .get(tenant_id, &line.product_id)
                        .ok_or(DomainError::NotFound)?;
                    v.insert(p)
                }
            };
            product.apply_stock_delta(-direction.signed_delta(line.quantity))?;
        }

        invoice.mark_reverted()?;

        let mut notifications = Vec::new();
        for (id, product) in staged {
            let expected = ExpectedRevision::Exact(product.revision());
            let saved = save_versioned(self.db.products(), tenant_id, id, product, expected)?;
            notifications.extend(notifier::critical_stock(&self.db, tenant_id, &saved, now));
        }

        // Delete exactly the movements created by the approval, matched by
        // {product_id, invoice_id}. Other invoices' movements are untouched.
        let line_products: HashSet<ProductId> =
            invoice.line_items().iter().map(|l| l.product_id).collect();
        self.db.movements().retain(tenant_id, &mut |m| {
            !(m.invoice_id() == invoice_id && line_products.contains(&m.product_id()))
        });

        let expected = ExpectedRevision::Exact(invoice.revision());
        let invoice = save_versioned(self.db.invoices(), tenant_id, invoice_id, invoice, expected)?;

        tracing::info!(%tenant_id, %invoice_id, "invoice reverted to draft");
        Ok((invoice, notifications))
    }

    /// Collect against a sale invoice or pay a purchase invoice: one
    /// transaction, one balance change, and the accumulated paid amount.
    pub fn settle_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        account_id: AccountId,
        amount: i64,
        settlement: Settlement,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Invoice, Account, Transaction)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        if invoice.kind() != settlement.expected_kind() {
            return Err(DomainError::validation(match settlement {
                Settlement::Collect => "collect applies to sale invoices",
                Settlement::Pay => "pay applies to purchase invoices",
            }));
        }

        let mut account = self
            .db
            .accounts()
            .get(tenant_id, &account_id)
            .ok_or(DomainError::NotFound)?;

        let outcome = invoice.register_settlement(amount)?;

        let transaction = match settlement {
            Settlement::Collect => {
                account.credit(amount)?;
                Transaction::income(
                    tenant_id,
                    TransactionId::new(EntityId::new()),
                    amount,
                    account_id,
                    now,
                )?
            }
            Settlement::Pay => {
                account.debit(amount)?;
                Transaction::expense(
                    tenant_id,
                    TransactionId::new(EntityId::new()),
                    amount,
                    account_id,
                    now,
                )?
            }
        }
        .with_related_invoice(invoice_id)
        .with_partner(invoice.partner())
        .with_description(description);

        let expected = ExpectedRevision::Exact(account.revision());
        let account = save_versioned(self.db.accounts(), tenant_id, account_id, account, expected)?;
        let expected = ExpectedRevision::Exact(invoice.revision());
        let invoice = save_versioned(self.db.invoices(), tenant_id, invoice_id, invoice, expected)?;
        self.db
            .transactions()
            .upsert(tenant_id, transaction.id_typed(), transaction.clone());

        tracing::info!(
            %tenant_id, %invoice_id, amount,
            became_paid = outcome.became_paid,
            "invoice settlement registered"
        );
        Ok((invoice, account, transaction))
    }

    /// Undo `Paid → Approved`. The settlement transactions and account
    /// balances are deliberately left untouched (see DESIGN.md).
    pub fn revert_invoice_to_approved(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> DomainResult<Invoice> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        invoice.mark_unpaid()?;

        let expected = ExpectedRevision::Exact(invoice.revision());
        let invoice = save_versioned(self.db.invoices(), tenant_id, invoice_id, invoice, expected)?;
        tracing::info!(%tenant_id, %invoice_id, "invoice reverted to approved");
        Ok(invoice)
    }

    /// Direct status override. No side effects, by design.
    pub fn override_invoice_status(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    ) -> DomainResult<Invoice> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        invoice.override_status(status);

        let expected = ExpectedRevision::Exact(invoice.revision());
        let invoice = save_versioned(self.db.invoices(), tenant_id, invoice_id, invoice, expected)?;
        tracing::info!(%tenant_id, %invoice_id, ?status, "invoice status overridden");
        Ok(invoice)
    }

    /// Delete an invoice. Admins may delete approved invoices; no stock or
    /// ledger reversal happens, so movements can be left orphaned.
    pub fn delete_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        is_admin: bool,
    ) -> DomainResult<()> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let invoice = self
            .db
            .invoices()
            .get(tenant_id, &invoice_id)
            .ok_or(DomainError::NotFound)?;
        invoice.ensure_deletable(is_admin)?;

        if invoice.status() == InvoiceStatus::Approved {
            tracing::warn!(
                %tenant_id, %invoice_id,
                "approved invoice deleted without reversal; stock movements left in place"
            );
        }
        self.db.invoices().remove(tenant_id, &invoice_id);
        Ok(())
    }

    /// Sweep for invoices due within the lookahead window and emit
    /// deduplicated due-date notifications. Returns the number of invoices
    /// found due plus the notifications actually created.
    pub fn due_soon_sweep(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> (usize, Vec<Notification>) {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let due: Vec<Invoice> = self
            .db
            .invoices()
            .list(tenant_id)
            .into_iter()
            .filter(|i| i.due_within(now, SWEEP_DUE_LOOKAHEAD_DAYS))
            .collect();

        let mut created = Vec::new();
        for invoice in &due {
            created.extend(notifier::due_date(&self.db, tenant_id, invoice, now));
        }

        tracing::info!(%tenant_id, due = due.len(), created = created.len(), "due-soon sweep");
        (due.len(), created)
    }

    // ── accounts & transactions ─────────────────────────────────────────

    pub fn create_account(
        &self,
        tenant_id: TenantId,
        input: AccountCreate,
    ) -> DomainResult<Account> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(partner) = &input.partner {
            let party = self
                .db
                .parties()
                .get(tenant_id, &partner.party_id())
                .ok_or(DomainError::NotFound)?;
            if party.kind() != partner.kind() {
                return Err(DomainError::validation(format!(
                    "partner {} is not a {:?}",
                    party.id_typed(),
                    partner.kind()
                )));
            }
        }

        let account = Account::create(tenant_id, AccountId::new(EntityId::new()), input)?;
        self.db
            .accounts()
            .upsert(tenant_id, account.id_typed(), account.clone());
        tracing::info!(%tenant_id, account_id = %account.id_typed(), "account created");
        Ok(account)
    }

    /// Atomic transfer: debit source, credit target, one transfer-typed
    /// transaction referencing both. Rejected (no mutation) on same-account
    /// or insufficient balance.
    pub fn transfer(
        &self,
        tenant_id: TenantId,
        source_id: AccountId,
        target_id: AccountId,
        amount: i64,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Account, Account, Transaction)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.transfer_locked(tenant_id, source_id, target_id, amount, description, None, now)
    }

    /// Transfer where at least one side is a partner ("cari") account:
    /// manual debt adjustment. The partner ends up on the transaction.
    pub fn cari_transfer(
        &self,
        tenant_id: TenantId,
        source_id: AccountId,
        target_id: AccountId,
        amount: i64,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Account, Account, Transaction)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let source = self
            .db
            .accounts()
            .get(tenant_id, &source_id)
            .ok_or(DomainError::NotFound)?;
        let target = self
            .db
            .accounts()
            .get(tenant_id, &target_id)
            .ok_or(DomainError::NotFound)?;
        let partner = source.partner().or(target.partner());
        if partner.is_none() {
            return Err(DomainError::validation(
                "cari transfer requires a partner account on either side",
            ));
        }

        self.transfer_locked(tenant_id, source_id, target_id, amount, description, partner, now)
    }

    fn transfer_locked(
        &self,
        tenant_id: TenantId,
        source_id: AccountId,
        target_id: AccountId,
        amount: i64,
        description: Option<String>,
        partner: Option<PartnerRef>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Account, Account, Transaction)> {
        if source_id == target_id {
            return Err(DomainError::validation(
                "source and target accounts must differ",
            ));
        }

        let mut source = self
            .db
            .accounts()
            .get(tenant_id, &source_id)
            .ok_or(DomainError::NotFound)?;
        let mut target = self
            .db
            .accounts()
            .get(tenant_id, &target_id)
            .ok_or(DomainError::NotFound)?;

        source.debit(amount)?;
        target.credit(amount)?;

        let mut transaction = Transaction::transfer(
            tenant_id,
            TransactionId::new(EntityId::new()),
            amount,
            source_id,
            target_id,
            now,
        )?
        .with_description(description);
        if let Some(partner) = partner {
            transaction = transaction.with_partner(partner);
        }

        let expected = ExpectedRevision::Exact(source.revision());
        let source = save_versioned(self.db.accounts(), tenant_id, source_id, source, expected)?;
        let expected = ExpectedRevision::Exact(target.revision());
        let target = save_versioned(self.db.accounts(), tenant_id, target_id, target, expected)?;
        self.db
            .transactions()
            .upsert(tenant_id, transaction.id_typed(), transaction.clone());

        tracing::info!(%tenant_id, %source_id, %target_id, amount, "transfer executed");
        Ok((source, target, transaction))
    }

    /// Direct ledger entry: income credits the account, expense debits it.
    pub fn record_transaction(
        &self,
        tenant_id: TenantId,
        kind: TransactionKind,
        account_id: AccountId,
        amount: i64,
        description: Option<String>,
        partner: Option<PartnerRef>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Account, Transaction)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut account = self
            .db
            .accounts()
            .get(tenant_id, &account_id)
            .ok_or(DomainError::NotFound)?;

        let transaction = match kind {
            TransactionKind::Income => {
                account.credit(amount)?;
                Transaction::income(
                    tenant_id,
                    TransactionId::new(EntityId::new()),
                    amount,
                    account_id,
                    now,
                )?
            }
            TransactionKind::Expense => {
                account.debit(amount)?;
                Transaction::expense(
                    tenant_id,
                    TransactionId::new(EntityId::new()),
                    amount,
                    account_id,
                    now,
                )?
            }
            TransactionKind::Transfer => {
                return Err(DomainError::validation(
                    "use the transfer operation for transfers",
                ));
            }
        }
        .with_description(description);
        let transaction = match partner {
            Some(p) => transaction.with_partner(p),
            None => transaction,
        };

        let expected = ExpectedRevision::Exact(account.revision());
        let account = save_versioned(self.db.accounts(), tenant_id, account_id, account, expected)?;
        self.db
            .transactions()
            .upsert(tenant_id, transaction.id_typed(), transaction.clone());

        tracing::info!(%tenant_id, %account_id, ?kind, amount, "transaction recorded");
        Ok((account, transaction))
    }

    // ── products ────────────────────────────────────────────────────────

    pub fn create_product(
        &self,
        tenant_id: TenantId,
        input: ProductCreate,
    ) -> DomainResult<Product> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let product = Product::create(tenant_id, ProductId::new(EntityId::new()), input)?;
        if self.db.sku_in_use(tenant_id, product.sku(), None) {
            return Err(DomainError::conflict(format!(
                "sku {} already in use",
                product.sku()
            )));
        }
        self.db
            .products()
            .upsert(tenant_id, product.id_typed(), product.clone());
        tracing::info!(%tenant_id, product_id = %product.id_typed(), "product created");
        Ok(product)
    }

    /// Edit a product. Never touches quantity and writes no movements.
    pub fn update_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> DomainResult<Product> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut product = self
            .db
            .products()
            .get(tenant_id, &product_id)
            .ok_or(DomainError::NotFound)?;
        let sku_changed = product.apply_patch(patch)?;
        if sku_changed && self.db.sku_in_use(tenant_id, product.sku(), Some(product_id)) {
            return Err(DomainError::conflict(format!(
                "sku {} already in use",
                product.sku()
            )));
        }

        let expected = ExpectedRevision::Exact(product.revision());
        save_versioned(self.db.products(), tenant_id, product_id, product, expected)
    }

    pub fn delete_product(&self, tenant_id: TenantId, product_id: ProductId) -> DomainResult<()> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.db
            .products()
            .remove(tenant_id, &product_id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    /// Stock-count import: overwrite counted quantities in one atomic batch.
    /// Writes no movements; raises critical-stock notifications.
    pub fn import_stock_count(
        &self,
        tenant_id: TenantId,
        counts: Vec<StockCount>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Vec<Product>, Vec<Notification>)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if counts.is_empty() {
            return Err(DomainError::validation("stock count must not be empty"));
        }

        // Validate the whole batch before writing any row.
        let mut staged: Vec<Product> = Vec::with_capacity(counts.len());
        for count in &counts {
            let mut product = self
                .db
                .products()
                .get(tenant_id, &count.product_id)
                .ok_or(DomainError::NotFound)?;
            product.set_counted_quantity(count.counted_quantity)?;
            staged.push(product);
        }

        let mut saved = Vec::with_capacity(staged.len());
        let mut notifications = Vec::new();
        for product in staged {
            let id = product.id_typed();
            let expected = ExpectedRevision::Exact(product.revision());
            let product = save_versioned(self.db.products(), tenant_id, id, product, expected)?;
            notifications.extend(notifier::critical_stock(&self.db, tenant_id, &product, now));
            saved.push(product);
        }

        tracing::info!(%tenant_id, rows = saved.len(), "stock count imported");
        Ok((saved, notifications))
    }

    // ── parties ─────────────────────────────────────────────────────────

    pub fn create_party(&self, tenant_id: TenantId, input: PartyCreate) -> DomainResult<Party> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let party = Party::create(tenant_id, PartyId::new(EntityId::new()), input)?;
        self.db
            .parties()
            .upsert(tenant_id, party.id_typed(), party.clone());
        tracing::info!(%tenant_id, party_id = %party.id_typed(), "party created");
        Ok(party)
    }

    pub fn update_party(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        patch: PartyPatch,
    ) -> DomainResult<Party> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut party = self
            .db
            .parties()
            .get(tenant_id, &party_id)
            .ok_or(DomainError::NotFound)?;
        party.apply_patch(patch)?;

        let expected = ExpectedRevision::Exact(party.revision());
        save_versioned(self.db.parties(), tenant_id, party_id, party, expected)
    }

    pub fn delete_party(&self, tenant_id: TenantId, party_id: PartyId) -> DomainResult<()> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.db
            .parties()
            .remove(tenant_id, &party_id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    /// Credit standing of a customer, computed from open sale invoices on
    /// demand. Crossing the limit emits a deduplicated notification.
    pub fn credit_status(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Party, CreditStatus, Vec<Notification>)> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let party = self
            .db
            .parties()
            .get(tenant_id, &party_id)
            .ok_or(DomainError::NotFound)?;
        if party.kind() != PartyKind::Customer {
            return Ok((party, CreditStatus::none(), Vec::new()));
        }

        let partner = PartnerRef::Customer(party_id);
        let outstanding: i64 = self
            .db
            .invoices()
            .list(tenant_id)
            .into_iter()
            .filter(|i| i.kind() == InvoiceKind::Sale && i.partner() == partner && i.is_open())
            .map(|i| i.outstanding_amount())
            .sum();

        let limit = party.credit_limit();
        let exceeded = limit.is_some_and(|l| outstanding > l);

        let mut notifications = Vec::new();
        if exceeded {
            if let Some(limit) = limit {
                notifications.extend(notifier::credit_limit(
                    &self.db, tenant_id, &party, outstanding, limit, now,
                ));
            }
        }

        Ok((
            party,
            CreditStatus {
                outstanding,
                limit,
                exceeded,
            },
            notifications,
        ))
    }

    // ── notifications ───────────────────────────────────────────────────

    pub fn mark_notification_read(
        &self,
        tenant_id: TenantId,
        notification_id: NotificationId,
    ) -> DomainResult<Notification> {
        let lock = self.guard(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut notification = self
            .db
            .notifications()
            .get(tenant_id, &notification_id)
            .ok_or(DomainError::NotFound)?;
        notification.mark_read();
        self.db
            .notifications()
            .upsert(tenant_id, notification_id, notification.clone());
        Ok(notification)
    }
}
