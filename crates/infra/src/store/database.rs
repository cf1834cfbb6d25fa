use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use defter_accounting::{Account, AccountId, Transaction, TransactionId};
use defter_core::{DomainResult, ExpectedRevision, TenantId, Versioned};
use defter_inventory::{MovementId, StockMovement};
use defter_invoicing::{Invoice, InvoiceId};
use defter_notifications::{Notification, NotificationId};
use defter_parties::{Party, PartyId};
use defter_products::{Product, ProductId, Sku};

use super::tenant_store::{InMemoryTenantStore, TenantStore};

/// The tenant-scoped document store: one typed collection per entity.
///
/// Reads go straight to the collections. Multi-entity mutations go through
/// [`crate::ledger::Ledger`], which serializes writers per tenant via
/// [`Database::tenant_lock`].
#[derive(Debug, Default)]
pub struct Database {
    products: InMemoryTenantStore<ProductId, Product>,
    parties: InMemoryTenantStore<PartyId, Party>,
    invoices: InMemoryTenantStore<InvoiceId, Invoice>,
    accounts: InMemoryTenantStore<AccountId, Account>,
    transactions: InMemoryTenantStore<TransactionId, Transaction>,
    movements: InMemoryTenantStore<MovementId, StockMovement>,
    notifications: InMemoryTenantStore<NotificationId, Notification>,
    tenant_locks: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> &InMemoryTenantStore<ProductId, Product> {
        &self.products
    }

    pub fn parties(&self) -> &InMemoryTenantStore<PartyId, Party> {
        &self.parties
    }

    pub fn invoices(&self) -> &InMemoryTenantStore<InvoiceId, Invoice> {
        &self.invoices
    }

    pub fn accounts(&self) -> &InMemoryTenantStore<AccountId, Account> {
        &self.accounts
    }

    pub fn transactions(&self) -> &InMemoryTenantStore<TransactionId, Transaction> {
        &self.transactions
    }

    pub fn movements(&self) -> &InMemoryTenantStore<MovementId, StockMovement> {
        &self.movements
    }

    pub fn notifications(&self) -> &InMemoryTenantStore<NotificationId, Notification> {
        &self.notifications
    }

    /// Per-tenant write serialization handle.
    ///
    /// Holding the lock makes a multi-entity mutation atomic with respect to
    /// every other mutation in the same tenant; reads stay lock-free.
    pub fn tenant_lock(&self, tenant_id: TenantId) -> Arc<Mutex<()>> {
        let mut locks = self
            .tenant_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks.entry(tenant_id).or_default().clone()
    }

    /// SKU lookup (uniqueness checks, stock-count import by SKU).
    pub fn find_product_by_sku(&self, tenant_id: TenantId, sku: &Sku) -> Option<Product> {
        self.products
            .list(tenant_id)
            .into_iter()
            .find(|p| p.sku() == sku)
    }

    pub fn sku_in_use(&self, tenant_id: TenantId, sku: &Sku, excluding: Option<ProductId>) -> bool {
        self.products
            .list(tenant_id)
            .into_iter()
            .any(|p| p.sku() == sku && Some(p.id_typed()) != excluding)
    }

    pub fn invoice_number_in_use(&self, tenant_id: TenantId, number: &str) -> bool {
        self.invoices
            .list(tenant_id)
            .into_iter()
            .any(|i| i.invoice_number() == number)
    }
}

/// Revision-checked save: verifies the stored revision still matches the
/// loaded one, bumps it, and writes. Behind the tenant lock this can only
/// fail if a caller bypassed the lock.
pub fn save_versioned<K, V>(
    store: &InMemoryTenantStore<K, V>,
    tenant_id: TenantId,
    key: K,
    mut value: V,
    expected: ExpectedRevision,
) -> DomainResult<V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Versioned + Clone + Send + Sync + 'static,
{
    if let Some(current) = store.get(tenant_id, &key) {
        expected.check(current.revision())?;
    }
    value.bump_revision();
    store.upsert(tenant_id, key, value.clone());
    Ok(value)
}
