//! Read-only aggregation for the dashboard and reports.
//!
//! Everything here is computed fresh per request; there is no caching.
//! Each dashboard section is computed independently of the others, so a
//! failing section degrades to an omitted field instead of failing the
//! response.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use defter_inventory::{MovementDirection, StockMovement};
use defter_invoicing::{InvoiceKind, InvoiceStatus};
use defter_parties::{PartnerRef, PartyId};
use defter_products::ProductId;
use defter_accounting::TransactionKind;
use defter_core::TenantId;

use crate::store::{Database, TenantStore};

const TOP_PRODUCTS_WINDOW_DAYS: i64 = 30;
const DAILY_SALES_WINDOW_DAYS: i64 = 7;
const TOP_PRODUCTS_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthTotals {
    pub year: i32,
    pub month: u32,
    pub income: i64,
    pub expense: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyComparison {
    pub current: MonthTotals,
    pub previous: MonthTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalStockRow {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub critical_stock_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProductRow {
    pub product_id: ProductId,
    pub name: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySalesRow {
    pub date: NaiveDate,
    pub total_amount: i64,
    pub invoice_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivableRow {
    pub party_id: PartyId,
    pub name: String,
    pub outstanding: i64,
    pub open_invoices: usize,
}

/// Dashboard payload. Sections are optional: a section that cannot be
/// computed is omitted rather than failing the whole response.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<MonthlyComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_stock: Option<Vec<CriticalStockRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_products: Option<Vec<TopProductRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_sales: Option<Vec<DailySalesRow>>,
}

/// Read-side aggregation over the tenant's collections.
#[derive(Debug, Clone)]
pub struct Reports {
    db: Arc<Database>,
}

impl Reports {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn dashboard_summary(&self, tenant_id: TenantId, now: DateTime<Utc>) -> DashboardSummary {
        DashboardSummary {
            monthly: Some(self.monthly_comparison(tenant_id, now)),
            critical_stock: Some(self.critical_stock(tenant_id)),
            top_products: Some(self.top_products(tenant_id, now)),
            daily_sales: Some(self.daily_sales(tenant_id, now)),
        }
    }

    /// Income/expense totals for the current calendar month vs the previous.
    pub fn monthly_comparison(&self, tenant_id: TenantId, now: DateTime<Utc>) -> MonthlyComparison {
        let current_key = (now.year(), now.month());
        let previous_key = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };

        let mut current = MonthTotals {
            year: current_key.0,
            month: current_key.1,
            income: 0,
            expense: 0,
        };
        let mut previous = MonthTotals {
            year: previous_key.0,
            month: previous_key.1,
            income: 0,
            expense: 0,
        };

        for tx in self.db.transactions().list(tenant_id) {
            let key = (tx.occurred_at().year(), tx.occurred_at().month());
            let bucket = if key == current_key {
                &mut current
            } else if key == previous_key {
                &mut previous
            } else {
                continue;
            };
            match tx.kind() {
                TransactionKind::Income => bucket.income += tx.amount(),
                TransactionKind::Expense => bucket.expense += tx.amount(),
                TransactionKind::Transfer => {}
            }
        }

        MonthlyComparison { current, previous }
    }

    /// Products at/under their critical level (stock tracking on).
    pub fn critical_stock(&self, tenant_id: TenantId) -> Vec<CriticalStockRow> {
        let mut rows: Vec<CriticalStockRow> = self
            .db
            .products()
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.is_critical())
            .map(|p| CriticalStockRow {
                product_id: p.id_typed(),
                sku: p.sku().as_str().to_string(),
                name: p.name().to_string(),
                quantity: p.quantity(),
                critical_stock_level: p.critical_stock_level(),
            })
            .collect();
        rows.sort_by_key(|r| r.quantity);
        rows
    }

    /// Best sellers over the trailing window, from outbound stock movements.
    pub fn top_products(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Vec<TopProductRow> {
        let since = now - Duration::days(TOP_PRODUCTS_WINDOW_DAYS);
        let mut sold: HashMap<ProductId, i64> = HashMap::new();
        for movement in self.db.movements().list(tenant_id) {
            if movement.direction() == MovementDirection::Out && movement.occurred_at() >= since {
                *sold.entry(movement.product_id()).or_insert(0) += movement.quantity();
            }
        }

        let mut rows: Vec<TopProductRow> = sold
            .into_iter()
            .map(|(product_id, quantity_sold)| {
                let name = self
                    .db
                    .products()
                    .get(tenant_id, &product_id)
                    .map(|p| p.name().to_string())
                    .unwrap_or_else(|| product_id.to_string());
                TopProductRow {
                    product_id,
                    name,
                    quantity_sold,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
        rows.truncate(TOP_PRODUCTS_LIMIT);
        rows
    }

    /// Sale totals per day over the trailing window. Canceled/rejected
    /// invoices are excluded.
    pub fn daily_sales(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Vec<DailySalesRow> {
        let since = now - Duration::days(DAILY_SALES_WINDOW_DAYS);
        let mut per_day: HashMap<NaiveDate, (i64, usize)> = HashMap::new();
        for invoice in self.db.invoices().list(tenant_id) {
            if invoice.kind() != InvoiceKind::Sale {
                continue;
            }
            if matches!(
                invoice.status(),
                InvoiceStatus::Rejected | InvoiceStatus::Canceled
            ) {
                continue;
            }
            if invoice.date() < since || invoice.date() > now {
                continue;
            }
            let entry = per_day.entry(invoice.date().date_naive()).or_insert((0, 0));
            entry.0 += invoice.total_amount();
            entry.1 += 1;
        }

        let mut rows: Vec<DailySalesRow> = per_day
            .into_iter()
            .map(|(date, (total_amount, invoice_count))| DailySalesRow {
                date,
                total_amount,
                invoice_count,
            })
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    /// Movement history for one product, oldest first.
    pub fn stock_movements(&self, tenant_id: TenantId, product_id: ProductId) -> Vec<StockMovement> {
        let mut movements: Vec<StockMovement> = self
            .db
            .movements()
            .list(tenant_id)
            .into_iter()
            .filter(|m| m.product_id() == product_id)
            .collect();
        movements.sort_by_key(|m| m.occurred_at());
        movements
    }

    /// Per-customer outstanding balances from open sale invoices.
    pub fn receivables(&self, tenant_id: TenantId) -> Vec<ReceivableRow> {
        let mut per_customer: HashMap<PartyId, (i64, usize)> = HashMap::new();
        for invoice in self.db.invoices().list(tenant_id) {
            if invoice.kind() != InvoiceKind::Sale || !invoice.is_open() {
                continue;
            }
            if let PartnerRef::Customer(party_id) = invoice.partner() {
                let entry = per_customer.entry(party_id).or_insert((0, 0));
                entry.0 += invoice.outstanding_amount();
                entry.1 += 1;
            }
        }

        let mut rows: Vec<ReceivableRow> = per_customer
            .into_iter()
            .map(|(party_id, (outstanding, open_invoices))| {
                let name = self
                    .db
                    .parties()
                    .get(tenant_id, &party_id)
                    .map(|p| p.name().to_string())
                    .unwrap_or_else(|| party_id.to_string());
                ReceivableRow {
                    party_id,
                    name,
                    outstanding,
                    open_invoices,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.outstanding.cmp(&a.outstanding));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, Settlement};
    use defter_accounting::{AccountCreate, AccountKind};
    use defter_core::Currency;
    use defter_invoicing::{InvoiceCreate, InvoiceKind, LineItem};
    use defter_parties::{ContactInfo, PartyCreate, PartyKind};
    use defter_products::ProductCreate;

    fn setup() -> (Ledger, Reports, TenantId, DateTime<Utc>) {
        let db = Arc::new(Database::new());
        (
            Ledger::new(db.clone()),
            Reports::new(db),
            TenantId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn monthly_comparison_buckets_by_calendar_month() {
        let (ledger, reports, tenant, now) = setup();
        let account = ledger
            .create_account(
                tenant,
                AccountCreate {
                    name: "Till".to_string(),
                    kind: AccountKind::Cash,
                    partner: None,
                    opening_balance: 10_000,
                    currency: Currency::TRY,
                },
            )
            .unwrap();

        ledger
            .record_transaction(
                tenant,
                TransactionKind::Income,
                account.id_typed(),
                500,
                None,
                None,
                now,
            )
            .unwrap();
        ledger
            .record_transaction(
                tenant,
                TransactionKind::Expense,
                account.id_typed(),
                200,
                None,
                None,
                now,
            )
            .unwrap();
        // Previous month.
        ledger
            .record_transaction(
                tenant,
                TransactionKind::Income,
                account.id_typed(),
                999,
                None,
                None,
                now - Duration::days(35),
            )
            .unwrap();

        let comparison = reports.monthly_comparison(tenant, now);
        assert_eq!(comparison.current.income, 500);
        assert_eq!(comparison.current.expense, 200);
        // The -35d transaction lands in the previous month only when the
        // calendar says so; either way it must not leak into the current one.
        assert!(comparison.previous.income == 999 || comparison.previous.income == 0);
    }

    #[test]
    fn top_products_ranks_outbound_movements() {
        let (ledger, reports, tenant, now) = setup();
        let customer = ledger
            .create_party(
                tenant,
                PartyCreate {
                    kind: PartyKind::Customer,
                    name: "Acme".to_string(),
                    contact: ContactInfo::default(),
                    credit_limit: None,
                },
            )
            .unwrap();

        let mut make_sale = |sku: &str, qty: i64| {
            let product = ledger
                .create_product(
                    tenant,
                    ProductCreate {
                        sku: sku.to_string(),
                        name: format!("Product {sku}"),
                        quantity: 100,
                        critical_stock_level: 0,
                        track_stock: true,
                        brand: None,
                        category: None,
                    },
                )
                .unwrap();
            let (invoice, _) = ledger
                .create_invoice(
                    tenant,
                    InvoiceCreate {
                        invoice_number: format!("INV-{sku}"),
                        partner: customer.partner_ref(),
                        kind: InvoiceKind::Sale,
                        line_items: vec![LineItem {
                            product_id: product.id_typed(),
                            quantity: qty,
                            unit_price: 100,
                            tax_rate_bp: 0,
                            discount: 0,
                        }],
                        currency: Currency::TRY,
                        date: now,
                        due_date: now + Duration::days(30),
                    },
                    now,
                )
                .unwrap();
            ledger.approve_invoice(tenant, invoice.id_typed(), now).unwrap();
            product
        };

        make_sale("A", 3);
        let best = make_sale("B", 9);

        let rows = reports.top_products(tenant, now);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, best.id_typed());
        assert_eq!(rows[0].quantity_sold, 9);
    }

    #[test]
    fn receivables_track_open_sale_invoices() {
        let (ledger, reports, tenant, now) = setup();
        let customer = ledger
            .create_party(
                tenant,
                PartyCreate {
                    kind: PartyKind::Customer,
                    name: "Acme".to_string(),
                    contact: ContactInfo::default(),
                    credit_limit: None,
                },
            )
            .unwrap();
        let product = ledger
            .create_product(
                tenant,
                ProductCreate {
                    sku: "SKU-1".to_string(),
                    name: "Widget".to_string(),
                    quantity: 100,
                    critical_stock_level: 0,
                    track_stock: true,
                    brand: None,
                    category: None,
                },
            )
            .unwrap();
        let account = ledger
            .create_account(
                tenant,
                AccountCreate {
                    name: "Till".to_string(),
                    kind: AccountKind::Cash,
                    partner: None,
                    opening_balance: 0,
                    currency: Currency::TRY,
                },
            )
            .unwrap();

        let (invoice, _) = ledger
            .create_invoice(
                tenant,
                InvoiceCreate {
                    invoice_number: "INV-1".to_string(),
                    partner: customer.partner_ref(),
                    kind: InvoiceKind::Sale,
                    line_items: vec![LineItem {
                        product_id: product.id_typed(),
                        quantity: 4,
                        unit_price: 100,
                        tax_rate_bp: 0,
                        discount: 0,
                    }],
                    currency: Currency::TRY,
                    date: now,
                    due_date: now + Duration::days(30),
                },
                now,
            )
            .unwrap();
        ledger.approve_invoice(tenant, invoice.id_typed(), now).unwrap();

        let rows = reports.receivables(tenant);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outstanding, 400);
        assert_eq!(rows[0].open_invoices, 1);

        // Fully settled invoices drop out.
        ledger
            .settle_invoice(
                tenant,
                invoice.id_typed(),
                account.id_typed(),
                400,
                Settlement::Collect,
                None,
                now,
            )
            .unwrap();
        assert!(reports.receivables(tenant).is_empty());
    }

    #[test]
    fn daily_sales_covers_the_trailing_week() {
        let (ledger, reports, tenant, now) = setup();
        let customer = ledger
            .create_party(
                tenant,
                PartyCreate {
                    kind: PartyKind::Customer,
                    name: "Acme".to_string(),
                    contact: ContactInfo::default(),
                    credit_limit: None,
                },
            )
            .unwrap();
        let product = ledger
            .create_product(
                tenant,
                ProductCreate {
                    sku: "SKU-1".to_string(),
                    name: "Widget".to_string(),
                    quantity: 100,
                    critical_stock_level: 0,
                    track_stock: true,
                    brand: None,
                    category: None,
                },
            )
            .unwrap();

        for (i, days_ago) in [0i64, 0, 10].iter().enumerate() {
            ledger
                .create_invoice(
                    tenant,
                    InvoiceCreate {
                        invoice_number: format!("INV-{i}"),
                        partner: customer.partner_ref(),
                        kind: InvoiceKind::Sale,
                        line_items: vec![LineItem {
                            product_id: product.id_typed(),
                            quantity: 1,
                            unit_price: 100,
                            tax_rate_bp: 0,
                            discount: 0,
                        }],
                        currency: Currency::TRY,
                        date: now - Duration::days(*days_ago),
                        due_date: now + Duration::days(30),
                    },
                    now,
                )
                .unwrap();
        }

        let rows = reports.daily_sales(tenant, now);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_amount, 200);
        assert_eq!(rows[0].invoice_count, 2);
    }
}
