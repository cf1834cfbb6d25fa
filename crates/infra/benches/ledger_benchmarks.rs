//! Hot-path benchmarks for the ledger service: invoice approval/reversion
//! (stock staging + movements) and account transfers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use defter_accounting::{AccountCreate, AccountKind};
use defter_core::{Currency, TenantId};
use defter_infra::{Database, Ledger};
use defter_invoicing::{InvoiceCreate, InvoiceKind, LineItem};
use defter_parties::{ContactInfo, Party, PartyCreate, PartyKind};
use defter_products::{Product, ProductCreate};

struct Bench {
    ledger: Ledger,
    tenant_id: TenantId,
    customer: Party,
    products: Vec<Product>,
}

fn setup(product_count: usize) -> Bench {
    let ledger = Ledger::new(Arc::new(Database::new()));
    let tenant_id = TenantId::new();

    let customer = ledger
        .create_party(
            tenant_id,
            PartyCreate {
                kind: PartyKind::Customer,
                name: "Bench customer".to_string(),
                contact: ContactInfo::default(),
                credit_limit: None,
            },
        )
        .expect("create customer");

    let products = (0..product_count)
        .map(|i| {
            ledger
                .create_product(
                    tenant_id,
                    ProductCreate {
                        sku: format!("SKU-{i}"),
                        name: format!("Product {i}"),
                        quantity: i64::MAX / 4,
                        critical_stock_level: 0,
                        track_stock: true,
                        brand: None,
                        category: None,
                    },
                )
                .expect("create product")
        })
        .collect();

    Bench {
        ledger,
        tenant_id,
        customer,
        products,
    }
}

fn bench_approve_revert_cycle(c: &mut Criterion) {
    let bench = setup(10);
    let now = Utc::now();
    let mut counter = 0u64;

    c.bench_function("approve_revert_cycle_10_lines", |b| {
        b.iter(|| {
            counter += 1;
            let lines = bench
                .products
                .iter()
                .map(|p| LineItem {
                    product_id: p.id_typed(),
                    quantity: 2,
                    unit_price: 100,
                    tax_rate_bp: 18_00,
                    discount: 0,
                })
                .collect();
            let (invoice, _) = bench
                .ledger
                .create_invoice(
                    bench.tenant_id,
                    InvoiceCreate {
                        invoice_number: format!("BENCH-{counter}"),
                        partner: bench.customer.partner_ref(),
                        kind: InvoiceKind::Sale,
                        line_items: lines,
                        currency: Currency::TRY,
                        date: now,
                        due_date: now + Duration::days(30),
                    },
                    now,
                )
                .expect("create invoice");
            bench
                .ledger
                .approve_invoice(bench.tenant_id, invoice.id_typed(), now)
                .expect("approve");
            bench
                .ledger
                .revert_invoice(bench.tenant_id, invoice.id_typed(), now)
                .expect("revert");
            black_box(invoice.id_typed())
        })
    });
}

fn bench_transfer(c: &mut Criterion) {
    let bench = setup(0);
    let now = Utc::now();

    let source = bench
        .ledger
        .create_account(
            bench.tenant_id,
            AccountCreate {
                name: "Source".to_string(),
                kind: AccountKind::Bank,
                partner: None,
                opening_balance: i64::MAX / 2,
                currency: Currency::TRY,
            },
        )
        .expect("create source");
    let target = bench
        .ledger
        .create_account(
            bench.tenant_id,
            AccountCreate {
                name: "Target".to_string(),
                kind: AccountKind::Bank,
                partner: None,
                opening_balance: 0,
                currency: Currency::TRY,
            },
        )
        .expect("create target");

    c.bench_function("account_transfer", |b| {
        b.iter(|| {
            bench
                .ledger
                .transfer(
                    bench.tenant_id,
                    source.id_typed(),
                    target.id_typed(),
                    1,
                    None,
                    now,
                )
                .expect("transfer")
        })
    });
}

criterion_group!(benches, bench_approve_revert_cycle, bench_transfer);
criterion_main!(benches);
