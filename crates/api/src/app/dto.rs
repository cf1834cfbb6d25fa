use serde::Deserialize;
use serde_json::{Value, json};

use defter_accounting::{Account, AccountKind, Transaction, TransactionKind};
use defter_infra::CreditStatus;
use defter_inventory::StockMovement;
use defter_invoicing::{Invoice, InvoiceKind, InvoiceStatus};
use defter_notifications::Notification;
use defter_parties::{Party, PartyKind};
use defter_products::Product;

// -------------------------
// Request DTOs
// -------------------------
//
// Identifier and timestamp fields arrive as strings and are parsed in the
// handlers so malformed values come back as 400s, not body rejections.

#[derive(Debug, Deserialize)]
pub struct PartnerRefRequest {
    pub kind: PartyKind,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(default)]
    pub tax_rate_bp: u32,
    #[serde(default)]
    pub discount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub invoice_number: String,
    pub partner: PartnerRefRequest,
    pub kind: InvoiceKind,
    pub line_items: Vec<InvoiceLineRequest>,
    #[serde(default)]
    pub currency: Option<String>,
    /// RFC3339; defaults to the request time.
    #[serde(default)]
    pub date: Option<String>,
    /// RFC3339.
    pub due_date: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleInvoiceRequest {
    pub account_id: String,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub partner: Option<PartnerRefRequest>,
    #[serde(default)]
    pub opening_balance: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: String,
    pub target_account_id: String,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub kind: TransactionKind,
    pub account_id: String,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub partner: Option<PartnerRefRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StockCountRowRequest {
    pub product_id: String,
    pub counted_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct StockCountRequest {
    pub counts: Vec<StockCountRowRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StockMovementsQuery {
    pub product_id: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn invoice_to_json(invoice: &Invoice) -> Value {
    json!({
        "id": invoice.id_typed().to_string(),
        "invoice_number": invoice.invoice_number(),
        "partner": invoice.partner(),
        "kind": invoice.kind(),
        "status": invoice.status(),
        "line_items": invoice.line_items(),
        "total_amount": invoice.total_amount(),
        "paid_amount": invoice.paid_amount(),
        "currency": invoice.currency(),
        "date": invoice.date(),
        "due_date": invoice.due_date(),
    })
}

pub fn product_to_json(product: &Product) -> Value {
    json!({
        "id": product.id_typed().to_string(),
        "sku": product.sku().as_str(),
        "name": product.name(),
        "quantity": product.quantity(),
        "critical_stock_level": product.critical_stock_level(),
        "track_stock": product.track_stock(),
        "brand": product.brand(),
        "category": product.category(),
    })
}

pub fn party_to_json(party: &Party, credit: Option<&CreditStatus>) -> Value {
    let mut value = json!({
        "id": party.id_typed().to_string(),
        "kind": party.kind(),
        "name": party.name(),
        "contact": party.contact(),
        "credit_limit": party.credit_limit(),
    });
    if let (Some(credit), Some(obj)) = (credit, value.as_object_mut()) {
        obj.insert(
            "credit".to_string(),
            json!({
                "outstanding": credit.outstanding,
                "limit": credit.limit,
                "exceeded": credit.exceeded,
            }),
        );
    }
    value
}

pub fn account_to_json(account: &Account) -> Value {
    json!({
        "id": account.id_typed().to_string(),
        "name": account.name(),
        "kind": account.kind(),
        "partner": account.partner(),
        "balance": account.balance(),
        "currency": account.currency(),
    })
}

pub fn transaction_to_json(transaction: &Transaction) -> Value {
    json!({
        "id": transaction.id_typed().to_string(),
        "kind": transaction.kind(),
        "amount": transaction.amount(),
        "occurred_at": transaction.occurred_at(),
        "description": transaction.description(),
        "related_invoice": transaction.related_invoice().map(|i| i.to_string()),
        "partner": transaction.partner(),
        "source_account": transaction.source_account().map(|a| a.to_string()),
        "target_account": transaction.target_account().map(|a| a.to_string()),
    })
}

pub fn movement_to_json(movement: &StockMovement) -> Value {
    json!({
        "id": movement.id_typed().to_string(),
        "product_id": movement.product_id().to_string(),
        "invoice_id": movement.invoice_id().to_string(),
        "direction": movement.direction(),
        "quantity": movement.quantity(),
        "occurred_at": movement.occurred_at(),
    })
}

pub fn notification_to_json(notification: &Notification) -> Value {
    json!({
        "id": notification.id_typed().to_string(),
        "kind": notification.kind(),
        "message": notification.message(),
        "related_id": notification.related_id().to_string(),
        "read": notification.is_read(),
        "created_at": notification.created_at(),
    })
}
