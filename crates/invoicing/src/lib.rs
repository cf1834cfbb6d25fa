//! `defter-invoicing` — invoice lifecycle domain.
//!
//! Pure state machine: storage and cross-entity side effects (stock,
//! accounts, notifications) are orchestrated by `defter-infra`.

pub mod invoice;

pub use invoice::{
    Invoice, InvoiceCreate, InvoiceId, InvoiceKind, InvoiceStatus, LineItem, SettlementOutcome,
};
