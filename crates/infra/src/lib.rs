//! `defter-infra` — storage and cross-entity orchestration.
//!
//! The domain crates stay pure; everything that touches more than one entity
//! (invoice approval, settlements, transfers, notification emission, report
//! aggregation) runs here, atomically per tenant.

pub mod ledger;
pub mod notifier;
pub mod reports;
pub mod store;

pub use ledger::{CreditStatus, Ledger, Settlement, StockCount};
pub use reports::{DashboardSummary, Reports};
pub use store::{Database, InMemoryTenantStore, TenantStore, save_versioned};
