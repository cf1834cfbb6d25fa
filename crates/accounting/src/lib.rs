//! `defter-accounting` — money accounts and the transaction ledger.

pub mod account;
pub mod transaction;

pub use account::{Account, AccountCreate, AccountId, AccountKind};
pub use transaction::{Transaction, TransactionId, TransactionKind};
