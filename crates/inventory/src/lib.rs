//! `defter-inventory` — stock movement audit trail.

pub mod movement;

pub use movement::{MovementDirection, MovementId, StockMovement};
