//! `defter-parties` — trading partners (customers and suppliers).

pub mod party;

pub use party::{ContactInfo, PartnerRef, Party, PartyCreate, PartyId, PartyKind, PartyPatch};
