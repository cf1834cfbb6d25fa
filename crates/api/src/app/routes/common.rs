use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use defter_auth::{CommandAuthorization, Permission};
use defter_core::{Currency, EntityId};
use defter_parties::{PartnerRef, PartyId, PartyKind};

use crate::app::{dto, errors};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

pub fn parse_entity_id(raw: &str, what: &str) -> Result<EntityId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what}"),
        )
    })
}

pub fn parse_rfc3339(raw: &str, field: &str) -> Result<DateTime<Utc>, axum::response::Response> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_date",
                format!("{field} must be RFC3339"),
            )
        })
}

pub fn parse_currency(raw: Option<&str>) -> Result<Currency, axum::response::Response> {
    match raw {
        None => Ok(Currency::default()),
        Some(raw) => raw.parse().map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_currency",
                "currency must be a three-letter uppercase code",
            )
        }),
    }
}

/// Build a typed partner reference from the request's tagged form.
pub fn parse_partner(req: &dto::PartnerRefRequest) -> Result<PartnerRef, axum::response::Response> {
    let id = PartyId::new(parse_entity_id(&req.id, "partner id")?);
    Ok(match req.kind {
        PartyKind::Customer => PartnerRef::Customer(id),
        PartyKind::Supplier => PartnerRef::Supplier(id),
    })
}
