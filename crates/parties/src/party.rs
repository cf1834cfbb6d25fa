use serde::{Deserialize, Serialize};

use defter_core::{DomainError, DomainResult, Entity, EntityId, Revision, TenantId, Versioned};

/// Party identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub EntityId);

impl PartyId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

/// Reference to a trading partner, tagged by kind.
///
/// Replaces the runtime model-name lookup of loosely-typed stores: callers
/// pattern-match instead of inspecting a discriminator string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PartnerRef {
    Customer(PartyId),
    Supplier(PartyId),
}

impl PartnerRef {
    pub fn kind(&self) -> PartyKind {
        match self {
            PartnerRef::Customer(_) => PartyKind::Customer,
            PartnerRef::Supplier(_) => PartyKind::Supplier,
        }
    }

    pub fn party_id(&self) -> PartyId {
        match self {
            PartnerRef::Customer(id) | PartnerRef::Supplier(id) => *id,
        }
    }
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Party entity (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    id: PartyId,
    tenant_id: TenantId,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    /// Customers only: unpaid sales above this raise a credit-limit
    /// notification. Minor currency units.
    credit_limit: Option<i64>,
    revision: Revision,
}

/// Validated creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PartyCreate {
    pub kind: PartyKind,
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub credit_limit: Option<i64>,
}

/// Typed patch: field presence is explicit, never accumulated dynamically.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    #[serde(default)]
    pub credit_limit: Option<i64>,
}

impl Party {
    pub fn create(tenant_id: TenantId, id: PartyId, input: PartyCreate) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("party name must not be empty"));
        }
        if input.credit_limit.is_some() && input.kind != PartyKind::Customer {
            return Err(DomainError::validation(
                "credit_limit only applies to customers",
            ));
        }
        if let Some(limit) = input.credit_limit {
            if limit < 0 {
                return Err(DomainError::validation("credit_limit must not be negative"));
            }
        }

        Ok(Self {
            id,
            tenant_id,
            kind: input.kind,
            name: input.name.trim().to_string(),
            contact: input.contact,
            credit_limit: input.credit_limit,
            revision: Revision::initial(),
        })
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn credit_limit(&self) -> Option<i64> {
        self.credit_limit
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Typed reference to this party.
    pub fn partner_ref(&self) -> PartnerRef {
        match self.kind {
            PartyKind::Customer => PartnerRef::Customer(self.id),
            PartyKind::Supplier => PartnerRef::Supplier(self.id),
        }
    }

    pub fn apply_patch(&mut self, patch: PartyPatch) -> DomainResult<()> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("party name must not be empty"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(contact) = patch.contact {
            self.contact = contact;
        }
        if let Some(limit) = patch.credit_limit {
            if self.kind != PartyKind::Customer {
                return Err(DomainError::validation(
                    "credit_limit only applies to customers",
                ));
            }
            if limit < 0 {
                return Err(DomainError::validation("credit_limit must not be negative"));
            }
            self.credit_limit = Some(limit);
        }
        Ok(())
    }
}

impl Versioned for Party {
    fn revision(&self) -> Revision {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.next();
    }
}

impl Entity for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(kind: PartyKind, credit_limit: Option<i64>) -> DomainResult<Party> {
        Party::create(
            TenantId::new(),
            PartyId::new(EntityId::new()),
            PartyCreate {
                kind,
                name: "Acme".to_string(),
                contact: ContactInfo::default(),
                credit_limit,
            },
        )
    }

    #[test]
    fn supplier_cannot_carry_credit_limit() {
        let err = create(PartyKind::Supplier, Some(1000)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn partner_ref_matches_kind() {
        let customer = create(PartyKind::Customer, Some(1000)).unwrap();
        assert!(matches!(customer.partner_ref(), PartnerRef::Customer(id) if id == customer.id_typed()));

        let supplier = create(PartyKind::Supplier, None).unwrap();
        assert_eq!(supplier.partner_ref().kind(), PartyKind::Supplier);
    }

    #[test]
    fn patch_rejects_credit_limit_on_supplier() {
        let mut supplier = create(PartyKind::Supplier, None).unwrap();
        let err = supplier
            .apply_patch(PartyPatch {
                credit_limit: Some(500),
                ..PartyPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
