use serde::{Deserialize, Serialize};

use defter_core::{
    Currency, DomainError, DomainResult, Entity, EntityId, Revision, TenantId, Versioned,
};
use defter_parties::PartnerRef;

/// Account identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub EntityId);

impl AccountId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Account kind. `Partner` accounts ("cari") track a trading partner's
/// running debt and may carry a negative balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Cash,
    Bank,
    CreditCard,
    Personnel,
    Partner,
}

/// Money account. Balance in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    tenant_id: TenantId,
    name: String,
    kind: AccountKind,
    /// Present iff `kind == Partner`.
    partner: Option<PartnerRef>,
    balance: i64,
    currency: Currency,
    revision: Revision,
}

/// Validated creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreate {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub partner: Option<PartnerRef>,
    #[serde(default)]
    pub opening_balance: i64,
    #[serde(default)]
    pub currency: Currency,
}

impl Account {
    pub fn create(tenant_id: TenantId, id: AccountId, input: AccountCreate) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        match (input.kind, &input.partner) {
            (AccountKind::Partner, None) => {
                return Err(DomainError::validation(
                    "partner accounts must reference a partner",
                ));
            }
            (AccountKind::Partner, Some(_)) => {}
            (_, Some(_)) => {
                return Err(DomainError::validation(
                    "only partner accounts may reference a partner",
                ));
            }
            (_, None) => {}
        }

        Ok(Self {
            id,
            tenant_id,
            name: input.name.trim().to_string(),
            kind: input.kind,
            partner: input.partner,
            balance: input.opening_balance,
            currency: input.currency,
            revision: Revision::initial(),
        })
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn partner(&self) -> Option<PartnerRef> {
        self.partner
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn is_partner_account(&self) -> bool {
        self.kind == AccountKind::Partner
    }

    pub fn ensure_can_debit(&self, amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        // Partner accounts track debt and may go negative.
        if !self.is_partner_account() && self.balance < amount {
            return Err(DomainError::invariant(format!(
                "insufficient balance on {} (have {}, need {})",
                self.name, self.balance, amount
            )));
        }
        Ok(())
    }

    pub fn debit(&mut self, amount: i64) -> DomainResult<()> {
        self.ensure_can_debit(amount)?;
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| DomainError::invariant("balance overflow"))?;
        Ok(())
    }

    pub fn credit(&mut self, amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("balance overflow"))?;
        Ok(())
    }
}

impl Versioned for Account {
    fn revision(&self) -> Revision {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.next();
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defter_parties::PartyId;

    fn cash_account(opening: i64) -> Account {
        Account::create(
            TenantId::new(),
            AccountId::new(EntityId::new()),
            AccountCreate {
                name: "Till".to_string(),
                kind: AccountKind::Cash,
                partner: None,
                opening_balance: opening,
                currency: Currency::TRY,
            },
        )
        .unwrap()
    }

    #[test]
    fn debit_requires_sufficient_balance() {
        let mut acc = cash_account(100);
        assert!(acc.ensure_can_debit(150).is_err());
        assert!(acc.debit(150).is_err());
        assert_eq!(acc.balance(), 100);

        acc.debit(60).unwrap();
        assert_eq!(acc.balance(), 40);
    }

    #[test]
    fn partner_accounts_may_go_negative() {
        let mut acc = Account::create(
            TenantId::new(),
            AccountId::new(EntityId::new()),
            AccountCreate {
                name: "Acme cari".to_string(),
                kind: AccountKind::Partner,
                partner: Some(PartnerRef::Customer(PartyId::new(EntityId::new()))),
                opening_balance: 0,
                currency: Currency::TRY,
            },
        )
        .unwrap();

        acc.debit(500).unwrap();
        assert_eq!(acc.balance(), -500);
    }

    #[test]
    fn partner_reference_must_match_kind() {
        let err = Account::create(
            TenantId::new(),
            AccountId::new(EntityId::new()),
            AccountCreate {
                name: "Till".to_string(),
                kind: AccountKind::Cash,
                partner: Some(PartnerRef::Customer(PartyId::new(EntityId::new()))),
                opening_balance: 0,
                currency: Currency::TRY,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = Account::create(
            TenantId::new(),
            AccountId::new(EntityId::new()),
            AccountCreate {
                name: "Acme cari".to_string(),
                kind: AccountKind::Partner,
                partner: None,
                opening_balance: 0,
                currency: Currency::TRY,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn credit_rejects_non_positive_amounts() {
        let mut acc = cash_account(0);
        assert!(acc.credit(0).is_err());
        assert!(acc.credit(-5).is_err());
    }
}
