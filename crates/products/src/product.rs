use serde::{Deserialize, Serialize};

use defter_core::{DomainError, DomainResult, Entity, EntityId, Revision, TenantId, Versioned};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub EntityId);

impl ProductId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stock-keeping unit. Unique per tenant (enforced by the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("sku must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product entity.
///
/// `quantity` is mutated exclusively through invoice approval/reversion and
/// stock-count import; the generic edit path never touches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    tenant_id: TenantId,
    sku: Sku,
    name: String,
    quantity: i64,
    critical_stock_level: i64,
    track_stock: bool,
    brand: Option<String>,
    category: Option<String>,
    revision: Revision,
}

/// Validated creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCreate {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub critical_stock_level: i64,
    #[serde(default = "default_track_stock")]
    pub track_stock: bool,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_track_stock() -> bool {
    true
}

/// Typed patch: field presence is explicit, never accumulated dynamically.
///
/// Deliberately has no `quantity` field: editing a product does not move
/// stock and writes no movement records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub critical_stock_level: Option<i64>,
    #[serde(default)]
    pub track_stock: Option<bool>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Product {
    pub fn create(tenant_id: TenantId, id: ProductId, input: ProductCreate) -> DomainResult<Self> {
        let sku = Sku::parse(input.sku)?;
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }
        if input.quantity < 0 {
            return Err(DomainError::validation("quantity must not be negative"));
        }
        if input.critical_stock_level < 0 {
            return Err(DomainError::validation(
                "critical_stock_level must not be negative",
            ));
        }

        Ok(Self {
            id,
            tenant_id,
            sku,
            name: input.name.trim().to_string(),
            quantity: input.quantity,
            critical_stock_level: input.critical_stock_level,
            track_stock: input.track_stock,
            brand: input.brand,
            category: input.category,
            revision: Revision::initial(),
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn critical_stock_level(&self) -> i64 {
        self.critical_stock_level
    }

    pub fn track_stock(&self) -> bool {
        self.track_stock
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// At/under the critical level while stock tracking is on.
    pub fn is_critical(&self) -> bool {
        self.track_stock && self.quantity <= self.critical_stock_level
    }

    /// Apply a validated patch. Returns whether the SKU changed (the caller
    /// must then re-check per-tenant uniqueness).
    pub fn apply_patch(&mut self, patch: ProductPatch) -> DomainResult<bool> {
        let mut sku_changed = false;
        if let Some(raw) = patch.sku {
            let sku = Sku::parse(raw)?;
            if sku != self.sku {
                self.sku = sku;
                sku_changed = true;
            }
        }
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("product name must not be empty"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(level) = patch.critical_stock_level {
            if level < 0 {
                return Err(DomainError::validation(
                    "critical_stock_level must not be negative",
                ));
            }
            self.critical_stock_level = level;
        }
        if let Some(track) = patch.track_stock {
            self.track_stock = track;
        }
        if patch.brand.is_some() {
            self.brand = patch.brand;
        }
        if patch.category.is_some() {
            self.category = patch.category;
        }
        Ok(sku_changed)
    }

    /// Apply a signed stock delta. Stock never goes below zero.
    pub fn apply_stock_delta(&mut self, delta: i64) -> DomainResult<()> {
        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
        if next < 0 {
            return Err(DomainError::invariant(format!(
                "insufficient stock for {} (have {}, need {})",
                self.sku, self.quantity, -delta
            )));
        }
        self.quantity = next;
        Ok(())
    }

    /// Overwrite the quantity from a stock-count import.
    pub fn set_counted_quantity(&mut self, counted: i64) -> DomainResult<()> {
        if counted < 0 {
            return Err(DomainError::validation(
                "counted quantity must not be negative",
            ));
        }
        self.quantity = counted;
        Ok(())
    }
}

impl Versioned for Product {
    fn revision(&self) -> Revision {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.next();
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defter_core::EntityId;

    fn test_product(quantity: i64, critical: i64) -> Product {
        Product::create(
            TenantId::new(),
            ProductId::new(EntityId::new()),
            ProductCreate {
                sku: "SKU-001".to_string(),
                name: "Widget".to_string(),
                quantity,
                critical_stock_level: critical,
                track_stock: true,
                brand: None,
                category: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_rejects_blank_sku() {
        let err = Product::create(
            TenantId::new(),
            ProductId::new(EntityId::new()),
            ProductCreate {
                sku: "   ".to_string(),
                name: "Widget".to_string(),
                quantity: 0,
                critical_stock_level: 0,
                track_stock: true,
                brand: None,
                category: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn stock_delta_cannot_go_negative() {
        let mut p = test_product(5, 0);
        let err = p.apply_stock_delta(-6).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(p.quantity(), 5);
    }

    #[test]
    fn critical_flag_respects_track_stock() {
        let mut p = test_product(3, 5);
        assert!(p.is_critical());

        p.apply_patch(ProductPatch {
            track_stock: Some(false),
            ..ProductPatch::default()
        })
        .unwrap();
        assert!(!p.is_critical());
    }

    #[test]
    fn patch_reports_sku_change() {
        let mut p = test_product(0, 0);
        let changed = p
            .apply_patch(ProductPatch {
                sku: Some("SKU-002".to_string()),
                ..ProductPatch::default()
            })
            .unwrap();
        assert!(changed);
        assert_eq!(p.sku().as_str(), "SKU-002");

        let unchanged = p
            .apply_patch(ProductPatch {
                sku: Some("SKU-002".to_string()),
                ..ProductPatch::default()
            })
            .unwrap();
        assert!(!unchanged);
    }
}
