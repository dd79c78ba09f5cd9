use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId};

/// A catalog product together with its projected stock level.
///
/// `stock` is never authoritative: it mirrors the clamped fold of the
/// product's ledger movements and can always be rebuilt from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Optional merchant SKU. Upstream data is messy: SKUs may be missing or
    /// duplicated, so nothing here enforces uniqueness.
    pub sku: Option<String>,
    /// Projected quantity on hand, maintained by the ledger commit path.
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a new active product with zero stock.
    ///
    /// The name is trimmed and must be non-empty; a blank SKU collapses to
    /// `None` so lookups never match on empty strings.
    pub fn new(name: impl Into<String>, sku: Option<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }
        let sku = sku
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            name,
            sku,
            stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Case-insensitive exact match against the product's name or SKU.
    ///
    /// This is the fallback used when an order line item carries no usable
    /// product id; callers decide what to do with zero or multiple matches.
    /// Lowercase folding matches what `LOWER()` does on the SQL side.
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return false;
        }
        if self.name.to_lowercase() == key {
            return true;
        }
        match &self.sku {
            Some(sku) => sku.to_lowercase() == key,
            None => false,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.touch();
    }

    /// Overwrite the projected stock level. Only the ledger commit and
    /// rebuild paths should call this.
    pub fn project_stock(&mut self, stock: i64) {
        self.stock = stock;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
