//! Product Aggregate
//!
//! A product owns an ordered list of variations; each variation lists colors and
//! each color lists purchasable sizes with their own price and stock.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CartKey, Money};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub variations: Vec<Variation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation { pub id: String, pub colors: Vec<ColorOption> }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOption { pub name: String, pub sizes: Vec<SizeOption> }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeOption { pub size: String, pub price: Money, pub quantity: u32 }

impl SizeOption {
    pub fn is_in_stock(&self) -> bool { self.quantity > 0 }
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, variations: Vec<Variation>) -> Self {
        Self { id: id.into(), name: name.into(), image: None, category: None, variations }
    }

    pub fn variation(&self, variation_id: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == variation_id)
    }

    /// Size record addressed by a cart key; the first color with a matching name wins.
    pub fn size_for(&self, key: &CartKey) -> Option<&SizeOption> {
        self.variation(&key.variation_id)?
            .colors
            .iter()
            .filter(|c| c.name == key.color)
            .find_map(|c| c.sizes.iter().find(|s| s.size == key.size))
    }

    /// Removes `qty` units from the addressed size.
    pub fn remove_stock(&mut self, key: &CartKey, qty: u32) -> Result<(), ProductError> {
        let size = self
            .variations
            .iter_mut()
            .filter(|v| v.id == key.variation_id)
            .flat_map(|v| v.colors.iter_mut())
            .filter(|c| c.name == key.color)
            .flat_map(|c| c.sizes.iter_mut())
            .find(|s| s.size == key.size)
            .ok_or(ProductError::UnknownSize)?;
        size.quantity = size.quantity.checked_sub(qty).ok_or(ProductError::InsufficientInventory { available: size.quantity })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("Unknown variation size")]
    UnknownSize,
    #[error("Insufficient inventory: {available} available")]
    InsufficientInventory { available: u32 },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal::Decimal;

    pub fn size(size: &str, amount: i64, quantity: u32) -> SizeOption {
        SizeOption { size: size.into(), price: Money::usd(Decimal::new(amount, 0)), quantity }
    }

    /// `p1` with variation `v1`: Red {S: 25 x5, M: 25 x2}, Blue {M: 10 x10}.
    pub fn tee() -> Product {
        Product::new("p1", "Tee", vec![Variation {
            id: "v1".into(),
            colors: vec![
                ColorOption { name: "Red".into(), sizes: vec![size("S", 25, 5), size("M", 25, 2)] },
                ColorOption { name: "Blue".into(), sizes: vec![size("M", 10, 10)] },
            ],
        }])
    }
}
