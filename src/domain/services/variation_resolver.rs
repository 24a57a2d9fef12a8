//! Variation Resolver
//!
//! Maps a user's color/size choice onto the catalog record that carries the
//! authoritative price and stock. Pure lookup over already-fetched product data.

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{CartLine, ColorOption, Product, SizeOption, Variation};
use crate::domain::value_objects::CartKey;
use crate::error::CartError;

/// What the shopper picked on the product page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationSelection {
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
}

impl VariationSelection {
    pub fn new(color: impl Into<String>, size: impl Into<String>, quantity: u32) -> Self {
        Self { color: Some(color.into()), size: Some(size.into()), quantity }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResolvedVariation<'a> {
    pub product: &'a Product,
    pub variation: &'a Variation,
    pub color: &'a ColorOption,
    pub size: &'a SizeOption,
}

impl ResolvedVariation<'_> {
    pub fn key(&self) -> CartKey {
        CartKey::new(&self.product.id, &self.variation.id, &self.color.name, &self.size.size)
    }

    pub fn ensure_available(&self, quantity: u32) -> Result<(), CartError> {
        if quantity > self.size.quantity {
            return Err(CartError::InsufficientStock { available: self.size.quantity });
        }
        Ok(())
    }

    pub fn to_line(&self, quantity: u32) -> CartLine {
        CartLine {
            product_id: self.product.id.clone(),
            variation_id: self.variation.id.clone(),
            color: self.color.name.clone(),
            size: self.size.size.clone(),
            quantity,
            price: Some(self.size.price.clone()),
            name: Some(self.product.name.clone()),
        }
    }
}

/// Finds the `(variation, color, size)` triple for a color name and size value.
///
/// Colors are searched in variation order; when two colors share a name the
/// first one that carries the requested size wins.
pub fn resolve<'a>(product: &'a Product, color_name: &str, size_value: &str) -> Result<ResolvedVariation<'a>, CartError> {
    if color_name.is_empty() || size_value.is_empty() {
        return Err(CartError::InvalidSelection);
    }
    product
        .variations
        .iter()
        .flat_map(|variation| variation.colors.iter().map(move |color| (variation, color)))
        .filter(|(_, color)| color.name == color_name)
        .find_map(|(variation, color)| {
            color
                .sizes
                .iter()
                .find(|s| s.size == size_value)
                .map(|size| ResolvedVariation { product, variation, color, size })
        })
        .ok_or(CartError::VariationNotFound)
}

/// Validates a selection, resolves it and checks the requested quantity against stock.
pub fn resolve_selection<'a>(product: &'a Product, selection: &VariationSelection) -> Result<ResolvedVariation<'a>, CartError> {
    let color = selection.color.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let size = selection.size.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (Some(color), Some(size)) = (color, size) else {
        return Err(CartError::InvalidSelection);
    };
    if selection.quantity == 0 {
        return Err(CartError::InvalidSelection);
    }
    let resolved = resolve(product, color, size)?;
    resolved.ensure_available(selection.quantity)?;
    Ok(resolved)
}
