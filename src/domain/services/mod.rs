//! Domain services: pure functions over aggregates.
pub mod pricing;
pub mod variation_resolver;

pub use pricing::calculate_totals;
pub use variation_resolver::{resolve, resolve_selection, ResolvedVariation, VariationSelection};
