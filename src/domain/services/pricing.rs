//! Cart totals.

use tracing::warn;
use crate::domain::aggregates::{AppliedCoupon, CartLine, CartTotals, DEFAULT_CURRENCY};
use crate::domain::value_objects::Money;

/// `subTotal = Σ price × quantity`; `total = max(0, subTotal − subTotal × pct / 100)`;
/// `savings = subTotal − total`.
///
/// Lines without a usable price (missing, negative, foreign currency, or
/// overflowing) are logged and left out of the sum instead of failing the whole
/// calculation. The totals currency is taken from the first priced line.
pub fn calculate_totals(lines: &[CartLine], coupon: Option<&AppliedCoupon>) -> CartTotals {
    let currency = lines
        .iter()
        .find_map(|l| l.price.as_ref())
        .map_or(DEFAULT_CURRENCY, Money::currency)
        .to_string();

    let mut sub_total = Money::zero(&currency);
    for line in lines {
        let Some(price) = line.price.as_ref() else {
            warn!(key = %line.key(), "skipping cart line without a price");
            continue;
        };
        if price.is_negative() {
            warn!(key = %line.key(), price = %price, "skipping cart line with a negative price");
            continue;
        }
        match price.multiply(line.quantity).and_then(|t| sub_total.add(&t)) {
            Ok(sum) => sub_total = sum,
            Err(e) => warn!(key = %line.key(), error = %e, "skipping unpriceable cart line"),
        }
    }

    let total = match coupon {
        Some(c) => {
            let discount = sub_total.percentage(c.discount_percentage);
            sub_total.saturating_sub(&discount).unwrap_or_else(|_| sub_total.clone())
        }
        None => sub_total.clone(),
    };
    let savings = Money::new(sub_total.amount() - total.amount(), &currency);
    CartTotals { sub_total, total, savings }
}
