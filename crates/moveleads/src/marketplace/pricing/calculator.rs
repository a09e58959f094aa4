use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use super::rule::PricingRule;
use crate::marketplace::domain::PropertySize;
use crate::marketplace::region::DistanceBand;

/// Reveal price for a lead: base plus size, short-notice and distance adjustments,
/// rounded to pennies. Categories missing from the rule add nothing.
pub fn calculate_price(
    rule: &PricingRule,
    property_size: PropertySize,
    short_notice: bool,
    distance_band: DistanceBand,
) -> Decimal {
    let surcharge = if short_notice {
        rule.short_notice_surcharge
    } else {
        Decimal::ZERO
    };

    let price = rule.base_price
        + rule.size_modifier(property_size)
        + surcharge
        + rule.distance_modifier(distance_band);

    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A dated move is short notice when it is between today (inclusive) and
/// `threshold_days` away (exclusive). Flexible moves never are.
pub fn is_short_notice(move_date: Option<NaiveDate>, threshold_days: u32, today: NaiveDate) -> bool {
    let Some(move_date) = move_date else {
        return false;
    };

    let days_until_move = move_date.signed_duration_since(today).num_days();
    (0..i64::from(threshold_days)).contains(&days_until_move)
}
