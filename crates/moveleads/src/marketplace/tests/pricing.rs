use super::common::*;
use std::sync::Arc;

use chrono::Duration;
use rust_decimal_macros::dec;

use crate::marketplace::domain::{LeadId, PricingRuleId, PropertySize};
use crate::marketplace::memory::InMemoryMarketplaceStore;
use crate::marketplace::pricing::{PricingError, PricingRule, PricingService, DEFAULT_RULE_ID};
use crate::marketplace::region::DistanceBand;

#[test]
fn stored_lead_is_priced_with_the_fallback_rule() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let mut submission = submission("SW1A 1AA", "M1 1AE", PropertySize::FivePlusBed);
    submission.move_date = Some(today() + Duration::days(3));
    let lead = stored_lead(store.as_ref(), submission);

    let quote = PricingService::new(store)
        .calculate_reveal_price(&lead.id, today())
        .expect("priced");

    assert_eq!(quote.price, dec!(12.00));
    assert_eq!(quote.distance_band, DistanceBand::Long);
    assert!(quote.short_notice);
    assert_eq!(quote.rule_id.0, DEFAULT_RULE_ID);
}

#[test]
fn activated_rule_replaces_the_fallback() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let service = PricingService::new(store);
    let mut rule = PricingRule::fallback();
    rule.id = PricingRuleId::from("summer-2025");
    rule.base_price = dec!(7.25);

    service.activate_rule(rule).expect("activated");
    let quote = service
        .quote("SW1A 1AA", "SE1 9SG", PropertySize::OneBed, None, today())
        .expect("quoted");

    assert_eq!(quote.price, dec!(8.75));
    assert_eq!(quote.distance_band, DistanceBand::Medium);
    assert_eq!(quote.rule_id, PricingRuleId::from("summer-2025"));
}

#[test]
fn unknown_lead_cannot_be_priced() {
    let store = Arc::new(InMemoryMarketplaceStore::new());

    let result =
        PricingService::new(store).calculate_reveal_price(&LeadId::from("lead-404"), today());

    assert!(matches!(result, Err(PricingError::LeadNotFound(_))));
}
