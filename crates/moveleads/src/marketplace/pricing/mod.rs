//! Reveal pricing.
//!
//! [`calculator`] holds the pure arithmetic; [`PricingService`] is the thin impure shell that
//! loads the active rule and the lead before delegating to it.

mod calculator;
mod rule;

pub use calculator::{calculate_price, is_short_notice};
pub use rule::{PricingRule, DEFAULT_RULE_ID};

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::domain::{LeadId, PricingRuleId, PropertySize};
use super::region::{estimate_distance_band, DistanceBand};
use super::repository::{LeadRepository, PricingRuleRepository, RepositoryError};

/// Price together with the inputs that produced it, so callers can explain a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub distance_band: DistanceBand,
    pub short_notice: bool,
    pub rule_id: PricingRuleId,
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct PricingService<S> {
    store: Arc<S>,
}

impl<S> PricingService<S>
where
    S: LeadRepository + PricingRuleRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The active rule, or the built-in fallback when none is active.
    pub fn current_rule(&self) -> Result<PricingRule, PricingError> {
        Ok(self
            .store
            .active_rule()?
            .unwrap_or_else(PricingRule::fallback))
    }

    /// Price a stored lead as of `today`.
    pub fn calculate_reveal_price(
        &self,
        lead_id: &LeadId,
        today: NaiveDate,
    ) -> Result<PriceQuote, PricingError> {
        let rule = self.current_rule()?;
        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or_else(|| PricingError::LeadNotFound(lead_id.clone()))?;

        let quote = quote_with_rule(
            &rule,
            &lead.from_postcode,
            &lead.to_postcode,
            lead.property_size,
            lead.move_date,
            today,
        );
        debug!(
            lead_id = %lead_id,
            price = %quote.price,
            band = quote.distance_band.label(),
            short_notice = quote.short_notice,
            "priced lead"
        );
        Ok(quote)
    }

    /// Price an arbitrary move under the current rule without storing anything.
    pub fn quote(
        &self,
        from_postcode: &str,
        to_postcode: &str,
        property_size: PropertySize,
        move_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<PriceQuote, PricingError> {
        let rule = self.current_rule()?;
        Ok(quote_with_rule(
            &rule,
            from_postcode,
            to_postcode,
            property_size,
            move_date,
            today,
        ))
    }

    /// Store `rule` as the single active rule.
    pub fn activate_rule(&self, mut rule: PricingRule) -> Result<PricingRule, PricingError> {
        rule.active = true;
        Ok(self.store.save_rule(rule)?)
    }
}

pub fn quote_with_rule(
    rule: &PricingRule,
    from_postcode: &str,
    to_postcode: &str,
    property_size: PropertySize,
    move_date: Option<NaiveDate>,
    today: NaiveDate,
) -> PriceQuote {
    let short_notice = is_short_notice(move_date, rule.short_notice_days, today);
    let distance_band = estimate_distance_band(from_postcode, to_postcode);
    PriceQuote {
        price: calculate_price(rule, property_size, short_notice, distance_band),
        distance_band,
        short_notice,
        rule_id: rule.id.clone(),
    }
}
