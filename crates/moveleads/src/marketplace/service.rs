use std::sync::Arc;

use crate::config::MarketplaceConfig;

use super::assignments::AssignmentService;
use super::companies::CompanyService;
use super::intake::LeadIntakeService;
use super::ledger::CreditLedger;
use super::notifications::NotificationSink;
use super::pricing::PricingService;
use super::rate_limit::{RateLimitPolicy, SubmissionRateLimiter};
use super::repository::MarketplaceStore;
use super::reveal::RevealService;

/// All marketplace services wired to one store and one notification sink.
///
/// Built once per process and shared behind an `Arc` by the HTTP layer.
pub struct Marketplace<S, N> {
    pub store: Arc<S>,
    pub intake: LeadIntakeService<S, N>,
    pub reveal: RevealService<S, N>,
    pub ledger: CreditLedger<S>,
    pub pricing: PricingService<S>,
    pub assignments: AssignmentService<S>,
    pub companies: CompanyService<S>,
}

impl<S, N> Marketplace<S, N>
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: &MarketplaceConfig) -> Self {
        let limiter = Arc::new(SubmissionRateLimiter::new(RateLimitPolicy::from_config(
            config,
        )));
        Self::with_rate_limiter(store, notifications, limiter, config)
    }

    /// Same as [`Marketplace::new`] with a caller-owned rate limiter.
    pub fn with_rate_limiter(
        store: Arc<S>,
        notifications: Arc<N>,
        limiter: Arc<SubmissionRateLimiter>,
        config: &MarketplaceConfig,
    ) -> Self {
        Self {
            intake: LeadIntakeService::new(store.clone(), limiter, notifications.clone()),
            reveal: RevealService::new(
                store.clone(),
                notifications,
                config.low_credit_threshold,
            ),
            ledger: CreditLedger::new(store.clone(), config.low_credit_threshold),
            pricing: PricingService::new(store.clone()),
            assignments: AssignmentService::new(store.clone()),
            companies: CompanyService::new(store.clone()),
            store,
        }
    }
}
