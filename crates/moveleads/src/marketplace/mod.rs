//! Removals lead marketplace.
//!
//! Homeowner requests come in through [`intake`], are routed to covering companies by
//! [`matching`], and are paid for through [`reveal`], which prices the lead with [`pricing`]
//! and charges the company's append-only [`ledger`]. Storage sits behind the traits in
//! [`repository`]; [`memory`] is the in-process backend used by the API service and tests.

pub mod assignments;
pub mod companies;
pub mod domain;
pub mod intake;
pub mod ledger;
pub mod matching;
pub mod memory;
pub mod notifications;
pub mod postcode;
pub mod pricing;
pub mod rate_limit;
pub mod region;
pub mod repository;
pub mod reveal;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use assignments::{AssignmentError, AssignmentService, AssignmentUpdate, AssignmentView};
pub use companies::{CompanyError, CompanyService};
pub use domain::{
    AssignmentId, AssignmentStatus, AuditFlag, AuditFlagKind, Company, CompanyId,
    CompanyProfile, CompanyStatus, ContactDetails, Lead, LeadAssignment, LeadId, LeadSubmission,
    LedgerEntry, LedgerReason, LedgerReference, PostcodeCoverage, PropertySize, RevealedContact,
    ServiceFlags,
};
pub use intake::{IntakeError, IntakeReceipt, LeadIntakeService};
pub use ledger::{CreditLedger, CreditOutcome, DebitReceipt, LedgerError, PaymentCompleted};
pub use matching::{LeadMatcher, MATCH_LIMIT};
pub use memory::InMemoryMarketplaceStore;
pub use notifications::{
    LowBalanceEvent, Notification, NotificationQueue, NotificationSink, Notifier, NotifyError,
    RecordingSink, TracingNotifier,
};
pub use pricing::{PriceQuote, PricingError, PricingRule, PricingService};
pub use rate_limit::{RateLimitPolicy, RateLimited, SubmissionRateLimiter};
pub use region::{estimate_distance_band, region_of, DistanceBand, Region};
pub use repository::{MarketplaceStore, RepositoryError};
pub use reveal::{RevealError, RevealOutcome, RevealRequest, RevealService};
pub use router::marketplace_router;
pub use service::Marketplace;
