//! Storage abstractions so the services can be exercised against any backend.
//!
//! Every trait is synchronous and object safe. Handlers run one request per task, and
//! consistency across concurrent requests is the backend's job: see
//! [`LedgerRepository::append_entry`] for the one write that must be conditional.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::domain::{
    AssignmentId, AuditFlag, Company, CompanyId, CompanyProfile, ContactDetails, Lead,
    LeadAssignment, LeadId, LedgerEntry, LedgerEntryId, LedgerReference, NewAssignment,
    NewAuditFlag, NewLead, NewLedgerEntry, PostcodeCoverage,
};
use super::pricing::PricingRule;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// Another writer appended to the company's ledger since it was read.
    #[error("ledger head moved for company {0}")]
    StaleLedgerHead(CompanyId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait LeadRepository: Send + Sync {
    /// Persist a lead together with its contact record.
    fn insert_lead(&self, lead: NewLead, contact: ContactDetails) -> Result<Lead, RepositoryError>;
    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn fetch_contact(&self, id: &LeadId) -> Result<Option<ContactDetails>, RepositoryError>;
}

pub trait CompanyRepository: Send + Sync {
    fn insert_company(
        &self,
        profile: CompanyProfile,
        created_at: DateTime<Utc>,
    ) -> Result<Company, RepositoryError>;
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    /// Companies for the given ids, in the order requested. Unknown ids are skipped.
    fn companies_by_ids(&self, ids: &[CompanyId]) -> Result<Vec<Company>, RepositoryError>;
    fn update_company(&self, company: Company) -> Result<(), RepositoryError>;
}

pub trait CoverageRepository: Send + Sync {
    /// Enabled coverage rows whose prefix equals one of `prefixes`, in storage order.
    fn coverage_matching(&self, prefixes: &[&str])
        -> Result<Vec<PostcodeCoverage>, RepositoryError>;
    fn replace_coverage(
        &self,
        company_id: &CompanyId,
        prefixes: Vec<String>,
    ) -> Result<Vec<PostcodeCoverage>, RepositoryError>;
}

pub trait AssignmentRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the (lead, company) pair already exists.
    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<LeadAssignment, RepositoryError>;
    /// Lookup scoped by owner: another company's assignment is reported as absent.
    fn fetch_assignment_for_company(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
    ) -> Result<Option<LeadAssignment>, RepositoryError>;
    /// Stamp the reveal. Fails with [`RepositoryError::Conflict`] when already revealed.
    fn mark_revealed(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
        price: Decimal,
        revealed_at: DateTime<Utc>,
    ) -> Result<LeadAssignment, RepositoryError>;
    fn update_assignment(&self, assignment: LeadAssignment) -> Result<(), RepositoryError>;
    fn assignments_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LeadAssignment>, RepositoryError>;
    fn assignments_for_lead(&self, lead_id: &LeadId)
        -> Result<Vec<LeadAssignment>, RepositoryError>;
}

pub trait PricingRuleRepository: Send + Sync {
    fn active_rule(&self) -> Result<Option<PricingRule>, RepositoryError>;
    /// Insert or replace a rule. Saving an active rule deactivates every other rule.
    fn save_rule(&self, rule: PricingRule) -> Result<PricingRule, RepositoryError>;
}

/// Append-only credit ledger storage.
pub trait LedgerRepository: Send + Sync {
    /// Newest entry for the company, ordered by insertion.
    fn latest_entry(&self, company_id: &CompanyId) -> Result<Option<LedgerEntry>, RepositoryError>;
    /// Conditional insert: succeeds only if the company's newest entry is still
    /// `expected_head` (`None` meaning the ledger is empty). Otherwise fails with
    /// [`RepositoryError::StaleLedgerHead`] and writes nothing. A second purchase carrying a
    /// reference that was already recorded fails with [`RepositoryError::Conflict`].
    fn append_entry(
        &self,
        entry: NewLedgerEntry,
        expected_head: Option<&LedgerEntryId>,
    ) -> Result<LedgerEntry, RepositoryError>;
    fn find_by_reference(
        &self,
        reference: &LedgerReference,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;
    /// Oldest first.
    fn entries_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

/// Administrative audit trail, written only by the system identity.
pub trait AuditLog: Send + Sync {
    fn record_flag(&self, flag: NewAuditFlag) -> Result<AuditFlag, RepositoryError>;
    fn flags(&self) -> Result<Vec<AuditFlag>, RepositoryError>;
}

/// Everything the marketplace services need from a single backend.
pub trait MarketplaceStore:
    LeadRepository
    + CompanyRepository
    + CoverageRepository
    + AssignmentRepository
    + PricingRuleRepository
    + LedgerRepository
    + AuditLog
{
}

impl<T> MarketplaceStore for T where
    T: LeadRepository
        + CompanyRepository
        + CoverageRepository
        + AssignmentRepository
        + PricingRuleRepository
        + LedgerRepository
        + AuditLog
{
}
