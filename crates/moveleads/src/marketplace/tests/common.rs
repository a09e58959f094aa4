use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{
    AssignmentId, AuditFlag, Company, CompanyId, CompanyProfile, CompanyStatus, ContactDetails,
    Lead, LeadAssignment, LeadId, LeadSubmission, LedgerEntry, LedgerEntryId, LedgerReason,
    LedgerReference, NewAssignment, NewAuditFlag, NewLead, NewLedgerEntry, PostcodeCoverage,
    PropertySize, ServiceFlags,
};
use crate::marketplace::ledger::{CreditLedger, PaymentCompleted};
use crate::marketplace::memory::InMemoryMarketplaceStore;
use crate::marketplace::notifications::RecordingSink;
use crate::marketplace::pricing::PricingRule;
use crate::marketplace::repository::{
    AssignmentRepository, AuditLog, CompanyRepository, CoverageRepository, LeadRepository,
    LedgerRepository, PricingRuleRepository, RepositoryError,
};
use crate::marketplace::service::Marketplace;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn today() -> NaiveDate {
    now().date_naive()
}

pub(super) fn credits(value: i64) -> Decimal {
    Decimal::from(value)
}

pub(super) fn contact() -> ContactDetails {
    ContactDetails {
        full_name: "Jo Bloggs".to_string(),
        email: "jo.bloggs@example.com".to_string(),
        phone: "07700 900123".to_string(),
        marketing_consent: false,
    }
}

pub(super) fn submission(from: &str, to: &str, size: PropertySize) -> LeadSubmission {
    LeadSubmission {
        from_postcode: from.to_string(),
        to_postcode: to.to_string(),
        move_date: None,
        flexible_dates: true,
        property_size: size,
        services: ServiceFlags {
            packing: true,
            ..ServiceFlags::default()
        },
        notes: Some("Piano on the ground floor".to_string()),
        contact: contact(),
    }
}

/// Studio move within London area `SW`, which prices at 5.00 under the fallback rule.
pub(super) fn local_studio() -> LeadSubmission {
    submission("SW1A 1AA", "SW2 1AA", PropertySize::Studio)
}

pub(super) fn profile(name: &str) -> CompanyProfile {
    CompanyProfile {
        name: name.to_string(),
        email: format!("{}@removals.example", name.to_ascii_lowercase().replace(' ', ".")),
        phone: None,
        website: None,
    }
}

/// Registers a company, approves it and gives it `prefixes` as coverage.
pub(super) fn approved_company<S>(store: &S, name: &str, prefixes: &[&str]) -> Company
where
    S: CompanyRepository + CoverageRepository,
{
    let mut company = store
        .insert_company(profile(name), now())
        .expect("company stored");
    company.status = CompanyStatus::Approved;
    store
        .update_company(company.clone())
        .expect("company approved");
    store
        .replace_coverage(
            &company.id,
            prefixes.iter().map(|prefix| prefix.to_string()).collect(),
        )
        .expect("coverage stored");
    company
}

pub(super) fn stored_lead<S: LeadRepository>(store: &S, submission: LeadSubmission) -> Lead {
    let (lead, contact) = submission.into_parts(now());
    store.insert_lead(lead, contact).expect("lead stored")
}

pub(super) fn assignment<S: AssignmentRepository>(
    store: &S,
    lead: &Lead,
    company: &Company,
) -> LeadAssignment {
    store
        .insert_assignment(NewAssignment {
            lead_id: lead.id.clone(),
            company_id: company.id.clone(),
            assigned_at: now(),
        })
        .expect("assignment stored")
}

pub(super) fn payment(company: &Company, amount: u32, session: &str) -> PaymentCompleted {
    PaymentCompleted {
        company_id: company.id.clone(),
        credits: amount,
        session_id: session.to_string(),
    }
}

/// Credits `amount` to `company` through a fresh checkout session.
pub(super) fn fund<S: LedgerRepository>(store: &Arc<S>, company: &Company, amount: u32) {
    let ledger = CreditLedger::new(store.clone(), MarketplaceConfig::default().low_credit_threshold);
    let session = format!("cs_test_{}_{}", company.id, amount);
    ledger
        .credit_purchase(&payment(company, amount, &session), now())
        .expect("credits purchased");
}

pub(super) fn balance_of<S: LedgerRepository>(store: &S, company: &Company) -> Decimal {
    store
        .latest_entry(&company.id)
        .expect("ledger readable")
        .map(|entry| entry.balance_after)
        .unwrap_or(Decimal::ZERO)
}

pub(super) fn entries_of<S: LedgerRepository>(store: &S, company: &Company) -> Vec<LedgerEntry> {
    store
        .entries_for_company(&company.id)
        .expect("ledger readable")
}

pub(super) fn marketplace<S>(store: Arc<S>) -> (Arc<Marketplace<S, RecordingSink>>, Arc<RecordingSink>)
where
    S: crate::marketplace::repository::MarketplaceStore + 'static,
{
    let sink = Arc::new(RecordingSink::default());
    let marketplace = Marketplace::new(store, sink.clone(), &MarketplaceConfig::default());
    (Arc::new(marketplace), sink)
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

/// In-memory store with switchable failures, for exercising recovery paths.
#[derive(Default)]
pub(super) struct FaultyStore {
    pub inner: InMemoryMarketplaceStore,
    pub fail_mark_revealed: AtomicBool,
    pub fail_contact_lookup: AtomicBool,
    pub fail_refunds: AtomicBool,
    /// Another request reveals the assignment just before this one does.
    pub concurrent_reveal: AtomicBool,
    /// The concurrent request also pays for its reveal.
    pub rival_charged: AtomicBool,
}

impl FaultyStore {
    pub fn failing_mark_revealed() -> Self {
        let store = Self::default();
        store.fail_mark_revealed.store(true, Ordering::SeqCst);
        store
    }

    fn charge_rival(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let head = self.inner.latest_entry(company_id)?;
        let balance = head
            .as_ref()
            .map(|entry| entry.balance_after)
            .unwrap_or(Decimal::ZERO);
        self.inner.append_entry(
            NewLedgerEntry {
                company_id: company_id.clone(),
                delta: -price,
                balance_after: balance - price,
                reason: LedgerReason::Reveal,
                reference: Some(LedgerReference::assignment(id)),
                description: format!("Lead reveal for assignment {id}"),
                created_at: at,
            },
            head.as_ref().map(|entry| &entry.id),
        )?;
        Ok(())
    }

    fn unavailable(what: &str) -> RepositoryError {
        RepositoryError::Unavailable(format!("{what} offline"))
    }
}

impl LeadRepository for FaultyStore {
    fn insert_lead(&self, lead: NewLead, contact: ContactDetails) -> Result<Lead, RepositoryError> {
        self.inner.insert_lead(lead, contact)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch_lead(id)
    }

    fn fetch_contact(&self, id: &LeadId) -> Result<Option<ContactDetails>, RepositoryError> {
        if self.fail_contact_lookup.load(Ordering::SeqCst) {
            return Err(Self::unavailable("contacts"));
        }
        self.inner.fetch_contact(id)
    }
}

impl CompanyRepository for FaultyStore {
    fn insert_company(
        &self,
        profile: CompanyProfile,
        created_at: DateTime<Utc>,
    ) -> Result<Company, RepositoryError> {
        self.inner.insert_company(profile, created_at)
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch_company(id)
    }

    fn companies_by_ids(&self, ids: &[CompanyId]) -> Result<Vec<Company>, RepositoryError> {
        self.inner.companies_by_ids(ids)
    }

    fn update_company(&self, company: Company) -> Result<(), RepositoryError> {
        self.inner.update_company(company)
    }
}

impl CoverageRepository for FaultyStore {
    fn coverage_matching(
        &self,
        prefixes: &[&str],
    ) -> Result<Vec<PostcodeCoverage>, RepositoryError> {
        self.inner.coverage_matching(prefixes)
    }

    fn replace_coverage(
        &self,
        company_id: &CompanyId,
        prefixes: Vec<String>,
    ) -> Result<Vec<PostcodeCoverage>, RepositoryError> {
        self.inner.replace_coverage(company_id, prefixes)
    }
}

impl AssignmentRepository for FaultyStore {
    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<LeadAssignment, RepositoryError> {
        self.inner.insert_assignment(assignment)
    }

    fn fetch_assignment_for_company(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
    ) -> Result<Option<LeadAssignment>, RepositoryError> {
        self.inner.fetch_assignment_for_company(id, company_id)
    }

    fn mark_revealed(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
        price: Decimal,
        revealed_at: DateTime<Utc>,
    ) -> Result<LeadAssignment, RepositoryError> {
        if self.fail_mark_revealed.load(Ordering::SeqCst) {
            return Err(Self::unavailable("assignments"));
        }
        if self.concurrent_reveal.swap(false, Ordering::SeqCst) {
            if self.rival_charged.load(Ordering::SeqCst) {
                self.charge_rival(id, company_id, price, revealed_at)?;
            }
            self.inner.mark_revealed(id, company_id, price, revealed_at)?;
        }
        self.inner.mark_revealed(id, company_id, price, revealed_at)
    }

    fn update_assignment(&self, assignment: LeadAssignment) -> Result<(), RepositoryError> {
        self.inner.update_assignment(assignment)
    }

    fn assignments_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LeadAssignment>, RepositoryError> {
        self.inner.assignments_for_company(company_id)
    }

    fn assignments_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<LeadAssignment>, RepositoryError> {
        self.inner.assignments_for_lead(lead_id)
    }
}

impl PricingRuleRepository for FaultyStore {
    fn active_rule(&self) -> Result<Option<PricingRule>, RepositoryError> {
        self.inner.active_rule()
    }

    fn save_rule(&self, rule: PricingRule) -> Result<PricingRule, RepositoryError> {
        self.inner.save_rule(rule)
    }
}

impl LedgerRepository for FaultyStore {
    fn latest_entry(&self, company_id: &CompanyId) -> Result<Option<LedgerEntry>, RepositoryError> {
        self.inner.latest_entry(company_id)
    }

    fn append_entry(
        &self,
        entry: NewLedgerEntry,
        expected_head: Option<&LedgerEntryId>,
    ) -> Result<LedgerEntry, RepositoryError> {
        if entry.reason == LedgerReason::Refund && self.fail_refunds.load(Ordering::SeqCst) {
            return Err(Self::unavailable("ledger"));
        }
        self.inner.append_entry(entry, expected_head)
    }

    fn find_by_reference(
        &self,
        reference: &LedgerReference,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        self.inner.find_by_reference(reference)
    }

    fn entries_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        self.inner.entries_for_company(company_id)
    }
}

impl AuditLog for FaultyStore {
    fn record_flag(&self, flag: NewAuditFlag) -> Result<AuditFlag, RepositoryError> {
        self.inner.record_flag(flag)
    }

    fn flags(&self) -> Result<Vec<AuditFlag>, RepositoryError> {
        self.inner.flags()
    }
}
