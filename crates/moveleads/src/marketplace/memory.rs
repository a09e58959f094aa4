//! In-memory implementation of [`MarketplaceStore`](super::repository::MarketplaceStore).
//!
//! Not durable: state lives for the life of the process. Each table sits behind its own
//! mutex, and identifiers come from a per-store sequence so two stores never share state.
//! Ledger appends run entirely under the ledger lock, which makes the head check and the
//! insert a single atomic step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::domain::{
    AssignmentId, AssignmentStatus, AuditFlag, AuditFlagId, Company, CompanyId, CompanyProfile,
    CompanyStatus, ContactDetails, Lead, LeadAssignment, LeadId, LedgerEntry, LedgerEntryId,
    LedgerReason, LedgerReference, NewAssignment, NewAuditFlag, NewLead, NewLedgerEntry,
    PostcodeCoverage,
};
use super::pricing::PricingRule;
use super::repository::{
    AssignmentRepository, AuditLog, CompanyRepository, CoverageRepository, LeadRepository,
    LedgerRepository, PricingRuleRepository, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    sequence: AtomicU64,
    leads: Mutex<HashMap<LeadId, (Lead, ContactDetails)>>,
    companies: Mutex<HashMap<CompanyId, Company>>,
    coverage: Mutex<Vec<PostcodeCoverage>>,
    assignments: Mutex<Vec<LeadAssignment>>,
    rules: Mutex<Vec<PricingRule>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    audit: Mutex<Vec<AuditFlag>>,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{id:06}")
    }
}

impl LeadRepository for InMemoryMarketplaceStore {
    fn insert_lead(&self, lead: NewLead, contact: ContactDetails) -> Result<Lead, RepositoryError> {
        let lead = Lead::from_new(LeadId(self.next_id("lead")), lead);
        lock(&self.leads).insert(lead.id.clone(), (lead.clone(), contact));
        Ok(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(lock(&self.leads).get(id).map(|(lead, _)| lead.clone()))
    }

    fn fetch_contact(&self, id: &LeadId) -> Result<Option<ContactDetails>, RepositoryError> {
        Ok(lock(&self.leads).get(id).map(|(_, contact)| contact.clone()))
    }
}

impl CompanyRepository for InMemoryMarketplaceStore {
    fn insert_company(
        &self,
        profile: CompanyProfile,
        created_at: DateTime<Utc>,
    ) -> Result<Company, RepositoryError> {
        let company = Company {
            id: CompanyId(self.next_id("co")),
            profile,
            status: CompanyStatus::Pending,
            paused: false,
            created_at,
        };
        lock(&self.companies).insert(company.id.clone(), company.clone());
        Ok(company)
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(lock(&self.companies).get(id).cloned())
    }

    fn companies_by_ids(&self, ids: &[CompanyId]) -> Result<Vec<Company>, RepositoryError> {
        let guard = lock(&self.companies);
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    fn update_company(&self, company: Company) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.companies);
        match guard.get_mut(&company.id) {
            Some(slot) => {
                *slot = company;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl CoverageRepository for InMemoryMarketplaceStore {
    fn coverage_matching(
        &self,
        prefixes: &[&str],
    ) -> Result<Vec<PostcodeCoverage>, RepositoryError> {
        Ok(lock(&self.coverage)
            .iter()
            .filter(|row| row.enabled && prefixes.contains(&row.prefix.as_str()))
            .cloned()
            .collect())
    }

    fn replace_coverage(
        &self,
        company_id: &CompanyId,
        prefixes: Vec<String>,
    ) -> Result<Vec<PostcodeCoverage>, RepositoryError> {
        let rows: Vec<PostcodeCoverage> = prefixes
            .into_iter()
            .map(|prefix| PostcodeCoverage {
                company_id: company_id.clone(),
                prefix,
                enabled: true,
            })
            .collect();

        let mut guard = lock(&self.coverage);
        guard.retain(|row| &row.company_id != company_id);
        guard.extend(rows.iter().cloned());
        Ok(rows)
    }
}

impl AssignmentRepository for InMemoryMarketplaceStore {
    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<LeadAssignment, RepositoryError> {
        let mut guard = lock(&self.assignments);
        let duplicate = guard.iter().any(|existing| {
            existing.lead_id == assignment.lead_id && existing.company_id == assignment.company_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let stored = LeadAssignment {
            id: AssignmentId(self.next_id("asg")),
            lead_id: assignment.lead_id,
            company_id: assignment.company_id,
            status: AssignmentStatus::Assigned,
            assigned_at: assignment.assigned_at,
            revealed_at: None,
            price_at_reveal: None,
            notes: None,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn fetch_assignment_for_company(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
    ) -> Result<Option<LeadAssignment>, RepositoryError> {
        Ok(lock(&self.assignments)
            .iter()
            .find(|assignment| &assignment.id == id && &assignment.company_id == company_id)
            .cloned())
    }

    fn mark_revealed(
        &self,
        id: &AssignmentId,
        company_id: &CompanyId,
        price: Decimal,
        revealed_at: DateTime<Utc>,
    ) -> Result<LeadAssignment, RepositoryError> {
        let mut guard = lock(&self.assignments);
        let assignment = guard
            .iter_mut()
            .find(|assignment| &assignment.id == id && &assignment.company_id == company_id)
            .ok_or(RepositoryError::NotFound)?;

        if assignment.revealed_at.is_some() {
            return Err(RepositoryError::Conflict);
        }

        assignment.status = AssignmentStatus::Revealed;
        assignment.revealed_at = Some(revealed_at);
        assignment.price_at_reveal = Some(price);
        Ok(assignment.clone())
    }

    fn update_assignment(&self, assignment: LeadAssignment) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.assignments);
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id == assignment.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = assignment;
        Ok(())
    }

    fn assignments_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LeadAssignment>, RepositoryError> {
        Ok(lock(&self.assignments)
            .iter()
            .filter(|assignment| &assignment.company_id == company_id)
            .cloned()
            .collect())
    }

    fn assignments_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<LeadAssignment>, RepositoryError> {
        Ok(lock(&self.assignments)
            .iter()
            .filter(|assignment| &assignment.lead_id == lead_id)
            .cloned()
            .collect())
    }
}

impl PricingRuleRepository for InMemoryMarketplaceStore {
    fn active_rule(&self) -> Result<Option<PricingRule>, RepositoryError> {
        Ok(lock(&self.rules).iter().find(|rule| rule.active).cloned())
    }

    fn save_rule(&self, rule: PricingRule) -> Result<PricingRule, RepositoryError> {
        let mut guard = lock(&self.rules);
        if rule.active {
            for other in guard.iter_mut() {
                other.active = false;
            }
        }
        match guard.iter_mut().find(|existing| existing.id == rule.id) {
            Some(slot) => *slot = rule.clone(),
            None => guard.push(rule.clone()),
        }
        Ok(rule)
    }
}

impl LedgerRepository for InMemoryMarketplaceStore {
    fn latest_entry(&self, company_id: &CompanyId) -> Result<Option<LedgerEntry>, RepositoryError> {
        Ok(lock(&self.ledger)
            .iter()
            .rev()
            .find(|entry| &entry.company_id == company_id)
            .cloned())
    }

    fn append_entry(
        &self,
        entry: NewLedgerEntry,
        expected_head: Option<&LedgerEntryId>,
    ) -> Result<LedgerEntry, RepositoryError> {
        let mut guard = lock(&self.ledger);

        if entry.reason == LedgerReason::Purchase {
            let already_recorded = guard.iter().any(|existing| {
                existing.reason == LedgerReason::Purchase && existing.reference == entry.reference
            });
            if already_recorded {
                return Err(RepositoryError::Conflict);
            }
        }

        let head = guard
            .iter()
            .rev()
            .find(|existing| existing.company_id == entry.company_id)
            .map(|existing| &existing.id);
        if head != expected_head {
            return Err(RepositoryError::StaleLedgerHead(entry.company_id));
        }

        let stored = LedgerEntry::from_new(LedgerEntryId(self.next_id("led")), entry);
        guard.push(stored.clone());
        Ok(stored)
    }

    fn find_by_reference(
        &self,
        reference: &LedgerReference,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(lock(&self.ledger)
            .iter()
            .filter(|entry| entry.reference.as_ref() == Some(reference))
            .cloned()
            .collect())
    }

    fn entries_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(lock(&self.ledger)
            .iter()
            .filter(|entry| &entry.company_id == company_id)
            .cloned()
            .collect())
    }
}

impl AuditLog for InMemoryMarketplaceStore {
    fn record_flag(&self, flag: NewAuditFlag) -> Result<AuditFlag, RepositoryError> {
        let stored = AuditFlag::from_new(AuditFlagId(self.next_id("audit")), flag);
        lock(&self.audit).push(stored.clone());
        Ok(stored)
    }

    fn flags(&self) -> Result<Vec<AuditFlag>, RepositoryError> {
        Ok(lock(&self.audit).clone())
    }
}
