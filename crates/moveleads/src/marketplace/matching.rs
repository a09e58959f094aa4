//! Postcode-driven lead matching.
//!
//! A lead goes to at most [`MATCH_LIMIT`] approved, unpaused companies whose coverage
//! includes the origin postcode. Companies covering the exact outward code (`SW1A`) rank
//! ahead of those that only cover the area (`SW`). Coming up short is an operational signal
//! recorded in the audit log, never an error for the homeowner.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    AuditFlagKind, CompanyId, Lead, LeadAssignment, NewAssignment, NewAuditFlag,
    PostcodeCoverage,
};
use super::postcode::{area_code, outward_code};
use super::repository::{
    AssignmentRepository, AuditLog, CompanyRepository, CoverageRepository, RepositoryError,
};

pub const MATCH_LIMIT: usize = 5;

pub struct LeadMatcher<S> {
    store: Arc<S>,
}

impl<S> LeadMatcher<S>
where
    S: CoverageRepository + CompanyRepository + AssignmentRepository + AuditLog,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Pick the companies that should receive `lead`, best match first.
    ///
    /// Writes exactly one audit flag whenever fewer than [`MATCH_LIMIT`] companies are found.
    pub fn match_lead(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompanyId>, RepositoryError> {
        let exact_prefix = outward_code(&lead.from_postcode);
        let area_prefix = area_code(&lead.from_postcode);

        let coverage = self
            .store
            .coverage_matching(&[exact_prefix.as_str(), area_prefix.as_str()])?;
        if coverage.is_empty() {
            self.flag(AuditFlagKind::NoCoverage, lead, 0, now);
            return Ok(Vec::new());
        }

        let mut candidate_ids: Vec<CompanyId> = Vec::new();
        for row in &coverage {
            if !candidate_ids.contains(&row.company_id) {
                candidate_ids.push(row.company_id.clone());
            }
        }

        let eligible: HashSet<CompanyId> = self
            .store
            .companies_by_ids(&candidate_ids)?
            .into_iter()
            .filter(|company| company.accepts_leads())
            .map(|company| company.id)
            .collect();
        if eligible.is_empty() {
            self.flag(AuditFlagKind::NoEligibleCompanies, lead, 0, now);
            return Ok(Vec::new());
        }

        let matched = rank_coverage(&coverage, &exact_prefix, &eligible, MATCH_LIMIT);
        if matched.len() < MATCH_LIMIT {
            self.flag(AuditFlagKind::PartialMatch, lead, matched.len(), now);
        }

        debug!(
            lead_id = %lead.id,
            outward = %exact_prefix,
            area = %area_prefix,
            matched = matched.len(),
            "lead matched"
        );
        Ok(matched)
    }

    /// Match `lead` and create one `assigned` assignment per selected company.
    pub fn assign(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadAssignment>, RepositoryError> {
        let company_ids = self.match_lead(lead, now)?;
        let mut assignments = Vec::with_capacity(company_ids.len());

        for company_id in company_ids {
            let new = NewAssignment {
                lead_id: lead.id.clone(),
                company_id,
                assigned_at: now,
            };
            match self.store.insert_assignment(new) {
                Ok(assignment) => assignments.push(assignment),
                Err(RepositoryError::Conflict) => {
                    debug!(lead_id = %lead.id, "company already assigned to lead, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        info!(lead_id = %lead.id, assigned = assignments.len(), "lead assigned");
        Ok(assignments)
    }

    fn flag(&self, kind: AuditFlagKind, lead: &Lead, matched: usize, now: DateTime<Utc>) {
        let flag = NewAuditFlag {
            kind,
            lead_id: lead.id.clone(),
            matched,
            limit: MATCH_LIMIT,
            created_at: now,
        };
        match self.store.record_flag(flag) {
            Ok(_) => info!(
                lead_id = %lead.id,
                matched,
                reason = kind.describe(),
                "lead under-matched"
            ),
            Err(err) => warn!(lead_id = %lead.id, error = %err, "failed to record audit flag"),
        }
    }
}

/// Order eligible companies: exact-prefix rows first, then area-only rows, each group in
/// coverage order, each company once, truncated to `limit`.
pub fn rank_coverage(
    coverage: &[PostcodeCoverage],
    exact_prefix: &str,
    eligible: &HashSet<CompanyId>,
    limit: usize,
) -> Vec<CompanyId> {
    let mut exact: Vec<CompanyId> = Vec::new();
    let mut area: Vec<CompanyId> = Vec::new();

    for row in coverage {
        if !eligible.contains(&row.company_id) {
            continue;
        }
        let group = if row.prefix == exact_prefix {
            &mut exact
        } else {
            &mut area
        };
        if !group.contains(&row.company_id) {
            group.push(row.company_id.clone());
        }
    }

    area.retain(|company_id| !exact.contains(company_id));
    exact.into_iter().chain(area).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(company: &str, prefix: &str) -> PostcodeCoverage {
        PostcodeCoverage {
            company_id: CompanyId::from(company),
            prefix: prefix.to_string(),
            enabled: true,
        }
    }

    fn eligible(ids: &[&str]) -> HashSet<CompanyId> {
        ids.iter().map(|id| CompanyId::from(*id)).collect()
    }

    fn ids(ranked: &[CompanyId]) -> Vec<&str> {
        ranked.iter().map(|id| id.0.as_str()).collect()
    }

    #[test]
    fn exact_matches_rank_before_area_matches() {
        let coverage = vec![
            row("area-1", "SW"),
            row("area-2", "SW"),
            row("exact-1", "SW1A"),
        ];
        let ranked = rank_coverage(
            &coverage,
            "SW1A",
            &eligible(&["area-1", "area-2", "exact-1"]),
            MATCH_LIMIT,
        );
        assert_eq!(ids(&ranked), vec!["exact-1", "area-1", "area-2"]);
    }

    #[test]
    fn company_in_both_groups_counts_once_as_exact() {
        let coverage = vec![row("both", "SW"), row("other", "SW"), row("both", "SW1A")];
        let ranked = rank_coverage(&coverage, "SW1A", &eligible(&["both", "other"]), MATCH_LIMIT);
        assert_eq!(ids(&ranked), vec!["both", "other"]);
    }

    #[test]
    fn ineligible_companies_are_skipped_and_result_is_truncated() {
        let coverage: Vec<PostcodeCoverage> = (0..8)
            .map(|index| row(&format!("co-{index}"), "SW"))
            .collect();
        let all: Vec<String> = (0..8).map(|index| format!("co-{index}")).collect();
        let mut allowed: HashSet<CompanyId> =
            all.iter().map(|id| CompanyId(id.clone())).collect();
        allowed.remove(&CompanyId::from("co-1"));

        let ranked = rank_coverage(&coverage, "SW1A", &allowed, MATCH_LIMIT);
        assert_eq!(ids(&ranked), vec!["co-0", "co-2", "co-3", "co-4", "co-5"]);
    }
}
