//! Company accounts: registration, admin review, pausing and coverage areas.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{Company, CompanyId, CompanyProfile, CompanyStatus, PostcodeCoverage};
use super::repository::{CompanyRepository, CoverageRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum CompanyError {
    #[error("company not found")]
    NotFound,
    #[error("company {0} is required")]
    MissingField(&'static str),
    #[error("companies cannot be moved back to pending")]
    InvalidDecision,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CompanyService<S> {
    store: Arc<S>,
}

impl<S> CompanyService<S>
where
    S: CompanyRepository + CoverageRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// New companies wait in `pending` until an admin reviews them.
    pub fn register(
        &self,
        profile: CompanyProfile,
        now: DateTime<Utc>,
    ) -> Result<Company, CompanyError> {
        if profile.name.trim().is_empty() {
            return Err(CompanyError::MissingField("name"));
        }
        if profile.email.trim().is_empty() {
            return Err(CompanyError::MissingField("email"));
        }

        let company = self.store.insert_company(profile, now)?;
        info!(company_id = %company.id, name = %company.profile.name, "company registered");
        Ok(company)
    }

    pub fn review(
        &self,
        company_id: &CompanyId,
        decision: CompanyStatus,
    ) -> Result<Company, CompanyError> {
        if decision == CompanyStatus::Pending {
            return Err(CompanyError::InvalidDecision);
        }

        let mut company = self.load(company_id)?;
        let previous = company.status;
        company.status = decision;
        self.store.update_company(company.clone())?;

        info!(
            company_id = %company_id,
            from = previous.label(),
            to = decision.label(),
            "company reviewed"
        );
        Ok(company)
    }

    pub fn set_paused(&self, company_id: &CompanyId, paused: bool) -> Result<Company, CompanyError> {
        let mut company = self.load(company_id)?;
        if company.paused != paused {
            company.paused = paused;
            self.store.update_company(company.clone())?;
            info!(company_id = %company_id, paused, "company lead intake toggled");
        }
        Ok(company)
    }

    /// Replace every coverage prefix the company serves.
    pub fn replace_coverage(
        &self,
        company_id: &CompanyId,
        prefixes: &[String],
    ) -> Result<Vec<PostcodeCoverage>, CompanyError> {
        self.load(company_id)?;
        let normalized = normalize_prefixes(prefixes);
        let rows = self.store.replace_coverage(company_id, normalized)?;
        info!(company_id = %company_id, prefixes = rows.len(), "coverage replaced");
        Ok(rows)
    }

    fn load(&self, company_id: &CompanyId) -> Result<Company, CompanyError> {
        self.store
            .fetch_company(company_id)?
            .ok_or(CompanyError::NotFound)
    }
}

/// Uppercase, strip whitespace, drop blanks and duplicates. First occurrence wins.
pub fn normalize_prefixes(prefixes: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(prefixes.len());
    for raw in prefixes {
        let prefix: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        if !prefix.is_empty() && !normalized.contains(&prefix) {
            normalized.push(prefix);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_normalized_and_deduplicated() {
        let raw = vec![
            " sw1a ".to_string(),
            "SW".to_string(),
            "sw1a".to_string(),
            "".to_string(),
            "e 1".to_string(),
        ];
        assert_eq!(normalize_prefixes(&raw), vec!["SW1A", "SW", "E1"]);
    }
}
