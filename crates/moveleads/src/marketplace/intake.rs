//! Lead submission: throttle, store, match and tell the chosen companies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::domain::{LeadAssignment, LeadId, LeadSubmission};
use super::matching::LeadMatcher;
use super::notifications::{Notification, NotificationSink};
use super::rate_limit::{RateLimited, SubmissionRateLimiter};
use super::repository::{
    AssignmentRepository, AuditLog, CompanyRepository, CoverageRepository, LeadRepository,
    RepositoryError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeReceipt {
    pub lead_id: LeadId,
    pub assignments: Vec<LeadAssignment>,
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct LeadIntakeService<S, N> {
    store: Arc<S>,
    matcher: LeadMatcher<S>,
    limiter: Arc<SubmissionRateLimiter>,
    notifications: Arc<N>,
}

impl<S, N> LeadIntakeService<S, N>
where
    S: LeadRepository + CoverageRepository + CompanyRepository + AssignmentRepository + AuditLog,
    N: NotificationSink,
{
    pub fn new(
        store: Arc<S>,
        limiter: Arc<SubmissionRateLimiter>,
        notifications: Arc<N>,
    ) -> Self {
        Self {
            matcher: LeadMatcher::new(store.clone()),
            store,
            limiter,
            notifications,
        }
    }

    /// Store a homeowner's request and hand it to matching companies.
    ///
    /// The lead is kept even when matching fails; a lead nobody receives is an admin
    /// follow-up, not a failed submission.
    pub fn submit(
        &self,
        client_key: &str,
        submission: LeadSubmission,
        now: DateTime<Utc>,
    ) -> Result<IntakeReceipt, IntakeError> {
        self.limiter.check(client_key, now)?;

        let (new_lead, contact) = submission.into_parts(now);
        let lead = self.store.insert_lead(new_lead, contact)?;

        let assignments = match self.matcher.assign(&lead, now) {
            Ok(assignments) => assignments,
            Err(err) => {
                error!(lead_id = %lead.id, error = %err, "matching failed for stored lead");
                Vec::new()
            }
        };

        for assignment in &assignments {
            self.notifications.dispatch(Notification::LeadAssigned {
                company_id: assignment.company_id.clone(),
                lead_id: lead.id.clone(),
                assignment_id: assignment.id.clone(),
            });
        }

        info!(
            lead_id = %lead.id,
            from = %lead.from_postcode,
            to = %lead.to_postcode,
            matched = assignments.len(),
            "lead submitted"
        );

        Ok(IntakeReceipt {
            lead_id: lead.id,
            assignments,
        })
    }
}
