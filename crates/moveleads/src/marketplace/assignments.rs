//! Company-side progress tracking on leads they have paid for.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{AssignmentId, AssignmentStatus, CompanyId, Lead, LeadAssignment};
use super::repository::{AssignmentRepository, LeadRepository, RepositoryError};

/// Partial update sent by the owning company. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentUpdate {
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An assignment with the lead it points at. Carries no contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: LeadAssignment,
    pub lead: Option<Lead>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("assignment not found")]
    NotFound,
    #[error("assignment must be revealed before it can be updated")]
    NotRevealed,
    #[error("cannot move assignment from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Whether a company may move an assignment from `from` to `to` by hand.
pub fn can_transition(from: AssignmentStatus, to: AssignmentStatus) -> bool {
    if from == to {
        return true;
    }
    if from.is_terminal() || matches!(to, AssignmentStatus::Assigned | AssignmentStatus::Revealed) {
        return false;
    }
    from >= AssignmentStatus::Revealed && to > from
}

pub struct AssignmentService<S> {
    store: Arc<S>,
}

impl<S> AssignmentService<S>
where
    S: AssignmentRepository + LeadRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn update(
        &self,
        company_id: &CompanyId,
        assignment_id: &AssignmentId,
        update: AssignmentUpdate,
    ) -> Result<LeadAssignment, AssignmentError> {
        let mut assignment = self
            .store
            .fetch_assignment_for_company(assignment_id, company_id)?
            .ok_or(AssignmentError::NotFound)?;

        if !assignment.is_revealed() {
            return Err(AssignmentError::NotRevealed);
        }

        if let Some(status) = update.status {
            if !can_transition(assignment.status, status) {
                return Err(AssignmentError::InvalidTransition {
                    from: assignment.status.label(),
                    to: status.label(),
                });
            }
            assignment.status = status;
        }
        if let Some(notes) = update.notes {
            let trimmed = notes.trim();
            assignment.notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }

        self.store.update_assignment(assignment.clone())?;
        info!(
            company_id = %company_id,
            assignment_id = %assignment_id,
            status = assignment.status.label(),
            "assignment updated"
        );
        Ok(assignment)
    }

    /// The company's assignments, newest first.
    pub fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<AssignmentView>, AssignmentError> {
        let mut assignments = self.store.assignments_for_company(company_id)?;
        assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at).then(b.id.cmp(&a.id)));

        assignments
            .into_iter()
            .map(|assignment| {
                let lead = self.store.fetch_lead(&assignment.lead_id)?;
                Ok(AssignmentView { assignment, lead })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::AssignmentStatus::*;

    #[test]
    fn progress_only_moves_forward() {
        assert!(can_transition(Revealed, Contacted));
        assert!(can_transition(Revealed, Won));
        assert!(can_transition(Contacted, Quoted));
        assert!(can_transition(Quoted, Lost));
        assert!(!can_transition(Quoted, Contacted));
        assert!(!can_transition(Contacted, Revealed));
    }

    #[test]
    fn closed_assignments_stay_closed() {
        assert!(!can_transition(Won, Lost));
        assert!(!can_transition(Lost, Quoted));
        assert!(can_transition(Won, Won));
    }

    #[test]
    fn unrevealed_assignments_cannot_progress() {
        assert!(!can_transition(Assigned, Contacted));
        assert!(!can_transition(Assigned, Revealed));
    }
}
