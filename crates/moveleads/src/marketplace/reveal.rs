//! Paid disclosure of a lead's contact details.
//!
//! The ledger debit is written before the assignment is marked revealed. If the assignment
//! update then fails, the debit is compensated on the spot with a refund entry and the caller
//! is told so. Once the assignment is marked revealed the charge is final: a failed contact
//! lookup is reported, and a later retry returns the details without charging again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{AssignmentId, CompanyId, LeadAssignment, LeadId, RevealedContact};
use super::ledger::{CreditLedger, DebitReceipt, LedgerError};
use super::notifications::{LowBalanceEvent, Notification, NotificationSink};
use super::pricing::{PricingError, PricingService};
use super::repository::{
    AssignmentRepository, CompanyRepository, LeadRepository, LedgerRepository,
    PricingRuleRepository, RepositoryError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealRequest {
    pub lead_id: LeadId,
    pub assignment_id: AssignmentId,
    pub requesting_company_id: CompanyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealOutcome {
    pub assignment: LeadAssignment,
    pub contact: RevealedContact,
    /// False when the assignment had already been paid for.
    pub charged: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    /// Unknown assignment, or one that belongs to another company.
    #[error("assignment not found")]
    NotFound,
    #[error("insufficient credits: {required} required, {balance} available")]
    InsufficientCredits { required: Decimal, balance: Decimal },
    #[error("could not record the reveal; credits refunded: {refunded}")]
    AssignmentUpdateFailed {
        refunded: bool,
        #[source]
        source: RepositoryError,
    },
    #[error("contact details for lead {0} are unavailable")]
    ContactUnavailable(LeadId),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LedgerError> for RevealError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientCredits { required, balance } => {
                Self::InsufficientCredits { required, balance }
            }
            other => Self::Ledger(other),
        }
    }
}

pub struct RevealService<S, N> {
    store: Arc<S>,
    pricing: PricingService<S>,
    ledger: CreditLedger<S>,
    notifications: Arc<N>,
}

impl<S, N> RevealService<S, N>
where
    S: LeadRepository
        + CompanyRepository
        + AssignmentRepository
        + PricingRuleRepository
        + LedgerRepository
        + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, low_credit_threshold: Decimal) -> Self {
        Self {
            pricing: PricingService::new(store.clone()),
            ledger: CreditLedger::new(store.clone(), low_credit_threshold),
            store,
            notifications,
        }
    }

    /// Charge for and return a lead's contact details. Idempotent per assignment.
    pub fn reveal(
        &self,
        request: &RevealRequest,
        now: DateTime<Utc>,
    ) -> Result<RevealOutcome, RevealError> {
        let company_id = &request.requesting_company_id;
        let assignment = self
            .store
            .fetch_assignment_for_company(&request.assignment_id, company_id)?
            .filter(|assignment| assignment.lead_id == request.lead_id)
            .ok_or(RevealError::NotFound)?;

        if assignment.is_revealed() {
            return self.previously_revealed(assignment);
        }

        let quote = self
            .pricing
            .calculate_reveal_price(&assignment.lead_id, now.date_naive())?;

        let receipt = self
            .ledger
            .debit_reveal(company_id, &assignment.id, quote.price, now)
            .map_err(|err| {
                if let LedgerError::InsufficientCredits { required, balance } = &err {
                    info!(
                        company_id = %company_id,
                        assignment_id = %assignment.id,
                        required = %required,
                        balance = %balance,
                        "reveal refused, insufficient credits"
                    );
                }
                RevealError::from(err)
            })?;

        let revealed = match self
            .store
            .mark_revealed(&assignment.id, company_id, quote.price, now)
        {
            Ok(revealed) => revealed,
            Err(RepositoryError::Conflict) => {
                // A concurrent request revealed it first and was charged for it.
                self.compensate(&receipt, now);
                let current = self
                    .store
                    .fetch_assignment_for_company(&assignment.id, company_id)?
                    .ok_or(RevealError::NotFound)?;
                return self.previously_revealed(current);
            }
            Err(source) => {
                error!(
                    company_id = %company_id,
                    assignment_id = %assignment.id,
                    error = %source,
                    "assignment update failed after debit"
                );
                let refunded = self.compensate(&receipt, now);
                return Err(RevealError::AssignmentUpdateFailed { refunded, source });
            }
        };

        let contact = self.contact_for(&revealed.lead_id);
        if receipt.crossed_low_threshold {
            self.notify_low_balance(company_id, receipt.entry.balance_after);
        }

        info!(
            company_id = %company_id,
            assignment_id = %revealed.id,
            price = %quote.price,
            balance = %receipt.entry.balance_after,
            "lead revealed"
        );

        Ok(RevealOutcome {
            assignment: revealed,
            contact: contact?,
            charged: true,
        })
    }

    fn previously_revealed(&self, assignment: LeadAssignment) -> Result<RevealOutcome, RevealError> {
        let contact = self.contact_for(&assignment.lead_id)?;
        Ok(RevealOutcome {
            assignment,
            contact,
            charged: false,
        })
    }

    fn contact_for(&self, lead_id: &LeadId) -> Result<RevealedContact, RevealError> {
        match self.store.fetch_contact(lead_id) {
            Ok(Some(contact)) => Ok(contact.disclosed()),
            Ok(None) => {
                warn!(lead_id = %lead_id, "revealed lead has no contact record");
                Err(RevealError::ContactUnavailable(lead_id.clone()))
            }
            Err(err) => {
                warn!(lead_id = %lead_id, error = %err, "contact lookup failed after reveal");
                Err(RevealError::ContactUnavailable(lead_id.clone()))
            }
        }
    }

    /// Refund a debit whose reveal did not stick. Returns whether the refund landed.
    ///
    /// When the refunded debit was the one that crossed the low-credit threshold, debits
    /// made in between may have kept the balance at or below it without crossing it
    /// themselves, so the notice is sent from here against the balance after the refund.
    fn compensate(&self, receipt: &DebitReceipt, now: DateTime<Utc>) -> bool {
        let debit = &receipt.entry;
        let refund = match self.ledger.refund_reveal(debit, now) {
            Ok(refund) => refund,
            Err(err) => {
                error!(
                    company_id = %debit.company_id,
                    debit_id = %debit.id,
                    error = %err,
                    "compensating refund failed, ledger needs manual correction"
                );
                return false;
            }
        };

        if receipt.crossed_low_threshold
            && refund.balance_after <= self.ledger.low_credit_threshold()
        {
            self.notify_low_balance(&debit.company_id, refund.balance_after);
        }
        true
    }

    fn notify_low_balance(&self, company_id: &CompanyId, balance: Decimal) {
        match self.store.fetch_company(company_id) {
            Ok(Some(company)) => self
                .notifications
                .dispatch(Notification::LowBalance(LowBalanceEvent {
                    company_email: company.profile.email,
                    company_name: company.profile.name,
                    new_balance: balance,
                })),
            Ok(None) => warn!(company_id = %company_id, "low balance for unknown company"),
            Err(err) => warn!(
                company_id = %company_id,
                error = %err,
                "could not load company for low balance notice"
            ),
        }
    }
}
