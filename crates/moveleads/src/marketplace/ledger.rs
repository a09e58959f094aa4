//! Credit ledger transactions.
//!
//! The ledger is the only record of a company's credit. Its balance is the `balance_after`
//! snapshot on the newest entry; nothing is ever updated or deleted, and corrections are new
//! entries. Each write reads the current head, computes the next balance and appends
//! conditionally on that head still being current, retrying when another request got there
//! first. That keeps concurrent reveals for one company from both spending the same credit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    AssignmentId, CompanyId, LedgerEntry, LedgerReason, LedgerReference, NewLedgerEntry,
    ReferenceType,
};
use super::repository::{LedgerRepository, RepositoryError};

const APPEND_ATTEMPTS: usize = 8;

/// Checkout completion delivered by the payment provider, possibly more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub company_id: CompanyId,
    pub credits: u32,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Applied(LedgerEntry),
    /// The session was credited before. Carries the original entry.
    AlreadyProcessed(LedgerEntry),
}

impl CreditOutcome {
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            CreditOutcome::Applied(entry) | CreditOutcome::AlreadyProcessed(entry) => entry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitReceipt {
    pub entry: LedgerEntry,
    pub balance_before: Decimal,
    /// This debit moved the balance from above the low-credit threshold to at or below it.
    pub crossed_low_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient credits: {required} required, {balance} available")]
    InsufficientCredits { required: Decimal, balance: Decimal },
    #[error("invalid credit amount {0}")]
    InvalidAmount(Decimal),
    #[error("ledger entry {0} is not a reveal debit")]
    NotRefundable(String),
    #[error("ledger for company {0} kept changing, gave up retrying")]
    Contention(CompanyId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CreditLedger<L> {
    store: Arc<L>,
    low_credit_threshold: Decimal,
}

impl<L> CreditLedger<L>
where
    L: LedgerRepository,
{
    pub fn new(store: Arc<L>, low_credit_threshold: Decimal) -> Self {
        Self {
            store,
            low_credit_threshold,
        }
    }

    pub fn low_credit_threshold(&self) -> Decimal {
        self.low_credit_threshold
    }

    /// Balance after the newest entry, zero for a company that never had credit.
    pub fn current_balance(&self, company_id: &CompanyId) -> Result<Decimal, LedgerError> {
        Ok(self
            .store
            .latest_entry(company_id)?
            .map(|entry| entry.balance_after)
            .unwrap_or(Decimal::ZERO))
    }

    pub fn history(&self, company_id: &CompanyId) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.entries_for_company(company_id)?)
    }

    /// Credit a completed checkout exactly once per payment session.
    pub fn credit_purchase(
        &self,
        payment: &PaymentCompleted,
        now: DateTime<Utc>,
    ) -> Result<CreditOutcome, LedgerError> {
        if payment.credits == 0 {
            return Err(LedgerError::InvalidAmount(Decimal::ZERO));
        }

        let reference = LedgerReference::stripe_session(payment.session_id.clone());
        if let Some(existing) = self.purchase_for(&reference)? {
            info!(
                company_id = %payment.company_id,
                session_id = %payment.session_id,
                "payment session already credited"
            );
            return Ok(CreditOutcome::AlreadyProcessed(existing));
        }

        let credits = Decimal::from(payment.credits);
        let appended = self.append(&payment.company_id, |balance| {
            Ok(NewLedgerEntry {
                company_id: payment.company_id.clone(),
                delta: credits,
                balance_after: balance + credits,
                reason: LedgerReason::Purchase,
                reference: Some(reference.clone()),
                description: format!("Purchased {} credits", payment.credits),
                created_at: now,
            })
        });

        match appended {
            Ok((entry, _)) => {
                info!(
                    company_id = %payment.company_id,
                    credits = payment.credits,
                    balance = %entry.balance_after,
                    "credits purchased"
                );
                Ok(CreditOutcome::Applied(entry))
            }
            // A concurrent delivery of the same webhook won the insert.
            Err(LedgerError::Repository(RepositoryError::Conflict)) => self
                .purchase_for(&reference)?
                .map(CreditOutcome::AlreadyProcessed)
                .ok_or(LedgerError::Repository(RepositoryError::Conflict)),
            Err(err) => Err(err),
        }
    }

    /// Charge `price` for revealing an assignment. Refused without writing when the balance
    /// does not cover it.
    pub fn debit_reveal(
        &self,
        company_id: &CompanyId,
        assignment_id: &AssignmentId,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<DebitReceipt, LedgerError> {
        if price.is_sign_negative() {
            return Err(LedgerError::InvalidAmount(price));
        }

        let (entry, balance_before) = self.append(company_id, |balance| {
            if price > balance {
                return Err(LedgerError::InsufficientCredits {
                    required: price,
                    balance,
                });
            }
            Ok(NewLedgerEntry {
                company_id: company_id.clone(),
                delta: -price,
                balance_after: balance - price,
                reason: LedgerReason::Reveal,
                reference: Some(LedgerReference::assignment(assignment_id)),
                description: format!("Lead reveal for assignment {assignment_id}"),
                created_at: now,
            })
        })?;

        let crossed_low_threshold = balance_before > self.low_credit_threshold
            && entry.balance_after <= self.low_credit_threshold;

        debug!(
            company_id = %company_id,
            assignment_id = %assignment_id,
            price = %price,
            balance = %entry.balance_after,
            "reveal debited"
        );

        Ok(DebitReceipt {
            entry,
            balance_before,
            crossed_low_threshold,
        })
    }

    /// Compensate a reveal debit by appending its inverse. The debit itself stays.
    pub fn refund_reveal(
        &self,
        debit: &LedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        if debit.reason != LedgerReason::Reveal || !debit.delta.is_sign_negative() {
            return Err(LedgerError::NotRefundable(debit.id.0.clone()));
        }

        let amount = -debit.delta;
        let (entry, _) = self.append(&debit.company_id, |balance| {
            Ok(NewLedgerEntry {
                company_id: debit.company_id.clone(),
                delta: amount,
                balance_after: balance + amount,
                reason: LedgerReason::Refund,
                reference: debit.reference.clone(),
                description: format!("Refund of reveal debit {}", debit.id),
                created_at: now,
            })
        })?;

        warn!(
            company_id = %debit.company_id,
            debit_id = %debit.id,
            amount = %amount,
            "reveal debit refunded"
        );
        Ok(entry)
    }

    /// Manual correction by an administrator. Cannot take the balance below zero.
    pub fn adjust(
        &self,
        company_id: &CompanyId,
        delta: Decimal,
        actor: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        if delta.is_zero() {
            return Err(LedgerError::InvalidAmount(delta));
        }

        let (entry, _) = self.append(company_id, |balance| {
            if balance + delta < Decimal::ZERO {
                return Err(LedgerError::InsufficientCredits {
                    required: -delta,
                    balance,
                });
            }
            Ok(NewLedgerEntry {
                company_id: company_id.clone(),
                delta,
                balance_after: balance + delta,
                reason: LedgerReason::Adjustment,
                reference: Some(LedgerReference {
                    reference_type: ReferenceType::Admin,
                    reference_id: actor.to_string(),
                }),
                description: description.to_string(),
                created_at: now,
            })
        })?;

        info!(company_id = %company_id, delta = %delta, actor, "ledger adjusted");
        Ok(entry)
    }

    fn purchase_for(
        &self,
        reference: &LedgerReference,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self
            .store
            .find_by_reference(reference)?
            .into_iter()
            .find(|entry| entry.reason == LedgerReason::Purchase))
    }

    /// Read the head, build the next entry from its balance and append conditionally.
    /// Returns the stored entry and the balance it was computed against.
    fn append<F>(
        &self,
        company_id: &CompanyId,
        build: F,
    ) -> Result<(LedgerEntry, Decimal), LedgerError>
    where
        F: Fn(Decimal) -> Result<NewLedgerEntry, LedgerError>,
    {
        for attempt in 1..=APPEND_ATTEMPTS {
            let head = self.store.latest_entry(company_id)?;
            let balance = head
                .as_ref()
                .map(|entry| entry.balance_after)
                .unwrap_or(Decimal::ZERO);
            let next = build(balance)?;

            match self
                .store
                .append_entry(next, head.as_ref().map(|entry| &entry.id))
            {
                Ok(entry) => return Ok((entry, balance)),
                Err(RepositoryError::StaleLedgerHead(_)) => {
                    debug!(company_id = %company_id, attempt, "ledger head moved, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::Contention(company_id.clone()))
    }
}
