//! Fire-and-forget notifications.
//!
//! Services hand events to a [`NotificationSink`] after their primary write has committed.
//! Sinks never report failure back to the caller: the production [`NotificationQueue`]
//! pushes onto a channel drained by a background worker, which logs delivery errors and
//! moves on. Retrying is left to the [`Notifier`] implementation.

use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::domain::{AssignmentId, CompanyId, LeadId};

/// Sent when a company's balance first drops to or below the low-credit threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowBalanceEvent {
    pub company_email: String,
    pub company_name: String,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    LeadAssigned {
        company_id: CompanyId,
        lead_id: LeadId,
        assignment_id: AssignmentId,
    },
    LowBalance(LowBalanceEvent),
}

impl Notification {
    pub const fn kind(&self) -> &'static str {
        match self {
            Notification::LeadAssigned { .. } => "lead_assigned",
            Notification::LowBalance(_) => "low_balance",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound delivery (e-mail, webhooks). Owned by an external collaborator.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Where services drop their side-effect events. Must not block on delivery.
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Channel-backed sink. Construct once per process and share the handle.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// Spawn the delivery worker on the current tokio runtime.
    ///
    /// The worker exits once every clone of the returned queue has been dropped.
    pub fn spawn<N>(notifier: Arc<N>) -> (Self, JoinHandle<()>)
    where
        N: Notifier + ?Sized + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Notification>();
        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match notifier.deliver(&notification) {
                    Ok(()) => debug!(kind = notification.kind(), "notification delivered"),
                    Err(err) => warn!(
                        kind = notification.kind(),
                        error = %err,
                        "notification delivery failed"
                    ),
                }
            }
            debug!("notification worker stopped");
        });
        (Self { sender }, worker)
    }
}

impl NotificationSink for NotificationQueue {
    fn dispatch(&self, notification: Notification) {
        if let Err(err) = self.sender.send(notification) {
            warn!(
                kind = err.0.kind(),
                "notification worker gone, dropping notification"
            );
        }
    }
}

/// Notifier that only writes a log line. Used until a mail transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::LeadAssigned {
                company_id,
                lead_id,
                assignment_id,
            } => info!(
                company_id = %company_id,
                lead_id = %lead_id,
                assignment_id = %assignment_id,
                "new lead available"
            ),
            Notification::LowBalance(event) => info!(
                company = %event.company_name,
                email = %event.company_email,
                balance = %event.new_balance,
                "credit balance running low"
            ),
        }
        Ok(())
    }
}

/// Sink that keeps everything in memory, for demos and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn dispatch(&self, notification: Notification) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl Notifier for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.dispatch(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyNotifier {
        attempts: AtomicUsize,
        delivered: RecordingSink,
    }

    impl Notifier for FlakyNotifier {
        fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                return Err(NotifyError::Transport("smtp timeout".to_string()));
            }
            self.delivered.deliver(notification)
        }
    }

    fn low_balance(balance: i64) -> Notification {
        Notification::LowBalance(LowBalanceEvent {
            company_email: "ops@swift.example".to_string(),
            company_name: "Swift Removals".to_string(),
            new_balance: Decimal::from(balance),
        })
    }

    #[tokio::test]
    async fn worker_keeps_draining_after_a_failed_delivery() {
        let notifier = Arc::new(FlakyNotifier {
            attempts: AtomicUsize::new(0),
            delivered: RecordingSink::default(),
        });
        let (queue, worker) = NotificationQueue::spawn(notifier.clone());

        queue.dispatch(low_balance(9));
        queue.dispatch(low_balance(4));
        drop(queue);
        worker.await.expect("worker joins");

        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.delivered.events(), vec![low_balance(4)]);
    }

    #[tokio::test]
    async fn dispatch_after_worker_exit_is_swallowed() {
        let (queue, worker) = NotificationQueue::spawn(Arc::new(TracingNotifier));
        worker.abort();
        let _ = worker.await;

        queue.dispatch(low_balance(1));
    }

    #[test]
    fn notifications_serialize_with_kind_tag() {
        let payload = serde_json::to_value(low_balance(3)).expect("serializes");
        assert_eq!(payload["kind"], "low_balance");
        assert_eq!(payload["company_name"], "Swift Removals");
    }
}
