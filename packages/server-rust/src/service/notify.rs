//! Admission notifications, delivered off the request path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use workshop_core::{Outcome, Registration};

use super::worker::BackgroundRunnable;
use crate::traits::Notifier;

/// One notification for the worker to deliver.
#[derive(Debug, Clone)]
pub struct NotifyTask {
    pub outcome: Outcome,
    pub registration: Registration,
}

/// Producer side of the notification queue.
///
/// Enqueueing never waits: a full or closed queue drops the notification
/// with a warning.
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    tx: Option<mpsc::Sender<NotifyTask>>,
}

impl NotificationQueue {
    #[must_use]
    pub fn new(tx: mpsc::Sender<NotifyTask>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A queue that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn enqueue(&self, outcome: Outcome, registration: Registration) {
        let Some(tx) = &self.tx else {
            return;
        };
        let registration_id = registration.id.clone();
        if let Err(err) = tx.try_send(NotifyTask {
            outcome,
            registration,
        }) {
            metrics::counter!("workshop_notifications_dropped_total").increment(1);
            tracing::warn!(
                registration_id = %registration_id,
                error = %err,
                "notification dropped"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationRunnable
// ---------------------------------------------------------------------------

/// Hands queued notifications to the `Notifier`. Failures are logged and
/// counted, never retried.
pub struct NotificationRunnable {
    notifier: Arc<dyn Notifier>,
    delivered: u64,
    failed: u64,
}

impl NotificationRunnable {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            delivered: 0,
            failed: 0,
        }
    }
}

#[async_trait]
impl BackgroundRunnable for NotificationRunnable {
    type Task = NotifyTask;

    async fn run(&mut self, task: NotifyTask) {
        match self.notifier.notify(&task.outcome, &task.registration).await {
            Ok(()) => {
                self.delivered += 1;
                metrics::counter!("workshop_notifications_total", "result" => "delivered")
                    .increment(1);
            }
            Err(err) => {
                self.failed += 1;
                metrics::counter!("workshop_notifications_total", "result" => "failed")
                    .increment(1);
                tracing::warn!(
                    registration_id = %task.registration.id,
                    outcome = task.outcome.label(),
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }

    async fn on_tick(&mut self) {
        tracing::debug!(
            delivered = self.delivered,
            failed = self.failed,
            "notification worker stats"
        );
    }

    async fn shutdown(&mut self) {
        tracing::info!(
            delivered = self.delivered,
            failed = self.failed,
            "notification worker stopped"
        );
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// `Notifier` that writes each outcome to the log. Used by the server binary
/// until a mail or push channel is wired in.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, outcome: &Outcome, registration: &Registration) -> anyhow::Result<()> {
        tracing::info!(
            workshop_id = %registration.workshop_id,
            registration_id = %registration.id,
            student_id = %registration.student_id,
            outcome = outcome.label(),
            status = registration.status.as_str(),
            "registration notification"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use workshop_core::{FormData, RegistrationStatus};

    use super::*;
    use crate::service::worker::BackgroundWorker;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, outcome: &Outcome, registration: &Registration) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.seen
                .lock()
                .push(format!("{}:{}", outcome.label(), registration.student_id));
            Ok(())
        }
    }

    fn registration(student: &str) -> Registration {
        Registration::new(
            "w1",
            student,
            FormData::new(),
            RegistrationStatus::Confirmed,
            None,
            1,
        )
    }

    #[tokio::test]
    async fn worker_delivers_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut worker =
            BackgroundWorker::start(NotificationRunnable::new(notifier.clone()), 8, 60_000);
        let queue = NotificationQueue::new(worker.sender().unwrap());

        let accepted = Outcome::Accepted {
            status: RegistrationStatus::Confirmed,
        };
        queue.enqueue(accepted, registration("s1"));
        queue.enqueue(accepted, registration("s2"));
        worker.stop().await;

        assert_eq!(*notifier.seen.lock(), vec!["accepted:s1", "accepted:s2"]);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_worker() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let mut worker = BackgroundWorker::start(NotificationRunnable::new(notifier), 8, 60_000);
        let queue = NotificationQueue::new(worker.sender().unwrap());

        queue.enqueue(Outcome::Waitlisted { position: 1 }, registration("s1"));
        queue.enqueue(Outcome::Waitlisted { position: 2 }, registration("s2"));
        worker.stop().await;
    }

    #[test]
    fn disabled_queue_discards() {
        NotificationQueue::disabled().enqueue(Outcome::Waitlisted { position: 1 }, registration("s1"));
    }
}
