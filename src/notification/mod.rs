//! Outbound customer notifications.
//!
//! Core operations hand a [`Notification`] to the [`NotificationDispatcher`]
//! after their transaction commits. The dispatcher only enqueues; a worker
//! task drains the queue into a [`Notifier`] and logs delivery failures, so
//! nothing downstream can undo or delay a committed state change.

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::entity::sea_orm_active_enums::NotificationKind;

mod outbox;
pub mod templates;

pub use outbox::OutboxNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub kind: NotificationKind,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Dispatcher plus the receiving end of its queue, for callers that drain it themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Starts a worker that delivers every queued notification through `notifier`.
    ///
    /// The worker stops once every dispatcher clone has been dropped.
    pub fn spawn<N: Notifier>(notifier: N) -> (Self, JoinHandle<()>) {
        let (dispatcher, mut receiver) = Self::channel();
        let handle = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match notifier.send(&notification).await {
                    Ok(()) => tracing::debug!(
                        recipient = %notification.recipient,
                        kind = ?notification.kind,
                        "notification delivered"
                    ),
                    Err(err) => tracing::error!(
                        error = %err,
                        recipient = %notification.recipient,
                        kind = ?notification.kind,
                        "notification delivery failed"
                    ),
                }
            }
            tracing::info!("notification worker stopped");
        });
        (dispatcher, handle)
    }

    /// Fire-and-forget. Never fails the caller.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(err) = self.sender.send(notification) {
            tracing::warn!(
                recipient = %err.0.recipient,
                kind = ?err.0.kind,
                "notification queue closed, message dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            if notification.recipient.starts_with("bounce") {
                anyhow::bail!("mailbox unavailable");
            }
            self.0.lock().unwrap().push(notification.recipient.clone());
            Ok(())
        }
    }

    fn message(recipient: &str) -> Notification {
        Notification {
            recipient: recipient.to_string(),
            subject: "subject".into(),
            body: "body".into(),
            is_html: false,
            kind: NotificationKind::OrderConfirmation,
        }
    }

    #[tokio::test]
    async fn worker_survives_delivery_failures() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, handle) = NotificationDispatcher::spawn(Recording(sent.clone()));

        dispatcher.dispatch(message("a@example.com"));
        dispatcher.dispatch(message("bounce@example.com"));
        dispatcher.dispatch(message("b@example.com"));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(*sent.lock().unwrap(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn dispatch_on_closed_queue_is_silent() {
        let (dispatcher, receiver) = NotificationDispatcher::channel();
        drop(receiver);
        dispatcher.dispatch(message("a@example.com"));
    }
}
