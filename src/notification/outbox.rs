use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use super::{Notification, Notifier};
use crate::entity::notifications::ActiveModel as NotificationActive;

/// Persists outgoing messages to `notifications`, where the mail relay picks them up.
pub struct OutboxNotifier {
    orm: DatabaseConnection,
}

impl OutboxNotifier {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        NotificationActive {
            id: Set(Uuid::new_v4()),
            recipient: Set(notification.recipient.clone()),
            subject: Set(notification.subject.clone()),
            body: Set(notification.body.clone()),
            kind: Set(notification.kind),
            is_html: Set(notification.is_html),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(())
    }
}
