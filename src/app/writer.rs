use anyhow::{bail, Result};

use crate::app::dispatch::Dispatcher;
use crate::app::notifications::{NewNotification, NotificationService};
use crate::domain::notification::Notification;

/// Persist-then-push orchestration for one recipient. Safe to invoke more
/// than once for the same fact: a duplicate (recipient, message) persist is
/// a successful no-op, which is what makes at-least-once event delivery
/// upstream harmless.
#[derive(Clone)]
pub struct NotificationWriter {
    notifications: NotificationService,
    dispatcher: Dispatcher,
}

impl NotificationWriter {
    pub fn new(notifications: NotificationService, dispatcher: Dispatcher) -> Self {
        Self {
            notifications,
            dispatcher,
        }
    }

    /// Returns the stored row, or `None` when nothing was written (already
    /// notified, or the recipient is the actor). Validation failures are
    /// the only errors this surfaces besides store failures; a push
    /// failure never reaches the caller.
    pub async fn create(&self, new: NewNotification) -> Result<Option<Notification>> {
        if new.text.trim().is_empty() {
            bail!("notification text must not be empty");
        }

        // Guard independently of the resolver: a policy bug that returns
        // the actor must not produce a self-notification.
        if new.recipient_user_id == new.actor_user_id {
            tracing::warn!(
                actor = %new.actor_user_id,
                "refusing self-notification"
            );
            return Ok(None);
        }

        let created = self.notifications.create(&new).await?;

        match created {
            Some(notification) => {
                self.dispatcher.publish_detached(
                    notification.recipient_user_id,
                    notification.id,
                    notification.text.clone(),
                    notification.created_at,
                );
                Ok(Some(notification))
            }
            None => {
                tracing::debug!(
                    recipient = %new.recipient_user_id,
                    message_id = ?new.message_id,
                    "notification already exists, skipping"
                );
                Ok(None)
            }
        }
    }
}
