use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::infra::cache::RedisCache;

/// Redis channel a connected client subscribes to for its own inbox.
pub fn user_channel(user_id: Uuid) -> String {
    format!("notify:user:{}", user_id)
}

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    id: Uuid,
    text: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

/// Best-effort real-time push. At-most-once, non-durable: with no live
/// subscriber the publish lands nowhere and the client catches up on its
/// next query. Durability lives entirely in the notification store.
#[derive(Clone)]
pub struct Dispatcher {
    cache: RedisCache,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(cache: RedisCache, timeout_ms: u64) -> Self {
        Self {
            cache,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Publish the minimal payload, returning how many live connections
    /// received it.
    pub async fn publish(
        &self,
        recipient_user_id: Uuid,
        notification_id: Uuid,
        text: &str,
        created_at: OffsetDateTime,
    ) -> Result<usize> {
        let payload = serde_json::to_string(&PushPayload {
            id: notification_id,
            text,
            created_at,
        })?;

        let receivers = tokio::time::timeout(
            self.timeout,
            self.cache.publish(&user_channel(recipient_user_id), &payload),
        )
        .await
        .map_err(|_| anyhow!("realtime push timed out"))??;

        Ok(receivers)
    }

    /// Fire-and-forget variant used on the write path: the push runs on its
    /// own task with a bounded timeout and no retry, so a slow or
    /// disconnected recipient never delays the writer's caller.
    pub fn publish_detached(
        &self,
        recipient_user_id: Uuid,
        notification_id: Uuid,
        text: String,
        created_at: OffsetDateTime,
    ) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher
                .publish(recipient_user_id, notification_id, &text, created_at)
                .await
            {
                Ok(receivers) => {
                    tracing::debug!(
                        notification_id = %notification_id,
                        recipient = %recipient_user_id,
                        receivers,
                        "realtime push delivered"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        error = ?err,
                        notification_id = %notification_id,
                        recipient = %recipient_user_id,
                        "realtime push failed"
                    );
                }
            }
        });
    }
}
