use std::time::Duration;

use anyhow::{anyhow, Result};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::app::dispatch::Dispatcher;
use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::recipients::RecipientResolver;
use crate::app::writer::NotificationWriter;
use crate::config::AppConfig;
use crate::domain::event::NotificationFact;
use crate::infra::{cache::RedisCache, db::Db};

const ERROR_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub resolver_timeout: Duration,
    pub dispatch_timeout_ms: u64,
}

impl RelayConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.outbox_poll_interval_ms),
            batch_size: config.outbox_batch_size,
            max_attempts: config.outbox_max_attempts,
            resolver_timeout: Duration::from_millis(config.resolver_timeout_ms),
            dispatch_timeout_ms: config.dispatch_timeout_ms,
        }
    }
}

/// Worker-mode entry point: drain committed facts from the outbox into
/// notification rows and real-time pushes, forever.
pub async fn run(db: Db, cache: RedisCache, config: RelayConfig) -> Result<()> {
    info!("notification relay started");

    let resolver = RecipientResolver::postgres(db.clone());
    let writer = NotificationWriter::new(
        NotificationService::new(db.clone()),
        Dispatcher::new(cache, config.dispatch_timeout_ms),
    );

    loop {
        match drain_once(&db, &resolver, &writer, &config).await {
            Ok(0) => tokio::time::sleep(config.poll_interval).await,
            Ok(claimed) => debug!(claimed, "outbox batch handled"),
            Err(err) => {
                warn!(error = ?err, "outbox poll failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

/// Claim one batch with SKIP LOCKED so concurrent relay instances never
/// double-process a fact, then settle each row inside the claim
/// transaction. Returns the number of rows claimed.
///
/// Notification inserts happen outside this transaction; if the relay dies
/// between insert and settle, redelivery is absorbed by the writer's
/// duplicate suppression.
pub async fn drain_once(
    db: &Db,
    resolver: &RecipientResolver,
    writer: &NotificationWriter,
    config: &RelayConfig,
) -> Result<usize> {
    let mut tx = db.pool().begin().await?;

    let rows = sqlx::query(
        "SELECT id, fact FROM notification_outbox \
         WHERE processed_at IS NULL \
           AND attempts < $1 \
           AND next_attempt_at <= now() \
         ORDER BY id \
         LIMIT $2 \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(config.max_attempts)
    .bind(config.batch_size)
    .fetch_all(&mut *tx)
    .await?;

    for row in &rows {
        let outbox_id: i64 = row.get("id");
        let fact_json: serde_json::Value = row.get("fact");

        match process_fact(resolver, writer, fact_json, config.resolver_timeout).await {
            Ok(created) => {
                sqlx::query("UPDATE notification_outbox SET processed_at = now() WHERE id = $1")
                    .bind(outbox_id)
                    .execute(&mut *tx)
                    .await?;
                debug!(outbox_id, created, "fact processed");
            }
            Err(err) => {
                // Retryable by design: duplicate suppression makes a
                // replayed fact harmless, so timeouts and lookup failures
                // must fail the attempt rather than skip the fact.
                warn!(error = ?err, outbox_id, "fact processing failed, scheduling retry");
                sqlx::query(
                    "UPDATE notification_outbox \
                     SET attempts = attempts + 1, \
                         last_error = $2, \
                         next_attempt_at = now() + make_interval(secs => LEAST(60, 2 ^ (attempts + 1))) \
                     WHERE id = $1",
                )
                .bind(outbox_id)
                .bind(format!("{:#}", err))
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(rows.len())
}

async fn process_fact(
    resolver: &RecipientResolver,
    writer: &NotificationWriter,
    fact_json: serde_json::Value,
    resolver_timeout: Duration,
) -> Result<usize> {
    let fact: NotificationFact = serde_json::from_value(fact_json)
        .map_err(|err| anyhow!("unparseable fact: {}", err))?;

    let recipients = tokio::time::timeout(resolver_timeout, resolver.resolve(&fact))
        .await
        .map_err(|_| anyhow!("recipient resolution timed out"))??;

    let (direct_conversation_id, channel_id, message_id) = fact.context();

    let mut created = 0;
    for recipient_user_id in recipients {
        let new = NewNotification {
            recipient_user_id,
            actor_user_id: fact.actor_user_id(),
            direct_conversation_id,
            channel_id,
            message_id,
            notification_type: Some(fact.notification_type()),
            text: fact.text().to_string(),
        };
        if writer.create(new).await?.is_some() {
            created += 1;
        }
    }

    debug!(kind = fact.kind(), created, "notifications written");
    Ok(created)
}
