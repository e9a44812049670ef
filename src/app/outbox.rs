use anyhow::Result;
use sqlx::{Postgres, Transaction};

use crate::domain::event::NotificationFact;
use crate::infra::db::Db;

/// Append-side of the outbox. Producers enqueue the fact in the same
/// transaction as the write that caused it, so the relay only ever sees
/// facts whose originating transaction committed.
#[derive(Clone)]
pub struct OutboxService {
    db: Db,
}

impl OutboxService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn enqueue_with_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        fact: &NotificationFact,
    ) -> Result<i64> {
        let payload = serde_json::to_value(fact)?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO notification_outbox (fact) VALUES ($1) RETURNING id",
        )
        .bind(payload)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Convenience for producers whose triggering write already committed
    /// (and for tests): enqueue in a transaction of its own.
    pub async fn enqueue(&self, fact: &NotificationFact) -> Result<i64> {
        let mut tx = self.db.pool().begin().await?;
        let id = self.enqueue_with_tx(&mut tx, fact).await?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE processed_at IS NULL",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}
