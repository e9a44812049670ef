use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{QueryBuilder, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::notification::{Notification, NotificationStatus, NotificationType};
use crate::infra::db::Db;

pub const DEFAULT_PAGE_SIZE: i64 = 30;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Server-side clamp; the caller's limit is advisory only.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_user_id: Uuid,
    pub actor_user_id: Uuid,
    pub direct_conversation_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub notification_type: Option<NotificationType>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub unread_only: bool,
    pub notification_type: Option<NotificationType>,
    pub since: Option<OffsetDateTime>,
    pub before: Option<OffsetDateTime>,
}

#[derive(Debug)]
pub struct CursorPage {
    pub items: Vec<Notification>,
    pub next_cursor: Option<(OffsetDateTime, Uuid)>,
    pub has_more: bool,
}

#[derive(Debug)]
pub struct OffsetPage {
    pub items: Vec<Notification>,
    pub next_page: Option<i64>,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert one notification row. Returns `None` when a row for the same
    /// (recipient, message) already exists; the partial unique index makes
    /// the second of two concurrent writers lose cleanly instead of racing.
    pub async fn create(&self, new: &NewNotification) -> Result<Option<Notification>> {
        let notification_type = new
            .notification_type
            .unwrap_or(NotificationType::Message);

        let row = sqlx::query(
            "INSERT INTO notifications \
                 (recipient_user_id, actor_user_id, direct_conversation_id, \
                  channel_id, message_id, notification_type, text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (recipient_user_id, message_id) WHERE message_id IS NOT NULL \
                 DO NOTHING \
             RETURNING id, recipient_user_id, actor_user_id, direct_conversation_id, \
                       channel_id, message_id, notification_type, status, text, \
                       created_at, read_at",
        )
        .bind(new.recipient_user_id)
        .bind(new.actor_user_id)
        .bind(new.direct_conversation_id)
        .bind(new.channel_id)
        .bind(new.message_id)
        .bind(notification_type.as_str())
        .bind(&new.text)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(from_row))
    }

    /// Keyset listing on (created_at DESC, id DESC). The cursor names the
    /// last row the caller saw; everything strictly earlier follows, so
    /// concurrent inserts cannot shift or repeat a page.
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ListFilter,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<CursorPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let mut query = self.select_for(user_id, filter);
        if let Some((created_at, id)) = cursor {
            query
                .push(" AND (created_at < ")
                .push_bind(created_at)
                .push(" OR (created_at = ")
                .push_bind(created_at)
                .push(" AND id < ")
                .push_bind(id)
                .push("))");
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows = query.build().fetch_all(self.db.pool()).await?;
        let mut items: Vec<Notification> = rows.into_iter().map(from_row).collect();

        let has_more = items.len() > limit as usize;
        if has_more {
            items.truncate(limit as usize);
        }
        let next_cursor = if has_more {
            items.last().map(|last| (last.created_at, last.id))
        } else {
            None
        };

        Ok(CursorPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Offset paging for small inboxes. Pages can drift under concurrent
    /// inserts; the cursor mode is the stable one.
    pub async fn list_page(
        &self,
        user_id: Uuid,
        filter: &ListFilter,
        page: i64,
        size: i64,
    ) -> Result<OffsetPage> {
        let size = size.clamp(1, MAX_PAGE_SIZE);
        let page = page.max(0);

        let mut query = self.select_for(user_id, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(size + 1)
            .push(" OFFSET ")
            .push_bind(page * size);

        let rows = query.build().fetch_all(self.db.pool()).await?;
        let mut items: Vec<Notification> = rows.into_iter().map(from_row).collect();

        let has_more = items.len() > size as usize;
        if has_more {
            items.truncate(size as usize);
        }

        Ok(OffsetPage {
            items,
            next_page: has_more.then_some(page + 1),
            has_more,
        })
    }

    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE recipient_user_id = $1 AND status = 'unread'",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// UNREAD -> READ for one row, scoped to its owner. Repeat calls and
    /// calls against another user's row report `false`; the two cases are
    /// deliberately indistinguishable.
    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET status = 'read', read_at = now() \
             WHERE id = $1 AND recipient_user_id = $2 AND status = 'unread'",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// One bulk UNREAD -> READ transition for everything the user owns.
    /// Rows created after the statement takes its snapshot stay unread.
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET status = 'read', read_at = now() \
             WHERE recipient_user_id = $1 AND status = 'unread'",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Shared SELECT prefix; filters apply before pagination so has_more
    /// and cursors agree with the filtered set.
    fn select_for(
        &self,
        user_id: Uuid,
        filter: &ListFilter,
    ) -> QueryBuilder<'static, sqlx::Postgres> {
        let mut query = QueryBuilder::new(
            "SELECT id, recipient_user_id, actor_user_id, direct_conversation_id, \
                    channel_id, message_id, notification_type, status, text, \
                    created_at, read_at \
             FROM notifications WHERE recipient_user_id = ",
        );
        query.push_bind(user_id);
        if filter.unread_only {
            query.push(" AND status = 'unread'");
        }
        if let Some(notification_type) = filter.notification_type {
            query
                .push(" AND notification_type = ")
                .push_bind(notification_type.as_str());
        }
        if let Some(since) = filter.since {
            query.push(" AND created_at >= ").push_bind(since);
        }
        if let Some(before) = filter.before {
            query.push(" AND created_at < ").push_bind(before);
        }
        query
    }
}

fn from_row(row: PgRow) -> Notification {
    let notification_type: String = row.get("notification_type");
    let status: String = row.get("status");
    Notification {
        id: row.get("id"),
        recipient_user_id: row.get("recipient_user_id"),
        actor_user_id: row.get("actor_user_id"),
        direct_conversation_id: row.get("direct_conversation_id"),
        channel_id: row.get("channel_id"),
        message_id: row.get("message_id"),
        notification_type: NotificationType::from_db(&notification_type),
        status: NotificationStatus::from_db(&status),
        text: row.get("text"),
        created_at: row.get("created_at"),
        read_at: row.get("read_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped_to_server_maximum() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(50)), 50);
        assert_eq!(clamp_limit(Some(100_000)), MAX_PAGE_SIZE);
    }
}
