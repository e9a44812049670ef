//! Read-only lookups into the chat, kanban, calendar, and preference
//! domains. The resolver depends on these narrow traits rather than on the
//! owning services, so policy can be tested with fakes and the other
//! domains can evolve their storage freely.

use std::collections::HashSet;

use anyhow::Result;
use uuid::Uuid;

use crate::infra::db::Db;

/// Scope of a per-user notification mute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuteScope {
    Conversation,
    Channel,
    Card,
    Board,
}

impl MuteScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuteScope::Conversation => "conversation",
            MuteScope::Channel => "channel",
            MuteScope::Card => "card",
            MuteScope::Board => "board",
        }
    }
}

#[axum::async_trait]
pub trait ConversationDirectory: Send + Sync {
    async fn participants(&self, conversation_id: Uuid) -> Result<HashSet<Uuid>>;
}

#[axum::async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn can_view(&self, user_id: Uuid, channel_id: Uuid) -> Result<bool>;
}

#[axum::async_trait]
pub trait CardDirectory: Send + Sync {
    async fn assignees_and_watchers(&self, card_id: Uuid) -> Result<HashSet<Uuid>>;
}

#[axum::async_trait]
pub trait BoardDirectory: Send + Sync {
    async fn watchers(&self, board_id: Uuid) -> Result<HashSet<Uuid>>;
}

#[axum::async_trait]
pub trait InviteDirectory: Send + Sync {
    async fn invitees(&self, invite_id: Uuid) -> Result<HashSet<Uuid>>;
}

#[axum::async_trait]
pub trait CalendarDirectory: Send + Sync {
    async fn attendees_due(&self, event_id: Uuid) -> Result<HashSet<Uuid>>;
}

#[axum::async_trait]
pub trait PreferenceDirectory: Send + Sync {
    async fn is_muted(&self, user_id: Uuid, scope: MuteScope, scope_id: Uuid) -> Result<bool>;
    async fn is_dnd_active(&self, user_id: Uuid) -> Result<bool>;
}

/// Every lookup backed by the shared Postgres schema.
#[derive(Clone)]
pub struct PgDirectory {
    db: Db,
}

impl PgDirectory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn id_set(&self, sql: &str, key: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(sql)
            .bind(key)
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids.into_iter().collect())
    }
}

#[axum::async_trait]
impl ConversationDirectory for PgDirectory {
    async fn participants(&self, conversation_id: Uuid) -> Result<HashSet<Uuid>> {
        self.id_set(
            "SELECT user_id FROM direct_conversation_participants WHERE conversation_id = $1",
            conversation_id,
        )
        .await
    }
}

#[axum::async_trait]
impl ChannelDirectory for PgDirectory {
    async fn can_view(&self, user_id: Uuid, channel_id: Uuid) -> Result<bool> {
        let visible: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM channel_members WHERE channel_id = $1 AND user_id = $2)",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(visible)
    }
}

#[axum::async_trait]
impl CardDirectory for PgDirectory {
    async fn assignees_and_watchers(&self, card_id: Uuid) -> Result<HashSet<Uuid>> {
        self.id_set(
            "SELECT user_id FROM card_assignees WHERE card_id = $1 \
             UNION \
             SELECT user_id FROM card_watchers WHERE card_id = $1",
            card_id,
        )
        .await
    }
}

#[axum::async_trait]
impl BoardDirectory for PgDirectory {
    async fn watchers(&self, board_id: Uuid) -> Result<HashSet<Uuid>> {
        self.id_set(
            "SELECT user_id FROM board_watchers WHERE board_id = $1",
            board_id,
        )
        .await
    }
}

#[axum::async_trait]
impl InviteDirectory for PgDirectory {
    async fn invitees(&self, invite_id: Uuid) -> Result<HashSet<Uuid>> {
        self.id_set(
            "SELECT invitee_user_id FROM invites WHERE id = $1",
            invite_id,
        )
        .await
    }
}

#[axum::async_trait]
impl CalendarDirectory for PgDirectory {
    async fn attendees_due(&self, event_id: Uuid) -> Result<HashSet<Uuid>> {
        self.id_set(
            "SELECT user_id FROM calendar_event_attendees \
             WHERE event_id = $1 AND reminder_at IS NOT NULL AND reminder_at <= now()",
            event_id,
        )
        .await
    }
}

#[axum::async_trait]
impl PreferenceDirectory for PgDirectory {
    async fn is_muted(&self, user_id: Uuid, scope: MuteScope, scope_id: Uuid) -> Result<bool> {
        let muted: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM notification_mutes \
                WHERE user_id = $1 AND scope = $2 AND scope_id = $3 \
             )",
        )
        .bind(user_id)
        .bind(scope.as_str())
        .bind(scope_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(muted)
    }

    async fn is_dnd_active(&self, user_id: Uuid) -> Result<bool> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM notification_prefs \
                WHERE user_id = $1 AND dnd_until IS NOT NULL AND dnd_until > now() \
             )",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(active)
    }
}
