use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::app::directory::{
    BoardDirectory, CalendarDirectory, CardDirectory, ChannelDirectory, ConversationDirectory,
    InviteDirectory, MuteScope, PgDirectory, PreferenceDirectory,
};
use crate::domain::event::NotificationFact;
use crate::infra::db::Db;

/// Pure audience policy: given a committed fact, decide who should be told.
/// Performs read-only lookups and no writes. Any lookup failure propagates;
/// silently over- or under-notifying on a degraded lookup is worse than
/// failing the fact and letting the outbox retry it.
#[derive(Clone)]
pub struct RecipientResolver {
    conversations: Arc<dyn ConversationDirectory>,
    channels: Arc<dyn ChannelDirectory>,
    cards: Arc<dyn CardDirectory>,
    boards: Arc<dyn BoardDirectory>,
    invites: Arc<dyn InviteDirectory>,
    calendar: Arc<dyn CalendarDirectory>,
    prefs: Arc<dyn PreferenceDirectory>,
}

impl RecipientResolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversations: Arc<dyn ConversationDirectory>,
        channels: Arc<dyn ChannelDirectory>,
        cards: Arc<dyn CardDirectory>,
        boards: Arc<dyn BoardDirectory>,
        invites: Arc<dyn InviteDirectory>,
        calendar: Arc<dyn CalendarDirectory>,
        prefs: Arc<dyn PreferenceDirectory>,
    ) -> Self {
        Self {
            conversations,
            channels,
            cards,
            boards,
            invites,
            calendar,
            prefs,
        }
    }

    /// All lookups served by the shared Postgres schema.
    pub fn postgres(db: Db) -> Self {
        let directory = Arc::new(PgDirectory::new(db));
        Self {
            conversations: directory.clone(),
            channels: directory.clone(),
            cards: directory.clone(),
            boards: directory.clone(),
            invites: directory.clone(),
            calendar: directory.clone(),
            prefs: directory,
        }
    }

    pub async fn resolve(&self, fact: &NotificationFact) -> Result<HashSet<Uuid>> {
        match fact {
            NotificationFact::DirectMessage {
                actor_user_id,
                direct_conversation_id,
                ..
            } => {
                let mut recipients = self.conversations.participants(*direct_conversation_id).await?;
                recipients.remove(actor_user_id);
                let recipients = self
                    .drop_muted(recipients, MuteScope::Conversation, *direct_conversation_id)
                    .await?;
                self.drop_dnd(recipients).await
            }
            NotificationFact::ChannelMention {
                actor_user_id,
                channel_id,
                mentioned_user_ids,
                ..
            } => {
                // Mentions are precise: only the explicitly named users,
                // never the channel at large.
                let mut mentioned: HashSet<Uuid> = mentioned_user_ids.iter().copied().collect();
                mentioned.remove(actor_user_id);

                let mut visible = HashSet::with_capacity(mentioned.len());
                for user_id in mentioned {
                    if self.channels.can_view(user_id, *channel_id).await? {
                        visible.insert(user_id);
                    }
                }
                let recipients = self
                    .drop_muted(visible, MuteScope::Channel, *channel_id)
                    .await?;
                self.drop_dnd(recipients).await
            }
            NotificationFact::CardUpdate {
                actor_user_id,
                card_id,
                ..
            } => {
                let mut recipients = self.cards.assignees_and_watchers(*card_id).await?;
                recipients.remove(actor_user_id);
                let recipients = self.drop_muted(recipients, MuteScope::Card, *card_id).await?;
                self.drop_dnd(recipients).await
            }
            NotificationFact::BoardUpdate {
                actor_user_id,
                board_id,
                ..
            } => {
                let mut recipients = self.boards.watchers(*board_id).await?;
                recipients.remove(actor_user_id);
                let recipients = self
                    .drop_muted(recipients, MuteScope::Board, *board_id)
                    .await?;
                self.drop_dnd(recipients).await
            }
            NotificationFact::Invite {
                actor_user_id,
                invite_id,
                ..
            } => {
                let mut recipients = self.invites.invitees(*invite_id).await?;
                recipients.remove(actor_user_id);
                self.drop_dnd(recipients).await
            }
            NotificationFact::BotMessage {
                actor_user_id,
                recipient_user_id,
                ..
            } => {
                let mut recipients = HashSet::from([*recipient_user_id]);
                recipients.remove(actor_user_id);
                self.drop_dnd(recipients).await
            }
            NotificationFact::CalendarReminder {
                actor_user_id,
                calendar_event_id,
                ..
            } => {
                let mut recipients = self.calendar.attendees_due(*calendar_event_id).await?;
                recipients.remove(actor_user_id);
                self.drop_dnd(recipients).await
            }
        }
    }

    async fn drop_muted(
        &self,
        recipients: HashSet<Uuid>,
        scope: MuteScope,
        scope_id: Uuid,
    ) -> Result<HashSet<Uuid>> {
        let mut kept = HashSet::with_capacity(recipients.len());
        for user_id in recipients {
            if !self.prefs.is_muted(user_id, scope, scope_id).await? {
                kept.insert(user_id);
            }
        }
        Ok(kept)
    }

    async fn drop_dnd(&self, recipients: HashSet<Uuid>) -> Result<HashSet<Uuid>> {
        let mut kept = HashSet::with_capacity(recipients.len());
        for user_id in recipients {
            if !self.prefs.is_dnd_active(user_id).await? {
                kept.insert(user_id);
            }
        }
        Ok(kept)
    }
}
