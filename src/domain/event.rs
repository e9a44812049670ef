use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::notification::NotificationType;

/// A committed domain event that may produce notifications. Facts are
/// appended to the outbox inside the transaction that performed the
/// triggering write, so the relay never observes a fact whose transaction
/// rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationFact {
    DirectMessage {
        actor_user_id: Uuid,
        direct_conversation_id: Uuid,
        message_id: Uuid,
        text: String,
    },
    ChannelMention {
        actor_user_id: Uuid,
        channel_id: Uuid,
        message_id: Uuid,
        mentioned_user_ids: Vec<Uuid>,
        text: String,
    },
    CardUpdate {
        actor_user_id: Uuid,
        card_id: Uuid,
        text: String,
    },
    BoardUpdate {
        actor_user_id: Uuid,
        board_id: Uuid,
        text: String,
    },
    Invite {
        actor_user_id: Uuid,
        invite_id: Uuid,
        text: String,
    },
    /// A bot addressed a specific user; the audience is already resolved.
    BotMessage {
        actor_user_id: Uuid,
        recipient_user_id: Uuid,
        message_id: Option<Uuid>,
        text: String,
    },
    /// Reminder for a calendar event; the actor is the event organizer.
    CalendarReminder {
        actor_user_id: Uuid,
        calendar_event_id: Uuid,
        text: String,
    },
}

impl NotificationFact {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationFact::DirectMessage { .. } => "direct_message",
            NotificationFact::ChannelMention { .. } => "channel_mention",
            NotificationFact::CardUpdate { .. } => "card_update",
            NotificationFact::BoardUpdate { .. } => "board_update",
            NotificationFact::Invite { .. } => "invite",
            NotificationFact::BotMessage { .. } => "bot_message",
            NotificationFact::CalendarReminder { .. } => "calendar_reminder",
        }
    }

    pub fn actor_user_id(&self) -> Uuid {
        match self {
            NotificationFact::DirectMessage { actor_user_id, .. }
            | NotificationFact::ChannelMention { actor_user_id, .. }
            | NotificationFact::CardUpdate { actor_user_id, .. }
            | NotificationFact::BoardUpdate { actor_user_id, .. }
            | NotificationFact::Invite { actor_user_id, .. }
            | NotificationFact::BotMessage { actor_user_id, .. }
            | NotificationFact::CalendarReminder { actor_user_id, .. } => *actor_user_id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            NotificationFact::DirectMessage { text, .. }
            | NotificationFact::ChannelMention { text, .. }
            | NotificationFact::CardUpdate { text, .. }
            | NotificationFact::BoardUpdate { text, .. }
            | NotificationFact::Invite { text, .. }
            | NotificationFact::BotMessage { text, .. }
            | NotificationFact::CalendarReminder { text, .. } => text,
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationFact::DirectMessage { .. } => NotificationType::Message,
            NotificationFact::ChannelMention { .. } => NotificationType::Mention,
            NotificationFact::CardUpdate { .. } => NotificationType::CardUpdate,
            NotificationFact::BoardUpdate { .. } => NotificationType::BoardUpdate,
            NotificationFact::Invite { .. } => NotificationType::Invite,
            NotificationFact::BotMessage { .. } => NotificationType::Bot,
            NotificationFact::CalendarReminder { .. } => NotificationType::CalendarEvent,
        }
    }

    /// Context pointers carried onto the stored notification. At most one
    /// primary context (conversation or channel) is populated per fact.
    pub fn context(&self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            NotificationFact::DirectMessage {
                direct_conversation_id,
                message_id,
                ..
            } => (Some(*direct_conversation_id), None, Some(*message_id)),
            NotificationFact::ChannelMention {
                channel_id,
                message_id,
                ..
            } => (None, Some(*channel_id), Some(*message_id)),
            NotificationFact::BotMessage { message_id, .. } => (None, None, *message_id),
            _ => (None, None, None),
        }
    }
}
