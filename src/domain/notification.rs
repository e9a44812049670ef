use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Classification of a notification. Stored as text; values the store does
/// not recognize fall back to `Message` so old rows survive enum changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Message,
    Mention,
    CardUpdate,
    BoardUpdate,
    Invite,
    Bot,
    CalendarEvent,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Message => "message",
            NotificationType::Mention => "mention",
            NotificationType::CardUpdate => "card_update",
            NotificationType::BoardUpdate => "board_update",
            NotificationType::Invite => "invite",
            NotificationType::Bot => "bot",
            NotificationType::CalendarEvent => "calendar_event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(NotificationType::Message),
            "mention" => Some(NotificationType::Mention),
            "card_update" => Some(NotificationType::CardUpdate),
            "board_update" => Some(NotificationType::BoardUpdate),
            "invite" => Some(NotificationType::Invite),
            "bot" => Some(NotificationType::Bot),
            "calendar_event" => Some(NotificationType::CalendarEvent),
            _ => None,
        }
    }

    pub fn from_db(value: &str) -> Self {
        Self::parse(value).unwrap_or(NotificationType::Message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
        }
    }

    pub fn from_db(value: &str) -> Self {
        if value == "read" {
            NotificationStatus::Read
        } else {
            NotificationStatus::Unread
        }
    }
}

/// One row per (recipient, triggering item). Created by the writer, mutated
/// only by the read-state transition, never deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub actor_user_id: Uuid,
    pub direct_conversation_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_round_trips_through_db_text() {
        for t in [
            NotificationType::Message,
            NotificationType::Mention,
            NotificationType::CardUpdate,
            NotificationType::BoardUpdate,
            NotificationType::Invite,
            NotificationType::Bot,
            NotificationType::CalendarEvent,
        ] {
            assert_eq!(NotificationType::from_db(t.as_str()), t);
        }
    }

    #[test]
    fn unknown_type_defaults_to_message() {
        assert_eq!(
            NotificationType::from_db("carrier_pigeon"),
            NotificationType::Message
        );
    }
}
