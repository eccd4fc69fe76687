use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Canonical key for the thread between two users, independent of order
pub fn conversation_key(a: Uuid, b: Uuid) -> String {
    let (low, high) = sorted_pair(a, b);
    format!("{}:{}", low, high)
}

pub fn sorted_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestMessage {
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Longest body kept in the latest-message snapshot
const SNAPSHOT_CHARS: usize = 140;

impl LatestMessage {
    pub fn from_message(message: &Message) -> Self {
        Self {
            sender_id: message.sender_id,
            body: message.body.chars().take(SNAPSHOT_CHARS).collect(),
            sent_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub conversation_key: String,
    pub participants: Vec<Uuid>,
    pub product_id: Option<Uuid>,
    pub last_read: Json<HashMap<Uuid, DateTime<Utc>>>,
    pub latest_message: Option<Json<LatestMessage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        self.participants.iter().copied().find(|p| *p != user_id)
    }

    pub fn last_read_by(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.last_read.get(&user_id).copied()
    }

    /// Whether the latest message is something `user_id` has not seen
    pub fn has_unread_for(&self, user_id: Uuid) -> bool {
        match &self.latest_message {
            Some(latest) if latest.sender_id != user_id => match self.last_read_by(user_id) {
                Some(read_at) => latest.sent_at > read_at,
                None => true,
            },
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Messages `reader` has not seen: sent by someone else after `read_at`
pub fn count_unread(messages: &[Message], reader: Uuid, read_at: Option<DateTime<Utc>>) -> usize {
    messages
        .iter()
        .filter(|m| m.sender_id != reader)
        .filter(|m| read_at.map_or(true, |at| m.created_at > at))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(sender: Uuid, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::nil(),
            sender_id: sender,
            body: "Is the pickle still available?".to_string(),
            attachments: vec![],
            created_at: at,
        }
    }

    #[test]
    fn key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(conversation_key(a, b), conversation_key(b, a));
        assert!(conversation_key(a, b).contains(':'));
    }

    #[test]
    fn own_messages_are_never_unread() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let now = Utc::now();
        let messages = vec![message(me, now), message(them, now), message(me, now)];

        assert_eq!(count_unread(&messages, me, None), 1);
        assert_eq!(count_unread(&messages, them, None), 2);
    }

    #[test]
    fn unread_respects_last_read() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let now = Utc::now();
        let messages = vec![
            message(them, now - Duration::minutes(10)),
            message(them, now - Duration::minutes(1)),
        ];
        assert_eq!(count_unread(&messages, me, Some(now - Duration::minutes(5))), 1);
        assert_eq!(count_unread(&messages, me, Some(now)), 0);
    }

    #[test]
    fn snapshot_unread_flag() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let now = Utc::now();
        let (low, high) = sorted_pair(me, them);
        let mut conversation = Conversation {
            id: Uuid::new_v4(),
            conversation_key: conversation_key(me, them),
            participants: vec![low, high],
            product_id: None,
            last_read: Json(HashMap::new()),
            latest_message: Some(Json(LatestMessage::from_message(&message(them, now)))),
            created_at: now,
            updated_at: now,
        };

        assert!(conversation.has_unread_for(me));
        assert!(!conversation.has_unread_for(them));
        assert_eq!(conversation.other_participant(me), Some(them));

        conversation.last_read.0.insert(me, now);
        assert!(!conversation.has_unread_for(me));
    }

    #[test]
    fn snapshot_truncates_long_bodies() {
        let mut long = message(Uuid::new_v4(), Utc::now());
        long.body = "x".repeat(500);
        assert_eq!(LatestMessage::from_message(&long).body.chars().count(), 140);
    }
}
