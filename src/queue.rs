//! Work queue abstraction (spec.md §4.J, §6).
//!
//! The worker dequeues JSON messages describing one of two commands.
//! `RedisQueue` is the reference backing implementation; nothing in the
//! worker depends on Redis directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::QueueError;
use crate::scan::CollectionFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    #[serde(rename = "VALIDATE_ALL")]
    ValidateAll(ValidateAllPayload),
    #[serde(rename = "REPAIR_ALL")]
    RepairAll(RepairAllPayload),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateAllPayload {
    #[serde(default)]
    pub filter: CollectionFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAllPayload {
    pub report_id: String,
}

/// A receipt a queue hands back for a dequeued message, opaque to callers
/// other than the queue that issued it — `RedisQueue::ack` is a no-op
/// because `BLPOP` already removed the message, but other queue
/// implementations may need it to complete a visibility timeout.
pub type Receipt = String;

#[async_trait]
pub trait Queue: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), QueueError>;
    async fn receive(&self, max: u32) -> Result<Vec<(Receipt, Message)>, QueueError>;
    async fn ack(&self, receipt: &Receipt) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_all_round_trips_through_json() {
        let message = Message::ValidateAll(ValidateAllPayload {
            filter: CollectionFilter {
                include: Some(vec!["yachts".to_string()]),
                exclude: None,
            },
        });
        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        match parsed {
            Message::ValidateAll(payload) => {
                assert_eq!(payload.filter.include, Some(vec!["yachts".to_string()]))
            }
            _ => panic!("expected VALIDATE_ALL"),
        }
    }

    #[test]
    fn repair_all_round_trips_through_json() {
        let message = Message::RepairAll(RepairAllPayload {
            report_id: "abc-123".to_string(),
        });
        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        match parsed {
            Message::RepairAll(payload) => assert_eq!(payload.report_id, "abc-123"),
            _ => panic!("expected REPAIR_ALL"),
        }
    }

    #[test]
    fn malformed_json_fails_to_parse() {
        let result: Result<Message, _> = serde_json::from_str("{\"type\":\"UNKNOWN\"}");
        assert!(result.is_err());
    }
}
