//! Redis-backed `Queue` (spec.md §4.J, SPEC_FULL.md §N).
//!
//! A single list holds pending messages; `RPUSH` enqueues, `BLPOP`
//! dequeues and removes in one step, so `ack` has nothing left to do.

use redis::AsyncCommands;

use crate::errors::QueueError;
use crate::queue::{Message, Queue, Receipt};

const LIST_KEY: &str = "guardian:work";
const BLOCK_TIMEOUT_SECS: f64 = 1.0;

pub struct RedisQueue {
    client: redis::Client,
}

impl RedisQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::Send(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Queue for RedisQueue {
    async fn send(&self, message: &Message) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Send(e.to_string()))?;
        let payload = serde_json::to_string(message).map_err(|e| QueueError::Send(e.to_string()))?;
        let _: () = conn
            .rpush(LIST_KEY, payload)
            .await
            .map_err(|e| QueueError::Send(e.to_string()))?;
        Ok(())
    }

    async fn receive(&self, max: u32) -> Result<Vec<(Receipt, Message)>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let mut received = Vec::new();
        for _ in 0..max {
            let popped: Option<(String, String)> = conn
                .blpop(LIST_KEY, BLOCK_TIMEOUT_SECS)
                .await
                .map_err(|e| QueueError::Receive(e.to_string()))?;

            let Some((_key, payload)) = popped else {
                break;
            };

            match serde_json::from_str::<Message>(&payload) {
                Ok(message) => received.push((payload, message)),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping a malformed queue message");
                }
            }
        }
        Ok(received)
    }

    /// `BLPOP` already removed the message from the list; nothing to do.
    async fn ack(&self, _receipt: &Receipt) -> Result<(), QueueError> {
        Ok(())
    }
}
