use std::time::{Duration, Instant};

/// A pending broadcast message.
///
/// Messages are keyed by `id`: queueing a second message with the same id
/// replaces the first one wholesale (payload, priority and expiry), so a
/// fresher report for the same station simply supersedes the stale one.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: String,
    pub payload: Vec<u8>,
    /// Lower value is transmitted earlier.
    pub priority: u8,
    /// The message is dropped by the maintenance sweep once this instant has
    /// strictly passed.
    pub expiry: Instant,
}

impl QueuedMessage {
    pub fn new(id: impl Into<String>, payload: Vec<u8>, priority: u8, expiry: Instant) -> Self {
        Self {
            id: id.into(),
            payload,
            priority,
            expiry,
        }
    }

    /// Convenience constructor for messages that expire `ttl` from now.
    pub fn with_ttl(id: impl Into<String>, payload: Vec<u8>, priority: u8, ttl: Duration) -> Self {
        Self::new(id, payload, priority, Instant::now() + ttl)
    }
}
