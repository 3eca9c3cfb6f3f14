use std::collections::HashMap;
use std::time::Instant;

use crate::QueuedMessage;

/// In-memory store of pending messages, keyed by message id.
///
/// The store is owned by the scheduler task and is never shared: producers
/// hand messages over on a channel, so no locking is needed here. Expired
/// entries are removed by [`MessageStore::sweep`], which builds a fresh store
/// instead of mutating in place so a send list built from the old contents
/// stays valid.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    entries: HashMap<String, QueuedMessage>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, replacing any existing entry with the same id.
    pub fn put(&mut self, msg: QueuedMessage) {
        self.entries.insert(msg.id.clone(), msg);
    }

    /// Return a new store containing only entries that have not expired.
    ///
    /// An entry expiring exactly at `now` is retained; removal requires `now`
    /// to be strictly past the expiry.
    pub fn sweep(&self, now: Instant) -> MessageStore {
        let entries = self
            .entries
            .iter()
            .filter(|(_, m)| m.expiry >= now)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        MessageStore { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QueuedMessage> {
        self.entries.get(id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn put_replaces_by_id() {
        let mut store = MessageStore::new();
        let now = Instant::now();
        store.put(QueuedMessage::new("METAR/KJFK", b"old".to_vec(), 10, now));
        store.put(QueuedMessage::new(
            "METAR/KJFK",
            b"new".to_vec(),
            5,
            now + Duration::from_secs(60),
        ));

        assert_eq!(store.len(), 1);
        let msg = store.get("METAR/KJFK").unwrap();
        assert_eq!(msg.payload, b"new");
        assert_eq!(msg.priority, 5);
        assert_eq!(msg.expiry, now + Duration::from_secs(60));
    }

    #[test]
    fn sweep_drops_only_strictly_expired() {
        let mut store = MessageStore::new();
        let now = Instant::now();
        store.put(QueuedMessage::new("at-now", vec![1], 1, now));
        store.put(QueuedMessage::new(
            "expired",
            vec![2],
            1,
            now - Duration::from_secs(1),
        ));
        store.put(QueuedMessage::new(
            "fresh",
            vec![3],
            1,
            now + Duration::from_secs(1),
        ));

        let swept = store.sweep(now);
        assert_eq!(swept.len(), 2);
        assert!(swept.get("at-now").is_some());
        assert!(swept.get("fresh").is_some());
        assert!(swept.get("expired").is_none());
        // The original store is untouched.
        assert_eq!(store.len(), 3);
    }
}
