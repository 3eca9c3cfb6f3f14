//! Bin-packing packetizer: turns the current store contents into an ordered
//! list of size-bounded packets.

use std::collections::BTreeMap;

use crate::{MessageStore, QueuedMessage};

/// Largest transmission unit the link accepts, in bytes.
pub const MAX_PACKET_SIZE: usize = 255;

/// Separator inserted between coalesced message payloads.
pub const DELIMITER: u8 = b'|';

/// One fixed-size transmission unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    fn from_payload(payload: &[u8]) -> Self {
        Self {
            bytes: payload.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build the send list for the given store contents.
///
/// Messages are grouped by priority (ascending, lower first) and ordered by
/// id within a group so the output is deterministic. Oversized payloads are
/// split into exact chunks of at most [`MAX_PACKET_SIZE`] bytes; everything
/// else is coalesced onto the most recently started packet, `|`-separated,
/// when it fits. Coalescing never backtracks to earlier packets.
pub fn build_send_list(store: &MessageStore) -> Vec<Packet> {
    let mut by_priority: BTreeMap<u8, Vec<&QueuedMessage>> = BTreeMap::new();
    for msg in store.messages() {
        by_priority.entry(msg.priority).or_default().push(msg);
    }

    let mut list: Vec<Packet> = Vec::new();
    for (_, mut group) in by_priority {
        group.sort_by(|a, b| a.id.cmp(&b.id));
        for msg in group {
            if msg.payload.len() > MAX_PACKET_SIZE {
                // Exact partition: concatenating the fragments reproduces the
                // payload byte-for-byte.
                for chunk in msg.payload.chunks(MAX_PACKET_SIZE) {
                    list.push(Packet::from_payload(chunk));
                }
                continue;
            }
            match list.last_mut() {
                Some(last) if last.bytes.len() + msg.payload.len() + 1 < MAX_PACKET_SIZE => {
                    last.bytes.push(DELIMITER);
                    last.bytes.extend_from_slice(&msg.payload);
                }
                _ => list.push(Packet::from_payload(&msg.payload)),
            }
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn msg(id: &str, payload: &[u8], priority: u8) -> QueuedMessage {
        QueuedMessage::new(id, payload.to_vec(), priority, Instant::now() + Duration::from_secs(60))
    }

    fn store_of(messages: Vec<QueuedMessage>) -> MessageStore {
        let mut store = MessageStore::new();
        for m in messages {
            store.put(m);
        }
        store
    }

    #[test]
    fn empty_store_empty_list() {
        assert!(build_send_list(&MessageStore::new()).is_empty());
    }

    #[test]
    fn every_packet_within_size_bound() {
        let store = store_of(vec![
            msg("a", &[b'x'; 700], 1),
            msg("b", &[b'y'; 255], 2),
            msg("c", b"short", 2),
            msg("d", &[b'z'; 254], 3),
        ]);
        for packet in build_send_list(&store) {
            assert!(packet.len() <= MAX_PACKET_SIZE);
        }
    }

    #[test]
    fn same_priority_coalesces_before_lower_priority() {
        let store = store_of(vec![
            msg("KBOS", b"METAR KBOS 251954Z", 5),
            msg("KJFK", b"METAR KJFK 251951Z", 5),
            msg("KLGA", b"TAF KLGA 251720Z", 10),
        ]);

        let list = build_send_list(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[0].as_bytes(),
            b"METAR KBOS 251954Z|METAR KJFK 251951Z".as_slice()
        );
        assert_eq!(list[1].as_bytes(), b"TAF KLGA 251720Z".as_slice());
    }

    #[test]
    fn within_priority_order_is_by_id() {
        let store = store_of(vec![
            msg("b", b"second", 1),
            msg("a", b"first", 1),
            msg("c", b"third", 1),
        ]);
        let list = build_send_list(&store);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_bytes(), b"first|second|third".as_slice());
    }

    #[test]
    fn oversized_payload_fragments_losslessly() {
        let payload: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
        let store = store_of(vec![msg("big", &payload, 1)]);

        let list = build_send_list(&store);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].len(), 255);
        assert_eq!(list[1].len(), 255);
        assert_eq!(list[2].len(), 190);

        let mut reassembled = Vec::new();
        for packet in &list {
            reassembled.extend_from_slice(packet.as_bytes());
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn max_size_payload_starts_its_own_packet() {
        let store = store_of(vec![
            msg("a", b"tiny", 1),
            msg("b", &[b'q'; MAX_PACKET_SIZE], 1),
        ]);
        let list = build_send_list(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].as_bytes(), b"tiny".as_slice());
        assert_eq!(list[1].len(), MAX_PACKET_SIZE);
    }

    #[test]
    fn coalescing_only_looks_at_last_packet() {
        // First packet has room left, but once a new packet is started the
        // packetizer never backtracks to fill it.
        let store = store_of(vec![
            msg("a", &[b'a'; 200], 1),
            msg("b", &[b'b'; 200], 1),
            msg("c", b"x", 1),
        ]);
        let list = build_send_list(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].len(), 200);
        assert_eq!(list[1].len(), 202); // 200 + '|' + 'x'
    }
}
