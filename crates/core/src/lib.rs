//! Core data model for the WxLink broadcast queue.
//!
//! Pure algorithms only: the deduplicating message store and the bin-packing
//! packetizer. All I/O and scheduling lives in `wxlink_radio`.

pub mod message;
pub mod packet;
pub mod store;

pub use message::QueuedMessage;
pub use packet::{build_send_list, Packet, DELIMITER, MAX_PACKET_SIZE};
pub use store::MessageStore;
