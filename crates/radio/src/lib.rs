//! Narrowband broadcast link: the transport capability and the cyclic
//! transmission scheduler that drains the message queue over it.

use std::time::Duration;

use iridium_sbd::SessionStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod scheduler;
pub mod simulated;
pub mod transport;

pub use scheduler::{BroadcastScheduler, SchedulerStats};
pub use simulated::SimulatedTransport;
pub use transport::{RawTransport, SbdTransport, Transport};

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("packet exceeds maximum packet size")]
    PacketTooLarge,

    #[error("link io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("link timed out")]
    Timeout,

    #[error("message rejected by network: {0}")]
    Rejected(SessionStatus),

    #[error("link transmission failed: {0}")]
    TransmissionFailed(String),

    #[error("link closed")]
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Period of the send slot: the worst-case on-air time of one
    /// maximum-size packet. One packet goes out per slot.
    pub send_interval: Duration,
    /// Period of the maintenance slot: expired messages are swept and the
    /// send list rebuilt, once the current list has fully cycled.
    pub maintenance_interval: Duration,
    /// Depth of the producer channel feeding the scheduler.
    pub queue_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(30),
            maintenance_interval: Duration::from_secs(10),
            queue_capacity: 64,
        }
    }
}
