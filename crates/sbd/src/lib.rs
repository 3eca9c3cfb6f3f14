//! Protocol driver for Iridium Short Burst Data modems.
//!
//! The modem is controlled over a half-duplex serial line with CR-terminated
//! AT commands. [`SbdModem`] owns a reader and a writer task and exposes the
//! command/response exchanges built on top of them: text and binary message
//! sends, signal-quality and device-time queries, and the session status
//! reported by the network after each send attempt.

use std::time::Duration;

use thiserror::Error;

pub mod codec;
pub mod modem;
pub mod status;

pub use codec::AtCodec;
pub use modem::{Expect, SbdModem};
pub use status::{binary_checksum, SessionStatus, MO_STATUS_SENT};

#[derive(Debug, Error)]
pub enum SbdError {
    #[error("serial io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] tokio_serial::Error),

    #[error("no matching response before timeout")]
    Timeout,

    #[error("driver closed")]
    Closed,

    #[error("invalid response frame: {0}")]
    Parse(String),

    #[error("message rejected by network: {0}")]
    SendFailed(SessionStatus),
}

#[derive(Clone, Debug)]
pub struct SbdConfig {
    pub device: String,
    pub baud: u32,
    /// How long one exchange may wait for its matching response line.
    pub response_timeout: Duration,
}

impl SbdConfig {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud: 19_200,
            response_timeout: Duration::from_secs(300),
        }
    }
}
