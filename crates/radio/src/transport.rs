//! The transport capability: one packet in, success or failure out.
//!
//! The scheduler never assumes acknowledgment semantics. The modem transport
//! reports real network dispositions; the raw transport reports only that
//! the bytes left the port, and reliability comes from the scheduler's
//! cyclic retransmission.

use std::sync::Arc;

use async_trait::async_trait;
use iridium_sbd::{SbdError, SbdModem};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::RadioError;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, packet: &[u8]) -> Result<(), RadioError>;
}

impl From<SbdError> for RadioError {
    fn from(e: SbdError) -> Self {
        match e {
            SbdError::Timeout => RadioError::Timeout,
            SbdError::Closed => RadioError::Closed,
            SbdError::SendFailed(session) => RadioError::Rejected(session),
            SbdError::Io(io) => RadioError::Io(io),
            other => RadioError::TransmissionFailed(other.to_string()),
        }
    }
}

/// Acknowledged transport over an Iridium SBD modem session.
pub struct SbdTransport {
    modem: Arc<SbdModem>,
}

impl SbdTransport {
    pub fn new(modem: Arc<SbdModem>) -> Self {
        Self { modem }
    }
}

#[async_trait]
impl Transport for SbdTransport {
    async fn send(&self, packet: &[u8]) -> Result<(), RadioError> {
        self.modem.send_binary(packet).await?;
        Ok(())
    }
}

/// Fire-and-forget transport: writes the packet to the device and returns.
/// Suitable for broadcast radios (LoRa and friends) that never answer.
pub struct RawTransport<W> {
    writer: Mutex<W>,
}

impl<W> RawTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> Transport for RawTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, packet: &[u8]) -> Result<(), RadioError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(packet).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn raw_transport_writes_packet_verbatim() {
        let (local, mut remote) = tokio::io::duplex(256);
        let transport = RawTransport::new(local);

        transport.send(b"METAR KBOS|METAR KJFK").await.unwrap();

        let mut buf = [0u8; 21];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"METAR KBOS|METAR KJFK");
    }
}
