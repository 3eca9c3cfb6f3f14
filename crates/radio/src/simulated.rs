//! Simulated lossy transport for tests and bench runs without hardware.

use async_trait::async_trait;
use log::debug;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use wxlink_core::MAX_PACKET_SIZE;

use crate::{RadioError, Transport};

pub struct SimulatedTransport {
    bandwidth_bps: u32,
    packet_loss: f32,
    sent: Mutex<Vec<Vec<u8>>>,
    stats: Mutex<TransportStats>,
}

#[derive(Debug, Default)]
struct TransportStats {
    packets_sent: u64,
    packets_dropped: u64,
    bytes_sent: u64,
}

impl SimulatedTransport {
    pub fn new(bandwidth_bps: u32, packet_loss: f32) -> Self {
        Self {
            bandwidth_bps,
            packet_loss,
            sent: Mutex::new(Vec::new()),
            stats: Mutex::new(TransportStats::default()),
        }
    }

    /// Instant, lossless channel. What the scheduler tests run against.
    pub fn lossless() -> Self {
        Self::new(0, 0.0)
    }

    /// Every packet delivered so far, in transmission order.
    pub async fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().await.clone()
    }

    pub async fn stats(&self) -> (u64, u64, u64) {
        let stats = self.stats.lock().await;
        (stats.packets_sent, stats.packets_dropped, stats.bytes_sent)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, packet: &[u8]) -> Result<(), RadioError> {
        if packet.len() > MAX_PACKET_SIZE {
            return Err(RadioError::PacketTooLarge);
        }

        if self.bandwidth_bps > 0 {
            let airtime = Duration::from_secs_f64(
                (packet.len() * 8) as f64 / f64::from(self.bandwidth_bps),
            );
            sleep(airtime).await;
        }

        let dropped = {
            let mut rng = rand::rng();
            rng.random::<f32>() < self.packet_loss
        };
        if dropped {
            let mut stats = self.stats.lock().await;
            stats.packets_dropped += 1;
            debug!("simulated packet loss ({} bytes)", packet.len());
            return Err(RadioError::TransmissionFailed("simulated loss".into()));
        }

        let mut stats = self.stats.lock().await;
        stats.packets_sent += 1;
        stats.bytes_sent += packet.len() as u64;
        drop(stats);

        self.sent.lock().await.push(packet.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_oversized_packets() {
        let transport = SimulatedTransport::lossless();
        let err = transport.send(&[0u8; MAX_PACKET_SIZE + 1]).await.unwrap_err();
        assert!(matches!(err, RadioError::PacketTooLarge));
    }

    #[tokio::test]
    async fn records_delivered_packets() {
        let transport = SimulatedTransport::lossless();
        transport.send(b"one").await.unwrap();
        transport.send(b"two").await.unwrap();

        assert_eq!(transport.sent().await, vec![b"one".to_vec(), b"two".to_vec()]);
        let (sent, dropped, bytes) = transport.stats().await;
        assert_eq!((sent, dropped, bytes), (2, 0, 6));
    }
}
