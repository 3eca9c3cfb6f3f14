//! Periodic position report producer.
//!
//! Reports carry a fixed queue id, so only the newest fix is ever on the
//! air: each report replaces the previous one and expires on its own if the
//! reporter stops.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use iridium_sbd::SbdModem;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use wxlink_core::QueuedMessage;

pub const POSITION_ID: &str = "POS";
pub const PRIORITY_POSITION: u8 = 0;

pub struct PositionReporter {
    pub lat: f64,
    pub lng: f64,
    pub interval: Duration,
    /// Timestamp source when attached to a modem; otherwise wall clock.
    pub modem: Option<Arc<SbdModem>>,
}

impl PositionReporter {
    pub async fn run(self, producer: mpsc::Sender<QueuedMessage>, shutdown: CancellationToken) {
        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    let report = self.report().await;
                    debug!("position report: {report}");
                    let msg = QueuedMessage::with_ttl(
                        POSITION_ID,
                        report.into_bytes(),
                        PRIORITY_POSITION,
                        self.interval * 2,
                    );
                    if producer.send(msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// `<unix-seconds>,<lat>,<lng>`, with the timestamp taken from the
    /// device when possible so the report reflects network time.
    async fn report(&self) -> String {
        let time = match &self.modem {
            Some(modem) => match modem.system_time().await {
                Ok(t) => t,
                Err(e) => {
                    warn!("device time unavailable: {e}");
                    SystemTime::now()
                }
            },
            None => SystemTime::now(),
        };
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("{secs},{:.4},{:.4}", self.lat, self.lng)
    }
}
