//! wxlinkd: relays perishable aviation bulletins over a narrowband link.
//!
//! Reports arrive on stdin, get queued with priority and expiry, and the
//! broadcast scheduler drains them cyclically over the configured link —
//! an Iridium SBD modem or a fire-and-forget packet radio.

mod config;
mod feed;
mod position;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use iridium_sbd::{SbdConfig, SbdModem};
use log::{info, warn};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use wxlink_radio::{BroadcastScheduler, RawTransport, SbdTransport, Transport};

use config::{Config, LinkMode};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let cfg = Config::load(Path::new(&path))?;

    let shutdown = CancellationToken::new();

    let mut modem = None;
    let transport: Arc<dyn Transport> = match cfg.link_mode {
        LinkMode::Modem => {
            let mut sbd = SbdConfig::new(&cfg.device);
            sbd.baud = cfg.baud;
            let m = Arc::new(
                SbdModem::open(&sbd, shutdown.child_token()).context("can't open modem port")?,
            );
            m.init().await.context("modem handshake failed")?;
            info!("modem ready on {}", cfg.device);
            if let Err(e) = m.wait_for_network(Duration::from_secs(300)).await {
                warn!("starting without network: {e}");
            }
            modem = Some(m.clone());
            Arc::new(SbdTransport::new(m))
        }
        LinkMode::Raw => {
            let builder = tokio_serial::new(&cfg.device, cfg.baud);
            let port = tokio_serial::SerialStream::open(&builder)
                .context("can't open radio port")?;
            info!("radio ready on {}", cfg.device);
            Arc::new(RawTransport::new(port))
        }
    };

    let (scheduler, producer) =
        BroadcastScheduler::new(cfg.link_config(), transport, shutdown.child_token());

    tokio::spawn(feed::run(
        BufReader::new(tokio::io::stdin()),
        producer.clone(),
        cfg.bulletin_ttl(),
    ));

    let reporter = position::PositionReporter {
        lat: cfg.station_lat,
        lng: cfg.station_lng,
        interval: cfg.position_interval(),
        modem,
    };
    tokio::spawn(reporter.run(producer, shutdown.child_token()));

    let mut runner = tokio::spawn(scheduler.run());
    tokio::select! {
        res = &mut runner => {
            res?;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    }
    runner.await?;
    Ok(())
}
