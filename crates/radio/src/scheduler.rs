//! The transmission cycle: a single cooperative loop that accepts produced
//! messages, drains the current send list one packet per slot, and
//! periodically sweeps and repacks the queue.
//!
//! The send cadence and the maintenance cadence are independent on purpose:
//! refreshing the list too eagerly would let a growing backlog starve new
//! high-priority messages, while the completed-cycle guard guarantees every
//! accepted list is fully attempted at least once before it is replaced.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use wxlink_core::{build_send_list, MessageStore, Packet, QueuedMessage};

use crate::{LinkConfig, Transport};

#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerStats {
    pub messages_accepted: u64,
    pub packets_sent: u64,
    pub send_failures: u64,
    pub lists_built: u64,
    pub maintenance_skipped: u64,
}

pub struct BroadcastScheduler {
    config: LinkConfig,
    transport: Arc<dyn Transport>,
    store: MessageStore,
    send_list: Vec<Packet>,
    cursor: usize,
    cycles_completed: u64,
    rx: mpsc::Receiver<QueuedMessage>,
    shutdown: CancellationToken,
    stats: SchedulerStats,
}

impl BroadcastScheduler {
    /// Build a scheduler and the producer handle that feeds it.
    pub fn new(
        config: LinkConfig,
        transport: Arc<dyn Transport>,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::Sender<QueuedMessage>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let scheduler = Self {
            config,
            transport,
            store: MessageStore::new(),
            send_list: Vec::new(),
            cursor: 0,
            cycles_completed: 0,
            rx,
            shutdown,
            stats: SchedulerStats::default(),
        };
        (scheduler, tx)
    }

    /// Run until cancelled.
    pub async fn run(mut self) {
        info!(
            "broadcast scheduler started (send slot {:?}, maintenance {:?})",
            self.config.send_interval, self.config.maintenance_interval
        );

        let mut send_tick = interval(self.config.send_interval);
        send_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut maintenance_tick = interval(self.config.maintenance_interval);
        maintenance_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("broadcast scheduler stopped");
                    break;
                }
                Some(msg) = self.rx.recv() => self.accept(msg),
                _ = send_tick.tick() => self.send_slot().await,
                _ = maintenance_tick.tick() => self.maintenance_slot(),
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn accept(&mut self, msg: QueuedMessage) {
        debug!(
            "queued message {} (priority {}, {} bytes)",
            msg.id,
            msg.priority,
            msg.payload.len()
        );
        self.store.put(msg);
        self.stats.messages_accepted += 1;
    }

    /// Transmit the packet at the cursor and advance. A failed transmission
    /// still counts as an attempt; the packet comes around again on the next
    /// cycle.
    async fn send_slot(&mut self) {
        if self.send_list.is_empty() {
            return;
        }

        let packet = &self.send_list[self.cursor];
        match self.transport.send(packet.as_bytes()).await {
            Ok(()) => {
                self.stats.packets_sent += 1;
                debug!(
                    "sent packet {}/{} ({} bytes)",
                    self.cursor + 1,
                    self.send_list.len(),
                    packet.len()
                );
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!("packet transmission failed: {e}");
            }
        }

        self.cursor += 1;
        if self.cursor >= self.send_list.len() {
            self.cursor = 0;
            self.cycles_completed += 1;
            debug!("send list cycle {} complete", self.cycles_completed);
        }
    }

    /// Sweep expired messages and rebuild the send list, unless the current
    /// list has not yet been attempted in full.
    fn maintenance_slot(&mut self) {
        if !self.send_list.is_empty() && self.cycles_completed == 0 {
            warn!("send list not yet fully cycled, postponing maintenance");
            self.stats.maintenance_skipped += 1;
            return;
        }

        self.store = self.store.sweep(Instant::now());
        self.send_list = build_send_list(&self.store);
        self.cursor = 0;
        self.cycles_completed = 0;
        self.stats.lists_built += 1;
        debug!(
            "rebuilt send list: {} messages into {} packets",
            self.store.len(),
            self.send_list.len()
        );
    }
}
