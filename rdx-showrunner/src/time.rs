//! Time sources for the engine.
//!
//! The show logic never sleeps on a per-phase timer. It reads the wall clock
//! through a [`Clock`] and is polled by the [`Ticker`], a fixed-rate task
//! that broadcasts a [`TickEvent`] at the configured resolution.

use crate::common::{Millis, Timestamp};
use crate::config::ClockResolution;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, trace};

/// A source of wall-clock readings in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Millis) {
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst)
    }
}

/// One beat of the polling loop.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub tick_count: u64,
    pub timestamp: Instant,
}

/// A fixed-rate ticker that broadcasts `TickEvent`s until shut down.
pub struct Ticker {
    resolution: ClockResolution,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl Ticker {
    pub fn new(resolution: ClockResolution, tick_sender: broadcast::Sender<Arc<TickEvent>>) -> Self {
        Self {
            resolution,
            tick_sender,
        }
    }

    /// Ticks until a shutdown signal arrives. Late ticks are skipped rather
    /// than replayed in a burst.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.tick_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Ticker started with a period of {:?}.", period);

        let mut tick_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                timestamp = interval.tick() => {
                    tick_count += 1;
                    trace!("Tick #{} sent.", tick_count);
                    self.tick_sender
                        .send(Arc::new(TickEvent { tick_count, timestamp }))
                        .ok();
                }
            }
        }
        info!("Ticker stopped after {} ticks.", tick_count);
    }
}
