//! The async driver that keeps a show moving.

use crate::common::ListenerId;
use crate::config::ShowConfig;
use crate::controller::GameController;
use crate::error::Result as ShowResult;
use crate::events::{EventKind, ShowEvent, SystemEvent};
use crate::game::GameState;
use crate::time::{Clock, SystemClock, TickEvent, Ticker};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// The main Showrunner engine.
///
/// Holds the one `GameController` of a live show behind a mutex, so operator
/// commands and expiry polls are applied one at a time. `run` drives the
/// ticker and the periodic heartbeat. The engine is cheap to clone; every
/// clone is a handle to the same show.
#[derive(Clone)]
pub struct ShowEngine {
    config: Arc<ShowConfig>,
    controller: Arc<Mutex<GameController>>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    system_event_sender: broadcast::Sender<SystemEvent>,
}

// Core implementation block for internal logic.
impl ShowEngine {
    /// Creates an engine reading the real wall clock.
    pub fn new(config: ShowConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an engine reading time from `clock`.
    pub fn with_clock(config: ShowConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate()?;
        let controller = GameController::from_config(&config, clock)?;
        let (tick_sender, _) = broadcast::channel(256);
        let (system_event_sender, _) = broadcast::channel(64);
        Ok(Self {
            config: Arc::new(config),
            controller: Arc::new(Mutex::new(controller)),
            tick_sender,
            system_event_sender,
        })
    }

    pub fn config(&self) -> &ShowConfig {
        &self.config
    }

    /// Runs the engine until Ctrl+C is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("ShowEngine starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        let engine = self.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { engine.run_until_shutdown(shutdown_rx).await });

        info!(
            "Engine running at {:?}. Press Ctrl+C to shut down.",
            self.config.resolution
        );
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received. Stopping the show loops...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. The dispatcher may already have stopped.");
        }
        handle.await?;
        info!("ShowEngine has shut down.");
        Ok(())
    }

    /// Runs the tick and heartbeat loops until `shutdown_rx` fires.
    pub async fn run_until_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let (ticker_shutdown_tx, ticker_shutdown_rx) = broadcast::channel(1);
        let mut tick_rx = self.tick_sender.subscribe();
        let ticker = Ticker::new(self.config.resolution.clone(), self.tick_sender.clone());
        let ticker_handle = tokio::spawn(ticker.run(ticker_shutdown_rx));

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                Ok(tick) = tick_rx.recv() => self.process_tick(&tick).await,
                _ = heartbeat.tick() => self.controller.lock().await.emit_heartbeat(),
            }
        }

        ticker_shutdown_tx.send(()).ok();
        if let Err(e) = ticker_handle.await {
            error!("Ticker task failed: {}", e);
        }
        self.system_event_sender.send(SystemEvent::EngineShutdown).ok();
    }

    #[doc(hidden)]
    async fn process_tick(&self, tick: &TickEvent) {
        let mut controller = self.controller.lock().await;
        match controller.tick() {
            Ok(true) => debug!("Tick #{} advanced the show.", tick.tick_count),
            Ok(false) => trace!("Tick #{} processed.", tick.tick_count),
            Err(e) => error!("Tick #{} failed to advance the show: {}", tick.tick_count, e),
        }
    }
}

// Public API implementation block.
impl ShowEngine {
    /// Locks the controller for a sequence of commands.
    pub async fn lock(&self) -> MutexGuard<'_, GameController> {
        self.controller.lock().await
    }

    /// Runs one command against the controller.
    pub async fn command<T>(&self, f: impl FnOnce(&mut GameController) -> ShowResult<T>) -> ShowResult<T> {
        let mut controller = self.controller.lock().await;
        f(&mut controller)
    }

    /// Replaces the show with a fresh game of the configured shape.
    pub async fn new_game(&self) -> ShowResult<()> {
        let turns = self.config.turns;
        self.command(|c| c.reset(turns)).await
    }

    /// The current game as snapshot JSON.
    pub async fn save_snapshot(&self) -> ShowResult<String> {
        self.controller.lock().await.game().to_json()
    }

    /// Replaces the show with a game decoded from snapshot JSON.
    pub async fn load_snapshot(&self, json: &str) -> ShowResult<()> {
        let game = GameState::from_json(json)?;
        self.controller.lock().await.new_game(game);
        Ok(())
    }

    /// Registers a callback for one kind of show notification.
    pub async fn on_event(
        &self,
        kind: EventKind,
        callback: impl FnMut(&ShowEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.controller.lock().await.on(kind, callback);
        self.system_event_sender
            .send(SystemEvent::ListenerAdded { id, kind })
            .ok();
        id
    }

    /// Removes a callback. Returns `true` if it was found and removed.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let was_removed = self.controller.lock().await.remove_listener(id);
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Subscribes to every show notification.
    pub async fn subscribe_events(&self) -> broadcast::Receiver<ShowEvent> {
        self.controller.lock().await.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }
}
