//! # Showrunner
//!
//! A run-of-show timer engine for live broadcasts.
//!
//! A show is a sequence of turns, each made of phases. Timed phases count
//! down and hand over to the next phase on their own; untimed phases wait
//! for the operator. Viewers receive a periodic heartbeat describing what is
//! on screen and how long is left.
//!
//! ## Core Concepts
//!
//! - **GameState**: the serializable aggregate (phases, turns, turn order,
//!   the live phase, terror level, pause state) and every state transition.
//!   It performs no I/O; time is passed in.
//! - **GameController**: the command surface. It validates the lifecycle
//!   (`not started → running ⇄ paused → over`), mutates the state, and emits
//!   `ShowEvent` notifications to broadcast subscribers and callbacks.
//! - **ShowEngine**: the async driver. It serializes commands against a
//!   fixed-rate expiry poll and pushes heartbeats on a timer.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use showrunner::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Create a default configuration: 7 turns of the standard phases.
//!     let engine = ShowEngine::new(ShowConfig::default())?;
//!
//!     // 2. Subscribe to notifications before starting the show.
//!     let mut events = engine.subscribe_events().await;
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Received: {:?}", event);
//!         }
//!     });
//!
//!     // 3. Start the show.
//!     engine.command(|c| c.start_game()).await?;
//!
//!     // 4. Run the engine. It will shut down on Ctrl+C.
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Showrunner";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod game;
pub mod time;

pub use error::{Result, ShowError};

/// A prelude module for easy importing of the most common Showrunner types.
pub mod prelude {
    pub use crate::common::{ListenerId, Millis, PhaseId, Timestamp, TurnId, MINUTE_MS};
    pub use crate::config::{ClockResolution, PhaseConfig, ShowConfig};
    pub use crate::controller::GameController;
    pub use crate::engine::ShowEngine;
    pub use crate::error::{Result, ShowError};
    pub use crate::events::{EventKind, Heartbeat, ShowEvent, SystemEvent, TimerStatus};
    pub use crate::game::{CurrentPhase, Direction, GameState, PauseState, Phase, PhaseTemplate, Turn};
    pub use crate::time::{Clock, ManualClock, SystemClock};
}
