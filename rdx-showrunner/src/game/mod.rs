//! The show data model and its state machine.
//!
//! `model` holds the plain records (phase templates, turns, the live phase),
//! `state` holds the aggregate that owns them and every state transition.

pub mod model;
pub mod state;

pub use model::{
    CurrentPhase, Direction, PauseState, Phase, PhaseSummary, PhaseTemplate, Turn, MAX_PHASE_LENGTH,
};
pub use state::{GameState, MAX_TERROR, MIN_TERROR};
