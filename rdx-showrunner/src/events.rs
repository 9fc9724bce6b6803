//! Defines all public notifications broadcast by the controller and engine.
//!
//! Transports subscribe to these strongly-typed events and forward them to
//! viewers; the operator console prints them.

use crate::common::{ListenerId, Millis, Timestamp, TurnId};
use crate::game::{CurrentPhase, Phase, Turn};
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// What the viewer timer should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TimerStatus {
    /// No timer: the show is not running, or the phase is untimed.
    Hidden,
    /// Frozen. `time_left` is `None` when the paused phase is untimed.
    Paused {
        #[serde(rename = "timeLeft")]
        time_left: Option<Millis>,
    },
    /// Counting down to a wall-clock instant.
    Running {
        #[serde(rename = "endTime")]
        end_time: Timestamp,
    },
}

/// A read-only snapshot of what is on screen right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    /// The 1-based ordinal of the current turn, or 0 when not running.
    pub turn: u32,
    /// The label of the current phase, or empty when not running.
    pub phase: String,
    pub timer: TimerStatus,
    pub terror: u8,
}

/// Every notification the controller emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ShowEvent {
    Heartbeat(Heartbeat),
    TurnChange(TurnId),
    PhaseChange(CurrentPhase),
    PhaseEdit(Phase),
    TurnEdit(Turn),
    TurnOrderEdit(Vec<TurnId>),
    GameOver,
}

impl ShowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ShowEvent::Heartbeat(_) => EventKind::Heartbeat,
            ShowEvent::TurnChange(_) => EventKind::TurnChange,
            ShowEvent::PhaseChange(_) => EventKind::PhaseChange,
            ShowEvent::PhaseEdit(_) => EventKind::PhaseEdit,
            ShowEvent::TurnEdit(_) => EventKind::TurnEdit,
            ShowEvent::TurnOrderEdit(_) => EventKind::TurnOrderEdit,
            ShowEvent::GameOver => EventKind::GameOver,
        }
    }
}

/// The name of a notification, used to register callbacks for one kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Heartbeat,
    TurnChange,
    PhaseChange,
    PhaseEdit,
    TurnEdit,
    TurnOrderEdit,
    GameOver,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Heartbeat,
        EventKind::TurnChange,
        EventKind::PhaseChange,
        EventKind::PhaseEdit,
        EventKind::TurnEdit,
        EventKind::TurnOrderEdit,
        EventKind::GameOver,
    ];

    /// The wire name of the notification.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Heartbeat => "heartbeat",
            EventKind::TurnChange => "turnChange",
            EventKind::PhaseChange => "phaseChange",
            EventKind::PhaseEdit => "phaseEdit",
            EventKind::TurnEdit => "turnEdit",
            EventKind::TurnOrderEdit => "turnOrderEdit",
            EventKind::GameOver => "gameOver",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's `run` loop begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// Fired when a notification listener is added through the engine.
    ListenerAdded { id: ListenerId, kind: EventKind },
    /// Fired when a notification listener is removed through the engine.
    ListenerRemoved { id: ListenerId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_wire_shape() {
        let beat = Heartbeat {
            turn: 2,
            phase: "Action Time".to_string(),
            timer: TimerStatus::Running { end_time: 1_000 },
            terror: 40,
        };
        assert_eq!(
            serde_json::to_value(ShowEvent::Heartbeat(beat)).unwrap(),
            serde_json::json!({
                "type": "heartbeat",
                "data": {
                    "turn": 2,
                    "phase": "Action Time",
                    "timer": {"state": "running", "endTime": 1000},
                    "terror": 40
                }
            })
        );
        assert_eq!(
            serde_json::to_value(TimerStatus::Paused { time_left: None }).unwrap(),
            serde_json::json!({"state": "paused", "timeLeft": null})
        );
    }

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("newPhase"), None);
        assert_eq!(ShowEvent::GameOver.kind(), EventKind::GameOver);
    }
}
