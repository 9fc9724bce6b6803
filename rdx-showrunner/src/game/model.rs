//! Plain data records that make up a show: phase templates, turns and the
//! live instance of the phase currently on air.

use crate::common::{Millis, PhaseId, Timestamp, TurnId, MINUTE_MS};
use crate::error::{Result, ShowError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The longest phase a show can schedule: one week.
pub const MAX_PHASE_LENGTH: Millis = 7 * 24 * 60 * MINUTE_MS;

/// The authored shape of a phase, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTemplate {
    pub label: String,
    /// Milliseconds, or `None` for an untimed phase.
    pub length: Option<Millis>,
}

impl PhaseTemplate {
    pub fn timed(label: &str, length: Millis) -> Self {
        Self {
            label: label.to_string(),
            length: Some(length),
        }
    }

    pub fn untimed(label: &str) -> Self {
        Self {
            label: label.to_string(),
            length: None,
        }
    }

    /// A template needs a visible label and, if timed, a positive length no
    /// longer than `MAX_PHASE_LENGTH`.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(ShowError::validation("phase label must not be empty"));
        }
        if let Some(length) = self.length {
            if length <= 0 {
                return Err(ShowError::validation(format!(
                    "phase length must be positive, got {}",
                    length
                )));
            }
            if length > MAX_PHASE_LENGTH {
                return Err(ShowError::validation(format!(
                    "phase length must be at most {} ms, got {}",
                    MAX_PHASE_LENGTH, length
                )));
            }
        }
        Ok(())
    }
}

/// A phase template stored in the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub label: String,
    pub length: Option<Millis>,
}

impl Phase {
    pub(crate) fn from_template(template: PhaseTemplate) -> Self {
        Self {
            id: PhaseId::new(),
            label: template.label,
            length: template.length,
        }
    }
}

/// The id and label of a phase, without its timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub id: PhaseId,
    pub label: String,
}

/// An ordered run of phases, shown to viewers by its 1-based ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub label: u32,
    pub phases: Vec<PhaseId>,
}

/// The live instance of the active phase.
///
/// This is the only record holding absolute wall-clock values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPhase {
    pub id: PhaseId,
    pub length: Option<Millis>,
    pub started: Timestamp,
    /// `None` means the phase never ends on its own.
    pub ends: Option<Timestamp>,
}

impl CurrentPhase {
    pub(crate) fn starting_at(phase: &Phase, now: Timestamp) -> Self {
        Self {
            id: phase.id,
            length: phase.length,
            started: now,
            ends: phase.length.map(|length| now.saturating_add(length)),
        }
    }
}

/// What a paused game remembers about the phase it paused in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "timer", content = "timeLeft", rename_all = "camelCase")]
pub enum PauseState {
    /// The paused phase is untimed; there is nothing to resume.
    NoTimer,
    /// Milliseconds left when paused. Zero or negative means "about to end".
    Remaining(Millis),
}

impl PauseState {
    pub(crate) fn for_length(length: Option<Millis>) -> Self {
        match length {
            Some(length) => PauseState::Remaining(length),
            None => PauseState::NoTimer,
        }
    }

    /// The remaining time, if the paused phase is timed.
    pub fn time_left(&self) -> Option<Millis> {
        match self {
            PauseState::NoTimer => None,
            PauseState::Remaining(ms) => Some(*ms),
        }
    }
}

/// Which way `bump_phase` moves a phase within its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = ShowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(ShowError::validation(format!(
                "invalid direction {:?}, expected \"up\" or \"down\"",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}
