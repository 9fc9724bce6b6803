//! The show aggregate and its state transitions.
//!
//! `GameState` performs no I/O and keeps no timers. Every operation that
//! depends on time takes the caller's wall-clock reading `now`, so the whole
//! state machine can be driven deterministically.

use super::model::{CurrentPhase, Direction, PauseState, Phase, PhaseSummary, PhaseTemplate, Turn};
use crate::common::{Millis, PhaseId, Timestamp, TurnId};
use crate::error::{Result, ShowError};
use crate::events::{Heartbeat, TimerStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The lowest terror level, and the level every game starts at.
pub const MIN_TERROR: u8 = 1;
/// Reaching this terror level ends the show.
pub const MAX_TERROR: u8 = 250;

/// The serializable aggregate root of a show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    phases: HashMap<PhaseId, Phase>,
    turns: HashMap<TurnId, Turn>,
    turn_order: Vec<TurnId>,
    current_turn: Option<TurnId>,
    current_phase: Option<CurrentPhase>,
    terror: u8,
    paused: Option<PauseState>,
    over: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phases: HashMap::new(),
            turns: HashMap::new(),
            turn_order: Vec::new(),
            current_turn: None,
            current_phase: None,
            terror: MIN_TERROR,
            paused: None,
            over: false,
        }
    }
}

// Construction and snapshots.
impl GameState {
    /// Creates a game with `turns` turns, each seeded with `defaults`.
    pub fn new(turns: u32, defaults: &[PhaseTemplate]) -> Result<Self> {
        let mut game = Self::default();
        for label in 1..=turns {
            let id = game.create_turn(label, defaults)?;
            game.append_turn(id);
        }
        Ok(game)
    }

    /// Encodes the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a snapshot and checks that its references are consistent.
    ///
    /// Live timestamps are taken verbatim.
    pub fn from_json(json: &str) -> Result<Self> {
        let game: GameState = serde_json::from_str(json)?;
        game.check_integrity()?;
        Ok(game)
    }

    /// Verifies the aggregate's cross-references and ranges.
    pub fn check_integrity(&self) -> Result<()> {
        for (id, turn) in &self.turns {
            if turn.id != *id {
                return Err(ShowError::validation(format!("turn {} is stored under {}", turn.id, id)));
            }
            for phase_id in &turn.phases {
                if !self.phases.contains_key(phase_id) {
                    return Err(ShowError::phase_not_found(phase_id));
                }
            }
        }
        for (id, phase) in &self.phases {
            if phase.id != *id {
                return Err(ShowError::validation(format!("phase {} is stored under {}", phase.id, id)));
            }
            PhaseTemplate {
                label: phase.label.clone(),
                length: phase.length,
            }
            .validate()?;
            let owners = self.turns.values().filter(|t| t.phases.contains(id)).count();
            if owners > 1 {
                return Err(ShowError::validation(format!("phase {} belongs to {} turns", id, owners)));
            }
        }
        for turn_id in &self.turn_order {
            if !self.turns.contains_key(turn_id) {
                return Err(ShowError::turn_not_found(turn_id));
            }
        }
        if let Some(turn_id) = self.current_turn {
            if !self.turn_order.contains(&turn_id) {
                return Err(ShowError::turn_not_found(turn_id));
            }
        }
        if let Some(current) = &self.current_phase {
            if !self.phases.contains_key(&current.id) {
                return Err(ShowError::phase_not_found(current.id));
            }
            if self.over {
                return Err(ShowError::validation("an ended game cannot have a live phase"));
            }
            let on_air = self
                .current_turn()
                .ok_or_else(|| ShowError::validation("a live phase needs a current turn"))?;
            if !on_air.phases.contains(&current.id) {
                return Err(ShowError::validation(format!(
                    "live phase {} is not part of turn {}",
                    current.id, on_air.label
                )));
            }
        } else if self.paused.is_some() {
            return Err(ShowError::validation("only a running game can be paused"));
        }
        if !(MIN_TERROR..=MAX_TERROR).contains(&self.terror) {
            return Err(ShowError::validation(format!("terror {} out of range", self.terror)));
        }
        Ok(())
    }
}

// Read accessors.
impl GameState {
    pub fn phases(&self) -> &HashMap<PhaseId, Phase> {
        &self.phases
    }

    pub fn turns(&self) -> &HashMap<TurnId, Turn> {
        &self.turns
    }

    pub fn turn_order(&self) -> &[TurnId] {
        &self.turn_order
    }

    pub fn current_turn_id(&self) -> Option<TurnId> {
        self.current_turn
    }

    pub fn current_phase(&self) -> Option<&CurrentPhase> {
        self.current_phase.as_ref()
    }

    pub fn terror(&self) -> u8 {
        self.terror
    }

    pub fn paused(&self) -> Option<PauseState> {
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// A game runs from `start` until it is over.
    pub fn is_running(&self) -> bool {
        self.current_phase.is_some() && !self.over
    }

    pub fn phase(&self, id: PhaseId) -> Result<&Phase> {
        self.phases.get(&id).ok_or_else(|| ShowError::phase_not_found(id))
    }

    pub fn turn(&self, id: TurnId) -> Result<&Turn> {
        self.turns.get(&id).ok_or_else(|| ShowError::turn_not_found(id))
    }

    /// The turn whose phase list contains `phase`.
    pub fn turn_by_phase(&self, phase: PhaseId) -> Result<&Turn> {
        self.phase(phase)?;
        self.turns
            .values()
            .find(|turn| turn.phases.contains(&phase))
            .ok_or_else(|| ShowError::phase_not_found(phase))
    }

    pub fn current_turn(&self) -> Option<&Turn> {
        self.current_turn.and_then(|id| self.turns.get(&id))
    }

    /// Id and label of every phase, in turn order then play order.
    pub fn phase_summaries(&self) -> Vec<PhaseSummary> {
        self.turn_order
            .iter()
            .filter_map(|id| self.turns.get(id))
            .flat_map(|turn| turn.phases.iter())
            .filter_map(|id| self.phases.get(id))
            .map(|phase| PhaseSummary {
                id: phase.id,
                label: phase.label.clone(),
            })
            .collect()
    }
}

// Authoring.
impl GameState {
    /// Stores a new phase template and returns its id. The phase is not yet
    /// part of any turn.
    pub fn create_phase(&mut self, template: PhaseTemplate) -> Result<PhaseId> {
        template.validate()?;
        let phase = Phase::from_template(template);
        let id = phase.id;
        self.phases.insert(id, phase);
        Ok(id)
    }

    /// Stores a new turn seeded with one fresh phase per template. The turn
    /// is not yet part of the turn order.
    pub fn create_turn(&mut self, label: u32, templates: &[PhaseTemplate]) -> Result<TurnId> {
        for template in templates {
            template.validate()?;
        }
        let mut phases = Vec::with_capacity(templates.len());
        for template in templates {
            phases.push(self.create_phase(template.clone())?);
        }
        let turn = Turn {
            id: TurnId::new(),
            label,
            phases,
        };
        let id = turn.id;
        self.turns.insert(id, turn);
        Ok(id)
    }

    pub(crate) fn append_turn(&mut self, turn: TurnId) {
        if !self.turn_order.contains(&turn) {
            self.turn_order.push(turn);
        }
    }

    pub(crate) fn append_phase(&mut self, turn: TurnId, phase: PhaseId) -> Result<&Turn> {
        self.phase(phase)?;
        let turn = self.turns.get_mut(&turn).ok_or_else(|| ShowError::turn_not_found(turn))?;
        turn.phases.push(phase);
        Ok(turn)
    }

    /// Replaces a turn's phase list wholesale. The caller is responsible for
    /// passing a permutation of the existing list.
    pub fn reorder_turn_phases(&mut self, turn: TurnId, order: Vec<PhaseId>) -> Result<&Turn> {
        let turn = self.turns.get_mut(&turn).ok_or_else(|| ShowError::turn_not_found(turn))?;
        turn.phases = order;
        Ok(turn)
    }

    /// Swaps a phase with its neighbour. Moving past either end is a no-op.
    pub fn bump_phase(&mut self, phase: PhaseId, direction: Direction) -> Result<&Turn> {
        let turn_id = self.turn_by_phase(phase)?.id;
        let turn = self
            .turns
            .get_mut(&turn_id)
            .ok_or_else(|| ShowError::turn_not_found(turn_id))?;
        let idx = turn
            .phases
            .iter()
            .position(|id| *id == phase)
            .ok_or_else(|| ShowError::phase_not_found(phase))?;
        match direction {
            Direction::Up if idx > 0 => turn.phases.swap(idx, idx - 1),
            Direction::Down if idx + 1 < turn.phases.len() => turn.phases.swap(idx, idx + 1),
            _ => {}
        }
        Ok(turn)
    }

    /// Updates a phase template, reconciling the live phase if it is the one
    /// being edited. Returns `true` when the live phase was affected.
    ///
    /// Elapsed time is preserved: a shorter length brings the end closer, it
    /// does not restart the phase.
    pub fn edit_phase(&mut self, id: PhaseId, template: PhaseTemplate, now: Timestamp) -> Result<bool> {
        template.validate()?;
        let phase = self.phases.get_mut(&id).ok_or_else(|| ShowError::phase_not_found(id))?;
        phase.label = template.label;
        let new_length = template.length;
        phase.length = new_length;

        let live_length = match &self.current_phase {
            Some(current) if current.id == id && !self.over => current.length,
            _ => return Ok(false),
        };
        if live_length == new_length {
            return Ok(true);
        }

        // The stored time left is only meaningful against the old length, so
        // resume, reshape the timestamps, then freeze again.
        let was_paused = self.paused.is_some();
        if was_paused {
            self.resume_timestamps(now);
        }
        if let Some(current) = self.current_phase.as_mut() {
            current.ends = match (new_length, live_length, current.ends) {
                (None, _, _) => None,
                (Some(new), None, _) => Some(current.started.saturating_add(new)),
                (Some(new), Some(old), Some(ends)) => Some(ends.saturating_add(new.saturating_sub(old))),
                (Some(new), Some(_), None) => Some(current.started.saturating_add(new)),
            };
            current.length = new_length;
        }
        if was_paused {
            self.paused = Some(self.pause_state_at(now));
        }
        Ok(true)
    }
}

// Playback.
impl GameState {
    /// The phase after the current one within the current turn.
    pub fn next_phase(&self) -> Option<PhaseId> {
        let turn = self.current_turn()?;
        match &self.current_phase {
            Some(current) => {
                let pos = turn.phases.iter().position(|id| *id == current.id)?;
                turn.phases.get(pos + 1).copied()
            }
            None => turn.phases.first().copied(),
        }
    }

    /// The turn after the current one, or the first turn if none is current.
    pub fn next_turn(&self) -> Option<TurnId> {
        match self.current_turn {
            Some(current) => {
                let pos = self.turn_order.iter().position(|id| *id == current)?;
                self.turn_order.get(pos + 1).copied()
            }
            None => self.turn_order.first().copied(),
        }
    }

    /// Like `next_turn`, but skips turns that have no phases to play.
    pub fn next_playable_turn(&self) -> Option<TurnId> {
        let start = match self.current_turn {
            Some(current) => self.turn_order.iter().position(|id| *id == current)? + 1,
            None => 0,
        };
        self.first_playable_turn_from(start)
    }

    fn first_playable_turn_from(&self, start: usize) -> Option<TurnId> {
        self.turn_order
            .iter()
            .skip(start)
            .find(|id| self.turns.get(*id).is_some_and(|turn| !turn.phases.is_empty()))
            .copied()
    }

    /// Puts the first playable turn on air.
    pub fn start(&mut self, now: Timestamp) -> Result<TurnId> {
        if self.over {
            return Err(ShowError::invalid_state("game is over"));
        }
        if self.is_running() {
            return Err(ShowError::invalid_state("game is already running"));
        }
        let first = self
            .first_playable_turn_from(0)
            .ok_or_else(|| ShowError::invalid_state("game has no phases to play"))?;
        self.paused = None;
        self.set_turn(first, None, now)?;
        Ok(first)
    }

    /// Activates a phase of the current turn, restarting its clock.
    pub fn set_phase(&mut self, id: PhaseId, now: Timestamp) -> Result<()> {
        let phase = self.phase(id)?;
        let turn = self
            .current_turn()
            .ok_or_else(|| ShowError::invalid_state("no turn is on air"))?;
        if !turn.phases.contains(&id) {
            return Err(ShowError::validation(format!(
                "phase {} does not belong to turn {}",
                id, turn.label
            )));
        }
        let current = CurrentPhase::starting_at(phase, now);
        if self.paused.is_some() {
            self.paused = Some(PauseState::for_length(current.length));
        }
        self.current_phase = Some(current);
        Ok(())
    }

    /// Makes `turn` current and activates `phase` (which must belong to it)
    /// or the turn's first phase.
    pub fn set_turn(&mut self, turn: TurnId, phase: Option<PhaseId>, now: Timestamp) -> Result<()> {
        let target = self.turn(turn)?;
        if !self.turn_order.contains(&turn) {
            return Err(ShowError::turn_not_found(turn));
        }
        let phase = match phase {
            Some(phase) => {
                self.phase(phase)?;
                if !target.phases.contains(&phase) {
                    return Err(ShowError::validation(format!(
                        "phase {} does not belong to turn {}",
                        phase, target.label
                    )));
                }
                phase
            }
            None => *target.phases.first().ok_or_else(|| {
                ShowError::invalid_state(format!("turn {} has no phases", target.label))
            })?,
        };
        self.current_turn = Some(turn);
        self.set_phase(phase, now)
    }

    /// Marks the game over and takes the live phase off air.
    pub fn end(&mut self) {
        self.over = true;
        self.paused = None;
        self.current_phase = None;
    }

    /// Whether the live phase ran out. Never true while paused or for an
    /// untimed phase.
    pub fn is_current_phase_over(&self, now: Timestamp) -> bool {
        if self.paused.is_some() || self.over {
            return false;
        }
        match &self.current_phase {
            Some(CurrentPhase { ends: Some(ends), .. }) => *ends < now,
            _ => false,
        }
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<()> {
        if self.over {
            return Err(ShowError::invalid_state("game is over"));
        }
        if self.current_phase.is_none() {
            return Err(ShowError::invalid_state("game is not running"));
        }
        if self.paused.is_some() {
            return Err(ShowError::invalid_state("game is already paused"));
        }
        self.paused = Some(self.pause_state_at(now));
        Ok(())
    }

    pub fn unpause(&mut self, now: Timestamp) -> Result<()> {
        if self.over || self.current_phase.is_none() {
            return Err(ShowError::invalid_state("game is not running"));
        }
        if self.paused.is_none() {
            return Err(ShowError::invalid_state("game is not paused"));
        }
        self.resume_timestamps(now);
        Ok(())
    }

    fn pause_state_at(&self, now: Timestamp) -> PauseState {
        match self.current_phase.as_ref().and_then(|current| current.ends) {
            Some(ends) => PauseState::Remaining(ends.saturating_sub(now)),
            None => PauseState::NoTimer,
        }
    }

    /// Clears the pause, rebuilding `started`/`ends` as if the phase had run
    /// without interruption for `length - time_left` before `now`.
    fn resume_timestamps(&mut self, now: Timestamp) {
        let paused = self.paused.take();
        if let (Some(PauseState::Remaining(time_left)), Some(current)) = (paused, self.current_phase.as_mut()) {
            if let Some(length) = current.length {
                current.started = now.saturating_sub(length.saturating_sub(time_left));
                current.ends = Some(now.saturating_add(time_left));
            }
        }
    }

    /// Stores a terror level. Ending the game at the maximum is left to the
    /// controller.
    pub fn set_terror(&mut self, terror: i64) -> Result<()> {
        if !self.is_running() {
            return Err(ShowError::invalid_state("game is not running"));
        }
        let terror = u8::try_from(terror)
            .ok()
            .filter(|t| (MIN_TERROR..=MAX_TERROR).contains(t))
            .ok_or_else(|| {
                ShowError::validation(format!(
                    "terror must be between {} and {}, got {}",
                    MIN_TERROR, MAX_TERROR, terror
                ))
            })?;
        self.terror = terror;
        Ok(())
    }

    /// Time left on the live phase, measured at `now`.
    pub fn time_left(&self, now: Timestamp) -> Option<Millis> {
        if let Some(paused) = self.paused {
            return paused.time_left();
        }
        self.current_phase.as_ref()?.ends.map(|ends| ends.saturating_sub(now))
    }

    /// What viewers should see right now.
    pub fn heartbeat(&self) -> Heartbeat {
        let current = match &self.current_phase {
            Some(current) if !self.over => current,
            _ => {
                return Heartbeat {
                    turn: 0,
                    phase: String::new(),
                    timer: TimerStatus::Hidden,
                    terror: self.terror,
                }
            }
        };
        let timer = match (self.paused, current.ends) {
            (Some(paused), _) => TimerStatus::Paused {
                time_left: paused.time_left(),
            },
            (None, Some(end_time)) => TimerStatus::Running { end_time },
            (None, None) => TimerStatus::Hidden,
        };
        Heartbeat {
            turn: self.current_turn().map(|turn| turn.label).unwrap_or(0),
            phase: self
                .phases
                .get(&current.id)
                .map(|phase| phase.label.clone())
                .unwrap_or_default(),
            timer,
            terror: self.terror,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MINUTE_MS;
    use crate::game::MAX_PHASE_LENGTH;

    const T0: Timestamp = 1_700_000_000_000;

    fn defaults() -> Vec<PhaseTemplate> {
        vec![
            PhaseTemplate::timed("Team Time", 10 * MINUTE_MS),
            PhaseTemplate::timed("Action Time", 15 * MINUTE_MS),
            PhaseTemplate::untimed("End of Turn"),
        ]
    }

    fn started_game() -> GameState {
        let mut game = GameState::new(2, &defaults()).unwrap();
        game.start(T0).unwrap();
        game
    }

    #[test]
    fn new_game_seeds_every_turn() {
        let game = GameState::new(3, &defaults()).unwrap();
        assert_eq!(game.turn_order().len(), 3);
        assert_eq!(game.phases().len(), 9);
        let labels: Vec<u32> = game.turn_order().iter().map(|id| game.turns()[id].label).collect();
        assert_eq!(labels, vec![1, 2, 3]);
        assert_eq!(game.terror(), MIN_TERROR);
        assert!(!game.is_running());
        assert!(game.check_integrity().is_ok());
    }

    #[test]
    fn start_activates_first_phase_of_first_turn() {
        let game = started_game();
        let first_turn = game.turn_order()[0];
        assert_eq!(game.current_turn_id(), Some(first_turn));
        let current = game.current_phase().unwrap();
        assert_eq!(current.id, game.turns()[&first_turn].phases[0]);
        assert_eq!(current.started, T0);
        assert_eq!(current.ends, Some(T0 + 10 * MINUTE_MS));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut game = started_game();
        assert!(matches!(game.start(T0), Err(ShowError::InvalidState(_))));
    }

    #[test]
    fn next_phase_and_turn_walk_in_order() {
        let mut game = started_game();
        let turn = game.current_turn().unwrap().clone();
        assert_eq!(game.next_phase(), Some(turn.phases[1]));
        game.set_phase(turn.phases[2], T0).unwrap();
        assert_eq!(game.next_phase(), None);
        assert_eq!(game.next_turn(), Some(game.turn_order()[1]));
        let last = game.turn_order()[1];
        game.set_turn(last, None, T0).unwrap();
        assert_eq!(game.next_turn(), None);
    }

    #[test]
    fn set_turn_rejects_phase_of_another_turn() {
        let mut game = started_game();
        let first = game.turn_order()[0];
        let foreign = game.turns()[&game.turn_order()[1]].phases[0];
        assert!(matches!(
            game.set_turn(first, Some(foreign), T0),
            Err(ShowError::Validation(_))
        ));
    }

    #[test]
    fn expiry_is_strictly_after_the_end() {
        let game = started_game();
        let ends = game.current_phase().unwrap().ends.unwrap();
        assert!(!game.is_current_phase_over(ends));
        assert!(game.is_current_phase_over(ends + 1));
    }

    #[test]
    fn untimed_phases_never_expire() {
        let mut game = started_game();
        let untimed = game.current_turn().unwrap().phases[2];
        game.set_phase(untimed, T0).unwrap();
        assert!(!game.is_current_phase_over(T0 + 365 * 24 * 60 * MINUTE_MS));
        assert_eq!(game.heartbeat().timer, TimerStatus::Hidden);
    }

    #[test]
    fn pause_then_unpause_preserves_the_end() {
        let mut game = started_game();
        let before = game.current_phase().unwrap().clone();
        let now = T0 + 3 * MINUTE_MS;
        game.pause(now).unwrap();
        assert_eq!(game.paused(), Some(PauseState::Remaining(7 * MINUTE_MS)));
        assert!(!game.is_current_phase_over(T0 + 60 * MINUTE_MS));
        game.unpause(now).unwrap();
        let after = game.current_phase().unwrap();
        assert_eq!(after.ends, before.ends);
        assert_eq!(after.started, before.started);
        assert!(!game.is_current_phase_over(now));
    }

    #[test]
    fn unpause_shifts_the_end_by_the_paused_interval() {
        let mut game = started_game();
        game.pause(T0 + 3 * MINUTE_MS).unwrap();
        let resumed = T0 + 20 * MINUTE_MS;
        game.unpause(resumed).unwrap();
        let current = game.current_phase().unwrap();
        assert_eq!(current.ends, Some(resumed + 7 * MINUTE_MS));
        assert_eq!(current.started, resumed - 3 * MINUTE_MS);
    }

    #[test]
    fn pause_errors() {
        let mut game = GameState::new(1, &defaults()).unwrap();
        assert!(matches!(game.pause(T0), Err(ShowError::InvalidState(_))));
        game.start(T0).unwrap();
        assert!(matches!(game.unpause(T0), Err(ShowError::InvalidState(_))));
        game.pause(T0).unwrap();
        assert!(matches!(game.pause(T0), Err(ShowError::InvalidState(_))));
    }

    #[test]
    fn pausing_an_untimed_phase_tracks_nothing() {
        let mut game = started_game();
        let untimed = game.current_turn().unwrap().phases[2];
        game.set_phase(untimed, T0).unwrap();
        game.pause(T0 + MINUTE_MS).unwrap();
        assert_eq!(game.paused(), Some(PauseState::NoTimer));
        assert_eq!(game.heartbeat().timer, TimerStatus::Paused { time_left: None });
        game.unpause(T0 + 2 * MINUTE_MS).unwrap();
        assert_eq!(game.current_phase().unwrap().ends, None);
    }

    #[test]
    fn activating_a_phase_while_paused_rederives_time_left() {
        let mut game = started_game();
        game.pause(T0 + MINUTE_MS).unwrap();
        let phases = game.current_turn().unwrap().phases.clone();
        game.set_phase(phases[1], T0 + 2 * MINUTE_MS).unwrap();
        assert_eq!(game.paused(), Some(PauseState::Remaining(15 * MINUTE_MS)));
        game.set_phase(phases[2], T0 + 2 * MINUTE_MS).unwrap();
        assert_eq!(game.paused(), Some(PauseState::NoTimer));
    }

    #[test]
    fn edit_while_paused_keeps_elapsed_time() {
        let mut game = started_game();
        let id = game.current_phase().unwrap().id;
        game.pause(T0 + 3 * MINUTE_MS).unwrap();
        let affected = game
            .edit_phase(id, PhaseTemplate::timed("Team Time", 6 * MINUTE_MS), T0 + 5 * MINUTE_MS)
            .unwrap();
        assert!(affected);
        assert_eq!(game.paused(), Some(PauseState::Remaining(3 * MINUTE_MS)));

        let resumed = T0 + 9 * MINUTE_MS;
        game.unpause(resumed).unwrap();
        assert_eq!(game.time_left(resumed), Some(3 * MINUTE_MS));
    }

    #[test]
    fn edit_running_phase_shifts_the_end() {
        let mut game = started_game();
        let id = game.current_phase().unwrap().id;
        game.edit_phase(id, PhaseTemplate::timed("Longer", 12 * MINUTE_MS), T0 + MINUTE_MS)
            .unwrap();
        let current = game.current_phase().unwrap();
        assert_eq!(current.ends, Some(T0 + 12 * MINUTE_MS));
        assert_eq!(current.length, Some(12 * MINUTE_MS));
        assert_eq!(game.heartbeat().phase, "Longer");
    }

    #[test]
    fn edit_between_timed_and_untimed() {
        let mut game = started_game();
        let id = game.current_phase().unwrap().id;
        game.edit_phase(id, PhaseTemplate::untimed("Open"), T0 + MINUTE_MS).unwrap();
        assert_eq!(game.current_phase().unwrap().ends, None);
        game.edit_phase(id, PhaseTemplate::timed("Closed", 4 * MINUTE_MS), T0 + 2 * MINUTE_MS)
            .unwrap();
        assert_eq!(game.current_phase().unwrap().ends, Some(T0 + 4 * MINUTE_MS));
    }

    #[test]
    fn edit_of_an_idle_phase_does_not_touch_the_live_one() {
        let mut game = started_game();
        let before = game.current_phase().unwrap().clone();
        let other = game.current_turn().unwrap().phases[1];
        let affected = game
            .edit_phase(other, PhaseTemplate::timed("Short", MINUTE_MS), T0)
            .unwrap();
        assert!(!affected);
        assert_eq!(game.current_phase(), Some(&before));
        assert_eq!(game.phase(other).unwrap().length, Some(MINUTE_MS));
    }

    #[test]
    fn terror_bounds() {
        let mut game = started_game();
        assert!(matches!(game.set_terror(0), Err(ShowError::Validation(_))));
        assert!(matches!(game.set_terror(251), Err(ShowError::Validation(_))));
        assert!(matches!(game.set_terror(-3), Err(ShowError::Validation(_))));
        game.set_terror(250).unwrap();
        assert_eq!(game.terror(), 250);
    }

    #[test]
    fn bump_moves_within_bounds_only() {
        let mut game = GameState::new(1, &defaults()).unwrap();
        let original = game.turns()[&game.turn_order()[0]].phases.clone();

        let turn = game.bump_phase(original[0], Direction::Up).unwrap();
        assert_eq!(turn.phases, original);
        let turn = game.bump_phase(original[2], Direction::Down).unwrap();
        assert_eq!(turn.phases, original);

        let turn = game.bump_phase(original[1], Direction::Up).unwrap();
        assert_eq!(turn.phases, vec![original[1], original[0], original[2]]);
    }

    #[test]
    fn heartbeat_when_idle_is_hidden() {
        let game = GameState::new(1, &defaults()).unwrap();
        let beat = game.heartbeat();
        assert_eq!(beat.turn, 0);
        assert_eq!(beat.phase, "");
        assert_eq!(beat.timer, TimerStatus::Hidden);
        assert_eq!(beat.terror, 1);
    }

    #[test]
    fn heartbeat_reports_the_running_timer() {
        let game = started_game();
        let beat = game.heartbeat();
        assert_eq!(beat.turn, 1);
        assert_eq!(beat.phase, "Team Time");
        assert_eq!(
            beat.timer,
            TimerStatus::Running {
                end_time: T0 + 10 * MINUTE_MS
            }
        );
    }

    #[test]
    fn end_takes_the_phase_off_air() {
        let mut game = started_game();
        game.pause(T0).unwrap();
        game.end();
        assert!(game.is_over());
        assert!(!game.is_running());
        assert!(game.current_phase().is_none());
        assert!(!game.is_paused());
        assert!(game.check_integrity().is_ok());
    }

    #[test]
    fn snapshot_uses_camel_case_fields() {
        let mut game = started_game();
        game.pause(T0 + MINUTE_MS).unwrap();
        let value = serde_json::to_value(&game).unwrap();
        for field in ["phases", "turns", "turnOrder", "currentTurn", "currentPhase", "terror", "paused", "over"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(value["paused"]["timeLeft"], 9 * MINUTE_MS);

        let restored = GameState::from_json(&game.to_json().unwrap()).unwrap();
        assert_eq!(restored, game);
    }

    #[test]
    fn snapshot_with_dangling_reference_is_rejected() {
        let game = started_game();
        let mut value = serde_json::to_value(&game).unwrap();
        value["currentTurn"] = serde_json::json!(TurnId::new());
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(GameState::from_json(&json), Err(ShowError::NotFound { .. })));
    }

    #[test]
    fn oversized_lengths_are_rejected_without_touching_the_live_phase() {
        let mut game = started_game();
        let untimed = game.current_turn().unwrap().phases[2];
        game.set_phase(untimed, T0).unwrap();
        let before = game.clone();
        assert!(matches!(
            game.edit_phase(untimed, PhaseTemplate::timed("Long", i64::MAX), T0),
            Err(ShowError::Validation(_))
        ));
        assert_eq!(game, before);
    }

    #[test]
    fn timestamps_saturate_at_the_end_of_time() {
        let late = i64::MAX - MINUTE_MS;
        let mut game = GameState::new(1, &defaults()).unwrap();
        game.start(late).unwrap();
        let untimed = game.current_turn().unwrap().phases[2];
        game.set_phase(untimed, late).unwrap();
        game.edit_phase(untimed, PhaseTemplate::timed("Long", MAX_PHASE_LENGTH), late)
            .unwrap();
        assert_eq!(game.current_phase().unwrap().ends, Some(i64::MAX));

        game.pause(i64::MIN).unwrap();
        assert_eq!(game.paused(), Some(PauseState::Remaining(i64::MAX)));
        game.unpause(late).unwrap();
        assert_eq!(game.current_phase().unwrap().ends, Some(i64::MAX));
    }

    #[test]
    fn set_phase_only_activates_phases_of_the_current_turn() {
        let mut game = started_game();
        let foreign = game.turns()[&game.turn_order()[1]].phases[0];
        let before = game.clone();
        assert!(matches!(game.set_phase(foreign, T0), Err(ShowError::Validation(_))));
        assert_eq!(game, before);

        let mut idle = GameState::new(1, &defaults()).unwrap();
        let phase = idle.turns()[&idle.turn_order()[0]].phases[0];
        assert!(matches!(idle.set_phase(phase, T0), Err(ShowError::InvalidState(_))));
    }

    #[test]
    fn snapshot_with_live_phase_outside_the_current_turn_is_rejected() {
        let game = started_game();
        let mut value = serde_json::to_value(&game).unwrap();
        value["currentTurn"] = serde_json::Value::Null;
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(GameState::from_json(&json), Err(ShowError::Validation(_))));

        let mut value = serde_json::to_value(&game).unwrap();
        value["currentTurn"] = serde_json::json!(game.turn_order()[1]);
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(GameState::from_json(&json), Err(ShowError::Validation(_))));
    }

    #[test]
    fn snapshot_with_oversized_phase_is_rejected() {
        let game = started_game();
        let id = game.turns()[&game.turn_order()[1]].phases[0];
        let mut value = serde_json::to_value(&game).unwrap();
        value["phases"][id.to_string()]["length"] = serde_json::json!(i64::MAX);
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(GameState::from_json(&json), Err(ShowError::Validation(_))));
    }

    #[test]
    fn phase_summaries_follow_the_rundown() {
        let mut game = GameState::new(2, &defaults()).unwrap();
        let first = game.turn_order()[0];
        let phases = game.turns()[&first].phases.clone();
        game.bump_phase(phases[0], Direction::Down).unwrap();

        let summaries = game.phase_summaries();
        assert_eq!(summaries.len(), 6);
        assert_eq!(summaries[0].id, phases[1]);
        assert_eq!(summaries[0].label, "Action Time");
        assert_eq!(summaries[1].id, phases[0]);
        assert_eq!(summaries[3].id, game.turns()[&game.turn_order()[1]].phases[0]);
    }

    #[test]
    fn turns_without_phases_are_skipped() {
        let mut game = GameState::new(0, &[]).unwrap();
        let mut order = Vec::new();
        for (label, templates) in [(1, Vec::new()), (2, defaults()), (3, Vec::new()), (4, defaults())] {
            let id = game.create_turn(label, &templates).unwrap();
            game.append_turn(id);
            order.push(id);
        }

        assert_eq!(game.start(T0).unwrap(), order[1]);
        assert_eq!(game.next_turn(), Some(order[2]));
        assert_eq!(game.next_playable_turn(), Some(order[3]));
        game.set_turn(order[3], None, T0).unwrap();
        assert_eq!(game.next_playable_turn(), None);
    }

    #[test]
    fn start_needs_a_phase_to_play() {
        let mut game = GameState::new(3, &[]).unwrap();
        assert!(matches!(game.start(T0), Err(ShowError::InvalidState(_))));
        assert!(!game.is_running());
        assert!(game.current_turn_id().is_none());
    }
}
