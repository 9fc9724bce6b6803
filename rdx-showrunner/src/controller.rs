//! The command layer over a single show.
//!
//! `GameController` owns the `GameState`, checks the lifecycle preconditions
//! of every command, and emits notifications after each successful mutation.
//! Turn and phase changes are always emitted before the heartbeat of the same
//! command.

use crate::common::{ListenerId, PhaseId, Timestamp, TurnId};
use crate::components::listener::{EventCallback, ListenerRegistry};
use crate::config::ShowConfig;
use crate::error::{Result, ShowError};
use crate::events::{EventKind, Heartbeat, ShowEvent};
use crate::game::{Direction, GameState, Phase, PhaseTemplate, Turn, MAX_TERROR};
use crate::time::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct GameController {
    game: GameState,
    defaults: Vec<PhaseTemplate>,
    clock: Arc<dyn Clock>,
    event_sender: broadcast::Sender<ShowEvent>,
    listeners: ListenerRegistry,
}

// Construction and read access.
impl GameController {
    /// Wraps an existing game. `defaults` seeds every turn added later.
    pub fn new(game: GameState, defaults: Vec<PhaseTemplate>, clock: Arc<dyn Clock>) -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            game,
            defaults,
            clock,
            event_sender,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Builds a fresh, unstarted game from the configured show shape.
    pub fn from_config(config: &ShowConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let defaults = config.default_templates();
        let game = GameState::new(config.turns, &defaults)?;
        Ok(Self::new(game, defaults, clock))
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// A copy of the whole aggregate, suitable for saving.
    pub fn save_game(&self) -> GameState {
        self.game.clone()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn heartbeat(&self) -> Heartbeat {
        self.game.heartbeat()
    }

    pub fn emit_heartbeat(&mut self) {
        let beat = self.game.heartbeat();
        self.emit(ShowEvent::Heartbeat(beat));
    }
}

// Subscription.
impl GameController {
    /// Subscribes to every notification.
    pub fn subscribe(&self) -> broadcast::Receiver<ShowEvent> {
        self.event_sender.subscribe()
    }

    /// Registers a callback for one kind of notification.
    pub fn on(&mut self, kind: EventKind, callback: impl FnMut(&ShowEvent) + Send + Sync + 'static) -> ListenerId {
        self.register_listener(kind, Box::new(callback))
    }

    pub fn register_listener(&mut self, kind: EventKind, callback: EventCallback) -> ListenerId {
        self.listeners.register(kind, callback)
    }

    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

// Lifecycle commands.
impl GameController {
    /// Replaces the whole aggregate, e.g. with a fresh or a loaded game.
    pub fn new_game(&mut self, game: GameState) {
        info!(turns = game.turn_order().len(), "Loaded a new game.");
        self.game = game;
        self.emit_heartbeat();
    }

    /// Replaces the aggregate with a fresh game of `turns` default turns.
    pub fn reset(&mut self, turns: u32) -> Result<()> {
        let game = GameState::new(turns, &self.defaults)?;
        self.new_game(game);
        Ok(())
    }

    pub fn start_game(&mut self) -> Result<()> {
        if self.game.is_running() {
            return Err(ShowError::invalid_state("cannot start an already running game"));
        }
        if self.game.is_over() {
            return Err(ShowError::invalid_state("cannot restart an ended game"));
        }
        let now = self.now();
        self.game.start(now)?;
        info!("Game started.");
        self.emit_turn_change();
        self.emit_heartbeat();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.check_running()?;
        if self.game.is_paused() {
            return Err(ShowError::invalid_state("game is already paused"));
        }
        let now = self.now();
        self.game.pause(now)?;
        info!(paused = ?self.game.paused(), "Game paused.");
        self.emit_heartbeat();
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<()> {
        self.check_running()?;
        if !self.game.is_paused() {
            return Err(ShowError::invalid_state("game is not paused"));
        }
        let now = self.now();
        self.game.unpause(now)?;
        info!("Game unpaused.");
        // An edit made while paused may have used up the remaining time.
        if self.game.is_current_phase_over(now) {
            self.next_phase(now)
        } else {
            self.emit_heartbeat();
            Ok(())
        }
    }

    /// Polls for phase expiry. Returns `true` if the show moved on.
    pub fn tick(&mut self) -> Result<bool> {
        let now = self.now();
        if self.game.is_running() && self.game.is_current_phase_over(now) {
            self.next_phase(now)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Sets the terror level. The maximum ends the game.
    pub fn set_terror(&mut self, terror: i64) -> Result<()> {
        self.check_running()?;
        self.game.set_terror(terror)?;
        debug!(terror, "Terror updated.");
        if self.game.terror() == MAX_TERROR {
            self.end_game();
        } else {
            self.emit_heartbeat();
        }
        Ok(())
    }

    pub fn add_terror(&mut self, amount: i64) -> Result<()> {
        let target = i64::from(self.game.terror()).saturating_add(amount);
        self.set_terror(target)
    }

    pub fn advance_turn(&mut self) -> Result<()> {
        self.check_running()?;
        let now = self.now();
        self.next_turn(now)
    }

    /// Jumps to the start of a turn. Choosing the current turn restarts it.
    pub fn set_turn(&mut self, turn: TurnId) -> Result<()> {
        self.check_running()?;
        let now = self.now();
        self.game.set_turn(turn, None, now)?;
        self.emit_turn_change();
        self.emit_heartbeat();
        Ok(())
    }

    pub fn advance_phase(&mut self) -> Result<()> {
        self.check_running()?;
        let now = self.now();
        self.next_phase(now)
    }

    /// Jumps to any phase, switching turns if it belongs to another one.
    pub fn set_phase(&mut self, phase: PhaseId) -> Result<()> {
        self.check_running()?;
        let now = self.now();
        let target = self.game.turn_by_phase(phase)?.id;
        if self.game.current_turn_id() == Some(target) {
            self.game.set_phase(phase, now)?;
            self.emit_phase_change();
        } else {
            self.game.set_turn(target, Some(phase), now)?;
            self.emit_turn_change();
        }
        self.emit_heartbeat();
        Ok(())
    }
}

// Authoring commands.
impl GameController {
    /// Appends a new phase to the end of a turn.
    pub fn new_phase(&mut self, turn: TurnId, template: PhaseTemplate) -> Result<(Turn, Phase)> {
        self.check_not_over()?;
        self.game.turn(turn)?;
        let phase_id = self.game.create_phase(template)?;
        let turn = self.game.append_phase(turn, phase_id)?.clone();
        let phase = self.game.phase(phase_id)?.clone();
        debug!(turn = turn.label, phase = %phase.label, "Phase added.");
        self.emit(ShowEvent::PhaseEdit(phase.clone()));
        self.emit(ShowEvent::TurnEdit(turn.clone()));
        Ok((turn, phase))
    }

    pub fn edit_phase(&mut self, phase: PhaseId, template: PhaseTemplate) -> Result<Phase> {
        self.check_not_over()?;
        let now = self.now();
        let live = self.game.edit_phase(phase, template, now)?;
        let edited = self.game.phase(phase)?.clone();
        debug!(phase = %edited.label, live, "Phase edited.");
        self.emit(ShowEvent::PhaseEdit(edited.clone()));
        if live {
            // A shorter length may have ended the live phase already.
            if self.game.is_current_phase_over(now) {
                self.next_phase(now)?;
            } else {
                self.emit_heartbeat();
            }
        }
        Ok(edited)
    }

    /// Replaces a turn's phase order. `order` must be a permutation of the
    /// turn's current phases.
    pub fn reorder_turn_phases(&mut self, turn: TurnId, order: Vec<PhaseId>) -> Result<Turn> {
        self.check_not_over()?;
        let existing = &self.game.turn(turn)?.phases;
        let unique: HashSet<&PhaseId> = order.iter().collect();
        let is_permutation = order.len() == existing.len()
            && unique.len() == order.len()
            && existing.iter().all(|id| unique.contains(id));
        if !is_permutation {
            return Err(ShowError::validation("provided phases don't match the turn's existing phases"));
        }
        let turn = self.game.reorder_turn_phases(turn, order)?.clone();
        self.emit(ShowEvent::TurnEdit(turn.clone()));
        Ok(turn)
    }

    pub fn bump_phase(&mut self, phase: PhaseId, direction: Direction) -> Result<Turn> {
        self.check_not_over()?;
        let turn = self.game.bump_phase(phase, direction)?.clone();
        self.emit(ShowEvent::TurnEdit(turn.clone()));
        Ok(turn)
    }

    /// Appends a new turn seeded with the default phases.
    pub fn new_turn(&mut self) -> Result<(Turn, Vec<Phase>)> {
        self.check_not_over()?;
        let label = u32::try_from(self.game.turn_order().len() + 1)
            .map_err(|_| ShowError::validation("too many turns"))?;
        let turn_id = self.game.create_turn(label, &self.defaults)?;
        self.game.append_turn(turn_id);
        let turn = self.game.turn(turn_id)?.clone();
        let phases = turn
            .phases
            .iter()
            .map(|id| self.game.phase(*id).cloned())
            .collect::<Result<Vec<_>>>()?;
        debug!(turn = label, "Turn added.");
        self.emit(ShowEvent::TurnOrderEdit(self.game.turn_order().to_vec()));
        Ok((turn, phases))
    }
}

// Helpers.
impl GameController {
    fn check_running(&self) -> Result<()> {
        if self.game.is_over() {
            return Err(ShowError::invalid_state("game is over"));
        }
        if !self.game.is_running() {
            return Err(ShowError::invalid_state("game is not running"));
        }
        Ok(())
    }

    fn check_not_over(&self) -> Result<()> {
        if self.game.is_over() {
            return Err(ShowError::invalid_state("game is over"));
        }
        Ok(())
    }

    fn emit(&mut self, event: ShowEvent) {
        self.listeners.dispatch(&event);
        self.event_sender.send(event).ok();
    }

    fn emit_turn_change(&mut self) {
        if let Some(turn) = self.game.current_turn_id() {
            self.emit(ShowEvent::TurnChange(turn));
        }
        self.emit_phase_change();
    }

    fn emit_phase_change(&mut self) {
        if let Some(current) = self.game.current_phase().cloned() {
            self.emit(ShowEvent::PhaseChange(current));
        }
    }

    /// Moves to the next phase of the turn, or on to the next turn.
    fn next_phase(&mut self, now: Timestamp) -> Result<()> {
        match self.game.next_phase() {
            Some(phase) => {
                self.game.set_phase(phase, now)?;
                debug!(phase = %phase, "Phase changed.");
                self.emit_phase_change();
                self.emit_heartbeat();
                Ok(())
            }
            None => self.next_turn(now),
        }
    }

    /// Moves to the next turn with phases, or ends the game after the last.
    fn next_turn(&mut self, now: Timestamp) -> Result<()> {
        match self.game.next_playable_turn() {
            Some(turn) => {
                self.game.set_turn(turn, None, now)?;
                debug!(turn = %turn, "Turn changed.");
                self.emit_turn_change();
                self.emit_heartbeat();
                Ok(())
            }
            None => {
                self.end_game();
                Ok(())
            }
        }
    }

    fn end_game(&mut self) {
        if self.game.is_over() {
            return;
        }
        self.game.end();
        info!(terror = self.game.terror(), "Game over.");
        self.emit(ShowEvent::GameOver);
    }
}

impl std::fmt::Debug for GameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameController")
            .field("game", &self.game)
            .field("listeners", &self.listeners)
            .finish()
    }
}
