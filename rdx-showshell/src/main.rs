use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use showrunner::prelude::*;
use showrunner::{ENGINE_NAME, VERSION as LIB_VERSION};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A rustyline helper that highlights the command word.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", ENGINE_NAME.cyan().bold());
    println!("{}", rule.dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.".dimmed()
    );
    println!("{}", rule.dimmed());
}

/// Prints show notifications as they arrive. Heartbeats are only echoed
/// while `echo_heartbeats` is set.
async fn spawn_event_listeners(engine: &ShowEngine, echo_heartbeats: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] {:?}", event);
        }
    });

    let mut show_rx = engine.subscribe_events().await;
    let timezone = engine.config().timezone;
    tokio::spawn(async move {
        while let Ok(event) = show_rx.recv().await {
            match event {
                ShowEvent::Heartbeat(beat) => {
                    if echo_heartbeats.load(Ordering::Relaxed) {
                        println!("<-- [HEARTBEAT] {}", describe_heartbeat(&beat, timezone));
                    }
                }
                ShowEvent::TurnChange(_) => {}
                ShowEvent::PhaseChange(current) => {
                    println!("\n<-- [PHASE] now on air, ends {}", describe_end(current.ends, timezone));
                }
                ShowEvent::GameOver => println!("\n<-- {}", "[GAME OVER]".red().bold()),
                other => println!("\n<-- [{}]", other.kind()),
            }
        }
    });
}

fn describe_end(ends: Option<Timestamp>, timezone: Tz) -> String {
    match ends.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(at) => at.with_timezone(&timezone).format("%H:%M:%S %Z").to_string(),
        None => "when advanced".to_string(),
    }
}

fn describe_heartbeat(beat: &Heartbeat, timezone: Tz) -> String {
    let timer = match &beat.timer {
        TimerStatus::Hidden => "no timer".to_string(),
        TimerStatus::Paused { time_left: Some(ms) } => format!("paused, {} left", format_millis(*ms)),
        TimerStatus::Paused { time_left: None } => "paused".to_string(),
        TimerStatus::Running { end_time } => format!("running until {}", describe_end(Some(*end_time), timezone)),
    };
    if beat.turn == 0 {
        return format!("off air | {} | terror {}", timer, beat.terror);
    }
    format!("turn {} | {} | {} | terror {}", beat.turn, beat.phase, timer, beat.terror)
}

fn format_millis(ms: Millis) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let secs = ms.unsigned_abs() / 1000;
    format!("{}{}:{:02}", sign, secs / 60, secs % 60)
}

/// Parses `-` as untimed, otherwise a positive number of minutes.
fn parse_minutes(token: &str) -> Result<Option<Millis>> {
    if token == "-" {
        return Ok(None);
    }
    let minutes: i64 = token
        .parse()
        .with_context(|| format!("'{}' is not a number of minutes", token))?;
    minutes
        .checked_mul(MINUTE_MS)
        .map(Some)
        .ok_or_else(|| anyhow!("{} minutes is too long for a phase", minutes))
}

/// Resolves a 1-based turn number.
fn turn_at(game: &GameState, token: &str) -> Result<TurnId> {
    let n: usize = token
        .parse()
        .with_context(|| format!("'{}' is not a turn number", token))?;
    n.checked_sub(1)
        .and_then(|idx| game.turn_order().get(idx))
        .copied()
        .ok_or_else(|| anyhow!("there is no turn #{}", n))
}

/// Resolves a `<turn>.<phase>` reference, both 1-based.
fn phase_at(game: &GameState, token: &str) -> Result<PhaseId> {
    let (turn, phase) = token
        .split_once('.')
        .ok_or_else(|| anyhow!("expected <turn>.<phase>, got '{}'", token))?;
    let turn = game.turn(turn_at(game, turn)?)?;
    let n: usize = phase
        .parse()
        .with_context(|| format!("'{}' is not a phase number", phase))?;
    n.checked_sub(1)
        .and_then(|idx| turn.phases.get(idx))
        .copied()
        .ok_or_else(|| anyhow!("turn #{} has no phase #{}", turn.label, n))
}

fn print_rundown(game: &GameState) {
    let live = game.current_phase().map(|current| current.id);
    for turn_id in game.turn_order() {
        let Ok(turn) = game.turn(*turn_id) else { continue };
        println!("Turn #{}", turn.label);
        for (idx, phase_id) in turn.phases.iter().enumerate() {
            let Ok(phase) = game.phase(*phase_id) else { continue };
            let length = phase
                .length
                .map(format_millis)
                .unwrap_or_else(|| "untimed".to_string());
            let marker = if live == Some(phase.id) { ">>" } else { "  " };
            println!("  {} {}.{} {:<20} {}", marker, turn.label, idx + 1, phase.label, length.dimmed());
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  status                      - Shows what is on air.");
    println!("  list                        - Shows every turn and phase.");
    println!("  start | pause | resume      - Starts, pauses or resumes the show.");
    println!("  next                        - Advances to the next phase.");
    println!("  skip                        - Advances to the next turn.");
    println!("  turn <T>                    - Jumps to turn T (restarts it if current).");
    println!("  phase <T.P>                 - Jumps to phase P of turn T.");
    println!("  terror <N> | terror +/-<N>  - Sets or adjusts the terror level.");
    println!("  add turn                    - Appends a turn with the default phases.");
    println!("  add phase <T> <MIN|-> <L>   - Appends phase L to turn T ('-' is untimed).");
    println!("  edit <T.P> <MIN|-> <L>      - Changes a phase's length and label.");
    println!("  bump <T.P> up|down          - Moves a phase within its turn.");
    println!("  reorder <T> <P>...          - Reorders turn T, e.g. 'reorder 1 2 1 3 4 5'.");
    println!("  new game                    - Throws the show away and starts over.");
    println!("  save <FILE> | load <FILE>   - Writes or reads a snapshot.");
    println!("  watch <KIND> | unwatch <H>  - Adds or removes a notification callback.");
    println!("  listeners                   - Shows watch handles.");
    println!("  beats on|off                - Echoes heartbeats.");
    println!("  exit                        - Quits the shell.");
}

/// The shell's own bookkeeping between commands.
struct ShellState {
    engine: ShowEngine,
    echo_heartbeats: Arc<AtomicBool>,
    watches: HashMap<usize, (ListenerId, EventKind)>,
    next_handle: usize,
}

impl ShellState {
    async fn execute(&mut self, args: &[&str]) -> Result<()> {
        let engine = &self.engine;
        let timezone = engine.config().timezone;
        match args {
            ["status"] => {
                let beat = engine.lock().await.heartbeat();
                println!("{}", describe_heartbeat(&beat, timezone));
            }
            ["list"] => print_rundown(engine.lock().await.game()),
            ["start"] => engine.command(|c| c.start_game()).await?,
            ["pause"] => engine.command(|c| c.pause()).await?,
            ["resume"] | ["unpause"] => engine.command(|c| c.unpause()).await?,
            ["next"] => engine.command(|c| c.advance_phase()).await?,
            ["skip"] => engine.command(|c| c.advance_turn()).await?,
            ["turn", t] => {
                let mut controller = engine.lock().await;
                let turn = turn_at(controller.game(), t)?;
                controller.set_turn(turn)?;
            }
            ["phase", p] => {
                let mut controller = engine.lock().await;
                let phase = phase_at(controller.game(), p)?;
                controller.set_phase(phase)?;
            }
            ["terror", n] => {
                let mut controller = engine.lock().await;
                if let Some(delta) = n.strip_prefix('+') {
                    controller.add_terror(delta.parse().context("invalid terror delta")?)?;
                } else if n.starts_with('-') {
                    controller.add_terror(n.parse().context("invalid terror delta")?)?;
                } else {
                    controller.set_terror(n.parse().context("invalid terror level")?)?;
                }
                println!("--> Terror is now {}.", controller.game().terror());
            }
            ["add", "turn"] => {
                let (turn, phases) = engine.command(|c| c.new_turn()).await?;
                println!("--> Added turn #{} with {} phases.", turn.label, phases.len());
            }
            ["add", "phase", t, minutes, label @ ..] if !label.is_empty() => {
                let template = PhaseTemplate {
                    label: label.join(" "),
                    length: parse_minutes(minutes)?,
                };
                let mut controller = engine.lock().await;
                let turn = turn_at(controller.game(), t)?;
                let (turn, _) = controller.new_phase(turn, template)?;
                println!("--> Turn #{} now has {} phases.", turn.label, turn.phases.len());
            }
            ["edit", p, minutes, label @ ..] if !label.is_empty() => {
                let template = PhaseTemplate {
                    label: label.join(" "),
                    length: parse_minutes(minutes)?,
                };
                let mut controller = engine.lock().await;
                let phase = phase_at(controller.game(), p)?;
                let phase = controller.edit_phase(phase, template)?;
                println!("--> Phase is now '{}'.", phase.label);
            }
            ["bump", p, direction] => {
                let direction: Direction = direction.parse()?;
                let mut controller = engine.lock().await;
                let phase = phase_at(controller.game(), p)?;
                controller.bump_phase(phase, direction)?;
            }
            ["reorder", t, order @ ..] => {
                let mut controller = engine.lock().await;
                let turn = controller.game().turn(turn_at(controller.game(), t)?)?.clone();
                let phases = order
                    .iter()
                    .map(|idx| phase_at(controller.game(), &format!("{}.{}", turn.label, idx)))
                    .collect::<Result<Vec<_>>>()?;
                controller.reorder_turn_phases(turn.id, phases)?;
            }
            ["new", "game"] => {
                engine.new_game().await?;
                println!("--> Fresh game of {} turns ready.", engine.config().turns);
            }
            ["save", path] => {
                let json = engine.save_snapshot().await?;
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("failed to write {}", path))?;
                println!("--> Saved to {}.", path);
            }
            ["load", path] => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read {}", path))?;
                engine.load_snapshot(&json).await?;
                println!("--> Loaded {}.", path);
            }
            ["watch", kind] => {
                let kind = EventKind::from_name(kind).ok_or_else(|| anyhow!("unknown notification '{}'", kind))?;
                let handle = self.next_handle;
                let id = engine
                    .on_event(kind, move |event| println!("<-- [WATCH #{}] {:?}", handle, event))
                    .await;
                self.watches.insert(handle, (id, kind));
                self.next_handle += 1;
                println!("--> Watching {} with handle #{}.", kind, handle);
            }
            ["unwatch", h] => {
                let handle: usize = h.parse().context("handle must be a number")?;
                let (id, _) = self
                    .watches
                    .remove(&handle)
                    .ok_or_else(|| anyhow!("invalid handle #{}, use 'listeners'", handle))?;
                if engine.remove_listener(id).await {
                    println!("--> Listener removed.");
                } else {
                    println!("--> Listener was already gone.");
                }
            }
            ["listeners"] => {
                println!("Active listeners:");
                for (handle, (id, kind)) in &self.watches {
                    println!("  Handle #{}: {} {:?}", handle, kind, id);
                }
            }
            ["beats", "on"] => self.echo_heartbeats.store(true, Ordering::Relaxed),
            ["beats", "off"] => self.echo_heartbeats.store(false, Ordering::Relaxed),
            ["help"] => print_help(),
            _ => bail!("unknown command '{}', type 'help'", args.join(" ")),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = ShowConfig::load(config_path.as_deref())?;
    let engine = ShowEngine::new(config)?;
    let echo_heartbeats = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, echo_heartbeats.clone()).await;

    let runner = engine.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut shell = ShellState {
        engine,
        echo_heartbeats,
        watches: HashMap::new(),
        next_handle: 0,
    };

    let mut rl: Editor<CommandHighlighter, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                match args.as_slice() {
                    [] => {}
                    ["exit"] => break,
                    args => {
                        if let Err(e) = shell.execute(args).await {
                            warn!("Command '{}' rejected: {}", line.trim(), e);
                            println!("{} {:#}", "Error:".red().bold(), e);
                        }
                    }
                }
            }
            Err(_) => {
                println!("Exiting showshell...");
                break;
            }
        }
    }

    Ok(())
}
