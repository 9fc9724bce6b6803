use anyhow::Result;
use showrunner::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the show shape: an optional TOML file plus SHOWRUNNER_* overrides.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ShowConfig::load(config_path.as_deref())?;

    // 3. Create the ShowEngine instance.
    let engine = ShowEngine::new(config)?;

    // 4. Spawn tasks that log the notification streams.
    spawn_event_listeners(&engine).await;

    // 5. Put the show on air.
    engine.command(|c| c.start_game()).await?;

    // 6. Run the engine until Ctrl+C.
    engine.run().await?;

    Ok(())
}

/// Spawns tasks that log what viewers and the engine would see.
async fn spawn_event_listeners(engine: &ShowEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut show_rx = engine.subscribe_events().await;
    tokio::spawn(async move {
        while let Ok(event) = show_rx.recv().await {
            match event {
                ShowEvent::Heartbeat(beat) => {
                    info!("[HEARTBEAT] turn {} | {} | {:?} | terror {}", beat.turn, beat.phase, beat.timer, beat.terror)
                }
                other => info!("[{}] => {:?}", other.kind(), other),
            }
        }
    });

    let _game_over = engine
        .on_event(EventKind::GameOver, |_| info!("[GAME OVER] The show has ended."))
        .await;
}
