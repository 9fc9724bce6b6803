//! Defines all configuration structures for the Showrunner engine.
//!
//! These structs are deserialized with `serde` and loaded through the `config`
//! crate, so the tick speed, heartbeat cadence, show length and the default
//! phase template can be defined in a TOML file and overridden from the
//! environment (`SHOWRUNNER_TURNS=5`, `SHOWRUNNER_RESOLUTION=high`, ...).

use crate::common::MINUTE_MS;
use crate::game::PhaseTemplate;
use anyhow::{bail, Context};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHOWRUNNER";

/// The top-level configuration for the `ShowEngine`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    /// How often the engine polls for phase expiry.
    pub resolution: ClockResolution,

    /// How often a heartbeat is pushed to subscribers, in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Number of turns a fresh game is seeded with.
    pub turns: u32,

    /// Timezone used when rendering wall-clock end times for operators.
    /// Uses the IANA names (e.g. "Europe/London").
    pub timezone: Tz,

    /// The phases every new turn is seeded with, in play order.
    pub default_phases: Vec<PhaseConfig>,
}

/// Defines the polling speed of the tick loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// ~100 ticks per second. Phase expiry is noticed within ~10 ms.
    Ultra,
    /// ~60 ticks per second.
    High,
    /// ~30 ticks per second.
    Medium,
    /// ~1 tick per second. Only suitable for coarse shows.
    Low,
    /// A user-defined speed in ticks per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// The period between two ticks.
    pub fn tick_interval(&self) -> Duration {
        let per_second = match self {
            ClockResolution::Ultra => 100,
            ClockResolution::High => 60,
            ClockResolution::Medium => 30,
            ClockResolution::Low => 1,
            ClockResolution::Custom { ticks_per_second } => (*ticks_per_second).max(1),
        };
        Duration::from_micros(1_000_000 / per_second)
    }
}

/// A phase as authored in configuration: lengths are given in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhaseConfig {
    pub label: String,
    /// Minutes, or absent for an untimed phase that must be advanced by hand.
    #[serde(default)]
    pub minutes: Option<u32>,
}

impl PhaseConfig {
    pub fn new(label: &str, minutes: Option<u32>) -> Self {
        Self {
            label: label.to_string(),
            minutes,
        }
    }

    /// Converts the authored phase into a millisecond-based template.
    pub fn to_template(&self) -> PhaseTemplate {
        PhaseTemplate {
            label: self.label.clone(),
            length: self.minutes.map(|m| i64::from(m) * MINUTE_MS),
        }
    }
}

impl ShowConfig {
    /// Loads the configuration from an optional TOML file, then applies
    /// `SHOWRUNNER_*` environment overrides on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let loaded: ShowConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("failed to parse configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects configurations that could never produce a playable show.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.heartbeat_interval_ms == 0 {
            bail!("heartbeat_interval_ms must be positive");
        }
        if self.default_phases.is_empty() {
            bail!("default_phases must name at least one phase");
        }
        for phase in &self.default_phases {
            phase
                .to_template()
                .validate()
                .with_context(|| format!("invalid default phase {:?}", phase.label))?;
        }
        Ok(())
    }

    /// The default phase list as millisecond templates.
    pub fn default_templates(&self) -> Vec<PhaseTemplate> {
        self.default_phases.iter().map(PhaseConfig::to_template).collect()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

// --- Default values ---

/// The five-phase turn every show starts from.
pub fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("Team Time", Some(10)),
        PhaseConfig::new("Action Time", Some(15)),
        PhaseConfig::new("Diplomacy Time", Some(10)),
        PhaseConfig::new("Breaking News", Some(10)),
        PhaseConfig::new("End of Turn", None),
    ]
}

impl Default for ClockResolution {
    fn default() -> Self {
        ClockResolution::Ultra
    }
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            resolution: ClockResolution::default(),
            heartbeat_interval_ms: 1000,
            turns: 7,
            timezone: Tz::UTC,
            default_phases: default_phases(),
        }
    }
}
