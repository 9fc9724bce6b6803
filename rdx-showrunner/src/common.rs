//! Contains common, primitive types shared by every layer of the engine.
//!
//! Phases and turns are addressed by random UUID newtypes so that their ids
//! stay stable across snapshots. Listeners registered on the controller are
//! addressed by slotmap keys, which are never reused.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A wall-clock reading in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// A span of time in milliseconds.
pub type Millis = i64;

/// Milliseconds in one minute. Phase lengths are authored in minutes.
pub const MINUTE_MS: Millis = 60 * 1000;

new_key_type! {
    /// Uniquely and safely identifies a registered notification listener.
    ///
    /// Returned by `GameController::on`, and used to remove the listener again.
    pub struct ListenerId;
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Allocates a fresh, random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Identifies a phase template.
    PhaseId
}

uuid_id! {
    /// Identifies a turn.
    TurnId
}
