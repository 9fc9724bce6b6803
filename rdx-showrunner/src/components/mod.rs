//! Building blocks the controller is assembled from.
//!
//! Currently this is the notification listener registry, which lets callers
//! react to one named notification without draining the whole event stream.

pub mod listener;
