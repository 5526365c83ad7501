//! Utility modules.

/// Serde helpers for timestamps.
pub mod datetime;
pub mod release_window;
