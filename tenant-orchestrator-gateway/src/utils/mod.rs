//! Utility modules.

/// Log sanitization utilities to prevent secrets and large payloads leaking into logs.
pub mod log_sanitizer;
