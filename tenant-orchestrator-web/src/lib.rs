//! HTTP surface of the tenant orchestrator.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
