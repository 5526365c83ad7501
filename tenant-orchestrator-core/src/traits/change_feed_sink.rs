//! Change feed sink abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;

/// Append-only destination of mirrored account mutations.
///
/// Platform implementation:
/// - `FileChangeFeedSink` in the app crate (one file per key under a directory)
#[async_trait]
pub trait ChangeFeedSink: Send + Sync {
    /// Store `body` under `key`, e.g. `accounts/<mutation id>.json`
    async fn put(&self, key: &str, body: &[u8]) -> CoreResult<()>;
}
