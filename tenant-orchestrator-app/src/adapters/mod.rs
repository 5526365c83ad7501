//! Storage and change-feed adapters.

mod file_change_feed;

pub use file_change_feed::FileChangeFeedSink;

#[cfg(feature = "sqlite-store")]
mod sqlite;

#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;
