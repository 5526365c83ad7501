//! Storage layer abstraction trait definition

mod account_repository;
mod change_feed_sink;
mod workflow_repository;

pub use account_repository::{
    AccountDetails, AccountGuard, AccountRepository, InMemoryAccountRepository, check_replace,
};
pub use change_feed_sink::ChangeFeedSink;
pub use workflow_repository::{InMemoryWorkflowRepository, WorkflowRepository};
