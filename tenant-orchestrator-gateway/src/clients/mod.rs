//! HTTP implementations of the gateway traits

mod account_factory;
mod common;
mod delivery;

pub use account_factory::HttpAccountFactory;
pub use delivery::HttpDeliveryService;
