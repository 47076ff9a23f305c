// crates/taskcore/src/events/mod.rs

mod base;
mod iggy_bus;

pub use base::{BrokerRecord, InMemoryBroker, MessagePublisher, MessageSubscriber};
pub use iggy_bus::{IggyStatusPublisher, IggyStatusPublisherConfig};
