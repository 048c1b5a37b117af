//! Output module for delivering crawled records
//!
//! This module handles:
//! - The record type produced by extractors
//! - Publishing to a message broker with bounded reconnect-and-retry
//! - Falling back to local logging when no broker is available

mod amqp;
mod publisher;
mod record;
mod traits;

pub use amqp::AmqpTransport;
pub use publisher::{Publisher, MAX_DELIVERY_ATTEMPTS};
pub use record::Record;
pub use traits::{BrokerTransport, PublishError, PublishResult};
