//! Broker transport trait and publish errors
//!
//! The publisher only talks to a [`BrokerTransport`], which lets tests swap
//! the AMQP connection for an in-memory one.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering a record
#[derive(Debug, Error)]
pub enum PublishError {
    /// The connection or channel can no longer be used; reconnecting may help
    #[error("broker connection unusable: {0}")]
    ConnectionLost(String),

    /// The broker refused or failed the delivery
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PublishError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// A connection to a message broker
#[async_trait]
pub trait BrokerTransport: Send {
    /// Opens (or reopens) the connection and channel and declares the
    /// destination; any previous connection is torn down first
    async fn connect(&mut self) -> PublishResult<()>;

    /// Delivers one payload to the configured destination
    async fn send(&mut self, payload: &[u8]) -> PublishResult<()>;

    /// Human-readable destination for logs
    fn describe(&self) -> String;
}
