use crate::config::BrokerConfig;
use crate::output::amqp::AmqpTransport;
use crate::output::record::Record;
use crate::output::traits::BrokerTransport;

/// Delivery attempts per record before it is given up
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Where finished records go
///
/// Chosen once at startup: records are either logged locally or delivered
/// to a message broker.
pub enum Publisher {
    /// No broker configured (or reachable): records are written to the log
    LocalLog,
    /// Records are delivered through a broker transport
    Broker(Box<dyn BrokerTransport>),
}

impl Publisher {
    /// Publisher that logs every record
    pub fn local() -> Self {
        Self::LocalLog
    }

    /// Connects a transport, falling back to local logging when it fails
    pub async fn connect(mut transport: Box<dyn BrokerTransport>) -> Self {
        match transport.connect().await {
            Ok(()) => Self::Broker(transport),
            Err(e) => {
                tracing::warn!(
                    "Cannot write to message queue {} ({}). Records will be logged instead.",
                    transport.describe(),
                    e
                );
                Self::LocalLog
            }
        }
    }

    /// Builds the publisher for an optional broker configuration
    pub async fn from_config(broker: Option<&BrokerConfig>) -> Self {
        match broker {
            Some(config) => Self::connect(Box::new(AmqpTransport::new(config.clone()))).await,
            None => Self::LocalLog,
        }
    }

    pub fn is_broker(&self) -> bool {
        matches!(self, Self::Broker(_))
    }

    /// Publishes a record
    ///
    /// Returns false when the record was lost: it could not be serialized or
    /// every delivery attempt failed.
    pub async fn publish(&mut self, record: &Record) -> bool {
        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(severity = "critical", "Failed to serialize record: {}", e);
                return false;
            }
        };

        match self {
            Self::LocalLog => {
                tracing::info!(payload = %String::from_utf8_lossy(&payload), "crawled");
                true
            }
            Self::Broker(transport) => deliver(transport.as_mut(), &payload).await,
        }
    }
}

/// Tries a bounded number of deliveries, reconnecting on connection loss
async fn deliver(transport: &mut dyn BrokerTransport, payload: &[u8]) -> bool {
    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        match transport.send(payload).await {
            Ok(()) => {
                tracing::debug!(attempt, "Record delivered to {}", transport.describe());
                return true;
            }
            Err(e) if e.is_connection_lost() => {
                tracing::warn!(attempt, "Broker connection lost ({}), reconnecting", e);
                if let Err(e) = transport.connect().await {
                    tracing::warn!(attempt, "Reconnect to message broker failed: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(attempt, "Delivery to message broker failed: {}", e);
            }
        }
    }

    tracing::error!(
        severity = "critical",
        attempts = MAX_DELIVERY_ATTEMPTS,
        "Failed to send record to message queue {}",
        transport.describe()
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::traits::{PublishError, PublishResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Calls {
        connects: u32,
        sends: u32,
        delivered: Vec<Vec<u8>>,
    }

    /// Transport whose send results are scripted; unscripted sends succeed
    struct ScriptedTransport {
        calls: Arc<Mutex<Calls>>,
        connect_ok: bool,
        sends: VecDeque<PublishResult<()>>,
    }

    impl ScriptedTransport {
        fn new(connect_ok: bool, sends: Vec<PublishResult<()>>) -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let transport = Self {
                calls: calls.clone(),
                connect_ok,
                sends: sends.into(),
            };
            (transport, calls)
        }
    }

    #[async_trait]
    impl BrokerTransport for ScriptedTransport {
        async fn connect(&mut self) -> PublishResult<()> {
            self.calls.lock().unwrap().connects += 1;
            if self.connect_ok {
                Ok(())
            } else {
                Err(PublishError::ConnectionLost("refused".into()))
            }
        }

        async fn send(&mut self, payload: &[u8]) -> PublishResult<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.sends += 1;
            let result = self.sends.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                calls.delivered.push(payload.to_vec());
            }
            result
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn lost() -> PublishResult<()> {
        Err(PublishError::ConnectionLost("stream lost".into()))
    }

    fn record() -> Record {
        Record::new().with("title", "hello")
    }

    #[tokio::test]
    async fn test_local_publish_succeeds() {
        let mut publisher = Publisher::local();
        assert!(!publisher.is_broker());
        assert!(publisher.publish(&record()).await);
    }

    #[tokio::test]
    async fn test_unreachable_broker_falls_back_to_local() {
        let (transport, calls) = ScriptedTransport::new(false, vec![]);
        let mut publisher = Publisher::connect(Box::new(transport)).await;

        assert!(!publisher.is_broker());
        assert!(publisher.publish(&record()).await);
        assert_eq!(calls.lock().unwrap().sends, 0);
    }

    #[tokio::test]
    async fn test_always_failing_delivery_is_bounded() {
        let (transport, calls) = ScriptedTransport::new(true, vec![lost(), lost(), lost(), lost()]);
        let mut publisher = Publisher::connect(Box::new(transport)).await;

        assert!(!publisher.publish(&record()).await);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.sends, 3);
        // One initial connect plus at most one reconnect per attempt
        assert!(calls.connects - 1 <= 3);
        assert!(calls.delivered.is_empty());
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_stops() {
        let (transport, calls) = ScriptedTransport::new(true, vec![lost(), Ok(()), lost()]);
        let mut publisher = Publisher::connect(Box::new(transport)).await;

        assert!(publisher.publish(&record()).await);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.sends, 2);
        assert_eq!(calls.connects, 2);
        assert_eq!(calls.delivered, vec![br#"{"title":"hello"}"#.to_vec()]);
    }

    #[tokio::test]
    async fn test_delivery_errors_do_not_reconnect() {
        let (transport, calls) = ScriptedTransport::new(
            true,
            vec![Err(PublishError::Delivery("nack".into())), Ok(())],
        );
        let mut publisher = Publisher::connect(Box::new(transport)).await;

        assert!(publisher.publish(&record()).await);
        assert_eq!(calls.lock().unwrap().connects, 1);
    }
}
