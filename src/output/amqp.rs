//! AMQP transport backed by lapin

use crate::config::BrokerConfig;
use crate::output::traits::{BrokerTransport, PublishError, PublishResult};
use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

impl From<lapin::Error> for PublishError {
    fn from(error: lapin::Error) -> Self {
        match error {
            lapin::Error::InvalidChannelState(_)
            | lapin::Error::InvalidConnectionState(_)
            | lapin::Error::IOError(_) => PublishError::ConnectionLost(error.to_string()),
            other => PublishError::Delivery(other.to_string()),
        }
    }
}

/// Publishes to a RabbitMQ-compatible broker
pub struct AmqpTransport {
    config: BrokerConfig,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl AmqpTransport {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connection: None,
            channel: None,
        }
    }

    async fn teardown(&mut self) {
        self.channel = None;
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close(200, "reconnecting").await {
                tracing::debug!("Ignoring error while closing broker connection: {}", e);
            }
        }
    }
}

fn exchange_kind(kind: &str) -> ExchangeKind {
    match kind.to_ascii_lowercase().as_str() {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Custom(kind.to_string()),
    }
}

/// A nack means the broker refused the message
fn check_confirmation(confirmation: Confirmation) -> PublishResult<()> {
    if confirmation.is_nack() {
        return Err(PublishError::Delivery(
            "broker rejected the message".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl BrokerTransport for AmqpTransport {
    async fn connect(&mut self) -> PublishResult<()> {
        self.teardown().await;

        let connection =
            Connection::connect(&self.config.amqp_uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        match (&self.config.exchange, &self.config.queue) {
            (Some(exchange), _) => {
                channel
                    .exchange_declare(
                        &exchange.name,
                        exchange_kind(&exchange.kind),
                        ExchangeDeclareOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
            }
            (None, Some(queue)) => {
                channel
                    .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
                    .await?;
            }
            (None, None) => {
                return Err(PublishError::Delivery(
                    "broker has neither a queue nor an exchange".to_string(),
                ))
            }
        }

        tracing::info!("Connected to message broker: {}", self.describe());
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    async fn send(&mut self, payload: &[u8]) -> PublishResult<()> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| PublishError::ConnectionLost("channel is not open".to_string()))?;

        let (exchange, routing_key) = self.config.route();
        let confirmation = channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await?
            .await?;
        check_confirmation(confirmation)
    }

    fn describe(&self) -> String {
        let (exchange, routing_key) = self.config.route();
        format!(
            "amqp://{}:{}/{} exchange='{}' routing-key='{}'",
            self.config.host, self.config.port, self.config.vhost, exchange, routing_key
        )
    }
}
