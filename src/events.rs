use std::sync::Arc;
use std::time::Duration;

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

pub const EXCHANGE: &str = "expense_events";
pub const EXPENSE_CREATED: &str = "expense.created";
pub const EXPENSE_UPDATED: &str = "expense.updated";
pub const EXPENSE_DELETED: &str = "expense.deleted";

/// Wire format for expense change notifications.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl EventEnvelope {
    pub fn new(event: &str, data: serde_json::Value) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            event: event.to_string(),
            data,
            timestamp,
        }
    }

    /// Owner of the expense the event is about. Every routing key carries it.
    pub fn user_id(&self) -> Option<i64> {
        self.data.get("userId")?.as_i64()
    }
}

/// Broker connections are only retried at startup; after that, publish
/// failures are logged by callers and the caches recover via TTL.
pub async fn connect_with_retry(url: &str) -> anyhow::Result<Connection> {
    const ATTEMPTS: usize = 5;
    const DELAY: Duration = Duration::from_secs(3);

    let mut last_err = None;
    for attempt in 1..=ATTEMPTS {
        match Connection::connect(url, ConnectionProperties::default()).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(error = %e, attempt, "message broker connection failed");
                last_err = Some(e);
                if attempt < ATTEMPTS {
                    tokio::time::sleep(DELAY).await;
                }
            }
        }
    }
    Err(anyhow::anyhow!(
        "message broker unreachable: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[derive(Clone)]
pub struct EventPublisher {
    // The channel closes if the connection drops, so keep both alive together.
    _connection: Arc<Connection>,
    channel: Channel,
}

impl EventPublisher {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let connection = connect_with_retry(url).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        info!("connected to message broker");
        Ok(Self {
            _connection: Arc::new(connection),
            channel,
        })
    }

    pub async fn publish(&self, event: &str, data: serde_json::Value) -> anyhow::Result<()> {
        let envelope = EventEnvelope::new(event, data);
        let payload = serde_json::to_vec(&envelope)?;
        self.channel
            .basic_publish(
                EXCHANGE,
                event,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_carries_event_and_owner() {
        let envelope = EventEnvelope::new(
            EXPENSE_CREATED,
            json!({"id": 7, "userId": 42, "amount": "12.50"}),
        );
        assert_eq!(envelope.event, "expense.created");
        assert_eq!(envelope.user_id(), Some(42));
        assert!(!envelope.timestamp.is_empty());
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let envelope = EventEnvelope::new(EXPENSE_DELETED, json!({"id": 3, "userId": 9}));
        let raw = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.event, "expense.deleted");
        assert_eq!(back.user_id(), Some(9));
    }

    #[test]
    fn envelope_without_owner_yields_none() {
        let envelope = EventEnvelope::new(EXPENSE_UPDATED, json!({"id": 3}));
        assert_eq!(envelope.user_id(), None);
    }
}
