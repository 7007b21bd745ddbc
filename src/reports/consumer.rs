use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::ExchangeKind;
use tracing::{info, warn};

use crate::events::{self, EventEnvelope};
use crate::reports::handlers::{dashboard_cache_key, monthly_cache_key};
use crate::state::AppState;

const QUEUE: &str = "report_expense_events";
const BINDING: &str = "expense.*";

/// Consumes expense change events and drops the affected user's cached
/// reports. Runs for the lifetime of the report service process.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let connection = events::connect_with_retry(&state.config.amqp_url).await?;
    let channel = connection.create_channel().await?;

    channel
        .exchange_declare(
            events::EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(
            QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            QUEUE,
            events::EXCHANGE,
            BINDING,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            QUEUE,
            "report-service",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = QUEUE, "listening for expense events");
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(error) => {
                warn!(%error, "consumer stream error");
                continue;
            }
        };

        match handle(&state, &delivery.data).await {
            Ok(()) => delivery.ack(BasicAckOptions::default()).await?,
            Err(error) => {
                warn!(%error, "event handling failed, requeueing");
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
            }
        }
    }
    Ok(())
}

/// Invalidate both report caches for the event's owner. Errors here mean the
/// cache could not be reached, in which case the delivery is requeued;
/// malformed payloads are dropped instead, since redelivery cannot fix them.
async fn handle(state: &AppState, payload: &[u8]) -> anyhow::Result<()> {
    let envelope: EventEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%error, "unparseable event payload, dropping");
            return Ok(());
        }
    };
    let Some(user_id) = owner_id(&envelope) else {
        warn!(event = %envelope.event, "event without usable owner, dropping");
        return Ok(());
    };

    state.cache.delete(&monthly_cache_key(user_id)).await?;
    state.cache.delete(&dashboard_cache_key(user_id)).await?;
    info!(event = %envelope.event, user_id, "report caches invalidated");
    Ok(())
}

/// Owners are i32 ids; a value outside that range cannot belong to any user,
/// so such events are dropped rather than mapped onto someone else's keys.
fn owner_id(envelope: &EventEnvelope) -> Option<i32> {
    envelope.user_id().and_then(|id| i32::try_from(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_id_rejects_out_of_range_values() {
        let envelope = EventEnvelope::new("expense.created", json!({"userId": 10_000_000_000i64}));
        assert_eq!(owner_id(&envelope), None);

        let envelope = EventEnvelope::new("expense.created", json!({"userId": -1}));
        assert_eq!(owner_id(&envelope), Some(-1));

        let envelope = EventEnvelope::new("expense.deleted", json!({"userId": 42}));
        assert_eq!(owner_id(&envelope), Some(42));
    }
}
