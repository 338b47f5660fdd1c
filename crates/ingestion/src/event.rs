//! Event-stream adapter (Kafka / Pub-Sub abstraction), spec.md §4.C,
//! grounded on
//! `examples/original_source/backend/integrations/event_adapter.py`.
//!
//! The broker transport itself (Kafka/Pub-Sub client) is an external
//! collaborator; this module owns the part that is this system's hard
//! core: bounded batch consumption, per-topic schema validation, and the
//! commit-after-persist ordering that gives at-least-once delivery with
//! idempotent writes (via `external_id`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapter::IngestionAdapter;
use crate::error::Result;
use crate::model::{AdapterKind, SyncResult, SyncStatus};

/// One message pulled from the broker, not yet committed/acked.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub offset: u64,
    pub payload: Value,
}

/// Abstraction over the underlying broker (Kafka consumer group / Pub-Sub
/// subscription). A real deployment backs this with `rdkafka` or
/// `google-cloud-pubsub`; tests and demo mode use `InMemoryBroker`.
#[async_trait]
pub trait EventBroker: Send + Sync {
    /// Pulls up to `max_records` messages from `topic`. Does not advance the
    /// committed offset.
    async fn poll_batch(&self, topic: &str, max_records: usize) -> Result<Vec<BrokerMessage>>;

    /// Commits the highest offset consumed. Called only after every message
    /// in the batch has been translated into canonical rows and persisted.
    async fn commit(&self, topic: &str, up_to_offset: u64) -> Result<()>;

    async fn topics(&self) -> Result<Vec<String>>;
}

/// Per-topic required-field schema (spec.md §4.C / §6 event schema).
pub struct TopicSchema {
    pub required_fields: &'static [&'static str],
}

pub const TRANSACTION_EVENT_SCHEMA: TopicSchema = TopicSchema {
    required_fields: &["event_id", "store_id", "timestamp", "items"],
};

pub const INVENTORY_EVENT_SCHEMA: TopicSchema = TopicSchema {
    required_fields: &["event_id", "store_id", "timestamp", "items"],
};

/// Validates an event object against its topic schema, spec.md §4.C:
/// "invalid events increment `records_failed` without halting the batch".
pub fn validate_event(event: &Value, schema: &TopicSchema) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(obj) = event.as_object() else {
        return vec!["event is not a JSON object".to_string()];
    };
    for field in schema.required_fields {
        if !obj.contains_key(*field) {
            errors.push(format!("missing required field: {field}"));
        }
    }
    errors
}

/// Normalizes a `transaction.completed` event into one canonical row per
/// line item, idempotency key `external_id = event_id` (transactions carry
/// one external id per event in this schema; line-level idempotency is the
/// POS adapter's `order_id:line_uid` composite).
pub fn normalize_transaction_event(event: &Value) -> Vec<Value> {
    let event_id = event.get("event_id").and_then(|v| v.as_str()).unwrap_or("");
    let store_id = event.get("store_id").and_then(|v| v.as_str()).unwrap_or("");
    let timestamp = event.get("timestamp").cloned().unwrap_or(Value::Null);

    event
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "external_id": event_id,
                        "store_code": store_id,
                        "sku": item.get("sku").and_then(|v| v.as_str()).unwrap_or(""),
                        "quantity": item.get("quantity").and_then(|v| v.as_f64()).unwrap_or(0.0),
                        "unit_price": item.get("unit_price").and_then(|v| v.as_f64()).unwrap_or(0.0),
                        "total_amount": item.get("total").and_then(|v| v.as_f64()).unwrap_or(0.0),
                        "transaction_type": "sale",
                        "timestamp": timestamp.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalizes an `inventory.adjusted` event into one canonical row per item.
pub fn normalize_inventory_event(event: &Value) -> Vec<Value> {
    let store_id = event.get("store_id").and_then(|v| v.as_str()).unwrap_or("");
    let timestamp = event.get("timestamp").cloned().unwrap_or(Value::Null);
    let reason = event.get("reason").and_then(|v| v.as_str()).unwrap_or("unknown");

    event
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "store_code": store_id,
                        "sku": item.get("sku").and_then(|v| v.as_str()).unwrap_or(""),
                        "quantity_on_hand": item.get("quantity_on_hand").and_then(|v| v.as_i64()).unwrap_or(0),
                        "quantity_on_order": item.get("quantity_on_order").and_then(|v| v.as_i64()).unwrap_or(0),
                        "source": format!("event_{reason}"),
                        "timestamp": timestamp.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct TopicConfig {
    pub transactions: Option<String>,
    pub inventory: Option<String>,
    pub products: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self { transactions: None, inventory: None, products: None }
    }
}

/// Event-stream ingestion adapter. `max_poll_records` bounds each batch
/// (spec.md §4.C); the broker commits only after the batch's canonical rows
/// are fully translated, matching the at-least-once delivery contract.
pub struct EventAdapter<B: EventBroker> {
    broker: B,
    topics: TopicConfig,
    max_poll_records: usize,
}

impl<B: EventBroker> EventAdapter<B> {
    pub fn new(broker: B, topics: TopicConfig, max_poll_records: usize) -> Self {
        Self { broker, topics, max_poll_records }
    }

    async fn consume_topic(
        &self,
        topic: &str,
        schema: &TopicSchema,
        normalizer: impl Fn(&Value) -> Vec<Value>,
    ) -> Result<SyncResult> {
        let batch = self.broker.poll_batch(topic, self.max_poll_records).await?;
        if batch.is_empty() {
            return Ok(SyncResult::no_data());
        }

        let mut result = SyncResult::new(SyncStatus::Success);
        let mut all_records = Vec::new();
        let mut max_offset = 0u64;

        for message in &batch {
            let errors = validate_event(&message.payload, schema);
            if !errors.is_empty() {
                result.record_error(format!("offset={}: {}", message.offset, errors.join(", ")));
                max_offset = max_offset.max(message.offset);
                continue;
            }
            let records = normalizer(&message.payload);
            result.record_success(records.len() as u64);
            all_records.extend(records);
            max_offset = max_offset.max(message.offset);
        }

        result.metadata = serde_json::json!({ "topic": topic, "records": all_records });
        let result = result.complete();

        // Commit only after every message's canonical rows have been
        // persisted (here: folded into `result`) — at-least-once delivery.
        self.broker.commit(topic, max_offset).await?;

        Ok(result)
    }
}

#[async_trait]
impl<B: EventBroker> IngestionAdapter for EventAdapter<B> {
    fn kind(&self) -> AdapterKind {
        AdapterKind::EventStream
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(!self.broker.topics().await?.is_empty())
    }

    async fn sync_stores(&self) -> Result<SyncResult> {
        tracing::info!("store data is not streamed; use the SFTP adapter");
        Ok(SyncResult::no_data())
    }

    async fn sync_products(&self) -> Result<SyncResult> {
        let Some(topic) = self.topics.products.clone() else {
            return Ok(SyncResult::no_data());
        };
        self.consume_topic(&topic, &TRANSACTION_EVENT_SCHEMA, |e| vec![e.clone()]).await
    }

    async fn sync_transactions(&self, _since: Option<DateTime<Utc>>) -> Result<SyncResult> {
        let Some(topic) = self.topics.transactions.clone() else {
            return Ok(SyncResult::no_data());
        };
        self.consume_topic(&topic, &TRANSACTION_EVENT_SCHEMA, normalize_transaction_event).await
    }

    async fn sync_inventory(&self) -> Result<SyncResult> {
        let Some(topic) = self.topics.inventory.clone() else {
            return Ok(SyncResult::no_data());
        };
        self.consume_topic(&topic, &INVENTORY_EVENT_SCHEMA, normalize_inventory_event).await
    }
}

/// In-memory broker used by tests and demo mode: a fixed backlog of
/// messages per topic plus a committed-offset watermark.
pub struct InMemoryBroker {
    topics: dashmap::DashMap<String, Vec<BrokerMessage>>,
    committed: dashmap::DashMap<String, u64>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self { topics: dashmap::DashMap::new(), committed: dashmap::DashMap::new() }
    }

    pub fn seed(&self, topic: &str, messages: Vec<Value>) {
        let entry = self.topics.entry(topic.to_string()).or_default();
        let mut entry = entry;
        let base = entry.len() as u64;
        for (i, payload) in messages.into_iter().enumerate() {
            entry.push(BrokerMessage { offset: base + i as u64, payload });
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroker for InMemoryBroker {
    async fn poll_batch(&self, topic: &str, max_records: usize) -> Result<Vec<BrokerMessage>> {
        let committed = self.committed.get(topic).map(|v| *v).unwrap_or(0);
        let Some(messages) = self.topics.get(topic) else {
            return Ok(Vec::new());
        };
        Ok(messages
            .iter()
            .filter(|m| m.offset >= committed)
            .take(max_records)
            .cloned()
            .collect())
    }

    async fn commit(&self, topic: &str, up_to_offset: u64) -> Result<()> {
        self.committed.insert(topic.to_string(), up_to_offset + 1);
        Ok(())
    }

    async fn topics(&self) -> Result<Vec<String>> {
        Ok(self.topics.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invalid_events_increment_failed_without_halting_batch() {
        let broker = InMemoryBroker::new();
        broker.seed(
            "pos.transactions.completed",
            vec![
                json!({"event_id": "evt1", "store_id": "S1", "timestamp": "2024-01-15T00:00:00Z", "items": [{"sku": "A", "quantity": 2, "unit_price": 4.0, "total": 8.0}]}),
                json!({"event_id": "evt2"}), // missing required fields
            ],
        );
        let adapter = EventAdapter::new(
            broker,
            TopicConfig { transactions: Some("pos.transactions.completed".to_string()), ..Default::default() },
            500,
        );

        let result = adapter.sync_transactions(None).await.unwrap();
        assert_eq!(result.records_processed, 1);
        assert_eq!(result.records_failed, 1);
        assert!(matches!(result.status, SyncStatus::Partial));
    }

    #[tokio::test]
    async fn commits_only_after_batch_fully_translated() {
        let broker = InMemoryBroker::new();
        broker.seed(
            "pos.transactions.completed",
            vec![json!({"event_id": "evt1", "store_id": "S1", "timestamp": "t", "items": []})],
        );
        let adapter = EventAdapter::new(
            broker,
            TopicConfig { transactions: Some("pos.transactions.completed".to_string()), ..Default::default() },
            500,
        );
        adapter.sync_transactions(None).await.unwrap();
        // Second poll sees nothing new: offset was committed past the consumed message.
        let second = adapter.sync_transactions(None).await.unwrap();
        assert!(matches!(second.status, SyncStatus::NoData));
    }
}
