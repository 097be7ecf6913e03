use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// In-memory event store implementation.
///
/// Backs the default binary wiring and the test suites; provides the same
/// optimistic-concurrency semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let aggregate_id = first_event.aggregate_id;

        let mut store = self.events.write().await;

        // Current version for this aggregate
        let current_version = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial());

        // Check expected version if specified
        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Simulate the unique (aggregate_id, version) constraint
        let first_new_version = first_event.version;
        if first_new_version <= current_version && current_version != Version::initial() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());
        store.extend(events);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let events: Vec<_> = self.events.read().await.clone();
        let stream = futures_util::stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn envelope(aggregate_id: AggregateId, version: Version) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("OrderReceived")
            .aggregate_id(aggregate_id)
            .aggregate_type("FulfillmentOrder")
            .version(version)
            .payload_raw(serde_json::json!({"order_number": "SO-1"}))
            .build()
    }

    #[tokio::test]
    async fn append_and_load_roundtrip() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![envelope(id, Version::first())], AppendOptions::new())
            .await
            .unwrap();

        let events = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, Version::first());
    }

    #[tokio::test]
    async fn expected_version_mismatch_conflicts() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![envelope(id, Version::first())], AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append(
                vec![envelope(id, Version::new(2))],
                AppendOptions::expect_version(Version::new(5)),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn expect_new_fails_for_existing_aggregate() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![envelope(id, Version::first())], AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append(vec![envelope(id, Version::first())], AppendOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn stale_version_conflicts_without_expectation() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(
                vec![envelope(id, Version::new(1)), envelope(id, Version::new(2))],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        // Writing version 2 again must conflict even without an expectation.
        let result = store
            .append(vec![envelope(id, Version::new(2))], AppendOptions::new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn stream_all_yields_insertion_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(vec![envelope(a, Version::first())], AppendOptions::new())
            .await
            .unwrap();
        store
            .append(vec![envelope(b, Version::first())], AppendOptions::new())
            .await
            .unwrap();

        let mut stream = store.stream_all_events().await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.aggregate_id, a);
        assert_eq!(second.aggregate_id, b);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn aggregate_version_tracks_latest() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        assert_eq!(store.get_aggregate_version(id).await.unwrap(), None);

        store
            .append(
                vec![envelope(id, Version::new(1)), envelope(id, Version::new(2))],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            store.get_aggregate_version(id).await.unwrap(),
            Some(Version::new(2))
        );
    }
}
