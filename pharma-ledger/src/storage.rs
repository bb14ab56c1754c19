//! Storage layer
//!
//! # Collections
//!
//! - `batches` - Current-state records (key: batch ID)
//! - `events` - Append-only ledger (key: sequence number)
//!
//! [`SupplyStore`] is the persistence boundary. [`MemoryStore`] keeps both
//! collections behind one lock and is used for tests and single-node runs.

use crate::{
    error::{Error, Result},
    types::{
        Batch, BatchId, BatchPatch, BatchWrite, ClearSummary, Event, EventFilter, NewEvent,
        SortOrder,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Document store holding the batch registry and the event ledger
#[async_trait]
pub trait SupplyStore: Send + Sync {
    /// Look up one batch
    async fn find_batch(&self, batch_id: &BatchId) -> Result<Option<Batch>>;

    /// Insert a batch; `DuplicateBatch` when the ID is taken
    async fn insert_batch(&self, batch: Batch) -> Result<Batch>;

    /// Patch a batch; `None` when it does not exist
    async fn update_batch(&self, batch_id: &BatchId, patch: &BatchPatch) -> Result<Option<Batch>>;

    /// All batches, newest `created_at` first
    async fn list_batches(&self) -> Result<Vec<Batch>>;

    /// Remove every batch
    async fn delete_batches(&self) -> Result<u64>;

    /// Append an event, assigning its sequence number and timestamp
    async fn insert_event(&self, event: NewEvent) -> Result<Event>;

    /// Events matching `filter`, ordered by timestamp then sequence
    async fn list_events(&self, filter: &EventFilter, order: SortOrder) -> Result<Vec<Event>>;

    /// Remove every event
    async fn delete_events(&self) -> Result<u64>;

    /// Apply a registry write and append its ledger entry as one unit
    ///
    /// Returns `None`, and writes nothing, when an update targets a missing
    /// batch. Either both records are stored or neither is.
    async fn write_with_event(
        &self,
        write: BatchWrite,
        event: NewEvent,
    ) -> Result<Option<(Batch, Event)>>;

    /// Empty both collections together
    async fn clear_all(&self) -> Result<ClearSummary>;
}

#[derive(Debug, Default)]
struct Collections {
    batches: HashMap<BatchId, Batch>,
    // Insertion order, used to break created_at ties
    batch_order: Vec<BatchId>,
    events: Vec<Event>,
    next_event_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Collections {
    /// Current time, bumped past the last handed-out timestamp
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn insert_batch(&mut self, batch: Batch) -> Result<Batch> {
        if self.batches.contains_key(&batch.batch_id) {
            return Err(Error::DuplicateBatch(batch.batch_id.to_string()));
        }
        self.batch_order.push(batch.batch_id.clone());
        self.batches.insert(batch.batch_id.clone(), batch.clone());
        Ok(batch)
    }

    fn update_batch(&mut self, batch_id: &BatchId, patch: &BatchPatch) -> Option<Batch> {
        let batch = self.batches.get_mut(batch_id)?;
        batch.apply(patch);
        Some(batch.clone())
    }

    fn insert_event(&mut self, event: NewEvent) -> Event {
        self.next_event_id += 1;
        let timestamp = self.next_timestamp();
        let event = event.into_event(self.next_event_id, timestamp);
        self.events.push(event.clone());
        event
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SupplyStore for MemoryStore {
    async fn find_batch(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        Ok(self.inner.lock().batches.get(batch_id).cloned())
    }

    async fn insert_batch(&self, batch: Batch) -> Result<Batch> {
        self.inner.lock().insert_batch(batch)
    }

    async fn update_batch(&self, batch_id: &BatchId, patch: &BatchPatch) -> Result<Option<Batch>> {
        Ok(self.inner.lock().update_batch(batch_id, patch))
    }

    async fn list_batches(&self) -> Result<Vec<Batch>> {
        let inner = self.inner.lock();
        let mut batches: Vec<Batch> = inner
            .batch_order
            .iter()
            .rev()
            .filter_map(|id| inner.batches.get(id).cloned())
            .collect();
        // Stable sort keeps newest-inserted first among equal timestamps
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    async fn delete_batches(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let removed = inner.batches.len() as u64;
        inner.batches.clear();
        inner.batch_order.clear();
        Ok(removed)
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        Ok(self.inner.lock().insert_event(event))
    }

    async fn list_events(&self, filter: &EventFilter, order: SortOrder) -> Result<Vec<Event>> {
        let inner = self.inner.lock();
        let mut events: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        events.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        if order == SortOrder::Descending {
            events.reverse();
        }
        Ok(events)
    }

    async fn delete_events(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let removed = inner.events.len() as u64;
        inner.events.clear();
        Ok(removed)
    }

    async fn write_with_event(
        &self,
        write: BatchWrite,
        event: NewEvent,
    ) -> Result<Option<(Batch, Event)>> {
        let mut inner = self.inner.lock();

        let batch = match write {
            BatchWrite::Insert(batch) => inner.insert_batch(batch)?,
            BatchWrite::Update(ref batch_id, ref patch) => {
                match inner.update_batch(batch_id, patch) {
                    Some(batch) => batch,
                    None => return Ok(None),
                }
            }
        };

        let event = inner.insert_event(event);

        tracing::debug!(
            batch_id = %batch.batch_id,
            event_id = event.id,
            action = %event.action,
            "Batch write committed with ledger entry"
        );

        Ok(Some((batch, event)))
    }

    async fn clear_all(&self) -> Result<ClearSummary> {
        let mut inner = self.inner.lock();
        let summary = ClearSummary {
            batches_removed: inner.batches.len() as u64,
            events_removed: inner.events.len() as u64,
        };
        inner.batches.clear();
        inner.batch_order.clear();
        inner.events.clear();
        Ok(summary)
    }
}
