//! Event ledger
//!
//! Append-only, time-ordered log of actions taken against batches. Entries
//! are never modified; the only removal is the bulk clear.
//!
//! # Example
//!
//! ```no_run
//! use pharma_ledger::{EventLedger, MemoryStore, SortOrder};
//! use std::sync::Arc;
//!
//! # async fn demo() -> pharma_ledger::Result<()> {
//! let ledger = EventLedger::new(Arc::new(MemoryStore::new()));
//! ledger.append("B100", "Pharmacy", "Sold", None).await?;
//!
//! let history = ledger.list_by_batch("B100").await?;
//! let audit = ledger.list_all(SortOrder::Descending).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    error::Result,
    storage::SupplyStore,
    types::{BatchId, Event, EventFilter, NewEvent, SortOrder},
};
use std::sync::Arc;

/// Append-only event repository
#[derive(Clone)]
pub struct EventLedger {
    store: Arc<dyn SupplyStore>,
}

impl EventLedger {
    /// Wrap a store
    pub fn new(store: Arc<dyn SupplyStore>) -> Self {
        Self { store }
    }

    /// Append a new entry
    ///
    /// The batch ID is recorded as given; it need not name a registered batch.
    pub async fn append(
        &self,
        batch_id: &str,
        actor: &str,
        action: &str,
        notes: Option<&str>,
    ) -> Result<Event> {
        let event = NewEvent::new(batch_id, actor, action, notes)?;
        let event = self.store.insert_event(event).await?;

        tracing::debug!(
            event_id = event.id,
            batch_id = %event.batch_id,
            actor = %event.actor,
            action = %event.action,
            "Event appended"
        );

        Ok(event)
    }

    /// Every entry in the given order
    pub async fn list_all(&self, order: SortOrder) -> Result<Vec<Event>> {
        self.store.list_events(&EventFilter::all(), order).await
    }

    /// One batch's history, oldest first
    ///
    /// A blank or unknown batch ID yields an empty history.
    pub async fn list_by_batch(&self, batch_id: &str) -> Result<Vec<Event>> {
        let batch_id = match BatchId::parse(batch_id) {
            Ok(id) => id,
            Err(_) => return Ok(Vec::new()),
        };
        self.store
            .list_events(&EventFilter::for_batch(&batch_id), SortOrder::Ascending)
            .await
    }

    /// Remove every entry
    pub async fn clear_all(&self) -> Result<u64> {
        self.store.delete_events().await
    }
}

impl std::fmt::Debug for EventLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLedger").finish_non_exhaustive()
    }
}
