//! Stage-transition workflow
//!
//! Every state-changing action is one registry mutation paired with one
//! ledger entry. Both are handed to the store as a single
//! [`BatchWrite`] + [`NewEvent`] so they commit together or not at all.
//!
//! | Hand-off | Actor | Destination | Ledger action |
//! |---|---|---|---|
//! | `AcceptShipment` | Manufacturer | Manufacturer | Accepted Shipment |
//! | `Produce` | Manufacturer | Repackage | Produced |
//! | `Repackage` | Repackage | Distributor | Repackaged |
//! | `Dispatch` | Distributor | Pharmacy | Dispatched |
//! | `Receive` | Pharmacy | Patient | Received |
//! | `Sell` | Pharmacy | Delivered | Sold |
//!
//! The workflow order is advisory: [`StageWorkflow::transition_stage`]
//! accepts any destination from any stage.

use crate::{
    config::{DuplicatePolicy, WorkflowConfig},
    error::{Error, Result},
    ledger::EventLedger,
    metrics::Metrics,
    registry::BatchRegistry,
    storage::SupplyStore,
    types::{Batch, BatchId, BatchPatch, BatchWrite, ClearSummary, Event, NewEvent, Stage},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Actor recorded for registrations
pub const SUPPLIER_ACTOR: &str = "Supplier";

/// Ledger action for a new batch
pub const ACTION_CREATED: &str = "Created";

/// Ledger action for a restocked batch
pub const ACTION_RESTOCKED: &str = "Restocked";

/// Ledger action for a plain stage change
pub const ACTION_STAGE_UPDATED: &str = "Stage Updated";

/// Named workflow step pairing a stage change with a ledger label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handoff {
    /// Manufacturer takes delivery from the supplier
    AcceptShipment,
    /// Manufacturer finishes production
    Produce,
    /// Repackager hands over to distribution
    Repackage,
    /// Distributor ships to the pharmacy
    Dispatch,
    /// Pharmacy receives stock
    Receive,
    /// Pharmacy sells to a patient
    Sell,
}

impl Handoff {
    /// Every hand-off in workflow order
    pub const ALL: [Handoff; 6] = [
        Handoff::AcceptShipment,
        Handoff::Produce,
        Handoff::Repackage,
        Handoff::Dispatch,
        Handoff::Receive,
        Handoff::Sell,
    ];

    /// Party performing the step
    pub fn actor(&self) -> &'static str {
        match self {
            Handoff::AcceptShipment | Handoff::Produce => "Manufacturer",
            Handoff::Repackage => "Repackage",
            Handoff::Dispatch => "Distributor",
            Handoff::Receive | Handoff::Sell => "Pharmacy",
        }
    }

    /// Stage the batch moves to
    pub fn destination(&self) -> Stage {
        match self {
            Handoff::AcceptShipment => Stage::Manufacturer,
            Handoff::Produce => Stage::Repackage,
            Handoff::Repackage => Stage::Distributor,
            Handoff::Dispatch => Stage::Pharmacy,
            Handoff::Receive => Stage::Patient,
            Handoff::Sell => Stage::Delivered,
        }
    }

    /// Ledger action label
    pub fn action(&self) -> &'static str {
        match self {
            Handoff::AcceptShipment => "Accepted Shipment",
            Handoff::Produce => "Produced",
            Handoff::Repackage => "Repackaged",
            Handoff::Dispatch => "Dispatched",
            Handoff::Receive => "Received",
            Handoff::Sell => "Sold",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Handoff::AcceptShipment => "accept_shipment",
            Handoff::Produce => "produce",
            Handoff::Repackage => "repackage",
            Handoff::Dispatch => "dispatch",
            Handoff::Receive => "receive",
            Handoff::Sell => "sell",
        }
    }
}

impl fmt::Display for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Handoff {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Handoff::ALL
            .iter()
            .copied()
            .find(|h| h.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown hand-off: {}", s)))
    }
}

/// Whether a registration created or restocked the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// New record inserted
    Created,
    /// Existing record reset
    Restocked,
}

/// Result of registering a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Created or restocked
    pub outcome: RegistrationOutcome,
    /// Batch after the write
    pub batch: Batch,
    /// Ledger entry written with it
    pub event: Event,
}

/// Result of a stage change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Batch after the write
    pub batch: Batch,
    /// Ledger entry written with it
    pub event: Event,
}

/// Notes recorded with a stage change
fn moved_to(stage: Stage, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{} | Moved to {}", notes, stage),
        None => format!("Moved to {}", stage),
    }
}

/// Coordinator for registry mutations and their ledger entries
#[derive(Clone)]
pub struct StageWorkflow {
    store: Arc<dyn SupplyStore>,
    registry: BatchRegistry,
    ledger: EventLedger,
    config: WorkflowConfig,
    metrics: Metrics,
}

impl StageWorkflow {
    /// Build a workflow over a store
    pub fn new(store: Arc<dyn SupplyStore>, config: WorkflowConfig, metrics: Metrics) -> Self {
        Self {
            registry: BatchRegistry::new(store.clone()),
            ledger: EventLedger::new(store.clone()),
            store,
            config,
            metrics,
        }
    }

    /// Registry view
    pub fn registry(&self) -> &BatchRegistry {
        &self.registry
    }

    /// Ledger view
    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Register a batch as the supplier
    ///
    /// A known batch ID is restocked or rejected per [`DuplicatePolicy`].
    pub async fn register_batch(&self, batch_id: &str, drug_name: &str) -> Result<Registration> {
        let result = self.try_register(batch_id, drug_name).await;
        if let Err(ref e) = result {
            self.metrics.record_rejection(e.kind());
        }
        result
    }

    async fn try_register(&self, batch_id: &str, drug_name: &str) -> Result<Registration> {
        let batch_id = BatchId::parse(batch_id)?;
        let batch = Batch::new(batch_id.clone(), drug_name, Utc::now())?;

        if self.registry.get(&batch_id).await?.is_some() {
            return self.on_duplicate(&batch_id).await;
        }

        let event = NewEvent::new(
            batch_id.as_str(),
            SUPPLIER_ACTOR,
            ACTION_CREATED,
            Some("New shipment created"),
        )?;

        match self.commit(BatchWrite::Insert(batch), event).await {
            Ok(Some((batch, event))) => {
                self.metrics.record_created();
                info!(batch_id = %batch.batch_id, drug_name = %batch.drug_name, "Batch created");
                Ok(Registration {
                    outcome: RegistrationOutcome::Created,
                    batch,
                    event,
                })
            }
            Ok(None) => Err(Error::Persistence(format!(
                "Insert of batch {} returned no record",
                batch_id
            ))),
            // Lost a create race against another request
            Err(Error::DuplicateBatch(_)) => self.on_duplicate(&batch_id).await,
            Err(e) => Err(e),
        }
    }

    async fn on_duplicate(&self, batch_id: &BatchId) -> Result<Registration> {
        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => {
                warn!(batch_id = %batch_id, "Duplicate batch rejected");
                Err(Error::DuplicateBatch(batch_id.to_string()))
            }
            DuplicatePolicy::Restock => {
                let event = NewEvent::new(
                    batch_id.as_str(),
                    SUPPLIER_ACTOR,
                    ACTION_RESTOCKED,
                    Some("Existing batch restocked and ready"),
                )?;
                let write = BatchWrite::Update(batch_id.clone(), BatchPatch::restock());

                let (batch, event) = self
                    .commit(write, event)
                    .await?
                    .ok_or_else(|| Error::NotFound(batch_id.to_string()))?;

                self.metrics.record_restocked();
                info!(batch_id = %batch.batch_id, "Batch restocked");
                Ok(Registration {
                    outcome: RegistrationOutcome::Restocked,
                    batch,
                    event,
                })
            }
        }
    }

    /// Move a batch to `stage` and log a `Stage Updated` entry
    ///
    /// Any destination is accepted. A missing batch fails with `NotFound`
    /// and leaves the ledger untouched.
    pub async fn transition_stage(
        &self,
        batch_id: &str,
        stage: Stage,
        actor: &str,
    ) -> Result<Transition> {
        let result = self
            .apply_stage(batch_id, stage, actor, ACTION_STAGE_UPDATED, None)
            .await;
        if let Err(ref e) = result {
            self.metrics.record_rejection(e.kind());
        }
        result
    }

    /// Perform a named hand-off
    pub async fn perform(
        &self,
        batch_id: &str,
        handoff: Handoff,
        notes: Option<&str>,
    ) -> Result<Transition> {
        let result = self
            .apply_stage(
                batch_id,
                handoff.destination(),
                handoff.actor(),
                handoff.action(),
                notes,
            )
            .await;
        if let Err(ref e) = result {
            self.metrics.record_rejection(e.kind());
        }
        result
    }

    async fn apply_stage(
        &self,
        batch_id: &str,
        stage: Stage,
        actor: &str,
        action: &str,
        notes: Option<&str>,
    ) -> Result<Transition> {
        let batch_id = BatchId::parse(batch_id)?;
        let notes = moved_to(stage, notes);
        // Validated before any write so a bad actor cannot move the stage
        let event = NewEvent::new(batch_id.as_str(), actor, action, Some(notes.as_str()))?;
        let write = BatchWrite::Update(batch_id.clone(), BatchPatch::stage(stage));

        let (batch, event) = self
            .commit(write, event)
            .await?
            .ok_or_else(|| Error::NotFound(batch_id.to_string()))?;

        self.metrics.record_transition(stage);
        info!(
            batch_id = %batch.batch_id,
            stage = %stage,
            actor = %event.actor,
            action = %event.action,
            "Batch stage updated"
        );

        Ok(Transition { batch, event })
    }

    /// Append a free-form ledger entry
    pub async fn record_event(
        &self,
        batch_id: &str,
        actor: &str,
        action: &str,
        notes: Option<&str>,
    ) -> Result<Event> {
        match self.ledger.append(batch_id, actor, action, notes).await {
            Ok(event) => {
                self.metrics.record_event_append();
                Ok(event)
            }
            Err(e) => {
                self.metrics.record_rejection(e.kind());
                Err(e)
            }
        }
    }

    /// Empty registry and ledger together
    pub async fn clear_all(&self) -> Result<ClearSummary> {
        let summary = self.store.clear_all().await?;
        warn!(
            batches_removed = summary.batches_removed,
            events_removed = summary.events_removed,
            "All batches and events cleared"
        );
        Ok(summary)
    }

    async fn commit(&self, write: BatchWrite, event: NewEvent) -> Result<Option<(Batch, Event)>> {
        let batch_id = write.batch_id().clone();
        self.store.write_with_event(write, event).await.map_err(|e| {
            if let Error::Persistence(ref reason) = e {
                error!(
                    batch_id = %batch_id,
                    error = %reason,
                    "Batch write and ledger entry not committed"
                );
            }
            e
        })
    }
}

impl fmt::Debug for StageWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageWorkflow")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{SortOrder, STATUS_IN_PROGRESS, STATUS_RESTOCKED};

    fn workflow(policy: DuplicatePolicy) -> StageWorkflow {
        StageWorkflow::new(
            Arc::new(MemoryStore::new()),
            WorkflowConfig::with_duplicate_policy(policy),
            Metrics::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_register_creates_batch_and_event() {
        let wf = workflow(DuplicatePolicy::Restock);
        let reg = wf.register_batch("B100", "Aspirin").await.unwrap();

        assert_eq!(reg.outcome, RegistrationOutcome::Created);
        assert_eq!(reg.batch.stage, Stage::Supplier);
        assert_eq!(reg.batch.status, STATUS_IN_PROGRESS);
        assert_eq!(reg.event.actor, "Supplier");
        assert_eq!(reg.event.action, "Created");
        assert_eq!(wf.metrics().batches_created.get(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_restocks_under_restock_policy() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B1", "Aspirin").await.unwrap();
        wf.transition_stage("B1", Stage::Pharmacy, "Distributor").await.unwrap();

        let reg = wf.register_batch("B1", "Renamed").await.unwrap();
        assert_eq!(reg.outcome, RegistrationOutcome::Restocked);
        assert_eq!(reg.batch.stage, Stage::Supplier);
        assert_eq!(reg.batch.status, STATUS_RESTOCKED);
        assert_eq!(reg.batch.drug_name, "Aspirin");
        assert_eq!(reg.event.action, "Restocked");

        assert_eq!(wf.registry().list().await.unwrap().len(), 1);
        assert_eq!(wf.ledger().list_by_batch("B1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_under_reject_policy() {
        let wf = workflow(DuplicatePolicy::Reject);
        wf.register_batch("B1", "Aspirin").await.unwrap();

        let err = wf.register_batch("B1", "Aspirin").await.unwrap_err();
        assert_eq!(err, Error::DuplicateBatch("B1".to_string()));
        assert_eq!(wf.ledger().list_by_batch("B1").await.unwrap().len(), 1);
        assert_eq!(
            wf.metrics()
                .rejections
                .with_label_values(&["duplicate_batch"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let wf = workflow(DuplicatePolicy::Restock);
        assert!(matches!(
            wf.register_batch("", "Aspirin").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            wf.register_batch("B1", "").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(wf.ledger().list_all(SortOrder::Ascending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_scenario() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B100", "Aspirin").await.unwrap();

        let t = wf
            .transition_stage("B100", Stage::Distributor, "Repackage")
            .await
            .unwrap();
        assert_eq!(t.batch.stage, Stage::Distributor);
        assert_eq!(t.event.action, ACTION_STAGE_UPDATED);

        let history = wf.ledger().list_by_batch("B100").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "Created");
        assert_eq!(history[1].actor, "Repackage");
        assert!(history[1].notes.as_deref().unwrap().contains("Distributor"));
    }

    #[tokio::test]
    async fn test_transition_missing_batch_writes_no_event() {
        let wf = workflow(DuplicatePolicy::Restock);
        let err = wf
            .transition_stage("B999", Stage::Pharmacy, "Distributor")
            .await
            .unwrap_err();

        assert_eq!(err, Error::NotFound("B999".to_string()));
        assert!(wf.ledger().list_by_batch("B999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_blank_actor_leaves_stage() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B1", "Aspirin").await.unwrap();

        assert!(matches!(
            wf.transition_stage("B1", Stage::Pharmacy, " ").await,
            Err(Error::InvalidInput(_))
        ));
        let batch = wf
            .registry()
            .get(&BatchId::parse("B1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.stage, Stage::Supplier);
    }

    #[tokio::test]
    async fn test_handoff_table() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B1", "Aspirin").await.unwrap();

        for handoff in Handoff::ALL {
            let t = wf.perform("B1", handoff, None).await.unwrap();
            assert_eq!(t.batch.stage, handoff.destination());
            assert_eq!(t.event.actor, handoff.actor());
            assert_eq!(t.event.action, handoff.action());
        }

        let actions: Vec<String> = wf
            .ledger()
            .list_by_batch("B1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "Created",
                "Accepted Shipment",
                "Produced",
                "Repackaged",
                "Dispatched",
                "Received",
                "Sold"
            ]
        );
    }

    #[tokio::test]
    async fn test_sell_keeps_status() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B1", "Aspirin").await.unwrap();

        let t = wf.perform("B1", Handoff::Sell, Some("Walk-in")).await.unwrap();
        assert_eq!(t.batch.stage, Stage::Delivered);
        assert_eq!(t.batch.status, STATUS_IN_PROGRESS);
        assert_eq!(t.event.notes.as_deref(), Some("Walk-in | Moved to Delivered"));
    }

    #[tokio::test]
    async fn test_handoff_parse() {
        assert_eq!("accept_shipment".parse::<Handoff>().unwrap(), Handoff::AcceptShipment);
        assert_eq!("SELL".parse::<Handoff>().unwrap(), Handoff::Sell);
        assert!("teleport".parse::<Handoff>().is_err());
    }

    #[tokio::test]
    async fn test_clear_all_twice() {
        let wf = workflow(DuplicatePolicy::Restock);
        wf.register_batch("B1", "Aspirin").await.unwrap();
        wf.record_event("B1", "Pharmacy", "Sold", None).await.unwrap();

        let summary = wf.clear_all().await.unwrap();
        assert_eq!(summary.batches_removed, 1);
        assert_eq!(summary.events_removed, 2);

        let summary = wf.clear_all().await.unwrap();
        assert_eq!(summary, ClearSummary::default());
        assert!(wf.registry().list().await.unwrap().is_empty());
        assert!(wf.ledger().list_all(SortOrder::Descending).await.unwrap().is_empty());
    }
}
