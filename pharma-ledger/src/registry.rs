//! Batch registry
//!
//! Owns the mutable current-state projection: one record per batch ID.
//! Methods here touch the registry only. Pairing a change with its ledger
//! entry is the job of [`crate::workflow::StageWorkflow`].

use crate::{
    error::{Error, Result},
    storage::SupplyStore,
    types::{Batch, BatchId, BatchPatch, Stage},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One stage column of the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageBucket {
    /// Stage of every batch in the bucket
    pub stage: Stage,
    /// Batches currently in that stage, newest first
    pub batches: Vec<Batch>,
}

/// Batches grouped by stage, in workflow order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageBoard(pub Vec<StageBucket>);

impl StageBoard {
    /// Bucket a newest-first batch list, keeping empty stages
    pub fn from_batches(batches: Vec<Batch>) -> Self {
        let mut buckets: Vec<StageBucket> = Stage::ALL
            .iter()
            .map(|&stage| StageBucket {
                stage,
                batches: Vec::new(),
            })
            .collect();

        for batch in batches {
            buckets[batch.stage.ordinal()].batches.push(batch);
        }

        Self(buckets)
    }

    /// Batches in one stage
    pub fn stage(&self, stage: Stage) -> &[Batch] {
        self.0
            .iter()
            .find(|bucket| bucket.stage == stage)
            .map(|bucket| bucket.batches.as_slice())
            .unwrap_or(&[])
    }
}

/// Current-state repository for batches
#[derive(Clone)]
pub struct BatchRegistry {
    store: Arc<dyn SupplyStore>,
}

impl BatchRegistry {
    /// Wrap a store
    pub fn new(store: Arc<dyn SupplyStore>) -> Self {
        Self { store }
    }

    /// Insert a new batch in `Supplier` / `In Progress`
    pub async fn create(&self, batch_id: &str, drug_name: &str) -> Result<Batch> {
        let batch = Batch::new(BatchId::parse(batch_id)?, drug_name, Utc::now())?;
        self.store.insert_batch(batch).await
    }

    /// Reset an existing batch to `Supplier` / `Restocked`
    pub async fn restock(&self, batch_id: &str) -> Result<Batch> {
        let batch_id = BatchId::parse(batch_id)?;
        self.store
            .update_batch(&batch_id, &BatchPatch::restock())
            .await?
            .ok_or_else(|| Error::NotFound(batch_id.to_string()))
    }

    /// Move a batch to any stage
    ///
    /// No ordering check is made against the current stage.
    pub async fn transition_stage(&self, batch_id: &str, stage: Stage) -> Result<Batch> {
        let batch_id = BatchId::parse(batch_id)?;
        self.store
            .update_batch(&batch_id, &BatchPatch::stage(stage))
            .await?
            .ok_or_else(|| Error::NotFound(batch_id.to_string()))
    }

    /// Look up one batch
    pub async fn get(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        self.store.find_batch(batch_id).await
    }

    /// All batches, newest first
    pub async fn list(&self) -> Result<Vec<Batch>> {
        self.store.list_batches().await
    }

    /// All batches grouped by stage
    pub async fn board(&self) -> Result<StageBoard> {
        Ok(StageBoard::from_batches(self.list().await?))
    }

    /// Remove every batch
    pub async fn clear_all(&self) -> Result<u64> {
        self.store.delete_batches().await
    }
}

impl std::fmt::Debug for BatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{STATUS_IN_PROGRESS, STATUS_RESTOCKED};

    fn registry() -> BatchRegistry {
        BatchRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let registry = registry();
        registry.create("B100", "Aspirin").await.unwrap();

        let batches = registry.list().await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_id.as_str(), "B100");
        assert_eq!(batches[0].drug_name, "Aspirin");
        assert_eq!(batches[0].stage, Stage::Supplier);
        assert_eq!(batches[0].status, STATUS_IN_PROGRESS);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let registry = registry();
        assert!(matches!(
            registry.create("", "Aspirin").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            registry.create("B1", " ").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let registry = registry();
        registry.create("B1", "Aspirin").await.unwrap();
        assert_eq!(
            registry.create("B1", "Other").await.unwrap_err(),
            Error::DuplicateBatch("B1".to_string())
        );
    }

    #[tokio::test]
    async fn test_transition_accepts_any_stage() {
        let registry = registry();
        registry.create("B1", "Aspirin").await.unwrap();

        let batch = registry.transition_stage("B1", Stage::Delivered).await.unwrap();
        assert_eq!(batch.stage, Stage::Delivered);

        // Backwards is allowed too
        let batch = registry.transition_stage("B1", Stage::Manufacturer).await.unwrap();
        assert_eq!(batch.stage, Stage::Manufacturer);
        assert_eq!(batch.status, STATUS_IN_PROGRESS);
        assert_eq!(batch.drug_name, "Aspirin");
    }

    #[tokio::test]
    async fn test_transition_missing_batch() {
        let registry = registry();
        assert_eq!(
            registry
                .transition_stage("B999", Stage::Pharmacy)
                .await
                .unwrap_err(),
            Error::NotFound("B999".to_string())
        );
    }

    #[tokio::test]
    async fn test_restock() {
        let registry = registry();
        registry.create("B1", "Aspirin").await.unwrap();
        registry.transition_stage("B1", Stage::Pharmacy).await.unwrap();

        let batch = registry.restock("B1").await.unwrap();
        assert_eq!(batch.stage, Stage::Supplier);
        assert_eq!(batch.status, STATUS_RESTOCKED);
        assert!(matches!(registry.restock("B2").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_board_buckets_in_workflow_order() {
        let registry = registry();
        registry.create("B1", "Aspirin").await.unwrap();
        registry.create("B2", "Insulin").await.unwrap();
        registry.create("B3", "Ibuprofen").await.unwrap();
        registry.transition_stage("B2", Stage::Distributor).await.unwrap();

        let board = registry.board().await.unwrap();
        assert_eq!(board.0.len(), Stage::ALL.len());
        assert_eq!(board.0[0].stage, Stage::Supplier);

        let suppliers: Vec<&str> = board
            .stage(Stage::Supplier)
            .iter()
            .map(|b| b.batch_id.as_str())
            .collect();
        assert_eq!(suppliers, vec!["B3", "B1"]);
        assert_eq!(board.stage(Stage::Distributor).len(), 1);
        assert!(board.stage(Stage::Patient).is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_idempotent() {
        let registry = registry();
        registry.create("B1", "Aspirin").await.unwrap();
        assert_eq!(registry.clear_all().await.unwrap(), 1);
        assert_eq!(registry.clear_all().await.unwrap(), 0);
        assert!(registry.list().await.unwrap().is_empty());
    }
}
