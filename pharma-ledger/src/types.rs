//! Core types for batch tracking
//!
//! All types serialize with camelCase field names so the JSON seen by the
//! dashboard matches the stored documents one to one.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status label given to a freshly created batch
pub const STATUS_IN_PROGRESS: &str = "In Progress";

/// Status label given to a batch that was restocked in place
pub const STATUS_RESTOCKED: &str = "Restocked";

/// Batch identifier assigned by the supplier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Parse a batch ID, trimming surrounding whitespace
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Batch ID is required".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position of a batch in the supply chain
///
/// The declaration order is the advisory workflow order. Nothing in the
/// transition path enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Shipment created by the supplier
    Supplier,
    /// Accepted by the manufacturer
    Manufacturer,
    /// Produced and waiting for repackaging
    Repackage,
    /// Repackaged and handed to the distributor
    Distributor,
    /// In transit to, or held by, the pharmacy
    Pharmacy,
    /// Received at the pharmacy and available to patients
    Patient,
    /// Sold to a patient
    Delivered,
}

impl Stage {
    /// Every stage in workflow order
    pub const ALL: [Stage; 7] = [
        Stage::Supplier,
        Stage::Manufacturer,
        Stage::Repackage,
        Stage::Distributor,
        Stage::Pharmacy,
        Stage::Patient,
        Stage::Delivered,
    ];

    /// Label used on the wire and in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Supplier => "Supplier",
            Stage::Manufacturer => "Manufacturer",
            Stage::Repackage => "Repackage",
            Stage::Distributor => "Distributor",
            Stage::Pharmacy => "Pharmacy",
            Stage::Patient => "Patient",
            Stage::Delivered => "Delivered",
        }
    }

    /// Zero-based position in the workflow
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown stage: {}", s)))
    }
}

/// Current-state record for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Supplier-assigned identifier
    pub batch_id: BatchId,

    /// Drug name, fixed at creation
    pub drug_name: String,

    /// Current stage
    pub stage: Stage,

    /// Free-form status label, independent of stage
    pub status: String,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Build a new batch in the `Supplier` stage
    pub fn new(batch_id: BatchId, drug_name: &str, created_at: DateTime<Utc>) -> Result<Self> {
        let drug_name = drug_name.trim();
        if drug_name.is_empty() {
            return Err(Error::InvalidInput("Drug name is required".to_string()));
        }

        Ok(Self {
            batch_id,
            drug_name: drug_name.to_string(),
            stage: Stage::Supplier,
            status: STATUS_IN_PROGRESS.to_string(),
            created_at,
        })
    }

    /// Apply a patch in place
    pub fn apply(&mut self, patch: &BatchPatch) {
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
        if let Some(ref status) = patch.status {
            self.status = status.clone();
        }
    }
}

/// Partial update of a batch; drug name and creation time are not patchable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPatch {
    /// New stage
    pub stage: Option<Stage>,
    /// New status label
    pub status: Option<String>,
}

impl BatchPatch {
    /// Patch that only moves the stage
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            status: None,
        }
    }

    /// Patch that resets a batch to the restocked state
    pub fn restock() -> Self {
        Self {
            stage: Some(Stage::Supplier),
            status: Some(STATUS_RESTOCKED.to_string()),
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Store-assigned sequence number, strictly increasing
    pub id: i64,

    /// Batch the action refers to (not checked against the registry)
    pub batch_id: String,

    /// Party that performed the action
    pub actor: String,

    /// What happened
    pub action: String,

    /// Optional free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Time the entry was recorded
    pub timestamp: DateTime<Utc>,
}

/// Validated event fields awaiting an ID and timestamp from the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Batch the action refers to
    pub batch_id: String,
    /// Party that performed the action
    pub actor: String,
    /// What happened
    pub action: String,
    /// Optional free text
    pub notes: Option<String>,
}

impl NewEvent {
    /// Validate and normalise event fields
    ///
    /// Actor and action must be non-blank. Blank notes become `None`.
    pub fn new(
        batch_id: impl Into<String>,
        actor: &str,
        action: &str,
        notes: Option<&str>,
    ) -> Result<Self> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(Error::InvalidInput("Actor is required".to_string()));
        }

        let action = action.trim();
        if action.is_empty() {
            return Err(Error::InvalidInput("Action is required".to_string()));
        }

        let notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(Self {
            batch_id: batch_id.into().trim().to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            notes,
        })
    }

    /// Stamp with store-assigned sequence and time
    pub fn into_event(self, id: i64, timestamp: DateTime<Utc>) -> Event {
        Event {
            id,
            batch_id: self.batch_id,
            actor: self.actor,
            action: self.action,
            notes: self.notes,
            timestamp,
        }
    }
}

/// Sort direction for ledger reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

/// Ledger read filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Restrict to one batch
    pub batch_id: Option<String>,
}

impl EventFilter {
    /// No restriction
    pub fn all() -> Self {
        Self::default()
    }

    /// Events of a single batch
    pub fn for_batch(batch_id: &BatchId) -> Self {
        Self {
            batch_id: Some(batch_id.as_str().to_string()),
        }
    }

    /// Check whether an event passes the filter
    pub fn matches(&self, event: &Event) -> bool {
        match self.batch_id {
            Some(ref id) => event.batch_id == *id,
            None => true,
        }
    }
}

/// Registry write paired with a ledger append
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Insert a new record; fails on an existing batch ID
    Insert(Batch),
    /// Patch an existing record; yields nothing when the batch is missing
    Update(BatchId, BatchPatch),
}

impl BatchWrite {
    /// Batch the write targets
    pub fn batch_id(&self) -> &BatchId {
        match self {
            BatchWrite::Insert(batch) => &batch.batch_id,
            BatchWrite::Update(id, _) => id,
        }
    }
}

/// Number of records removed by a bulk clear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSummary {
    /// Batches removed
    pub batches_removed: u64,
    /// Events removed
    pub events_removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_id_trims_and_rejects_blank() {
        assert_eq!(BatchId::parse("  B100 ").unwrap().as_str(), "B100");
        assert!(matches!(BatchId::parse("   "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stage_parse_is_case_insensitive() {
        assert_eq!("distributor".parse::<Stage>().unwrap(), Stage::Distributor);
        assert_eq!("Delivered".parse::<Stage>().unwrap(), Stage::Delivered);
        assert!("Warehouse".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Supplier < Stage::Manufacturer);
        assert!(Stage::Pharmacy < Stage::Patient);
        assert_eq!(Stage::Delivered.ordinal(), 6);
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = Batch::new(BatchId::parse("B100").unwrap(), "Aspirin", Utc::now()).unwrap();
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["batchId"], "B100");
        assert_eq!(json["drugName"], "Aspirin");
        assert_eq!(json["stage"], "Supplier");
        assert_eq!(json["status"], "In Progress");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_restock_patch_keeps_drug_name() {
        let mut batch = Batch::new(BatchId::parse("B1").unwrap(), "Insulin", Utc::now()).unwrap();
        batch.apply(&BatchPatch::stage(Stage::Pharmacy));
        batch.apply(&BatchPatch::restock());

        assert_eq!(batch.stage, Stage::Supplier);
        assert_eq!(batch.status, STATUS_RESTOCKED);
        assert_eq!(batch.drug_name, "Insulin");
    }

    #[test]
    fn test_new_event_validation() {
        assert!(matches!(
            NewEvent::new("B1", " ", "Created", None),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            NewEvent::new("B1", "Supplier", "", None),
            Err(Error::InvalidInput(_))
        ));

        let event = NewEvent::new("B1", "Supplier", "Created", Some("  ")).unwrap();
        assert_eq!(event.notes, None);
    }
}
