//! Pharma Ledger
//!
//! Batch registry and append-only event ledger for a pharmaceutical supply
//! chain (Supplier → Manufacturer → Repackage → Distributor → Pharmacy →
//! Patient).
//!
//! # Architecture
//!
//! - **Registry**: mutable current-state record, one per batch ID
//! - **Ledger**: immutable, time-ordered audit trail
//! - **Workflow**: pairs each registry change with the ledger entry that
//!   explains it and commits both through the store as one unit
//!
//! # Invariants
//!
//! - Append-only: events are never modified, only bulk-cleared with batches
//! - Ledger reads are totally ordered by (timestamp, sequence)
//! - A failed stage change never leaves a ledger entry behind
//! - Stage order is advisory, never a transition guard

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod registry;
pub mod storage;
pub mod types;
pub mod workflow;

// Re-exports
pub use config::{DuplicatePolicy, WorkflowConfig};
pub use error::{Error, Result};
pub use ledger::EventLedger;
pub use metrics::Metrics;
pub use registry::{BatchRegistry, StageBoard, StageBucket};
pub use storage::{MemoryStore, SupplyStore};
pub use types::{
    Batch, BatchId, BatchPatch, BatchWrite, ClearSummary, Event, EventFilter, NewEvent, SortOrder,
    Stage,
};
pub use workflow::{Handoff, Registration, RegistrationOutcome, StageWorkflow, Transition};
