use crate::errors::Result;
use crate::export::{build_export, ExportFile};
use crate::iot_client::{FeedSource, FeedSummary};
use crate::models::{
    AppendEventRequest, BatchResponse, ClearResponse, CreateBatchRequest, HandoffRequest,
    HandoffResponse, StageUpdateResponse,
};
use chrono::Utc;
use pharma_ledger::{
    Batch, Error as LedgerError, Event, Handoff, RegistrationOutcome, SortOrder, Stage,
    StageBoard, StageWorkflow,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct TrackingService {
    pub workflow: StageWorkflow,
    pub feed: Arc<dyn FeedSource>,
    pub overheat_threshold_c: f64,
}

impl TrackingService {
    pub fn new(
        workflow: StageWorkflow,
        feed: Arc<dyn FeedSource>,
        overheat_threshold_c: f64,
    ) -> Self {
        TrackingService {
            workflow,
            feed,
            overheat_threshold_c,
        }
    }

    /// Create a batch or restock an existing one
    pub async fn register_batch(&self, request: CreateBatchRequest) -> Result<BatchResponse> {
        let fields = (required(request.batch_id), required(request.drug_name));
        let (batch_id, drug_name) = match fields {
            (Some(batch_id), Some(drug_name)) => (batch_id, drug_name),
            _ => {
                self.workflow.metrics().record_rejection("invalid_input");
                let err = LedgerError::InvalidInput("Batch ID & Drug name required".to_string());
                return Err(err.into());
            }
        };

        let registration = self.workflow.register_batch(&batch_id, &drug_name).await?;
        let message = match registration.outcome {
            RegistrationOutcome::Created => "New batch created successfully",
            RegistrationOutcome::Restocked => "Batch restocked successfully",
        };

        Ok(BatchResponse {
            message: message.to_string(),
            outcome: registration.outcome,
            batch: registration.batch,
        })
    }

    pub async fn update_stage(
        &self,
        batch_id: &str,
        stage: Option<String>,
        actor: Option<String>,
    ) -> Result<StageUpdateResponse> {
        let stage: Stage = required(stage)
            .ok_or_else(|| LedgerError::InvalidInput("Stage is required".to_string()))?
            .parse()?;
        let actor = actor.unwrap_or_default();

        let transition = self.workflow.transition_stage(batch_id, stage, &actor).await?;
        Ok(StageUpdateResponse {
            success: true,
            batch: transition.batch,
        })
    }

    pub async fn handoff(
        &self,
        batch_id: &str,
        request: HandoffRequest,
    ) -> Result<HandoffResponse> {
        let handoff: Handoff = request.step.parse()?;
        let transition = self
            .workflow
            .perform(batch_id, handoff, request.notes.as_deref())
            .await?;

        Ok(HandoffResponse {
            success: true,
            batch: transition.batch,
            event: transition.event,
        })
    }

    pub async fn list_batches(&self) -> Result<Vec<Batch>> {
        Ok(self.workflow.registry().list().await?)
    }

    pub async fn board(&self) -> Result<StageBoard> {
        Ok(self.workflow.registry().board().await?)
    }

    pub async fn append_event(&self, request: AppendEventRequest) -> Result<Event> {
        let batch_id = request.batch_id.unwrap_or_default();
        let actor = request.actor.unwrap_or_default();
        let action = request.action.unwrap_or_default();

        Ok(self
            .workflow
            .record_event(&batch_id, &actor, &action, request.notes.as_deref())
            .await?)
    }

    /// Whole ledger, newest first
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.workflow.ledger().list_all(SortOrder::Descending).await?)
    }

    /// One batch's history, oldest first
    pub async fn verify_batch(&self, batch_id: &str) -> Result<Vec<Event>> {
        Ok(self.workflow.ledger().list_by_batch(batch_id).await?)
    }

    /// Feed JSON exactly as the upstream sent it
    pub async fn iot_feed(&self) -> Result<Value> {
        self.feed.latest().await
    }

    pub async fn iot_summary(&self) -> Result<FeedSummary> {
        let feed = self.feed.latest().await?;
        let summary = FeedSummary::from_feed(&feed, self.overheat_threshold_c);
        if summary.skipped > 0 {
            warn!(skipped = summary.skipped, "Skipped unparsable IoT readings");
        }
        Ok(summary)
    }

    pub async fn clear_all(&self) -> Result<ClearResponse> {
        let summary = self.workflow.clear_all().await?;
        Ok(ClearResponse {
            message: "All batches and events cleared".to_string(),
            batches_removed: summary.batches_removed,
            events_removed: summary.events_removed,
        })
    }

    pub async fn export(&self) -> Result<ExportFile> {
        let batches = self.workflow.registry().list().await?;
        let events = self.workflow.ledger().list_all(SortOrder::Descending).await?;

        let file = build_export(&batches, &events, Utc::now())?;
        info!(filename = %file.filename, "Export ready");
        Ok(file)
    }

    pub fn render_metrics(&self) -> Result<String> {
        Ok(self.workflow.metrics().render()?)
    }
}
