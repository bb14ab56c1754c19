use pharma_ledger::{Batch, Event, RegistrationOutcome};
use serde::{Deserialize, Serialize};

/// Supplier registration form
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub drug_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateStageRequest {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Named hand-off such as `dispatch` or `sell`
#[derive(Debug, Deserialize, Serialize)]
pub struct HandoffRequest {
    pub step: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Free-form ledger entry
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventRequest {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub message: String,
    pub outcome: RegistrationOutcome,
    pub batch: Batch,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageUpdateResponse {
    pub success: bool,
    pub batch: Batch,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HandoffResponse {
    pub success: bool,
    pub batch: Batch,
    pub event: Event,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub message: String,
    pub batches_removed: u64,
    pub events_removed: u64,
}
