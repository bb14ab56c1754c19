use crate::errors::TrackerError;
use crate::models::{AppendEventRequest, CreateBatchRequest, HandoffRequest, UpdateStageRequest};
use crate::services::TrackingService;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "batch-tracker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus scrape endpoint
pub async fn metrics(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let body = service.render_metrics()?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Create or restock a batch
pub async fn create_batch(
    service: web::Data<Arc<TrackingService>>,
    request: web::Json<CreateBatchRequest>,
) -> Result<HttpResponse, TrackerError> {
    let response = service.register_batch(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_stage(
    service: web::Data<Arc<TrackingService>>,
    batch_id: web::Path<String>,
    request: web::Json<UpdateStageRequest>,
) -> Result<HttpResponse, TrackerError> {
    let request = request.into_inner();
    let response = service
        .update_stage(&batch_id, request.stage, request.actor)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_batches(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let batches = service.list_batches().await?;
    Ok(HttpResponse::Ok().json(batches))
}

/// Batches grouped by stage
pub async fn stage_board(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let board = service.board().await?;
    Ok(HttpResponse::Ok().json(board))
}

pub async fn perform_handoff(
    service: web::Data<Arc<TrackingService>>,
    batch_id: web::Path<String>,
    request: web::Json<HandoffRequest>,
) -> Result<HttpResponse, TrackerError> {
    let response = service.handoff(&batch_id, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn append_event(
    service: web::Data<Arc<TrackingService>>,
    request: web::Json<AppendEventRequest>,
) -> Result<HttpResponse, TrackerError> {
    let event = service.append_event(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(event))
}

pub async fn list_events(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let events = service.list_events().await?;
    Ok(HttpResponse::Ok().json(events))
}

/// Chronological history of one batch
pub async fn verify_batch(
    service: web::Data<Arc<TrackingService>>,
    batch_id: web::Path<String>,
) -> Result<HttpResponse, TrackerError> {
    let events = service.verify_batch(&batch_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

/// Upstream feed JSON, passed through as received
pub async fn iot_feed(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let feed = service.iot_feed().await?;
    Ok(HttpResponse::Ok().json(feed))
}

pub async fn iot_summary(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let summary = service.iot_summary().await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn clear_all(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let response = service.clear_all().await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Download both collections as a workbook
pub async fn export(
    service: web::Data<Arc<TrackingService>>,
) -> Result<HttpResponse, TrackerError> {
    let file = service.export().await?;

    Ok(HttpResponse::Ok()
        .content_type(file.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file.filename)],
        })
        .body(file.bytes))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_check))
            .route("/metrics", web::get().to(metrics))
            .route("/batches", web::post().to(create_batch))
            .route("/batches", web::get().to(list_batches))
            .route("/batches/board", web::get().to(stage_board))
            .route("/batches/{batch_id}/stage", web::put().to(update_stage))
            .route("/batches/{batch_id}/handoff", web::post().to(perform_handoff))
            .route("/events", web::post().to(append_event))
            .route("/events", web::get().to(list_events))
            .route("/events/verify/{batch_id}", web::get().to(verify_batch))
            .route("/iot", web::get().to(iot_feed))
            .route("/iot/summary", web::get().to(iot_summary))
            .route("/clear", web::delete().to(clear_all))
            .route("/export", web::get().to(export)),
    );
}
