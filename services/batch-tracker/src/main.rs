use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use batch_tracker::{
    config::Config, database::Database, handlers, FeedSource, ThingSpeakClient, TrackingService,
};
use dotenv::dotenv;
use pharma_ledger::{MemoryStore, Metrics, StageWorkflow, SupplyStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .json()
        .init();

    info!("Starting Batch Tracker...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        duplicate_policy = %config.workflow.duplicate_policy,
        "Configuration loaded successfully"
    );

    // Initialize store
    let store: Arc<dyn SupplyStore> = if config.database.is_in_memory() {
        warn!("No database URL configured, using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.acquire_timeout_secs,
        )
        .await
        .context("Failed to connect to database")?;
        db.ensure_schema().await.context("Failed to prepare schema")?;

        info!("Database connected successfully");
        Arc::new(db)
    };

    // Initialize IoT feed client
    if config.iot.channel.is_empty() {
        warn!("THINGSPEAK_CHANNEL is not set, IoT feed requests will fail upstream");
    }
    let feed: Arc<dyn FeedSource> =
        Arc::new(ThingSpeakClient::new(&config.iot).context("Failed to build IoT client")?);

    let metrics = Metrics::new().context("Failed to register metrics")?;
    let workflow = StageWorkflow::new(store, config.workflow.clone(), metrics);

    let service = Arc::new(TrackingService::new(
        workflow,
        feed,
        config.iot.overheat_threshold_c,
    ));

    info!("Tracking service initialized successfully");

    // Start HTTP server
    let server_config = config.server.clone();
    let service_data = web::Data::new(service);

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    Ok(())
}
