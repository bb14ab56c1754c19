pub mod config;
pub mod database;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod iot_client;
pub mod models;
pub mod services;

pub use config::Config;
pub use errors::{Result, TrackerError};
pub use iot_client::{FeedSource, FeedSummary, ThingSpeakClient};
pub use services::TrackingService;
