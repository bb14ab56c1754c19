use crate::config::IotConfig;
use crate::errors::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

/// Source of environmental sensor readings
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Raw feed JSON, untouched
    async fn latest(&self) -> Result<Value>;
}

pub struct ThingSpeakClient {
    base_url: String,
    channel: String,
    results: u32,
    client: Client,
}

impl ThingSpeakClient {
    pub fn new(config: &IotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(ThingSpeakClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            channel: config.channel.clone(),
            results: config.results,
            client,
        })
    }

    fn feed_url(&self) -> String {
        format!(
            "{}/channels/{}/feeds.json?results={}",
            self.base_url, self.channel, self.results
        )
    }
}

#[async_trait]
impl FeedSource for ThingSpeakClient {
    async fn latest(&self) -> Result<Value> {
        let url = self.feed_url();

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Failed to reach IoT feed: {}", e);
            TrackerError::UpstreamFeed(format!("Feed request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrackerError::UpstreamFeed(format!(
                "Feed returned status {}: {}",
                status, error_text
            )));
        }

        let feed = response.json::<Value>().await.map_err(|e| {
            TrackerError::UpstreamFeed(format!("Failed to parse feed: {}", e))
        })?;

        let entries = feed["feeds"].as_array().map_or(0, Vec::len);
        info!(channel = %self.channel, entries, "Fetched IoT feed");
        Ok(feed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedStatus {
    Normal,
    Overheat,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<i64>,
    pub temperature_c: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
}

/// Parsed view of a feed for the storage-conditions panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub status: FeedStatus,
    pub threshold_c: f64,
    pub latest: Option<Reading>,
    pub readings: Vec<Reading>,
    pub skipped: usize,
}

/// ThingSpeak sends field values as strings, tolerate plain numbers too
fn parse_field(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl FeedSummary {
    /// Summarise a raw feed; anything without a `feeds` array reads as no data
    pub fn from_feed(feed: &Value, threshold_c: f64) -> Self {
        let entries = feed["feeds"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        let mut readings = Vec::with_capacity(entries.len());
        let mut skipped = 0;

        for entry in entries {
            match parse_field(entry.get("field1")) {
                Some(temperature_c) => readings.push(Reading {
                    created_at: text_field(entry.get("created_at")),
                    entry_id: entry.get("entry_id").and_then(Value::as_i64),
                    temperature_c,
                    humidity_pct: parse_field(entry.get("field2")),
                }),
                None => skipped += 1,
            }
        }

        // Feeds arrive oldest first
        let latest = readings.last().cloned();
        let status = match &latest {
            None => FeedStatus::NoData,
            Some(r) if r.temperature_c > threshold_c => FeedStatus::Overheat,
            Some(_) => FeedStatus::Normal,
        };

        FeedSummary {
            status,
            threshold_c,
            latest,
            readings,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feed_url() {
        let client = ThingSpeakClient::new(&IotConfig {
            base_url: "https://api.thingspeak.com/".to_string(),
            channel: "98765".to_string(),
            results: 10,
            timeout_secs: 5,
            overheat_threshold_c: 30.0,
        })
        .unwrap();

        assert_eq!(
            client.feed_url(),
            "https://api.thingspeak.com/channels/98765/feeds.json?results=10"
        );
    }

    #[test]
    fn test_summary_overheat_uses_latest_reading() {
        let feed = json!({
            "feeds": [
                { "entry_id": 1, "field1": "35.0", "field2": "50" },
                { "entry_id": 2, "field1": "31.2", "field2": "48" }
            ]
        });

        let summary = FeedSummary::from_feed(&feed, 30.0);
        assert_eq!(summary.status, FeedStatus::Overheat);
        assert_eq!(summary.latest.unwrap().entry_id, Some(2));
        assert_eq!(summary.readings.len(), 2);
    }

    #[test]
    fn test_summary_threshold_is_exclusive() {
        let feed = json!({ "feeds": [ { "field1": "30", "field2": null } ] });

        let summary = FeedSummary::from_feed(&feed, 30.0);
        assert_eq!(summary.status, FeedStatus::Normal);
        assert_eq!(summary.latest.unwrap().humidity_pct, None);
    }

    #[test]
    fn test_summary_skips_unparsable_entries() {
        let feed = json!({
            "feeds": [
                { "entry_id": 1, "field1": "22.0" },
                { "entry_id": 2, "field1": "n/a" },
                { "entry_id": 3, "field1": null }
            ]
        });

        let summary = FeedSummary::from_feed(&feed, 30.0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.status, FeedStatus::Normal);
        assert_eq!(summary.latest.unwrap().entry_id, Some(1));
    }

    #[test]
    fn test_summary_tolerates_odd_field_types() {
        let feed = json!({
            "feeds": [
                { "created_at": 1714557600, "entry_id": 9, "field1": 24.5 }
            ]
        });

        let summary = FeedSummary::from_feed(&feed, 30.0);
        let latest = summary.latest.unwrap();
        assert_eq!(latest.created_at.as_deref(), Some("1714557600"));
        assert_eq!(latest.temperature_c, 24.5);
        assert_eq!(latest.humidity_pct, None);
    }

    #[test]
    fn test_summary_without_feeds() {
        assert_eq!(
            FeedSummary::from_feed(&json!({}), 30.0).status,
            FeedStatus::NoData
        );
        assert_eq!(
            FeedSummary::from_feed(&json!({ "feeds": "oops" }), 30.0).status,
            FeedStatus::NoData
        );
    }
}
