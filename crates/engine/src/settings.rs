//! Engine settings.
//!
//! These are plain deserializable structs with defaults; the binary fills
//! them from its configuration sources.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    /// The single currency every normalized amount is stored in.
    pub base_currency: String,
    /// Endpoint of the rate source, the base currency is appended as last path segment.
    pub source_url: String,
    /// A refresh is due once the newest stored rate is older than this.
    pub refresh_threshold_hours: i64,
    /// Subtracted from the threshold to obtain the dedup window of a refresh.
    pub dedup_slack_hours: i64,
    /// Conversions using rates older than this are flagged as stale.
    pub max_rate_age_hours: i64,
    pub timeout_secs: u64,
    /// How often the scheduler checks whether a refresh is due.
    pub schedule_interval_hours: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            source_url: "https://api.exchangerate-api.com/v4/latest".to_string(),
            refresh_threshold_hours: 12,
            dedup_slack_hours: 1,
            max_rate_age_hours: 72,
            timeout_secs: 10,
            schedule_interval_hours: 1,
        }
    }
}

impl RateSettings {
    /// Lookback used to skip currencies that already have a recent observation.
    pub fn dedup_window_hours(&self) -> i64 {
        (self.refresh_threshold_hours - self.dedup_slack_hours).max(0)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_image_bytes: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            max_image_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Upper bound for a single extraction attempt, whatever the extractor.
    pub extraction_timeout_secs: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            extraction_timeout_secs: 90,
        }
    }
}
