//! Configuration for the quiver engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration.
///
/// Defaults reproduce the reference serving parameters: two ad notifications
/// per hour, twenty per day, a seven day purchase-intent window and an
/// hourly catalog poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    /// Path to the catalog store database.
    pub catalog_db_path: PathBuf,
    /// Path to the persisted behavioral profile.
    pub profile_path: PathBuf,

    /// Hourly serving budget across all creatives.
    pub ads_per_hour: u32,
    /// Daily serving budget across all creatives.
    pub ads_per_day: u32,
    /// Per-creative-set exposures allowed within any rolling hour.
    pub per_hour_cap: u32,

    /// Sliding window for purchase-intent signal decay, in days.
    pub signal_decay_window_days: i64,
    /// Minimum per-segment intent score required to win.
    pub signal_score_threshold: u64,
    /// Maximum number of winning categories used for serving.
    pub winning_category_count: usize,

    /// Interval between catalog download attempts, in seconds.
    pub catalog_poll_secs: u64,
    /// Catalog age beyond which serving is refused, in seconds.
    pub catalog_max_age_secs: i64,
    /// Retry interval after a failed serving attempt, in seconds.
    pub retry_serve_secs: u64,
    /// Dwell time before a landed confirmation, in seconds.
    pub sustain_dwell_secs: u64,
    /// Upper bound on conversion processing jitter, in seconds.
    pub conversion_jitter_secs: u64,

    /// Category used when no winning category is available.
    pub untargeted_category: String,
}

impl Default for AdsConfig {
    fn default() -> Self {
        let quiver_dir = dirs::home_dir()
            .map(|h| h.join(".quiver"))
            .unwrap_or_else(|| PathBuf::from(".quiver"));

        Self {
            catalog_db_path: quiver_dir.join("catalog.db"),
            profile_path: quiver_dir.join("profile.json"),
            ads_per_hour: 2,
            ads_per_day: 20,
            per_hour_cap: 1,
            signal_decay_window_days: 7,
            signal_score_threshold: 10,
            winning_category_count: 3,
            catalog_poll_secs: 60 * 60,
            catalog_max_age_secs: 24 * 60 * 60,
            retry_serve_secs: 2 * 60,
            sustain_dwell_secs: 10,
            conversion_jitter_secs: 60,
            untargeted_category: "untargeted".to_string(),
        }
    }
}

impl AdsConfig {
    /// Seconds the engine must wait between exposures to spread the hourly
    /// budget evenly.
    pub fn minimum_wait_secs(&self) -> i64 {
        if self.ads_per_hour == 0 {
            return i64::MAX;
        }
        3600 / i64::from(self.ads_per_hour)
    }

    /// Delay until the next scheduled serving attempt after a success.
    pub fn next_serve_delay_secs(&self) -> u64 {
        if self.ads_per_hour == 0 {
            return 3600;
        }
        3600 / u64::from(self.ads_per_hour)
    }
}
