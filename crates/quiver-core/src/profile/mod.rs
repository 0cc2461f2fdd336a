//! The on-device behavioral profile.
//!
//! Everything the engine learns about the user lives here: intent history,
//! exposure ledgers, round-robin seen sets, moderation lists and the
//! conversion queue. Persisted as a single JSON document; nothing in it
//! ever leaves the device.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::AdsResult;
use crate::intent::SegmentHistoryMap;
use crate::types::{ConfirmationType, CreativeAdNotification, QueuedConversion};

/// One shown ad, as remembered by the exposure ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub at: DateTime<Utc>,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub category: String,
    pub target_url: String,
}

/// A redeemed confirmation, as remembered for conversion matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub at: DateTime<Utc>,
    pub creative_instance_id: String,
    pub confirmation_type: ConfirmationType,
}

/// The persisted profile document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Purchase-intent signal history per segment.
    pub intent_history: SegmentHistoryMap,

    /// Every shown ad, newest last.
    pub ads_shown_history: Vec<ExposureRecord>,
    /// Exposure timestamps per creative set.
    pub creative_set_history: HashMap<String, Vec<DateTime<Utc>>>,
    /// Exposure timestamps per campaign.
    pub campaign_history: HashMap<String, Vec<DateTime<Utc>>>,

    /// Creative instances already served in the current round-robin pass.
    pub seen_ads: HashSet<String>,
    /// Advertisers already served in the current round-robin pass.
    pub seen_advertisers: HashSet<String>,

    /// Categories the user opted out of.
    pub filtered_categories: HashSet<String>,
    /// Creative sets the user opted out of.
    pub filtered_creative_sets: HashSet<String>,
    /// Creative sets the user flagged as inappropriate.
    pub flagged_ads: HashSet<String>,

    /// Redeemed confirmations per creative set, for conversion matching.
    pub confirmations: HashMap<String, Vec<ConfirmationRecord>>,
    /// Creative sets that already converted, with the conversion time.
    pub conversion_history: HashMap<String, DateTime<Utc>>,
    /// Matched conversions waiting for their redemption timer.
    pub queued_conversions: Vec<QueuedConversion>,

    /// When the next scheduled serving attempt is due.
    pub next_serve_at: Option<DateTime<Utc>>,
    /// Taxonomy of the last page the client classified for us.
    pub last_page_classification: Option<String>,
}

impl Profile {
    /// Load the profile from `path`, or start fresh if the file is missing.
    /// A corrupt file is discarded with a warning rather than wedging
    /// initialization.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(profile) => profile,
                Err(err) => {
                    warn!(path = %path.display(), %err, "discarding corrupt profile");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> AdsResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Record a shown ad in every ledger. Timestamps are kept monotonic so
    /// a clock step backwards cannot reorder the history.
    pub fn record_exposure(&mut self, ad: &CreativeAdNotification, now: DateTime<Utc>) {
        let at = match self.ads_shown_history.last() {
            Some(last) if last.at > now => last.at,
            _ => now,
        };

        self.ads_shown_history.push(ExposureRecord {
            at,
            creative_instance_id: ad.creative_instance_id.clone(),
            creative_set_id: ad.creative_set_id.clone(),
            campaign_id: ad.campaign_id.clone(),
            advertiser_id: ad.advertiser_id.clone(),
            category: ad.category.clone(),
            target_url: ad.target_url.clone(),
        });
        self.creative_set_history
            .entry(ad.creative_set_id.clone())
            .or_default()
            .push(at);
        self.campaign_history
            .entry(ad.campaign_id.clone())
            .or_default()
            .push(at);
        self.seen_ads.insert(ad.creative_instance_id.clone());
        self.seen_advertisers.insert(ad.advertiser_id.clone());
    }

    /// The most recently shown ad, if any.
    pub fn last_shown(&self) -> Option<&ExposureRecord> {
        self.ads_shown_history.last()
    }

    pub fn ads_shown_within(&self, window: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - window;
        self.ads_shown_history
            .iter()
            .filter(|record| record.at > cutoff)
            .count()
    }

    pub fn creative_set_count_within(
        &self,
        creative_set_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let cutoff = now - window;
        self.creative_set_history
            .get(creative_set_id)
            .map(|times| times.iter().filter(|at| **at > cutoff).count())
            .unwrap_or(0)
    }

    pub fn creative_set_total(&self, creative_set_id: &str) -> usize {
        self.creative_set_history
            .get(creative_set_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Exposure timestamps for a creative set, oldest first. Used by
    /// conversion matching to find the confirmed exposure.
    pub fn creative_set_timestamps(&self, creative_set_id: &str) -> &[DateTime<Utc>] {
        self.creative_set_history
            .get(creative_set_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn record_confirmation(
        &mut self,
        creative_set_id: &str,
        creative_instance_id: &str,
        confirmation_type: ConfirmationType,
        now: DateTime<Utc>,
    ) {
        self.confirmations
            .entry(creative_set_id.to_string())
            .or_default()
            .push(ConfirmationRecord {
                at: now,
                creative_instance_id: creative_instance_id.to_string(),
                confirmation_type,
            });
    }

    pub fn confirmations_for(&self, creative_set_id: &str) -> &[ConfirmationRecord] {
        self.confirmations
            .get(creative_set_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_converted(&self, creative_set_id: &str) -> bool {
        self.conversion_history.contains_key(creative_set_id)
    }

    pub fn toggle_filtered_category(&mut self, category: &str) -> bool {
        if self.filtered_categories.remove(category) {
            false
        } else {
            self.filtered_categories.insert(category.to_string());
            true
        }
    }

    pub fn toggle_filtered_creative_set(&mut self, creative_set_id: &str) -> bool {
        if self.filtered_creative_sets.remove(creative_set_id) {
            false
        } else {
            self.filtered_creative_sets.insert(creative_set_id.to_string());
            true
        }
    }

    pub fn toggle_flagged_ad(&mut self, creative_set_id: &str) -> bool {
        if self.flagged_ads.remove(creative_set_id) {
            false
        } else {
            self.flagged_ads.insert(creative_set_id.to_string());
            true
        }
    }

    /// Forget everything learned about the user. Moderation lists survive,
    /// they are settings rather than history.
    pub fn remove_all_history(&mut self) {
        debug!("removing all profile history");
        self.intent_history.clear();
        self.ads_shown_history.clear();
        self.creative_set_history.clear();
        self.campaign_history.clear();
        self.seen_ads.clear();
        self.seen_advertisers.clear();
        self.confirmations.clear();
        self.conversion_history.clear();
        self.queued_conversions.clear();
        self.next_serve_at = None;
        self.last_page_classification = None;
    }
}
