//! Creative ad records as delivered by the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A creative served as a system notification.
///
/// `creative_instance_id` is unique within a (geo target, channel) scope;
/// re-inserting the same id replaces the previous row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeAdNotification {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub title: String,
    pub body: String,
    pub target_url: String,
    /// Start of the active window, inclusive.
    pub start_at: DateTime<Utc>,
    /// End of the active window, inclusive.
    pub end_at: DateTime<Utc>,
    pub daily_cap: u32,
    pub per_day: u32,
    pub total_max: u32,
    pub category: String,
    pub geo_targets: Vec<String>,
}

impl CreativeAdNotification {
    /// A creative missing any user-visible field cannot be shown.
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.body.is_empty() && !self.target_url.is_empty()
    }
}

/// A creative rendered inline on a publisher page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativePublisherAd {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub creative_url: String,
    pub target_url: String,
    pub size: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub daily_cap: u32,
    pub per_day: u32,
    pub total_max: u32,
    pub category: String,
    pub geo_targets: Vec<String>,
    pub channels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creative_validity() {
        let mut ad = CreativeAdNotification {
            title: "title".to_string(),
            body: "body".to_string(),
            target_url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert!(ad.is_valid());

        ad.body.clear();
        assert!(!ad.is_valid());
    }
}
