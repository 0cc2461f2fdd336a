//! Ad notifications and the confirmation vocabulary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CreativeAdNotification;

/// A notification built from a creative and handed to the client surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdNotification {
    pub uuid: String,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub target_url: String,
}

impl AdNotification {
    /// Build a notification from a creative, minting a fresh uuid.
    pub fn from_creative(creative: &CreativeAdNotification) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            creative_instance_id: creative.creative_instance_id.clone(),
            creative_set_id: creative.creative_set_id.clone(),
            campaign_id: creative.campaign_id.clone(),
            advertiser_id: creative.advertiser_id.clone(),
            category: creative.category.clone(),
            title: creative.title.clone(),
            body: creative.body.clone(),
            target_url: creative.target_url.clone(),
        }
    }
}

/// User interaction with a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdNotificationEventType {
    Viewed,
    Clicked,
    Dismissed,
    TimedOut,
}

/// Confirmation kinds reported to the external confirmation subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationType {
    View,
    Click,
    Dismiss,
    Landed,
    Conversion,
}

impl ConfirmationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationType::View => "view",
            ConfirmationType::Click => "click",
            ConfirmationType::Dismiss => "dismiss",
            ConfirmationType::Landed => "landed",
            ConfirmationType::Conversion => "conversion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_creative_mints_uuid() {
        let creative = CreativeAdNotification {
            creative_instance_id: "instance-1".to_string(),
            title: "title".to_string(),
            body: "body".to_string(),
            target_url: "https://example.com".to_string(),
            ..Default::default()
        };

        let a = AdNotification::from_creative(&creative);
        let b = AdNotification::from_creative(&creative);
        assert_ne!(a.uuid, b.uuid);
        assert_eq!(a.creative_instance_id, "instance-1");
    }
}
