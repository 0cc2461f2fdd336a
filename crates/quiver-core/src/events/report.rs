//! Ad reporting events.
//!
//! Every notable engine action is mirrored as a structured event and handed
//! to the client, which decides where the stream goes. Payloads are flat
//! JSON objects tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AdNotification, ConfirmationType};

/// Ad reporting events emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    /// A notification was pushed to the user.
    Notify(NotifyEvent),
    /// A confirmation was redeemed.
    Confirmation(ConfirmationEvent),
    /// A page finished loading and was classified.
    Load(LoadEvent),
    /// The browser entered the foreground.
    Foreground(StateEvent),
    /// The browser entered the background.
    Background(StateEvent),
    /// A tab gained focus.
    Focus(TabEvent),
    /// A tab lost focus.
    Blur(TabEvent),
    /// A tab was closed.
    Destroy(TabEvent),
    /// The engine restarted with existing state.
    Restart(StateEvent),
    /// An ads setting changed.
    Settings(SettingsEvent),
}

impl ReportEvent {
    /// Event type as a string for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Notify(_) => "notify",
            Self::Confirmation(_) => "confirmation",
            Self::Load(_) => "load",
            Self::Foreground(_) => "foreground",
            Self::Background(_) => "background",
            Self::Focus(_) => "focus",
            Self::Blur(_) => "blur",
            Self::Destroy(_) => "destroy",
            Self::Restart(_) => "restart",
            Self::Settings(_) => "settings",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Notify(e) => e.timestamp,
            Self::Confirmation(e) => e.timestamp,
            Self::Load(e) => e.timestamp,
            Self::Foreground(e) | Self::Background(e) | Self::Restart(e) => e.timestamp,
            Self::Focus(e) | Self::Blur(e) | Self::Destroy(e) => e.timestamp,
            Self::Settings(e) => e.timestamp,
        }
    }

    pub fn notify(notification: &AdNotification, timestamp: DateTime<Utc>) -> Self {
        Self::Notify(NotifyEvent {
            uuid: notification.uuid.clone(),
            creative_instance_id: notification.creative_instance_id.clone(),
            creative_set_id: notification.creative_set_id.clone(),
            campaign_id: notification.campaign_id.clone(),
            category: notification.category.clone(),
            target_url: notification.target_url.clone(),
            timestamp,
        })
    }

    pub fn confirmation(
        creative_instance_id: impl Into<String>,
        confirmation_type: ConfirmationType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Confirmation(ConfirmationEvent {
            creative_instance_id: creative_instance_id.into(),
            confirmation_type,
            timestamp,
        })
    }

    pub fn load(
        tab_id: i32,
        url: impl Into<String>,
        classification: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Load(LoadEvent {
            tab_id,
            url: url.into(),
            classification: classification.into(),
            timestamp,
        })
    }

    pub fn foreground(timestamp: DateTime<Utc>) -> Self {
        Self::Foreground(StateEvent { timestamp })
    }

    pub fn background(timestamp: DateTime<Utc>) -> Self {
        Self::Background(StateEvent { timestamp })
    }

    pub fn restart(timestamp: DateTime<Utc>) -> Self {
        Self::Restart(StateEvent { timestamp })
    }

    pub fn focus(tab_id: i32, timestamp: DateTime<Utc>) -> Self {
        Self::Focus(TabEvent { tab_id, timestamp })
    }

    pub fn blur(tab_id: i32, timestamp: DateTime<Utc>) -> Self {
        Self::Blur(TabEvent { tab_id, timestamp })
    }

    pub fn destroy(tab_id: i32, timestamp: DateTime<Utc>) -> Self {
        Self::Destroy(TabEvent { tab_id, timestamp })
    }

    pub fn settings(enabled: bool, ads_per_hour: u32, timestamp: DateTime<Utc>) -> Self {
        Self::Settings(SettingsEvent {
            enabled,
            ads_per_hour,
            timestamp,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyEvent {
    pub uuid: String,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub category: String,
    pub target_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationEvent {
    pub creative_instance_id: String,
    pub confirmation_type: ConfirmationType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEvent {
    pub tab_id: i32,
    pub url: String,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabEvent {
    pub tab_id: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsEvent {
    pub enabled: bool,
    pub ads_per_hour: u32,
    pub timestamp: DateTime<Utc>,
}
