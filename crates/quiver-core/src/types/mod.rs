//! Core data types shared across the engine.

mod catalog;
mod conversion;
mod creative;
mod notification;

pub use catalog::Catalog;
pub use conversion::{AdConversion, ConversionType, QueuedConversion};
pub use creative::{CreativeAdNotification, CreativePublisherAd};
pub use notification::{AdNotification, AdNotificationEventType, ConfirmationType};

use serde::{Deserialize, Serialize};

/// Host platform, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPlatform {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
}

impl ClientPlatform {
    /// Whether ad delivery runs on the mobile timer cadence.
    pub fn is_mobile(&self) -> bool {
        matches!(self, ClientPlatform::Android | ClientPlatform::Ios)
    }
}

/// Client platform information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub platform: ClientPlatform,
    pub application_version: String,
}
