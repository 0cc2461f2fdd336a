//! quiver-core - Core library for quiver.
//!
//! A local, privacy-preserving ad engine: purchase-intent classification,
//! catalog storage, frequency-cap rules and notification serving, all
//! running on-device against a host that implements [`AdsClient`].
//!
//! # Example
//!
//! ```ignore
//! use quiver_core::{AdsConfig, AdsEngine};
//!
//! let mut engine = AdsEngine::new(AdsConfig::default(), client)?;
//! engine.initialize().await?;
//!
//! // Drive it with browser activity.
//! engine.on_page_loaded(1, "https://www.google.com/search?q=audi+a6+review", "").await;
//! let notification = engine.serve_ad_notification(false).await?;
//! ```

pub mod catalog;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod intent;
pub mod profile;
pub mod rules;
pub mod serving;
pub mod traits;
pub mod types;
pub mod urls;

// Re-export commonly used types
pub use catalog::{CatalogInfo, CatalogStore};
pub use config::AdsConfig;
pub use error::{AdsError, AdsResult, ClassificationError, ServeFailure, StoreError};
pub use events::ReportEvent;
pub use intent::{Classifier, PurchaseIntentSignal, SegmentHistoryMap, SignalRecord};
pub use profile::{ExposureRecord, Profile};
pub use serving::AdsEngine;
pub use traits::{AdsClient, TimerId, INVALID_TIMER_ID};
pub use types::{
    AdConversion, AdNotification, AdNotificationEventType, Catalog, ClientInfo, ClientPlatform,
    ConfirmationType, ConversionType, CreativeAdNotification, CreativePublisherAd,
    QueuedConversion,
};
