//! AdsClient trait: everything the engine needs from its host.

use async_trait::async_trait;

use crate::error::AdsResult;
use crate::types::{AdNotification, Catalog, ClientInfo, ConfirmationType};

/// Opaque timer handle issued by the client. Zero is never a valid id.
pub type TimerId = u32;

pub const INVALID_TIMER_ID: TimerId = 0;

/// Host integration surface - the embedding application implements this.
///
/// The engine owns all policy; the client owns platform capabilities:
/// timers, networking, the notification surface and the confirmation
/// subsystem.
#[async_trait]
pub trait AdsClient: Send + Sync {
    /// Platform and version of the host.
    fn client_info(&self) -> ClientInfo;

    /// Whether the host currently has network connectivity.
    fn is_network_available(&self) -> bool;

    /// Whether the browser is in the foreground.
    fn is_foreground(&self) -> bool;

    /// Whether the host permits showing system notifications.
    fn should_show_notifications(&self) -> bool;

    /// Ask the host's text classifier for the taxonomy segment of a page,
    /// given its URL and extracted text content, if it has one for the
    /// active locale.
    async fn get_page_classification(
        &self,
        url: &str,
        content: &str,
    ) -> AdsResult<Option<String>>;

    /// Download the current catalog.
    async fn download_catalog(&self) -> AdsResult<Catalog>;

    /// Start a one-shot timer that fires back into the engine after
    /// `delay_secs`. Returns [`INVALID_TIMER_ID`] on failure.
    fn set_timer(&self, delay_secs: u64) -> TimerId;

    /// Cancel a pending timer. Unknown ids are ignored.
    fn kill_timer(&self, timer_id: TimerId);

    /// Surface a notification to the user.
    fn show_notification(&self, notification: &AdNotification);

    /// Withdraw a previously shown notification.
    fn close_notification(&self, uuid: &str);

    /// Emit a structured reporting event.
    fn emit_event(&self, event: serde_json::Value);

    /// Redeem a confirmation for a creative instance.
    async fn confirm(
        &self,
        creative_instance_id: &str,
        creative_set_id: &str,
        confirmation_type: ConfirmationType,
    ) -> AdsResult<()>;
}
