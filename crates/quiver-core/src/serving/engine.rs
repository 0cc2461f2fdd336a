//! The serving engine.
//!
//! Owns the catalog store, the behavioral profile and all serving policy.
//! The host drives it with page loads, tab activity, notification events
//! and timer callbacks; the engine answers through the [`AdsClient`] trait.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::config::AdsConfig;
use crate::conversions::{self, ConversionMatcher};
use crate::error::{AdsError, AdsResult, ServeFailure};
use crate::events::ReportEvent;
use crate::intent::{Classifier, SignalRecord};
use crate::profile::Profile;
use crate::rules::{self, ExclusionRule, PermissionRule};
use crate::serving::notifications::NotificationQueue;
use crate::serving::round_robin;
use crate::traits::{AdsClient, TimerId, INVALID_TIMER_ID};
use crate::types::{
    AdConversion, AdNotification, AdNotificationEventType, Catalog, ConfirmationType,
    CreativeAdNotification,
};
use crate::urls;

const CATEGORY_DELIMITER: char = '-';

/// The top-level ads engine.
pub struct AdsEngine {
    config: AdsConfig,
    client: Arc<dyn AdsClient>,
    store: CatalogStore,
    profile: Profile,
    classifier: Classifier,
    matcher: ConversionMatcher,
    exclusion_rules: Vec<Box<dyn ExclusionRule>>,
    permission_rules: Vec<Box<dyn PermissionRule>>,
    notifications: NotificationQueue,
    conversion_rules: Vec<AdConversion>,
    rng: StdRng,

    initialized: bool,
    enabled: bool,
    foreground: bool,
    focused_tab_id: Option<i32>,
    /// URL of the focused tab, checked again when the dwell timer fires.
    active_tab_url: Option<String>,

    /// Domain of the last sustained landing, so dwell on one site confirms
    /// at most once per visit streak.
    last_sustained_domain: Option<String>,
    /// Landing awaiting its dwell timer.
    pending_sustain: Option<PendingSustain>,

    collect_timer_id: TimerId,
    delivery_timer_id: TimerId,
    sustain_timer_id: TimerId,
    conversion_timer_id: TimerId,
}

struct PendingSustain {
    domain: String,
    creative_instance_id: String,
    creative_set_id: String,
}

impl AdsEngine {
    /// Open the catalog store and load the profile. The engine is not
    /// serving until [`initialize`](Self::initialize) runs.
    pub fn new(config: AdsConfig, client: Arc<dyn AdsClient>) -> AdsResult<Self> {
        let store = CatalogStore::new(&config.catalog_db_path)?;
        let profile = Profile::load(&config.profile_path);
        let classifier = Classifier::new(
            config.signal_decay_window_days,
            config.signal_score_threshold,
        );
        let matcher = ConversionMatcher::new(config.conversion_jitter_secs);
        let exclusion_rules = rules::default_exclusion_rules(&config);
        let permission_rules = rules::default_permission_rules();

        Ok(Self {
            config,
            client,
            store,
            profile,
            classifier,
            matcher,
            exclusion_rules,
            permission_rules,
            notifications: NotificationQueue::new(),
            conversion_rules: Vec::new(),
            rng: StdRng::from_entropy(),
            initialized: false,
            enabled: true,
            foreground: false,
            focused_tab_id: None,
            active_tab_url: None,
            last_sustained_domain: None,
            pending_sustain: None,
            collect_timer_id: INVALID_TIMER_ID,
            delivery_timer_id: INVALID_TIMER_ID,
            sustain_timer_id: INVALID_TIMER_ID,
            conversion_timer_id: INVALID_TIMER_ID,
        })
    }

    /// Bring the engine up: cache conversion rules, restore timers, announce
    /// the restart when prior state exists and request a fresh catalog.
    /// Initializing twice is an error.
    pub async fn initialize(&mut self) -> AdsResult<()> {
        if self.initialized {
            return Err(AdsError::Internal("engine already initialized".to_string()));
        }

        self.conversion_rules = self.store.get_ad_conversions()?;
        self.foreground = self.client.is_foreground();
        self.initialized = true;

        let now = Utc::now();
        if !self.profile.ads_shown_history.is_empty() {
            self.emit(ReportEvent::restart(now));
        }

        self.start_delivery_timer_from_profile(now);
        self.reschedule_conversion_timer(now);

        info!(
            catalog_ready = self.store.catalog_info()?.is_some(),
            "ads engine initialized"
        );

        // First collection happens right away; it also schedules the next one.
        self.collect_activity().await;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut Profile {
        &mut self.profile
    }

    /// Store a freshly downloaded catalog and refresh the cached
    /// conversion rules.
    pub async fn replace_catalog(&mut self, catalog: &Catalog) -> AdsResult<()> {
        let now = Utc::now();
        self.store.replace_catalog(catalog, now)?;
        self.conversion_rules = self.store.get_ad_conversions()?;
        info!(catalog_id = %catalog.catalog_id, "catalog replaced");
        Ok(())
    }

    /// Timer callback dispatch.
    pub async fn on_timer(&mut self, timer_id: TimerId) {
        if timer_id == self.collect_timer_id {
            self.collect_timer_id = INVALID_TIMER_ID;
            self.collect_activity().await;
        } else if timer_id == self.delivery_timer_id {
            self.delivery_timer_id = INVALID_TIMER_ID;
            if let Err(failure) = self.serve_ad_notification(false).await {
                debug!(%failure, "scheduled serve attempt failed");
            }
        } else if timer_id == self.sustain_timer_id {
            self.sustain_timer_id = INVALID_TIMER_ID;
            self.sustain_interaction().await;
        } else if timer_id == self.conversion_timer_id {
            self.conversion_timer_id = INVALID_TIMER_ID;
            self.process_due_conversions().await;
        } else {
            warn!(timer_id, "unknown timer fired");
        }
    }

    /// A page finished loading in a tab. `content` is the extracted page
    /// text, forwarded to the host classifier when the URL carries no
    /// purchase-intent signal of its own.
    pub async fn on_page_loaded(&mut self, tab_id: i32, url: &str, content: &str) {
        if !self.initialized {
            return;
        }
        let now = Utc::now();

        if self.focused_tab_id.is_none() || self.focused_tab_id == Some(tab_id) {
            self.active_tab_url = Some(url.to_string());
        }

        self.check_conversions(url, now);
        self.check_sustained_interaction(url);

        if !urls::is_supported(url) {
            return;
        }

        let signal = self.classifier.extract_signal(url, now);
        if !signal.is_empty() {
            for segment in &signal.segments {
                self.profile.intent_history.append(
                    segment,
                    SignalRecord {
                        at: signal.at,
                        weight: signal.weight,
                    },
                );
            }
            self.profile
                .intent_history
                .evict_before(now - Duration::days(self.config.signal_decay_window_days));
            self.save_profile();
            return;
        }

        // Not a search results page; ask the host classifier.
        let classification = match self.client.get_page_classification(url, content).await {
            Ok(Some(classification)) => classification,
            Ok(None) => String::new(),
            Err(err) => {
                debug!(%err, url, "page classification failed");
                String::new()
            }
        };
        if !classification.is_empty() {
            self.profile.last_page_classification = Some(classification.clone());
            self.save_profile();
        }
        self.emit(ReportEvent::load(tab_id, url, classification, now));
    }

    /// The user interacted with a shown notification.
    pub async fn on_ad_notification_event(
        &mut self,
        uuid: &str,
        event_type: AdNotificationEventType,
    ) {
        let Some(notification) = self.notifications.get(uuid).cloned() else {
            warn!(uuid, "event for unknown notification");
            return;
        };

        match event_type {
            AdNotificationEventType::Viewed => {
                self.redeem(&notification, ConfirmationType::View).await;
            }
            AdNotificationEventType::Clicked => {
                self.redeem(&notification, ConfirmationType::Click).await;
                self.notifications.remove(uuid);
                self.client.close_notification(uuid);
            }
            AdNotificationEventType::Dismissed => {
                self.redeem(&notification, ConfirmationType::Dismiss).await;
                self.notifications.remove(uuid);
            }
            AdNotificationEventType::TimedOut => {
                self.notifications.remove(uuid);
            }
        }
        self.save_profile();
    }

    pub fn on_foreground(&mut self) {
        self.foreground = true;
        self.emit(ReportEvent::foreground(Utc::now()));
    }

    pub fn on_background(&mut self) {
        self.foreground = false;
        self.emit(ReportEvent::background(Utc::now()));
    }

    /// Tab focus bookkeeping. Incognito tabs are invisible to the engine.
    pub fn on_tab_updated(&mut self, tab_id: i32, url: &str, is_active: bool, is_incognito: bool) {
        if is_incognito {
            return;
        }
        let now = Utc::now();
        if is_active {
            if let Some(previous) = self.focused_tab_id {
                if previous != tab_id {
                    self.emit(ReportEvent::blur(previous, now));
                }
            }
            self.focused_tab_id = Some(tab_id);
            self.active_tab_url = Some(url.to_string());
            self.emit(ReportEvent::focus(tab_id, now));
        } else if self.focused_tab_id == Some(tab_id) {
            self.focused_tab_id = None;
            self.active_tab_url = None;
            self.emit(ReportEvent::blur(tab_id, now));
        }
    }

    pub fn on_tab_closed(&mut self, tab_id: i32) {
        if self.focused_tab_id == Some(tab_id) {
            self.focused_tab_id = None;
            self.active_tab_url = None;
        }
        self.emit(ReportEvent::destroy(tab_id, Utc::now()));
    }

    /// The user became active again. Mobile surfaces have no delivery
    /// timer while idle, so unidle is their serving opportunity.
    pub async fn on_unidle(&mut self) {
        if !self.client.client_info().platform.is_mobile() {
            return;
        }
        if let Err(failure) = self.serve_ad_notification(false).await {
            debug!(%failure, "unidle serve attempt failed");
        }
    }

    /// Toggle an ads setting; announces the change when it flips.
    pub fn set_ads_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.emit(ReportEvent::settings(
            enabled,
            self.config.ads_per_hour,
            Utc::now(),
        ));
        if !enabled {
            for notification in self.notifications.remove_all() {
                self.client.close_notification(&notification.uuid);
            }
        }
    }

    pub fn toggle_filtered_category(&mut self, category: &str) -> bool {
        let filtered = self.profile.toggle_filtered_category(category);
        self.save_profile();
        filtered
    }

    pub fn toggle_filtered_creative_set(&mut self, creative_set_id: &str) -> bool {
        let filtered = self.profile.toggle_filtered_creative_set(creative_set_id);
        self.save_profile();
        filtered
    }

    pub fn toggle_flagged_ad(&mut self, creative_set_id: &str) -> bool {
        let flagged = self.profile.toggle_flagged_ad(creative_set_id);
        self.save_profile();
        flagged
    }

    /// Forget everything learned about the user.
    pub fn remove_all_history(&mut self) {
        self.profile.remove_all_history();
        self.save_profile();
    }

    pub fn on_memory_pressure(&self) {
        self.store.on_memory_pressure();
    }

    /// Attempt to serve one ad notification. `forced` skips the readiness
    /// gates, for explicit user-driven serves.
    pub async fn serve_ad_notification(
        &mut self,
        forced: bool,
    ) -> Result<AdNotification, ServeFailure> {
        let result = self.try_serve(forced).await;
        match &result {
            Ok(notification) => {
                info!(
                    creative_instance_id = %notification.creative_instance_id,
                    category = %notification.category,
                    "served ad notification"
                );
                let delay = self.config.next_serve_delay_secs();
                self.start_delivery_timer(delay);
            }
            Err(failure) => {
                debug!(%failure, "ad not served");
                self.start_delivery_timer(self.config.retry_serve_secs);
            }
        }
        result
    }

    async fn try_serve(&mut self, forced: bool) -> Result<AdNotification, ServeFailure> {
        let now = Utc::now();
        self.check_ready_ad_serve(forced, now)?;

        let winning = self.classifier.winning_categories(
            &self.profile.intent_history,
            self.config.winning_category_count,
            now,
        );

        if let Some(notification) = self.serve_from_categories(&winning, now) {
            return Ok(notification);
        }

        if let Some(parents) = parent_categories(&winning) {
            debug!("falling back to parent categories");
            if let Some(notification) = self.serve_from_categories(&parents, now) {
                return Ok(notification);
            }
        }

        debug!("falling back to untargeted serving");
        let untargeted = vec![self.config.untargeted_category.clone()];
        if let Some(notification) = self.serve_from_categories(&untargeted, now) {
            return Ok(notification);
        }

        Err(ServeFailure::NoEligibleCandidates)
    }

    fn check_ready_ad_serve(
        &self,
        forced: bool,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), ServeFailure> {
        if !self.initialized || !self.enabled {
            return Err(ServeFailure::NotInitialized);
        }
        let Ok(Some(info)) = self.store.catalog_info() else {
            return Err(ServeFailure::CatalogNotReady);
        };
        if forced {
            return Ok(());
        }

        if (now - info.last_updated_at).num_seconds() > self.config.catalog_max_age_secs {
            return Err(ServeFailure::CatalogStale);
        }
        if !self.client.is_network_available() {
            return Err(ServeFailure::NetworkUnavailable);
        }
        if !self.foreground {
            return Err(ServeFailure::NotInForeground);
        }
        if !self.client.should_show_notifications() {
            return Err(ServeFailure::NotificationsNotAllowed);
        }

        let verdict = rules::check_permissions(
            &self.permission_rules,
            &self.profile,
            &self.config,
            now,
        );
        if !verdict.allowed {
            return Err(ServeFailure::PermissionDenied(verdict.reason));
        }
        Ok(())
    }

    fn serve_from_categories(
        &mut self,
        categories: &[String],
        now: chrono::DateTime<Utc>,
    ) -> Option<AdNotification> {
        let candidates = match self.store.get_ads_for_categories(categories, now) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(%err, "candidate lookup failed");
                return None;
            }
        };
        let eligible = self.filter_eligible(candidates, now);
        let creative = round_robin::pick(eligible, &mut self.profile, &mut self.rng)?;
        Some(self.show_ad(&creative, now))
    }

    fn filter_eligible(
        &self,
        candidates: Vec<CreativeAdNotification>,
        now: chrono::DateTime<Utc>,
    ) -> Vec<CreativeAdNotification> {
        candidates
            .into_iter()
            .filter(|ad| ad.is_valid())
            .filter(|ad| !self.profile.filtered_categories.contains(&ad.category))
            .filter(|ad| {
                !self
                    .profile
                    .filtered_creative_sets
                    .contains(&ad.creative_set_id)
            })
            .filter(|ad| !self.profile.flagged_ads.contains(&ad.creative_set_id))
            .filter(|ad| {
                rules::should_exclude(&self.exclusion_rules, ad, &self.profile, now).is_none()
            })
            .collect()
    }

    fn show_ad(
        &mut self,
        creative: &CreativeAdNotification,
        now: chrono::DateTime<Utc>,
    ) -> AdNotification {
        let notification = AdNotification::from_creative(creative);
        self.profile.record_exposure(creative, now);
        self.profile.next_serve_at =
            Some(now + Duration::seconds(self.config.next_serve_delay_secs() as i64));
        self.notifications.push_back(notification.clone());
        self.client.show_notification(&notification);
        self.emit(ReportEvent::notify(&notification, now));
        self.save_profile();
        notification
    }

    async fn collect_activity(&mut self) {
        match self.client.download_catalog().await {
            Ok(catalog) => {
                if let Err(err) = self.replace_catalog(&catalog).await {
                    warn!(%err, "failed to store downloaded catalog");
                }
            }
            Err(err) => debug!(%err, "catalog download failed"),
        }
        self.start_collect_timer();
    }

    fn check_conversions(&mut self, url: &str, now: chrono::DateTime<Utc>) {
        let matches =
            self.matcher
                .find_matches(url, &self.conversion_rules, &self.profile, now);
        if matches.is_empty() {
            return;
        }
        self.profile.queued_conversions.extend(matches);
        self.save_profile();
        self.reschedule_conversion_timer(now);
    }

    async fn process_due_conversions(&mut self) {
        let now = Utc::now();
        let due = conversions::drain_due(&mut self.profile, now);
        for conversion in due {
            match self
                .client
                .confirm(
                    &conversion.creative_instance_id,
                    &conversion.creative_set_id,
                    ConfirmationType::Conversion,
                )
                .await
            {
                Ok(()) => {
                    self.profile
                        .conversion_history
                        .insert(conversion.creative_set_id.clone(), now);
                    self.emit(ReportEvent::confirmation(
                        conversion.creative_instance_id.clone(),
                        ConfirmationType::Conversion,
                        now,
                    ));
                }
                Err(err) => {
                    warn!(%err, creative_set_id = %conversion.creative_set_id,
                        "conversion redemption failed, requeueing");
                    let mut retry = conversion;
                    retry.process_at = now + Duration::seconds(self.config.retry_serve_secs as i64);
                    self.profile.queued_conversions.push(retry);
                }
            }
        }
        self.save_profile();
        self.reschedule_conversion_timer(now);
    }

    /// Landing on the target site of the last shown ad starts the dwell
    /// timer; leaving the domain resets the streak.
    fn check_sustained_interaction(&mut self, url: &str) {
        let Some(last) = self.profile.last_shown().cloned() else {
            return;
        };

        if urls::domains_match(url, &last.target_url) {
            let Some(domain) = urls::registrable_domain(url) else {
                return;
            };
            if self.last_sustained_domain.as_deref() == Some(domain.as_str()) {
                return;
            }
            if self.sustain_timer_id != INVALID_TIMER_ID {
                return;
            }
            self.pending_sustain = Some(PendingSustain {
                domain,
                creative_instance_id: last.creative_instance_id.clone(),
                creative_set_id: last.creative_set_id.clone(),
            });
            self.sustain_timer_id = self.client.set_timer(self.config.sustain_dwell_secs);
        } else {
            if self.sustain_timer_id != INVALID_TIMER_ID {
                self.client.kill_timer(self.sustain_timer_id);
                self.sustain_timer_id = INVALID_TIMER_ID;
            }
            self.pending_sustain = None;
            self.last_sustained_domain = None;
        }
    }

    async fn sustain_interaction(&mut self) {
        let Some(pending) = self.pending_sustain.take() else {
            return;
        };

        // The dwell only counts if the user is still on the landing domain.
        let still_on_domain = self
            .active_tab_url
            .as_deref()
            .and_then(urls::registrable_domain)
            .map_or(false, |domain| domain == pending.domain);
        if !still_on_domain {
            debug!(domain = %pending.domain, "left the landing domain before the dwell elapsed");
            return;
        }

        let now = Utc::now();
        if let Err(err) = self
            .client
            .confirm(
                &pending.creative_instance_id,
                &pending.creative_set_id,
                ConfirmationType::Landed,
            )
            .await
        {
            warn!(%err, "landed confirmation failed");
            return;
        }
        self.profile.record_confirmation(
            &pending.creative_set_id,
            &pending.creative_instance_id,
            ConfirmationType::Landed,
            now,
        );
        self.emit(ReportEvent::confirmation(
            pending.creative_instance_id,
            ConfirmationType::Landed,
            now,
        ));
        self.last_sustained_domain = Some(pending.domain);
        self.save_profile();
    }

    async fn redeem(&mut self, notification: &AdNotification, kind: ConfirmationType) {
        if let Err(err) = self
            .client
            .confirm(
                &notification.creative_instance_id,
                &notification.creative_set_id,
                kind,
            )
            .await
        {
            warn!(%err, kind = kind.as_str(), "confirmation failed");
            return;
        }
        let now = Utc::now();
        self.profile.record_confirmation(
            &notification.creative_set_id,
            &notification.creative_instance_id,
            kind,
            now,
        );
        self.emit(ReportEvent::confirmation(
            notification.creative_instance_id.clone(),
            kind,
            now,
        ));
    }

    fn start_collect_timer(&mut self) {
        if self.collect_timer_id != INVALID_TIMER_ID {
            self.client.kill_timer(self.collect_timer_id);
        }
        self.collect_timer_id = self.client.set_timer(self.config.catalog_poll_secs);
    }

    fn start_delivery_timer(&mut self, delay_secs: u64) {
        if self.delivery_timer_id != INVALID_TIMER_ID {
            self.client.kill_timer(self.delivery_timer_id);
        }
        self.delivery_timer_id = self.client.set_timer(delay_secs);
    }

    fn start_delivery_timer_from_profile(&mut self, now: chrono::DateTime<Utc>) {
        let delay = match self.profile.next_serve_at {
            Some(at) if at > now => (at - now).num_seconds() as u64,
            Some(_) => 0,
            None => self.config.next_serve_delay_secs(),
        };
        self.start_delivery_timer(delay);
    }

    fn reschedule_conversion_timer(&mut self, now: chrono::DateTime<Utc>) {
        if self.conversion_timer_id != INVALID_TIMER_ID {
            self.client.kill_timer(self.conversion_timer_id);
            self.conversion_timer_id = INVALID_TIMER_ID;
        }
        if let Some(delay) = conversions::next_due_delay_secs(&self.profile, now) {
            self.conversion_timer_id = self.client.set_timer(delay);
        }
    }

    fn emit(&self, event: ReportEvent) {
        match serde_json::to_value(&event) {
            Ok(value) => self.client.emit_event(value),
            Err(err) => warn!(%err, "failed to serialize report event"),
        }
    }

    fn save_profile(&self) {
        if let Err(err) = self.profile.save(&self.config.profile_path) {
            warn!(%err, "failed to persist profile");
        }
    }
}

/// Parent of each category, one taxonomy level up. Returns `None` when any
/// category is already a root, which ends the fallback ladder.
fn parent_categories(categories: &[String]) -> Option<Vec<String>> {
    if categories.is_empty() {
        return None;
    }
    let mut parents = Vec::with_capacity(categories.len());
    for category in categories {
        let (parent, _) = category.rsplit_once(CATEGORY_DELIMITER)?;
        let parent = parent.to_string();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }
    Some(parents)
}
