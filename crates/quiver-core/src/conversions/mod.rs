//! Conversion matching and redemption queueing.
//!
//! A conversion fires when the user visits a URL matching a catalog rule
//! after a confirmed exposure of the required kind, inside the rule's
//! observation window. Matches are queued with a random delay so redemption
//! timing does not reveal the exact page visit.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

use crate::profile::Profile;
use crate::types::{AdConversion, QueuedConversion};
use crate::urls;

/// Matches page visits against conversion rules.
#[derive(Debug, Clone)]
pub struct ConversionMatcher {
    jitter_secs: u64,
}

impl ConversionMatcher {
    pub fn new(jitter_secs: u64) -> Self {
        Self { jitter_secs }
    }

    /// Conversions triggered by a visit to `url`. At most one conversion
    /// per creative set, ever; sets with a match already queued are also
    /// skipped.
    pub fn find_matches(
        &self,
        url: &str,
        rules: &[AdConversion],
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Vec<QueuedConversion> {
        let mut matches = Vec::new();
        for rule in rules {
            if profile.has_converted(&rule.creative_set_id) {
                continue;
            }
            if profile
                .queued_conversions
                .iter()
                .chain(matches.iter())
                .any(|queued| queued.creative_set_id == rule.creative_set_id)
            {
                continue;
            }
            if !urls::match_wildcard(url, &rule.url_pattern) {
                continue;
            }

            let required = rule.conversion_type.required_confirmation();
            let window = Duration::days(i64::from(rule.observation_window));
            let confirmed = profile
                .confirmations_for(&rule.creative_set_id)
                .iter()
                .filter(|record| {
                    record.confirmation_type == required
                        && record.at <= now
                        && now - record.at <= window
                })
                .max_by_key(|record| record.at);

            let Some(confirmed) = confirmed else {
                continue;
            };

            debug!(
                creative_set_id = %rule.creative_set_id,
                conversion_type = rule.conversion_type.as_str(),
                "conversion matched"
            );
            matches.push(QueuedConversion {
                creative_instance_id: confirmed.creative_instance_id.clone(),
                creative_set_id: rule.creative_set_id.clone(),
                conversion_type: rule.conversion_type,
                process_at: now + Duration::seconds(self.jitter(&mut rand::thread_rng())),
            });
        }
        matches
    }

    fn jitter(&self, rng: &mut impl Rng) -> i64 {
        if self.jitter_secs == 0 {
            return 0;
        }
        rng.gen_range(0..=self.jitter_secs) as i64
    }
}

/// Split the profile's queue into due and still-pending conversions.
pub fn drain_due(
    profile: &mut Profile,
    now: DateTime<Utc>,
) -> Vec<QueuedConversion> {
    let (due, pending): (Vec<_>, Vec<_>) = profile
        .queued_conversions
        .drain(..)
        .partition(|queued| queued.process_at <= now);
    profile.queued_conversions = pending;
    due
}

/// Delay until the earliest queued conversion is due, if any are queued.
pub fn next_due_delay_secs(profile: &Profile, now: DateTime<Utc>) -> Option<u64> {
    profile
        .queued_conversions
        .iter()
        .map(|queued| queued.process_at)
        .min()
        .map(|at| (at - now).num_seconds().max(0) as u64)
}
