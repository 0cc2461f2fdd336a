//! Whole-attempt serving gates.

use chrono::{DateTime, Duration, Utc};

use super::{PermissionRule, RuleVerdict};
use crate::config::AdsConfig;
use crate::profile::Profile;

/// Global budget over a rolling hour.
pub struct AdsPerHourRule;

impl PermissionRule for AdsPerHourRule {
    fn name(&self) -> &'static str {
        "ads_per_hour"
    }

    fn evaluate(
        &self,
        profile: &Profile,
        config: &AdsConfig,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let count = profile.ads_shown_within(Duration::hours(1), now);
        if count >= config.ads_per_hour as usize {
            return RuleVerdict::deny(format!(
                "exceeded {} ads per hour",
                config.ads_per_hour
            ));
        }
        RuleVerdict::allow()
    }
}

/// Global budget over a rolling day.
pub struct AdsPerDayRule;

impl PermissionRule for AdsPerDayRule {
    fn name(&self) -> &'static str {
        "ads_per_day"
    }

    fn evaluate(
        &self,
        profile: &Profile,
        config: &AdsConfig,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let count = profile.ads_shown_within(Duration::days(1), now);
        if count >= config.ads_per_day as usize {
            return RuleVerdict::deny(format!("exceeded {} ads per day", config.ads_per_day));
        }
        RuleVerdict::allow()
    }
}

/// Spacing between consecutive exposures so the hourly budget cannot be
/// spent in a burst.
pub struct MinimumWaitTimeRule;

impl PermissionRule for MinimumWaitTimeRule {
    fn name(&self) -> &'static str {
        "minimum_wait_time"
    }

    fn evaluate(
        &self,
        profile: &Profile,
        config: &AdsConfig,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let Some(last) = profile.last_shown() else {
            return RuleVerdict::allow();
        };
        let wait = config.minimum_wait_secs();
        let elapsed = (now - last.at).num_seconds();
        if elapsed < wait {
            return RuleVerdict::deny(format!(
                "minimum wait of {wait}s between ads, {elapsed}s elapsed"
            ));
        }
        RuleVerdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CreativeAdNotification;

    fn profile_with_exposures(count: usize, at: DateTime<Utc>) -> Profile {
        let ad = CreativeAdNotification {
            creative_instance_id: "instance-1".to_string(),
            creative_set_id: "set-1".to_string(),
            campaign_id: "campaign-1".to_string(),
            advertiser_id: "advertiser-1".to_string(),
            ..Default::default()
        };
        let mut profile = Profile::default();
        for _ in 0..count {
            profile.record_exposure(&ad, at);
        }
        profile
    }

    #[test]
    fn test_ads_per_hour_budget() {
        let now = Utc::now();
        let config = AdsConfig::default();

        let under = profile_with_exposures(1, now - Duration::minutes(45));
        assert!(AdsPerHourRule.evaluate(&under, &config, now).allowed);

        let spent = profile_with_exposures(2, now - Duration::minutes(45));
        let verdict = AdsPerHourRule.evaluate(&spent, &config, now);
        assert!(!verdict.allowed);
        assert!(verdict.reason.contains("per hour"));
    }

    #[test]
    fn test_ads_per_day_budget() {
        let now = Utc::now();
        let config = AdsConfig::default();

        let spent = profile_with_exposures(20, now - Duration::hours(3));
        assert!(!AdsPerDayRule.evaluate(&spent, &config, now).allowed);

        let aged = profile_with_exposures(20, now - Duration::hours(25));
        assert!(AdsPerDayRule.evaluate(&aged, &config, now).allowed);
    }

    #[test]
    fn test_minimum_wait_time() {
        let now = Utc::now();
        // Two per hour means a 1800 second gap.
        let config = AdsConfig::default();

        assert!(MinimumWaitTimeRule
            .evaluate(&Profile::default(), &config, now)
            .allowed);

        let recent = profile_with_exposures(1, now - Duration::minutes(10));
        assert!(!MinimumWaitTimeRule.evaluate(&recent, &config, now).allowed);

        let spaced = profile_with_exposures(1, now - Duration::minutes(31));
        assert!(MinimumWaitTimeRule.evaluate(&spaced, &config, now).allowed);
    }
}
