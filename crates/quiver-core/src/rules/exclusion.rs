//! Per-candidate frequency caps. A cap of zero permits nothing.

use chrono::{DateTime, Duration, Utc};

use super::{ExclusionRule, RuleVerdict};
use crate::profile::Profile;
use crate::types::CreativeAdNotification;

/// Creative-set cap over a rolling day.
pub struct DailyCapRule;

impl ExclusionRule for DailyCapRule {
    fn name(&self) -> &'static str {
        "daily_cap"
    }

    fn evaluate(
        &self,
        ad: &CreativeAdNotification,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let count =
            profile.creative_set_count_within(&ad.creative_set_id, Duration::days(1), now);
        if count >= ad.daily_cap as usize {
            return RuleVerdict::deny(format!(
                "creative set {} exceeded daily cap of {}",
                ad.creative_set_id, ad.daily_cap
            ));
        }
        RuleVerdict::allow()
    }
}

/// Creative-set cap over the current calendar day.
pub struct PerDayRule;

impl ExclusionRule for PerDayRule {
    fn name(&self) -> &'static str {
        "per_day"
    }

    fn evaluate(
        &self,
        ad: &CreativeAdNotification,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let today = now.date_naive();
        let count = profile
            .creative_set_timestamps(&ad.creative_set_id)
            .iter()
            .filter(|at| at.date_naive() == today)
            .count();
        if count >= ad.per_day as usize {
            return RuleVerdict::deny(format!(
                "creative set {} exceeded per-day cap of {}",
                ad.creative_set_id, ad.per_day
            ));
        }
        RuleVerdict::allow()
    }
}

/// Creative-set cap over a rolling hour.
pub struct PerHourRule {
    cap: u32,
}

impl PerHourRule {
    pub fn new(cap: u32) -> Self {
        Self { cap }
    }
}

impl ExclusionRule for PerHourRule {
    fn name(&self) -> &'static str {
        "per_hour"
    }

    fn evaluate(
        &self,
        ad: &CreativeAdNotification,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> RuleVerdict {
        let count =
            profile.creative_set_count_within(&ad.creative_set_id, Duration::hours(1), now);
        if count >= self.cap as usize {
            return RuleVerdict::deny(format!(
                "creative set {} exceeded hourly cap of {}",
                ad.creative_set_id, self.cap
            ));
        }
        RuleVerdict::allow()
    }
}

/// Creative-set cap over its lifetime.
pub struct TotalMaxRule;

impl ExclusionRule for TotalMaxRule {
    fn name(&self) -> &'static str {
        "total_max"
    }

    fn evaluate(
        &self,
        ad: &CreativeAdNotification,
        profile: &Profile,
        _now: DateTime<Utc>,
    ) -> RuleVerdict {
        if profile.creative_set_total(&ad.creative_set_id) >= ad.total_max as usize {
            return RuleVerdict::deny(format!(
                "creative set {} exceeded total max of {}",
                ad.creative_set_id, ad.total_max
            ));
        }
        RuleVerdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capped_ad() -> CreativeAdNotification {
        CreativeAdNotification {
            creative_instance_id: "instance-1".to_string(),
            creative_set_id: "set-1".to_string(),
            campaign_id: "campaign-1".to_string(),
            advertiser_id: "advertiser-1".to_string(),
            daily_cap: 2,
            per_day: 2,
            total_max: 4,
            ..Default::default()
        }
    }

    fn profile_with_exposures(count: usize, at: DateTime<Utc>) -> Profile {
        let mut profile = Profile::default();
        for _ in 0..count {
            profile.record_exposure(&capped_ad(), at);
        }
        profile
    }

    #[test]
    fn test_daily_cap_rolling_day() {
        let now = Utc::now();
        let ad = capped_ad();

        let under = profile_with_exposures(1, now - Duration::hours(2));
        assert!(DailyCapRule.evaluate(&ad, &under, now).allowed);

        let at_cap = profile_with_exposures(2, now - Duration::hours(2));
        assert!(!DailyCapRule.evaluate(&ad, &at_cap, now).allowed);

        // Exposures older than a day roll out of the window.
        let aged = profile_with_exposures(2, now - Duration::hours(25));
        assert!(DailyCapRule.evaluate(&ad, &aged, now).allowed);
    }

    #[test]
    fn test_per_hour_cap_is_per_creative_set() {
        let now = Utc::now();
        let ad = capped_ad();
        let rule = PerHourRule::new(1);

        let recent = profile_with_exposures(1, now - Duration::minutes(10));
        assert!(!rule.evaluate(&ad, &recent, now).allowed);

        let stale = profile_with_exposures(1, now - Duration::minutes(61));
        assert!(rule.evaluate(&ad, &stale, now).allowed);

        // A different creative set is not capped by this history.
        let mut other = capped_ad();
        other.creative_set_id = "set-2".to_string();
        assert!(rule.evaluate(&other, &recent, now).allowed);
    }

    #[test]
    fn test_per_day_resets_at_midnight() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap();
        let ad = capped_ad();

        let today = profile_with_exposures(2, now - Duration::hours(2));
        assert!(!PerDayRule.evaluate(&ad, &today, now).allowed);

        // Thirteen hours earlier lands on the previous calendar day.
        let yesterday = profile_with_exposures(2, now - Duration::hours(13));
        assert!(PerDayRule.evaluate(&ad, &yesterday, now).allowed);
    }

    #[test]
    fn test_total_max_counts_lifetime() {
        let now = Utc::now();
        let ad = capped_ad();

        let under = profile_with_exposures(3, now - Duration::days(30));
        assert!(TotalMaxRule.evaluate(&ad, &under, now).allowed);

        let at_cap = profile_with_exposures(4, now - Duration::days(30));
        assert!(!TotalMaxRule.evaluate(&ad, &at_cap, now).allowed);
    }

    #[test]
    fn test_zero_cap_always_excludes() {
        let now = Utc::now();
        let mut ad = capped_ad();
        ad.total_max = 0;
        assert!(!TotalMaxRule.evaluate(&ad, &Profile::default(), now).allowed);
    }
}
