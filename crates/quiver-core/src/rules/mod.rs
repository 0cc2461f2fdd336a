//! Frequency-cap rules.
//!
//! Exclusion rules remove individual candidates from a serving attempt;
//! permission rules gate the attempt as a whole. Every rule is evaluated on
//! every pass so each can log its own verdict, and the first failing reason
//! is the one surfaced to the caller.

pub mod exclusion;
pub mod permission;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AdsConfig;
use crate::profile::Profile;
use crate::types::CreativeAdNotification;

/// The outcome of a single rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl RuleVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Removes one candidate from a serving attempt.
pub trait ExclusionRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        ad: &CreativeAdNotification,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> RuleVerdict;
}

/// Gates a serving attempt as a whole.
pub trait PermissionRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, profile: &Profile, config: &AdsConfig, now: DateTime<Utc>)
        -> RuleVerdict;
}

pub fn default_exclusion_rules(config: &AdsConfig) -> Vec<Box<dyn ExclusionRule>> {
    vec![
        Box::new(exclusion::DailyCapRule),
        Box::new(exclusion::PerDayRule),
        Box::new(exclusion::PerHourRule::new(config.per_hour_cap)),
        Box::new(exclusion::TotalMaxRule),
    ]
}

pub fn default_permission_rules() -> Vec<Box<dyn PermissionRule>> {
    vec![
        Box::new(permission::AdsPerHourRule),
        Box::new(permission::AdsPerDayRule),
        Box::new(permission::MinimumWaitTimeRule),
    ]
}

/// Run every exclusion rule against `ad`. Returns the first failing
/// rule's reason, or `None` when the candidate survives.
pub fn should_exclude(
    rules: &[Box<dyn ExclusionRule>],
    ad: &CreativeAdNotification,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Option<String> {
    let mut first_reason = None;
    for rule in rules {
        let verdict = rule.evaluate(ad, profile, now);
        if !verdict.allowed {
            debug!(
                rule = rule.name(),
                creative_instance_id = %ad.creative_instance_id,
                reason = %verdict.reason,
                "excluding candidate"
            );
            first_reason.get_or_insert(verdict.reason);
        }
    }
    first_reason
}

/// Run every permission rule. The aggregate denies if any rule denies,
/// carrying the first failing reason.
pub fn check_permissions(
    rules: &[Box<dyn PermissionRule>],
    profile: &Profile,
    config: &AdsConfig,
    now: DateTime<Utc>,
) -> RuleVerdict {
    let mut first_denial = None;
    for rule in rules {
        let verdict = rule.evaluate(profile, config, now);
        if !verdict.allowed {
            debug!(rule = rule.name(), reason = %verdict.reason, "permission denied");
            first_denial.get_or_insert(verdict);
        }
    }
    first_denial.unwrap_or_else(RuleVerdict::allow)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDeny(&'static str);

    impl PermissionRule for AlwaysDeny {
        fn name(&self) -> &'static str {
            "always_deny"
        }

        fn evaluate(&self, _: &Profile, _: &AdsConfig, _: DateTime<Utc>) -> RuleVerdict {
            RuleVerdict::deny(self.0)
        }
    }

    struct AlwaysAllow;

    impl PermissionRule for AlwaysAllow {
        fn name(&self) -> &'static str {
            "always_allow"
        }

        fn evaluate(&self, _: &Profile, _: &AdsConfig, _: DateTime<Utc>) -> RuleVerdict {
            RuleVerdict::allow()
        }
    }

    #[test]
    fn test_first_denial_wins() {
        let rules: Vec<Box<dyn PermissionRule>> = vec![
            Box::new(AlwaysAllow),
            Box::new(AlwaysDeny("first")),
            Box::new(AlwaysDeny("second")),
        ];
        let verdict = check_permissions(
            &rules,
            &Profile::default(),
            &AdsConfig::default(),
            Utc::now(),
        );
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "first");
    }

    #[test]
    fn test_all_allowing_rules_pass() {
        let rules: Vec<Box<dyn PermissionRule>> = vec![Box::new(AlwaysAllow)];
        let verdict = check_permissions(
            &rules,
            &Profile::default(),
            &AdsConfig::default(),
            Utc::now(),
        );
        assert!(verdict.allowed);
    }
}
