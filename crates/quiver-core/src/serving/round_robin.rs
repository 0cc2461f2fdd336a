//! Round-robin candidate selection.
//!
//! Candidates rotate at two levels: advertisers first, then individual
//! creatives within the surviving advertisers. Once every key at a level
//! has been served the pass resets, keeping only the most recently shown
//! key marked so the same ad never plays twice in a row when there is an
//! alternative.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::profile::Profile;
use crate::types::CreativeAdNotification;

/// Keep candidates whose key has not been seen this pass. When none
/// survive, the pass resets: only the candidates' own keys are forgotten,
/// so keys seen through other categories stay marked. The most recent key
/// stays marked while more than one key had been seen.
fn filter_unseen<F>(
    candidates: Vec<CreativeAdNotification>,
    seen: &mut HashSet<String>,
    most_recent: Option<&str>,
    key: F,
) -> Vec<CreativeAdNotification>
where
    F: Fn(&CreativeAdNotification) -> &str,
{
    let unseen: Vec<CreativeAdNotification> = candidates
        .iter()
        .filter(|ad| !seen.contains(key(ad)))
        .cloned()
        .collect();
    if !unseen.is_empty() {
        return unseen;
    }

    let keep_most_recent = seen.len() > 1;
    for ad in &candidates {
        seen.remove(key(ad));
    }
    if keep_most_recent {
        if let Some(recent) = most_recent {
            seen.insert(recent.to_string());
        }
    }

    candidates
        .into_iter()
        .filter(|ad| !seen.contains(key(ad)))
        .collect()
}

/// Pick one candidate uniformly at random after the two-level rotation.
pub fn pick(
    candidates: Vec<CreativeAdNotification>,
    profile: &mut Profile,
    rng: &mut impl Rng,
) -> Option<CreativeAdNotification> {
    if candidates.is_empty() {
        return None;
    }

    let last_advertiser = profile
        .last_shown()
        .map(|record| record.advertiser_id.clone());
    let last_instance = profile
        .last_shown()
        .map(|record| record.creative_instance_id.clone());

    let candidates = filter_unseen(
        candidates,
        &mut profile.seen_advertisers,
        last_advertiser.as_deref(),
        |ad| &ad.advertiser_id,
    );
    let candidates = filter_unseen(
        candidates,
        &mut profile.seen_ads,
        last_instance.as_deref(),
        |ad| &ad.creative_instance_id,
    );

    candidates.choose(rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ad(instance: &str, advertiser: &str) -> CreativeAdNotification {
        CreativeAdNotification {
            creative_instance_id: instance.to_string(),
            creative_set_id: format!("{instance}-set"),
            campaign_id: format!("{instance}-campaign"),
            advertiser_id: advertiser.to_string(),
            title: "title".to_string(),
            body: "body".to_string(),
            target_url: "https://example.com".to_string(),
            ..Default::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_rotates_through_unseen_advertisers() {
        let mut profile = Profile::default();
        let candidates = vec![ad("i1", "a1"), ad("i2", "a2")];

        profile.record_exposure(&candidates[0], Utc::now());
        let picked = pick(candidates, &mut profile, &mut rng()).unwrap();
        assert_eq!(picked.advertiser_id, "a2");
    }

    #[test]
    fn test_reset_excludes_most_recent_when_alternatives_exist() {
        let now = Utc::now();
        let mut profile = Profile::default();
        let candidates = vec![ad("i1", "a1"), ad("i2", "a2")];

        profile.record_exposure(&candidates[0], now);
        profile.record_exposure(&candidates[1], now);
        // Both advertisers seen; the reset must not repeat a2 immediately.
        let picked = pick(candidates, &mut profile, &mut rng()).unwrap();
        assert_eq!(picked.advertiser_id, "a1");
    }

    #[test]
    fn test_sole_candidate_can_repeat_after_reset() {
        let now = Utc::now();
        let mut profile = Profile::default();
        let only = ad("i1", "a1");

        profile.record_exposure(&only, now);
        let picked = pick(vec![only], &mut profile, &mut rng()).unwrap();
        assert_eq!(picked.creative_instance_id, "i1");
    }

    #[test]
    fn test_most_recent_sole_candidate_is_excluded_after_reset() {
        let now = Utc::now();
        let mut profile = Profile::default();
        let first = ad("i1", "a1");
        let second = ad("i2", "a2");
        profile.record_exposure(&first, now);
        profile.record_exposure(&second, now);

        // Only the most recently shown advertiser is on offer. With two
        // advertisers seen it must not repeat immediately, even though the
        // pool itself has a single key.
        assert!(pick(vec![second], &mut profile, &mut rng()).is_none());
    }

    #[test]
    fn test_reset_forgets_only_candidate_keys() {
        let now = Utc::now();
        let mut profile = Profile::default();
        let candidates = vec![ad("i1", "a1"), ad("i2", "a2")];
        profile.record_exposure(&candidates[0], now);
        profile.record_exposure(&candidates[1], now);
        profile.record_exposure(&ad("i3", "a3"), now);

        assert!(pick(candidates, &mut profile, &mut rng()).is_some());
        // a3 was seen through another category and must stay marked.
        assert!(profile.seen_advertisers.contains("a3"));
        assert!(profile.seen_ads.contains("i3"));
    }

    #[test]
    fn test_rotates_creatives_within_an_advertiser() {
        let now = Utc::now();
        let mut profile = Profile::default();
        let candidates = vec![ad("i1", "a1"), ad("i2", "a1")];

        profile.record_exposure(&candidates[0], now);
        // Advertiser level resets (only one advertiser); the ad level must
        // still rotate to the unseen creative.
        let picked = pick(candidates, &mut profile, &mut rng()).unwrap();
        assert_eq!(picked.creative_instance_id, "i2");
    }

    #[test]
    fn test_empty_candidates_pick_nothing() {
        let mut profile = Profile::default();
        assert!(pick(Vec::new(), &mut profile, &mut rng()).is_none());
    }
}
