//! Funnel sites: pages whose visit is itself a strong purchase-intent
//! signal, independent of any search query.

use once_cell::sync::Lazy;

use crate::urls;

#[derive(Debug, Clone)]
pub struct FunnelSiteInfo {
    pub domain: &'static str,
    pub weight: u16,
    pub segments: &'static [&'static str],
}

const AUTOMOTIVE_SEGMENTS: &[&str] = &["automotive purchase intent by category-none"];

/// Marketplace and research sites for the automotive vertical. Visiting any
/// page on these domains carries a fixed weight.
pub static FUNNEL_SITES: Lazy<Vec<FunnelSiteInfo>> = Lazy::new(|| {
    ["cars.com", "carmax.com", "kbb.com", "edmunds.com", "autotrader.com", "truecar.com"]
        .into_iter()
        .map(|domain| FunnelSiteInfo {
            domain,
            weight: 3,
            segments: AUTOMOTIVE_SEGMENTS,
        })
        .collect()
});

/// Look up the funnel site whose domain matches `url`, if any.
pub fn find_funnel_site(url: &str) -> Option<&'static FunnelSiteInfo> {
    FUNNEL_SITES
        .iter()
        .find(|site| urls::host_matches_domain(url, site.domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_funnel_site_and_subdomains() {
        assert!(find_funnel_site("https://www.carmax.com/cars/all").is_some());
        assert!(find_funnel_site("https://cars.com/").is_some());
        assert!(find_funnel_site("https://example.org/").is_none());
        // Label-boundary matching, not substring matching.
        assert!(find_funnel_site("https://notcarmax.com/").is_none());
    }
}
