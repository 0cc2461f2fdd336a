//! The downloaded catalog, as handed to `CatalogStore::replace_catalog`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AdConversion, CreativeAdNotification, CreativePublisherAd};

/// A full catalog snapshot. Replaced wholesale on every download; the store
/// never merges two catalogs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub catalog_id: String,
    /// Ad notifications grouped by category.
    pub ad_notifications: BTreeMap<String, Vec<CreativeAdNotification>>,
    /// Publisher ads grouped by category.
    pub publisher_ads: BTreeMap<String, Vec<CreativePublisherAd>>,
    pub ad_conversions: Vec<AdConversion>,
}

impl Catalog {
    /// All category names present in this catalog, deduplicated.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .ad_notifications
            .keys()
            .chain(self.publisher_ads.keys())
            .cloned()
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn is_empty(&self) -> bool {
        self.ad_notifications.values().all(Vec::is_empty)
            && self.publisher_ads.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_deduplicated() {
        let mut catalog = Catalog {
            catalog_id: "catalog-1".to_string(),
            ..Default::default()
        };
        catalog
            .ad_notifications
            .insert("tech".to_string(), vec![CreativeAdNotification::default()]);
        catalog
            .publisher_ads
            .insert("tech".to_string(), vec![CreativePublisherAd::default()]);
        catalog
            .publisher_ads
            .insert("travel".to_string(), vec![]);

        assert_eq!(catalog.categories(), vec!["tech", "travel"]);
        assert!(!catalog.is_empty());
    }
}
