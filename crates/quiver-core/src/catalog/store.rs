//! SQLite-backed catalog store.
//!
//! Holds the downloaded creative bundle. Every catalog download replaces the
//! whole bundle inside one transaction; readers see either the old catalog
//! or the new one, never a mix.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AdsResult, StoreError};
use crate::types::{
    AdConversion, Catalog, ConversionType, CreativeAdNotification, CreativePublisherAd,
};
use crate::urls;

const SCHEMA_VERSION: i64 = 5;
const COMPATIBLE_VERSION: i64 = 5;

/// Identity and freshness of the stored catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogInfo {
    pub catalog_id: String,
    pub last_updated_at: DateTime<Utc>,
}

/// SQLite-backed creative bundle.
#[derive(Debug)]
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    /// Open or create the store at the given path, migrating older schemas
    /// forward as needed.
    pub fn new(path: impl AsRef<Path>) -> AdsResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(StoreError::from)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> AdsResult<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> AdsResult<()> {
        let mut conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(StoreError::from)?;

        if let Some(compatible) = get_meta_i64(&conn, "last_compatible_version")? {
            if compatible > SCHEMA_VERSION {
                return Err(StoreError::SchemaIncompatible {
                    on_disk: compatible,
                    supported: SCHEMA_VERSION,
                }
                .into());
            }
        }

        let version = get_meta_i64(&conn, "version")?.unwrap_or(0);
        let tx = conn.transaction().map_err(StoreError::from)?;
        if version == 0 {
            create_schema(&tx)?;
        } else {
            for from in version..SCHEMA_VERSION {
                debug!(from, to = from + 1, "migrating catalog schema");
                migrate(&tx, from)?;
            }
        }
        set_meta(&tx, "version", &SCHEMA_VERSION.to_string())?;
        set_meta(
            &tx,
            "last_compatible_version",
            &COMPATIBLE_VERSION.to_string(),
        )?;
        tx.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// The on-disk schema version. Always the current code version once the
    /// store has opened successfully.
    pub fn schema_version(&self) -> AdsResult<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(get_meta_i64(&conn, "version")?.unwrap_or(0))
    }

    /// Identity and age of the stored catalog, if one has been saved.
    pub fn catalog_info(&self) -> AdsResult<Option<CatalogInfo>> {
        let conn = self.conn.lock().unwrap();
        let Some(catalog_id) = get_meta(&conn, "catalog_id")? else {
            return Ok(None);
        };
        let Some(updated) = get_meta(&conn, "catalog_last_updated_at")? else {
            return Ok(None);
        };
        let last_updated_at = parse_timestamp(&updated)?;
        Ok(Some(CatalogInfo {
            catalog_id,
            last_updated_at,
        }))
    }

    /// Replace the stored bundle with `catalog`. Truncates and repopulates
    /// every table inside a single transaction, then compacts the file on a
    /// best-effort basis.
    pub fn replace_catalog(&self, catalog: &Catalog, now: DateTime<Utc>) -> AdsResult<()> {
        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction().map_err(StoreError::from)?;

            tx.execute_batch(
                "DELETE FROM category;
                 DELETE FROM ad_info;
                 DELETE FROM ad_info_category;
                 DELETE FROM ad_conversions;
                 DELETE FROM publisher_ad_info;
                 DELETE FROM publisher_ad_info_category;",
            )
            .map_err(StoreError::from)?;

            for category in catalog.categories() {
                tx.execute("INSERT INTO category (name) VALUES (?1)", params![category])
                    .map_err(StoreError::from)?;
            }

            for (category, ads) in &catalog.ad_notifications {
                for ad in ads {
                    insert_ad_notification(&tx, category, ad)?;
                }
            }

            for (category, ads) in &catalog.publisher_ads {
                for ad in ads {
                    insert_publisher_ad(&tx, category, ad)?;
                }
            }

            for conversion in &catalog.ad_conversions {
                tx.execute(
                    "INSERT INTO ad_conversions
                     (creative_set_id, conversion_type, url_pattern, observation_window)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        conversion.creative_set_id,
                        conversion.conversion_type.as_str(),
                        conversion.url_pattern,
                        conversion.observation_window,
                    ],
                )
                .map_err(StoreError::from)?;
            }

            set_meta(&tx, "catalog_id", &catalog.catalog_id)?;
            set_meta(&tx, "catalog_last_updated_at", &format_timestamp(now))?;
            tx.commit().map_err(StoreError::from)?;
        }

        // Compaction failure must not fail the replace.
        let conn = self.conn.lock().unwrap();
        if let Err(err) = conn.execute_batch("VACUUM") {
            warn!(%err, "catalog store vacuum failed");
        }
        Ok(())
    }

    /// Active ad notifications in any of `categories`. The active window is
    /// inclusive at both ends.
    pub fn get_ads_for_categories(
        &self,
        categories: &[String],
        now: DateTime<Utc>,
    ) -> AdsResult<Vec<CreativeAdNotification>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = placeholders(categories.len());
        let sql = format!(
            "SELECT ai.uuid, ai.creative_set_id, ai.campaign_id, ai.advertiser_id,
                    ai.title, ai.body, ai.target_url, ai.start_at, ai.end_at,
                    ai.daily_cap, ai.per_day, ai.total_max, ai.region, aic.category_name
             FROM ad_info AS ai
             INNER JOIN ad_info_category AS aic ON aic.ad_info_uuid = ai.uuid
             WHERE aic.category_name IN ({placeholders})
               AND ai.start_at <= ?{n1} AND ?{n2} <= ai.end_at",
            n1 = categories.len() + 1,
            n2 = categories.len() + 2,
        );

        let now_text = format_timestamp(now);
        let bindings: Vec<String> = categories
            .iter()
            .cloned()
            .chain([now_text.clone(), now_text])
            .collect();

        let mut stmt = conn.prepare(&sql).map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params_from_iter(bindings), |row| {
                let region: String = row.get(12)?;
                Ok((
                    CreativeAdNotification {
                        creative_instance_id: row.get(0)?,
                        creative_set_id: row.get(1)?,
                        campaign_id: row.get(2)?,
                        advertiser_id: row.get(3)?,
                        title: row.get(4)?,
                        body: row.get(5)?,
                        target_url: row.get(6)?,
                        start_at: DateTime::UNIX_EPOCH,
                        end_at: DateTime::UNIX_EPOCH,
                        daily_cap: row.get(9)?,
                        per_day: row.get(10)?,
                        total_max: row.get(11)?,
                        category: row.get(13)?,
                        geo_targets: Vec::new(),
                    },
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    region,
                ))
            })
            .map_err(StoreError::from)?;

        let mut ads: Vec<CreativeAdNotification> = Vec::new();
        for row in rows {
            let (mut ad, start, end, region) = row.map_err(StoreError::from)?;
            ad.start_at = parse_timestamp(&start)?;
            ad.end_at = parse_timestamp(&end)?;

            // One row per geo target; merge them back into a single ad.
            match ads.iter_mut().find(|existing| {
                existing.creative_instance_id == ad.creative_instance_id
                    && existing.category == ad.category
            }) {
                Some(existing) => existing.geo_targets.push(region),
                None => {
                    ad.geo_targets.push(region);
                    ads.push(ad);
                }
            }
        }
        Ok(ads)
    }

    /// Active publisher ads for the page at `url`, constrained to the
    /// requested sizes and categories. The channel is the page's
    /// registrable domain.
    pub fn get_publisher_ads(
        &self,
        url: &str,
        categories: &[String],
        sizes: &[String],
        now: DateTime<Utc>,
    ) -> AdsResult<Vec<CreativePublisherAd>> {
        let Some(channel) = urls::registrable_domain(url) else {
            return Ok(Vec::new());
        };
        if categories.is_empty() || sizes.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();
        let category_slots = placeholders(categories.len());
        let size_slots = placeholders_from(categories.len() + 1, sizes.len());
        let base = categories.len() + sizes.len();
        let sql = format!(
            "SELECT pai.creative_instance_id, pai.creative_set_id, pai.campaign_id,
                    pai.advertiser_id, pai.creative_url, pai.target_url, pai.size,
                    pai.start_at, pai.end_at, pai.daily_cap, pai.per_day,
                    pai.total_max, pai.geo_target, pai.channel, paic.category_name
             FROM publisher_ad_info AS pai
             INNER JOIN publisher_ad_info_category AS paic
                ON paic.creative_instance_id = pai.creative_instance_id
             WHERE paic.category_name IN ({category_slots})
               AND pai.size IN ({size_slots})
               AND pai.channel = ?{n1}
               AND pai.start_at <= ?{n2} AND ?{n3} <= pai.end_at",
            n1 = base + 1,
            n2 = base + 2,
            n3 = base + 3,
        );

        let now_text = format_timestamp(now);
        let bindings: Vec<String> = categories
            .iter()
            .chain(sizes.iter())
            .cloned()
            .chain([channel, now_text.clone(), now_text])
            .collect();

        let mut stmt = conn.prepare(&sql).map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params_from_iter(bindings), |row| {
                Ok((
                    CreativePublisherAd {
                        creative_instance_id: row.get(0)?,
                        creative_set_id: row.get(1)?,
                        campaign_id: row.get(2)?,
                        advertiser_id: row.get(3)?,
                        creative_url: row.get(4)?,
                        target_url: row.get(5)?,
                        size: row.get(6)?,
                        start_at: DateTime::UNIX_EPOCH,
                        end_at: DateTime::UNIX_EPOCH,
                        daily_cap: row.get(9)?,
                        per_day: row.get(10)?,
                        total_max: row.get(11)?,
                        category: row.get(14)?,
                        geo_targets: Vec::new(),
                        channels: Vec::new(),
                    },
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(12)?,
                    row.get::<_, String>(13)?,
                ))
            })
            .map_err(StoreError::from)?;

        let mut ads: Vec<CreativePublisherAd> = Vec::new();
        for row in rows {
            let (mut ad, start, end, geo_target, channel) = row.map_err(StoreError::from)?;
            ad.start_at = parse_timestamp(&start)?;
            ad.end_at = parse_timestamp(&end)?;

            match ads.iter_mut().find(|existing| {
                existing.creative_instance_id == ad.creative_instance_id
                    && existing.category == ad.category
            }) {
                Some(existing) => {
                    if !existing.geo_targets.contains(&geo_target) {
                        existing.geo_targets.push(geo_target);
                    }
                    if !existing.channels.contains(&channel) {
                        existing.channels.push(channel);
                    }
                }
                None => {
                    ad.geo_targets.push(geo_target);
                    ad.channels.push(channel);
                    ads.push(ad);
                }
            }
        }
        Ok(ads)
    }

    /// All conversion rules in the stored catalog.
    pub fn get_ad_conversions(&self) -> AdsResult<Vec<AdConversion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT creative_set_id, conversion_type, url_pattern, observation_window
                 FROM ad_conversions",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })
            .map_err(StoreError::from)?;

        let mut conversions = Vec::new();
        for row in rows {
            let (creative_set_id, kind, url_pattern, observation_window) =
                row.map_err(StoreError::from)?;
            let Some(conversion_type) = ConversionType::parse(&kind) else {
                warn!(%kind, "skipping conversion with unknown type");
                continue;
            };
            conversions.push(AdConversion {
                creative_set_id,
                conversion_type,
                url_pattern,
                observation_window,
            });
        }
        Ok(conversions)
    }

    /// Release page cache back to the OS.
    pub fn on_memory_pressure(&self) {
        let conn = self.conn.lock().unwrap();
        if let Err(err) = conn.execute_batch("PRAGMA shrink_memory") {
            warn!(%err, "shrink_memory failed");
        }
    }
}

fn create_schema(conn: &Connection) -> AdsResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ad_info (
            uuid TEXT NOT NULL,
            creative_set_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            advertiser_id TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            target_url TEXT NOT NULL,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            daily_cap INTEGER NOT NULL DEFAULT 0,
            per_day INTEGER NOT NULL DEFAULT 0,
            total_max INTEGER NOT NULL DEFAULT 0,
            region TEXT NOT NULL,
            PRIMARY KEY (region, uuid)
        );

        CREATE TABLE IF NOT EXISTS ad_info_category (
            ad_info_uuid TEXT NOT NULL,
            category_name TEXT NOT NULL,
            UNIQUE (ad_info_uuid, category_name)
        );
        CREATE INDEX IF NOT EXISTS idx_ad_info_category_name
            ON ad_info_category (category_name);

        CREATE TABLE IF NOT EXISTS ad_conversions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creative_set_id TEXT NOT NULL,
            conversion_type TEXT NOT NULL,
            url_pattern TEXT NOT NULL,
            observation_window INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS publisher_ad_info (
            creative_instance_id TEXT NOT NULL,
            creative_set_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            advertiser_id TEXT NOT NULL,
            creative_url TEXT NOT NULL,
            target_url TEXT NOT NULL,
            size TEXT NOT NULL,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            daily_cap INTEGER NOT NULL DEFAULT 0,
            per_day INTEGER NOT NULL DEFAULT 0,
            total_max INTEGER NOT NULL DEFAULT 0,
            geo_target TEXT NOT NULL,
            channel TEXT NOT NULL,
            PRIMARY KEY (creative_instance_id, geo_target, channel)
        );

        CREATE TABLE IF NOT EXISTS publisher_ad_info_category (
            creative_instance_id TEXT NOT NULL,
            category_name TEXT NOT NULL,
            UNIQUE (creative_instance_id, category_name)
        );
        CREATE INDEX IF NOT EXISTS idx_publisher_ad_info_category_name
            ON publisher_ad_info_category (category_name);",
    )
    .map_err(StoreError::from)?;
    Ok(())
}

fn migrate(conn: &Connection, from: i64) -> AdsResult<()> {
    match from {
        1 => conn
            .execute_batch(
                "ALTER TABLE ad_info ADD COLUMN campaign_id TEXT NOT NULL DEFAULT '';
                 ALTER TABLE ad_info ADD COLUMN daily_cap INTEGER NOT NULL DEFAULT 0;
                 ALTER TABLE ad_info ADD COLUMN per_day INTEGER NOT NULL DEFAULT 0;
                 ALTER TABLE ad_info ADD COLUMN total_max INTEGER NOT NULL DEFAULT 0;",
            )
            .map_err(StoreError::from)?,
        2 => conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ad_conversions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    creative_set_id TEXT NOT NULL,
                    conversion_type TEXT NOT NULL,
                    url_pattern TEXT NOT NULL,
                    observation_window INTEGER NOT NULL
                );",
            )
            .map_err(StoreError::from)?,
        3 => conn
            .execute_batch(
                "ALTER TABLE ad_info ADD COLUMN advertiser_id TEXT NOT NULL DEFAULT '';",
            )
            .map_err(StoreError::from)?,
        4 => conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS publisher_ad_info (
                    creative_instance_id TEXT NOT NULL,
                    creative_set_id TEXT NOT NULL,
                    campaign_id TEXT NOT NULL,
                    advertiser_id TEXT NOT NULL,
                    creative_url TEXT NOT NULL,
                    target_url TEXT NOT NULL,
                    size TEXT NOT NULL,
                    start_at TEXT NOT NULL,
                    end_at TEXT NOT NULL,
                    daily_cap INTEGER NOT NULL DEFAULT 0,
                    per_day INTEGER NOT NULL DEFAULT 0,
                    total_max INTEGER NOT NULL DEFAULT 0,
                    geo_target TEXT NOT NULL,
                    channel TEXT NOT NULL,
                    PRIMARY KEY (creative_instance_id, geo_target, channel)
                );
                CREATE TABLE IF NOT EXISTS publisher_ad_info_category (
                    creative_instance_id TEXT NOT NULL,
                    category_name TEXT NOT NULL,
                    UNIQUE (creative_instance_id, category_name)
                );
                CREATE INDEX IF NOT EXISTS idx_publisher_ad_info_category_name
                    ON publisher_ad_info_category (category_name);",
            )
            .map_err(StoreError::from)?,
        _ => {
            return Err(
                StoreError::database(format!("no migration from schema version {from}")).into(),
            )
        }
    }
    Ok(())
}

fn insert_ad_notification(
    conn: &Connection,
    category: &str,
    ad: &CreativeAdNotification,
) -> AdsResult<()> {
    let regions: &[String] = if ad.geo_targets.is_empty() {
        &[] // geo-less ads get no ad_info rows; the category link below is still written
    } else {
        &ad.geo_targets
    };

    for region in regions {
        conn.execute(
            "INSERT OR REPLACE INTO ad_info
             (uuid, creative_set_id, campaign_id, advertiser_id, title, body,
              target_url, start_at, end_at, daily_cap, per_day, total_max, region)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                ad.creative_instance_id,
                ad.creative_set_id,
                ad.campaign_id,
                ad.advertiser_id,
                ad.title,
                ad.body,
                ad.target_url,
                format_timestamp(ad.start_at),
                format_timestamp(ad.end_at),
                ad.daily_cap,
                ad.per_day,
                ad.total_max,
                region,
            ],
        )
        .map_err(StoreError::from)?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO ad_info_category (ad_info_uuid, category_name)
         VALUES (?1, ?2)",
        params![ad.creative_instance_id, category],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

fn insert_publisher_ad(
    conn: &Connection,
    category: &str,
    ad: &CreativePublisherAd,
) -> AdsResult<()> {
    for geo_target in &ad.geo_targets {
        for channel in &ad.channels {
            conn.execute(
                "INSERT OR REPLACE INTO publisher_ad_info
                 (creative_instance_id, creative_set_id, campaign_id, advertiser_id,
                  creative_url, target_url, size, start_at, end_at, daily_cap,
                  per_day, total_max, geo_target, channel)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    ad.creative_instance_id,
                    ad.creative_set_id,
                    ad.campaign_id,
                    ad.advertiser_id,
                    ad.creative_url,
                    ad.target_url,
                    ad.size,
                    format_timestamp(ad.start_at),
                    format_timestamp(ad.end_at),
                    ad.daily_cap,
                    ad.per_day,
                    ad.total_max,
                    geo_target,
                    channel,
                ],
            )
            .map_err(StoreError::from)?;
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO publisher_ad_info_category
         (creative_instance_id, category_name) VALUES (?1, ?2)",
        params![ad.creative_instance_id, category],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> AdsResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|err| StoreError::from(err).into())
}

fn get_meta_i64(conn: &Connection, key: &str) -> AdsResult<Option<i64>> {
    match get_meta(conn, key)? {
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::database(format!("meta key {key} is not an integer")).into()),
        None => Ok(None),
    }
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> AdsResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

/// Stored timestamps are RFC 3339 in UTC so string comparison orders them.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(text: &str) -> AdsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::database(format!("bad stored timestamp {text}: {err}")).into())
}

fn placeholders(count: usize) -> String {
    placeholders_from(1, count)
}

fn placeholders_from(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdsError;
    use chrono::Duration;

    fn active_ad(instance: &str, now: DateTime<Utc>) -> CreativeAdNotification {
        CreativeAdNotification {
            creative_instance_id: instance.to_string(),
            creative_set_id: format!("{instance}-set"),
            campaign_id: format!("{instance}-campaign"),
            advertiser_id: format!("{instance}-advertiser"),
            title: "title".to_string(),
            body: "body".to_string(),
            target_url: "https://example.com".to_string(),
            start_at: now - Duration::days(1),
            end_at: now + Duration::days(1),
            daily_cap: 5,
            per_day: 5,
            total_max: 50,
            category: "tech".to_string(),
            geo_targets: vec!["US".to_string()],
        }
    }

    fn catalog_with_tech_ad(now: DateTime<Utc>) -> Catalog {
        let mut catalog = Catalog {
            catalog_id: "catalog-1".to_string(),
            ..Default::default()
        };
        catalog
            .ad_notifications
            .insert("tech".to_string(), vec![active_ad("i1", now)]);
        catalog
    }

    #[test]
    fn test_replace_and_query_by_category() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();
        store.replace_catalog(&catalog_with_tech_ad(now), now).unwrap();

        let ads = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].creative_instance_id, "i1");
        assert_eq!(ads[0].category, "tech");
        assert_eq!(ads[0].geo_targets, vec!["US".to_string()]);

        let none = store
            .get_ads_for_categories(&["travel".to_string()], now)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_active_window_is_inclusive() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();

        let mut catalog = Catalog {
            catalog_id: "catalog-1".to_string(),
            ..Default::default()
        };
        let mut ad = active_ad("i1", now);
        ad.start_at = now;
        ad.end_at = now;
        catalog.ad_notifications.insert("tech".to_string(), vec![ad]);
        store.replace_catalog(&catalog, now).unwrap();

        // Timestamps are stored at second precision.
        let now = parse_timestamp(&format_timestamp(now)).unwrap();
        let ads = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();
        assert_eq!(ads.len(), 1);

        let later = store
            .get_ads_for_categories(&["tech".to_string()], now + Duration::seconds(1))
            .unwrap();
        assert!(later.is_empty());
    }

    #[test]
    fn test_double_replace_is_idempotent() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();
        let catalog = catalog_with_tech_ad(now);

        store.replace_catalog(&catalog, now).unwrap();
        let first = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();

        store.replace_catalog(&catalog, now).unwrap();
        let second = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_replace_discards_previous_catalog() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();
        store.replace_catalog(&catalog_with_tech_ad(now), now).unwrap();

        let mut replacement = Catalog {
            catalog_id: "catalog-2".to_string(),
            ..Default::default()
        };
        replacement
            .ad_notifications
            .insert("travel".to_string(), vec![{
                let mut ad = active_ad("i2", now);
                ad.category = "travel".to_string();
                ad
            }]);
        store.replace_catalog(&replacement, now).unwrap();

        assert!(store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap()
            .is_empty());
        let info = store.catalog_info().unwrap().unwrap();
        assert_eq!(info.catalog_id, "catalog-2");
    }

    #[test]
    fn test_geo_targets_merge_back_into_one_ad() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();

        let mut catalog = Catalog {
            catalog_id: "catalog-1".to_string(),
            ..Default::default()
        };
        let mut ad = active_ad("i1", now);
        ad.geo_targets = vec!["US".to_string(), "GB".to_string()];
        catalog.ad_notifications.insert("tech".to_string(), vec![ad]);
        store.replace_catalog(&catalog, now).unwrap();

        let ads = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].geo_targets.len(), 2);
    }

    #[test]
    fn test_publisher_ads_filter_by_channel_and_size() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();

        let mut catalog = Catalog {
            catalog_id: "catalog-1".to_string(),
            ..Default::default()
        };
        catalog.publisher_ads.insert(
            "tech".to_string(),
            vec![CreativePublisherAd {
                creative_instance_id: "p1".to_string(),
                creative_set_id: "p1-set".to_string(),
                campaign_id: "p1-campaign".to_string(),
                advertiser_id: "p1-advertiser".to_string(),
                creative_url: "https://cdn.example.com/p1.png".to_string(),
                target_url: "https://example.com".to_string(),
                size: "300x250".to_string(),
                start_at: now - Duration::days(1),
                end_at: now + Duration::days(1),
                daily_cap: 5,
                per_day: 5,
                total_max: 50,
                category: "tech".to_string(),
                geo_targets: vec!["US".to_string()],
                channels: vec!["news.example".to_string()],
            }],
        );
        store.replace_catalog(&catalog, now).unwrap();

        let hits = store
            .get_publisher_ads(
                "https://www.news.example/story",
                &["tech".to_string()],
                &["300x250".to_string()],
                now,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].creative_instance_id, "p1");

        let wrong_size = store
            .get_publisher_ads(
                "https://www.news.example/story",
                &["tech".to_string()],
                &["728x90".to_string()],
                now,
            )
            .unwrap();
        assert!(wrong_size.is_empty());

        let wrong_channel = store
            .get_publisher_ads(
                "https://other.example/story",
                &["tech".to_string()],
                &["300x250".to_string()],
                now,
            )
            .unwrap();
        assert!(wrong_channel.is_empty());
    }

    #[test]
    fn test_conversions_roundtrip() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();

        let mut catalog = catalog_with_tech_ad(now);
        catalog.ad_conversions.push(AdConversion {
            creative_set_id: "i1-set".to_string(),
            conversion_type: ConversionType::PostView,
            url_pattern: "https://example.com/checkout/*".to_string(),
            observation_window: 30,
        });
        store.replace_catalog(&catalog, now).unwrap();

        let conversions = store.get_ad_conversions().unwrap();
        assert_eq!(conversions.len(), 1);
        assert_eq!(conversions[0].conversion_type, ConversionType::PostView);
        assert_eq!(conversions[0].observation_window, 30);
    }

    #[test]
    fn test_catalog_persists_across_reopen() {
        let now = Utc::now();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        {
            let store = CatalogStore::new(&path).unwrap();
            store.replace_catalog(&catalog_with_tech_ad(now), now).unwrap();
        }

        let store = CatalogStore::new(&path).unwrap();
        let ads = store
            .get_ads_for_categories(&["tech".to_string()], now)
            .unwrap();
        assert_eq!(ads.len(), 1);
        let info = store.catalog_info().unwrap().unwrap();
        assert_eq!(info.catalog_id, "catalog-1");
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_on_disk_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                 INSERT INTO meta VALUES ('version', '99');
                 INSERT INTO meta VALUES ('last_compatible_version', '99');",
            )
            .unwrap();
        }

        let err = CatalogStore::new(&path).unwrap_err();
        match err {
            AdsError::Store(StoreError::SchemaIncompatible { on_disk, supported }) => {
                assert_eq!(on_disk, 99);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_category_list_yields_no_ads() {
        let now = Utc::now();
        let store = CatalogStore::in_memory().unwrap();
        store.replace_catalog(&catalog_with_tech_ad(now), now).unwrap();
        assert!(store.get_ads_for_categories(&[], now).unwrap().is_empty());
    }
}
