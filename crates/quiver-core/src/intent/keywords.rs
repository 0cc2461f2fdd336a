//! Static keyword tables for purchase-intent classification.
//!
//! Two tables, both matched with a subset test against the tokenized search
//! query: segment keywords name what the user is shopping for, funnel
//! keywords grade how far down the purchase funnel the query sits. First
//! matching entry wins, so more specific funnel entries come first.

use once_cell::sync::Lazy;

/// Keywords that map a query onto taxonomy segments.
#[derive(Debug, Clone)]
pub struct SegmentKeywordInfo {
    pub keywords: &'static str,
    pub segments: &'static [&'static str],
}

/// Keywords that grade purchase-funnel depth.
#[derive(Debug, Clone)]
pub struct FunnelKeywordInfo {
    pub keywords: &'static str,
    pub weight: u16,
}

const MAKE_AUDI: &str = "automotive purchase intent by make-audi";
const MAKE_BMW: &str = "automotive purchase intent by make-bmw";
const MAKE_MERCEDES: &str = "automotive purchase intent by make-mercedes benz";
const MAKE_FORD: &str = "automotive purchase intent by make-ford";
const MAKE_TOYOTA: &str = "automotive purchase intent by make-toyota";
const CATEGORY_ENTRY_LUXURY: &str =
    "automotive purchase intent by category-entry luxury car";
const CATEGORY_MID_LUXURY: &str =
    "automotive purchase intent by category-mid luxury car";
const CATEGORY_SUV: &str = "automotive purchase intent by category-suv";
const CATEGORY_PICKUP: &str = "automotive purchase intent by category-pickup truck";

/// Reference automotive segment taxonomy.
pub static SEGMENT_KEYWORDS: Lazy<Vec<SegmentKeywordInfo>> = Lazy::new(|| {
    vec![
        SegmentKeywordInfo {
            keywords: "audi a4",
            segments: &[MAKE_AUDI, CATEGORY_ENTRY_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "audi a5",
            segments: &[MAKE_AUDI, CATEGORY_ENTRY_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "audi a6",
            segments: &[MAKE_AUDI, CATEGORY_MID_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "audi q5",
            segments: &[MAKE_AUDI, CATEGORY_SUV],
        },
        SegmentKeywordInfo {
            keywords: "bmw 3 series",
            segments: &[MAKE_BMW, CATEGORY_ENTRY_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "bmw 5 series",
            segments: &[MAKE_BMW, CATEGORY_MID_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "bmw x5",
            segments: &[MAKE_BMW, CATEGORY_SUV],
        },
        SegmentKeywordInfo {
            keywords: "mercedes c class",
            segments: &[MAKE_MERCEDES, CATEGORY_ENTRY_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "mercedes e class",
            segments: &[MAKE_MERCEDES, CATEGORY_MID_LUXURY],
        },
        SegmentKeywordInfo {
            keywords: "ford f 150",
            segments: &[MAKE_FORD, CATEGORY_PICKUP],
        },
        SegmentKeywordInfo {
            keywords: "toyota rav4",
            segments: &[MAKE_TOYOTA, CATEGORY_SUV],
        },
    ]
});

/// Funnel depth grading. Multi-word, more specific entries precede the
/// generic single-word ones because the first subset match wins.
pub static FUNNEL_KEYWORDS: Lazy<Vec<FunnelKeywordInfo>> = Lazy::new(|| {
    vec![
        FunnelKeywordInfo {
            keywords: "dealer reviews",
            weight: 3,
        },
        FunnelKeywordInfo {
            keywords: "dealership reviews",
            weight: 3,
        },
        FunnelKeywordInfo {
            keywords: "test drive",
            weight: 3,
        },
        FunnelKeywordInfo {
            keywords: "for sale",
            weight: 3,
        },
        FunnelKeywordInfo {
            keywords: "review",
            weight: 2,
        },
        FunnelKeywordInfo {
            keywords: "price",
            weight: 2,
        },
        FunnelKeywordInfo {
            keywords: "specs",
            weight: 2,
        },
        FunnelKeywordInfo {
            keywords: "dealer",
            weight: 2,
        },
    ]
});

/// Weight used when the query matched segment keywords but no funnel entry.
pub const DEFAULT_FUNNEL_WEIGHT: u16 = 1;
