//! Purchase-intent classification: signal extraction, segment history and
//! winning-category selection.

pub mod classifier;
pub mod funnel_sites;
pub mod keywords;
pub mod search_providers;
pub mod signal;

pub use classifier::Classifier;
pub use signal::{PurchaseIntentSignal, SegmentHistoryMap, SignalRecord};
