//! Purchase-intent signal types and the per-segment history map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single extracted purchase-intent signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseIntentSignal {
    pub at: DateTime<Utc>,
    pub segments: Vec<String>,
    /// Funnel weight; 0 when nothing matched.
    pub weight: u16,
}

impl PurchaseIntentSignal {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One historical signal observation for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub at: DateTime<Utc>,
    pub weight: u16,
}

/// Per-segment signal history that preserves the order segments were first
/// encountered. Winning-category tie-breaks depend on this order, so a
/// hash map will not do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentHistoryMap {
    entries: Vec<(String, Vec<SignalRecord>)>,
}

impl SegmentHistoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to a segment's history, creating the segment at the
    /// end of the iteration order if it is new.
    pub fn append(&mut self, segment: &str, record: SignalRecord) {
        match self.entries.iter_mut().find(|(name, _)| name == segment) {
            Some((_, records)) => records.push(record),
            None => self.entries.push((segment.to_string(), vec![record])),
        }
    }

    pub fn get(&self, segment: &str) -> Option<&[SignalRecord]> {
        self.entries
            .iter()
            .find(|(name, _)| name == segment)
            .map(|(_, records)| records.as_slice())
    }

    /// Segments in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SignalRecord])> {
        self.entries
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop records older than `cutoff` and segments left empty by that.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        for (_, records) in &mut self.entries {
            records.retain(|record| record.at >= cutoff);
        }
        self.entries.retain(|(_, records)| !records.is_empty());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
