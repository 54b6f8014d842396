// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deduplicating review accumulator.

use crate::types::ReviewRecord;
use std::collections::HashSet;

/// Reviews keyed by `review_id`, kept in first-discovery order.
///
/// A second record with an already seen id is dropped, so re-counting the
/// same node across loader passes can never produce duplicates.
#[derive(Debug, Default)]
pub struct ReviewSet {
    records: Vec<ReviewRecord>,
    seen: HashSet<String>,
}

impl ReviewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, record: ReviewRecord) -> bool {
        if self.seen.contains(&record.review_id) {
            return false;
        }
        self.seen.insert(record.review_id.clone());
        self.records.push(record);
        true
    }

    /// Insert every record; returns how many were new.
    pub fn extend<I: IntoIterator<Item = ReviewRecord>>(&mut self, records: I) -> usize {
        let mut added = 0;
        for record in records {
            if self.insert(record) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, review_id: &str) -> bool {
        self.seen.contains(review_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep the first `n` records in discovery order.
    pub fn truncate(&mut self, n: usize) {
        for dropped in self.records.drain(n.min(self.records.len())..) {
            self.seen.remove(&dropped.review_id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReviewRecord> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<ReviewRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str) -> ReviewRecord {
        ReviewRecord {
            review_id: id.to_string(),
            author: None,
            rating: Some(4),
            date_text: None,
            text: text.to_string(),
            place_ref: "1".to_string(),
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut set = ReviewSet::new();
        assert!(set.insert(record("a", "first")));
        assert!(!set.insert(record("a", "second")));
        assert!(set.insert(record("b", "x")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().text, "first");
    }

    #[test]
    fn test_repeated_passes_never_duplicate() {
        let mut set = ReviewSet::new();
        let pass: Vec<_> = (0..20).map(|i| record(&format!("r{i}"), "t")).collect();
        assert_eq!(set.extend(pass.clone()), 20);
        assert_eq!(set.extend(pass[5..15].to_vec()), 0);
        let mut more = pass.clone();
        more.push(record("r20", "t"));
        assert_eq!(set.extend(more), 1);

        let ids: HashSet<_> = set.iter().map(|r| r.review_id.clone()).collect();
        assert_eq!(ids.len(), set.len());
        assert_eq!(set.len(), 21);
    }

    #[test]
    fn test_truncate_keeps_discovery_order() {
        let mut set = ReviewSet::new();
        set.extend(["c", "a", "b"].map(|id| record(id, "")));
        set.truncate(2);
        let ids: Vec<_> = set.iter().map(|r| r.review_id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert!(!set.contains("b"));
        set.truncate(10);
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }
}
