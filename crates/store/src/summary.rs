//! Current level and recent change, from stored readings.
//!
//! Single readings jitter by a centimetre or two, so each point in time is
//! represented by the most frequent height among the ten newest readings at
//! or before it.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::sqlite::{ReadingStore, StoredLevel};

/// Readings considered for each point in time.
pub const SUMMARY_WINDOW: usize = 10;

/// Snapshot of the stored level history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSummary {
    /// Representative current height
    pub height: f64,
    /// Percentage recorded with that height
    pub percentage: i32,
    /// Percentage points gained since 24 hours ago
    pub percentage_change_24h: Option<i32>,
    /// Height gained since 3 hours ago, 2 decimal places
    pub height_change_3h: Option<f64>,
}

/// Most frequent value; ties go to the value seen first.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for value in values {
        match counts.iter().position(|(seen, _)| seen == value) {
            Some(index) => counts[index].1 += 1,
            None => counts.push((*value, 1)),
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

fn representative(levels: &[StoredLevel]) -> Option<StoredLevel> {
    let heights: Vec<f64> = levels.iter().map(|level| level.height).collect();
    let height = mode(&heights)?;
    levels.iter().find(|level| level.height == height).copied()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl ReadingStore {
    /// Summarize stored readings as of `now`. `None` when nothing is stored.
    pub fn summarize(&self, now: DateTime<Utc>) -> Result<Option<LevelSummary>> {
        let current = match representative(&self.latest_levels(SUMMARY_WINDOW)?) {
            Some(level) => level,
            None => return Ok(None),
        };

        let day_ago = representative(
            &self.levels_at_or_before(&(now - Duration::hours(24)), SUMMARY_WINDOW)?,
        );
        let three_hours_ago = representative(
            &self.levels_at_or_before(&(now - Duration::hours(3)), SUMMARY_WINDOW)?,
        );

        Ok(Some(LevelSummary {
            height: current.height,
            percentage: current.percentage,
            percentage_change_24h: day_ago.map(|past| current.percentage - past.percentage),
            height_change_3h: three_hours_ago.map(|past| round2(current.height - past.height)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hydrosonde_core::LevelResult;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()
    }

    fn insert(store: &ReadingStore, height: f64, percentage: i32, hours_ago: i64, seq: i64) {
        store
            .insert(&LevelResult {
                height,
                percentage,
                timestamp: now() - Duration::hours(hours_ago) - Duration::seconds(seq),
            })
            .unwrap();
    }

    #[test]
    fn test_mode() {
        assert_eq!(mode(&[]), None);
        assert_eq!(mode(&[0.3]), Some(0.3));
        assert_eq!(mode(&[0.3, 0.31, 0.31, 0.3, 0.31]), Some(0.31));
    }

    #[test]
    fn test_mode_tie_prefers_first() {
        assert_eq!(mode(&[0.42, 0.41, 0.41, 0.42]), Some(0.42));
    }

    #[test]
    fn test_empty_store_has_no_summary() {
        let store = ReadingStore::open_in_memory().unwrap();
        assert!(store.summarize(now()).unwrap().is_none());
    }

    #[test]
    fn test_summary_without_history() {
        let store = ReadingStore::open_in_memory().unwrap();
        insert(&store, 0.30, 58, 0, 1);
        insert(&store, 0.31, 60, 0, 2);
        insert(&store, 0.30, 58, 0, 3);

        let summary = store.summarize(now()).unwrap().unwrap();

        assert_eq!(summary.height, 0.30);
        assert_eq!(summary.percentage, 58);
        assert_eq!(summary.percentage_change_24h, None);
        assert_eq!(summary.height_change_3h, None);
    }

    #[test]
    fn test_summary_changes() {
        let store = ReadingStore::open_in_memory().unwrap();
        for seq in 0..5 {
            insert(&store, 0.20, 38, 25, seq);
            insert(&store, 0.25, 48, 4, seq);
            insert(&store, 0.31, 60, 0, seq);
        }
        // a single outlier does not move the representative value
        insert(&store, 0.45, 87, 0, 10);

        let summary = store.summarize(now()).unwrap().unwrap();

        assert_eq!(summary.height, 0.31);
        assert_eq!(summary.percentage, 60);
        assert_eq!(summary.percentage_change_24h, Some(22));
        assert_eq!(summary.height_change_3h, Some(0.06));
    }
}
