pub mod index;

use serde::Serialize;
use tracing::debug;

use crate::event::Event;

use index::{first_at_or_after, index_of};

/// Cached event stream of one device.
///
/// `events` is non-decreasing in `epoch_ms` after every merge. Data only ever
/// grows at the tail: a merge first drops the stale suffix at or after its
/// start boundary, then appends what was fetched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DeviceLog {
    events: Vec<Event>,
    /// highest epoch ever merged, 0 before the first non-empty merge
    max_loaded_epoch: i64,
    /// cumulative response bytes received for this device
    fetched_bytes: u64,
}

/// What one merge did to a [`DeviceLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub effective_start: i64,
    /// stale entries removed from the tail before appending
    pub truncated: usize,
    pub appended: usize,
    /// fetched entries dated before `effective_start`, not appended
    pub discarded: usize,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub event_count: usize,
    pub min_epoch_ms: Option<i64>,
    pub max_loaded_epoch: i64,
    pub fetched_bytes: u64,
}

impl DeviceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn max_loaded_epoch(&self) -> i64 {
        self.max_loaded_epoch
    }

    pub fn fetched_bytes(&self) -> u64 {
        self.fetched_bytes
    }

    pub fn min_epoch(&self) -> Option<i64> {
        self.events.first().map(|e| e.epoch_ms)
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            event_count: self.events.len(),
            min_epoch_ms: self.min_epoch(),
            max_loaded_epoch: self.max_loaded_epoch,
            fetched_bytes: self.fetched_bytes,
        }
    }

    /// Where the next fetch for `[requested_start, ..]` has to begin.
    ///
    /// Once anything has been loaded this is `max_loaded_epoch`, so a request
    /// for a window before the loaded data only appends what is new.
    pub fn effective_start(&self, requested_start: i64) -> i64 {
        if self.max_loaded_epoch == 0 {
            requested_start
        } else {
            self.max_loaded_epoch
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop trailing entries with `epoch_ms >= from`. Returns how many were removed.
    pub fn truncate_from(&mut self, from: i64) -> usize {
        let keep = first_at_or_after(&self.events, from);
        let removed = self.events.len() - keep;
        self.events.truncate(keep);
        removed
    }

    /// Truncate the stale suffix then append a fetched batch.
    ///
    /// `fetched` is expected in ascending order; entries dated before
    /// `effective_start` would break ordering and are skipped.
    pub fn merge(
        &mut self,
        effective_start: i64,
        fetched: Vec<Event>,
        byte_len: u64,
    ) -> MergeReport {
        let truncated = self.truncate_from(effective_start);

        let (mut appended, mut discarded) = (0, 0);
        self.events.reserve(fetched.len());
        for event in fetched {
            if event.epoch_ms < effective_start {
                discarded += 1;
                continue;
            }
            if let Some(last) = self.events.last() {
                if event.epoch_ms < last.epoch_ms {
                    discarded += 1;
                    continue;
                }
            }
            self.max_loaded_epoch = self.max_loaded_epoch.max(event.epoch_ms);
            self.events.push(event);
            appended += 1;
        }
        self.fetched_bytes += byte_len;

        if discarded > 0 {
            debug!(discarded, effective_start, "skipped out-of-order fetched events");
        }

        MergeReport {
            effective_start,
            truncated,
            appended,
            discarded,
            byte_len,
        }
    }

    /// Events with `start <= epoch_ms <= end`, ascending.
    pub fn scan(&self, start: i64, end: i64) -> std::slice::Iter<'_, Event> {
        let from = first_at_or_after(&self.events, start);
        let to = match index_of(&self.events, end) {
            Some(i) if i >= from => i + 1,
            _ => return self.events[..0].iter(),
        };
        self.events[from..to].iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::ParsedEvent;

    fn raw_events(epochs: &[i64]) -> Vec<Event> {
        epochs.iter().map(|t| Event::raw(*t, format!("line {t}"))).collect()
    }

    fn epochs(log: &DeviceLog) -> Vec<i64> {
        log.events().iter().map(|e| e.epoch_ms).collect()
    }

    #[test]
    fn fresh_log() {
        let log = DeviceLog::new();
        assert!(log.is_empty());
        assert_eq!(log.max_loaded_epoch(), 0);
        assert_eq!(log.fetched_bytes(), 0);
        assert_eq!(log.effective_start(500), 500);
        assert_eq!(log.scan(0, i64::MAX).count(), 0);
    }

    #[test]
    fn merge_appends_and_tracks_bookkeeping() {
        let mut log = DeviceLog::new();
        let report = log.merge(100, raw_events(&[100, 150, 200]), 64);
        assert_eq!(report.appended, 3);
        assert_eq!(report.truncated, 0);
        assert_eq!(log.max_loaded_epoch(), 200);
        assert_eq!(log.fetched_bytes(), 64);
        assert_eq!(log.effective_start(0), 200);
        assert_eq!(log.min_epoch(), Some(100));
    }

    #[test]
    fn merge_replaces_stale_suffix() {
        let mut log = DeviceLog::new();
        log.merge(100, raw_events(&[100, 150, 200]), 10);

        // the 200 entry came from a partial load and is superseded
        let mut fresh = raw_events(&[200, 250]);
        fresh[0].raw_text = Some("complete".into());
        let report = log.merge(200, fresh, 20);

        assert_eq!(report.truncated, 1);
        assert_eq!(report.appended, 2);
        assert_eq!(epochs(&log), vec![100, 150, 200, 250]);
        assert_eq!(log.events()[2].raw_text.as_deref(), Some("complete"));
        assert_eq!(log.fetched_bytes(), 30);
    }

    #[test]
    fn merge_skips_entries_before_boundary() {
        let mut log = DeviceLog::new();
        log.merge(100, raw_events(&[100, 200]), 0);
        let report = log.merge(200, raw_events(&[150, 200, 300]), 0);
        assert_eq!(report.discarded, 1);
        assert_eq!(epochs(&log), vec![100, 200, 300]);
    }

    #[test]
    fn empty_merge_keeps_max() {
        let mut log = DeviceLog::new();
        log.merge(100, raw_events(&[100, 200]), 5);
        let report = log.merge(200, Vec::new(), 2);
        // the 200 entry was truncated and nothing replaced it
        assert_eq!(report.truncated, 1);
        assert_eq!(epochs(&log), vec![100]);
        assert_eq!(log.max_loaded_epoch(), 200);
        assert_eq!(log.fetched_bytes(), 7);
    }

    #[test]
    fn reset_clears_everything() {
        let mut log = DeviceLog::new();
        log.merge(1, raw_events(&[1, 2, 3]), 99);
        log.reset();
        assert_eq!(log, DeviceLog::new());
    }

    #[test]
    fn scan_is_inclusive_on_both_ends() {
        let mut log = DeviceLog::new();
        log.merge(100, raw_events(&[100, 200, 300, 400]), 0);

        let got: Vec<i64> = log.scan(200, 300).map(|e| e.epoch_ms).collect();
        assert_eq!(got, vec![200, 300]);

        let got: Vec<i64> = log.scan(150, 350).map(|e| e.epoch_ms).collect();
        assert_eq!(got, vec![200, 300]);

        let got: Vec<i64> = log.scan(0, 1_000).map(|e| e.epoch_ms).collect();
        assert_eq!(got, vec![100, 200, 300, 400]);
    }

    #[test]
    fn scan_empty_ranges() {
        let mut log = DeviceLog::new();
        log.merge(100, raw_events(&[100, 200, 300]), 0);

        assert_eq!(log.scan(201, 299).count(), 0);
        assert_eq!(log.scan(0, 99).count(), 0);
        assert_eq!(log.scan(301, 400).count(), 0);
        assert_eq!(log.scan(300, 100).count(), 0);
    }

    #[test]
    fn scan_includes_duplicates_on_start() {
        let mut log = DeviceLog::new();
        log.merge(
            100,
            vec![
                Event::raw(100, "a"),
                Event::parsed(100, ParsedEvent::default()),
                Event::raw(200, "c"),
            ],
            0,
        );
        assert_eq!(log.scan(100, 100).count(), 2);
    }

    #[test]
    fn scan_is_restartable() {
        let mut log = DeviceLog::new();
        log.merge(1, raw_events(&[1, 2, 3]), 0);
        let it = log.scan(1, 3);
        assert_eq!(it.clone().count(), 3);
        assert_eq!(it.count(), 3);
    }
}
