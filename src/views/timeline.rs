//! Downsampled presence / config-change timeline.
//!
//! The requested range is cut into fixed-width buckets, each reporting whether
//! any event landed in it and whether the program or device config changed
//! there. "No data" is `NaN` rather than `0`, so renderers can tell a gap from
//! a quiet bucket.

use serde::{ser::SerializeTuple, Serialize, Serializer};

use crate::{error::QueryError, event::ParsedEvent, store::DeviceLog};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Upper bound on buckets per timeline, a bit over two years at 5 min.
pub const MAX_TIMELINE_BUCKETS: usize = 250_000;

/// Bucket width picked from the length of the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    TenSeconds,
    Minute,
    FiveMinutes,
}

impl Resolution {
    pub fn for_span(span_ms: i64) -> Self {
        if span_ms <= 8 * HOUR_MS {
            Self::TenSeconds
        } else if span_ms <= 2 * DAY_MS {
            Self::Minute
        } else {
            Self::FiveMinutes
        }
    }

    pub fn width_ms(self) -> i64 {
        match self {
            Self::TenSeconds => 10 * SECOND_MS,
            Self::Minute => MINUTE_MS,
            Self::FiveMinutes => 5 * MINUTE_MS,
        }
    }
}

/// `[epoch_ms, present, changed]`, where the flags are `1.0` or `NaN`.
///
/// Serializes as a 3-element array; JSON has no `NaN`, so it is written as `null`.
#[derive(Debug, Clone, Copy)]
pub struct TimelinePoint {
    pub epoch_ms: i64,
    pub present: f64,
    pub changed: f64,
}

impl TimelinePoint {
    fn empty(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            present: f64::NAN,
            changed: f64::NAN,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present == 1.0
    }

    pub fn is_changed(&self) -> bool {
        self.changed == 1.0
    }
}

impl Serialize for TimelinePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(3)?;
        t.serialize_element(&self.epoch_ms)?;
        t.serialize_element(&self.present)?;
        t.serialize_element(&self.changed)?;
        t.end()
    }
}

/// Build the timeline of `log` over `[start, end]`, followed by one trailing
/// edge point at `end + 1`.
///
/// Fails without allocating when the range needs more than
/// [`MAX_TIMELINE_BUCKETS`] buckets.
pub fn build(log: &DeviceLog, start: i64, end: i64) -> Result<Vec<TimelinePoint>, QueryError> {
    let width = Resolution::for_span(end.saturating_sub(start)).width_ms();
    let first_bucket = start.div_euclid(width);
    let first_bucket_start = first_bucket * width;
    // bucket ids are epoch / width, so this cannot overflow
    let buckets = end.div_euclid(width) - first_bucket + 1;
    let bucket_count = usize::try_from(buckets).unwrap_or(0);
    if bucket_count > MAX_TIMELINE_BUCKETS {
        return Err(QueryError::TooManyBuckets {
            buckets,
            max: MAX_TIMELINE_BUCKETS,
        });
    }

    let mut points: Vec<TimelinePoint> = (0..bucket_count)
        .map(|i| TimelinePoint::empty(first_bucket_start + i as i64 * width))
        .collect();

    // compared in scan order, not per bucket
    let mut prev: Option<&ParsedEvent> = None;
    for event in log.scan(start, end) {
        let idx = ((event.epoch_ms - first_bucket_start) / width) as usize;
        let Some(point) = points.get_mut(idx) else {
            continue;
        };
        point.present = 1.0;

        if let Some(parsed) = &event.parsed_event {
            if prev.is_some_and(|p| parsed.config_differs(p)) {
                point.changed = 1.0;
            }
            prev = Some(parsed);
        }
    }

    points.push(TimelinePoint::empty(end.saturating_add(1)));
    Ok(points)
}
