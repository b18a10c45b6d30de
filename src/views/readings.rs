use std::collections::BTreeSet;

use serde::{ser::SerializeSeq, Serialize, Serializer};

use crate::store::DeviceLog;

/// `[epoch_ms, v1, v2, ...]`, one value slot per requested reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub epoch_ms: i64,
    pub values: Vec<Option<f64>>,
}

impl Serialize for SeriesRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + self.values.len()))?;
        seq.serialize_element(&self.epoch_ms)?;
        for v in &self.values {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

/// A single reading is sparse (events without it are left out); several
/// readings are aligned (one row per parsed event, `null` where missing).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingSeries {
    Sparse(Vec<(i64, f64)>),
    Aligned(Vec<SeriesRow>),
}

impl ReadingSeries {
    pub fn len(&self) -> usize {
        match self {
            Self::Sparse(points) => points.len(),
            Self::Aligned(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every reading id seen in `[start, end]`, sorted.
pub fn distinct_readings(log: &DeviceLog, start: i64, end: i64) -> Vec<String> {
    let mut ids = BTreeSet::new();
    for parsed in log.scan(start, end).filter_map(|e| e.parsed_event.as_ref()) {
        ids.extend(parsed.reading_ids.iter().map(String::as_str));
    }
    ids.into_iter().map(str::to_string).collect()
}

pub fn reading_series(log: &DeviceLog, reading_id: &str, start: i64, end: i64) -> Vec<(i64, f64)> {
    log.scan(start, end)
        .filter_map(|e| {
            let value = e.parsed_event.as_ref()?.reading(reading_id)?;
            Some((e.epoch_ms, value))
        })
        .collect()
}

pub fn multi_reading_series(
    log: &DeviceLog,
    reading_ids: &[String],
    start: i64,
    end: i64,
) -> ReadingSeries {
    if let [reading_id] = reading_ids {
        return ReadingSeries::Sparse(reading_series(log, reading_id, start, end));
    }

    let rows = log
        .scan(start, end)
        .filter_map(|e| {
            let parsed = e.parsed_event.as_ref()?;
            Some(SeriesRow {
                epoch_ms: e.epoch_ms,
                values: reading_ids.iter().map(|id| parsed.reading(id)).collect(),
            })
        })
        .collect();
    ReadingSeries::Aligned(rows)
}
