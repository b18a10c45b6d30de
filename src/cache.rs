use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard},
};

use futures_util::future::join_all;
use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, span, warn, Instrument, Level};
use uuid::Uuid;

use crate::{
    error::{FetchError, QueryError},
    event::Event,
    source::{DataSource, FetchRequest},
    store::{DeviceLog, DeviceStats, MergeReport},
    views::{
        readings::{self, ReadingSeries},
        timeline::{self, TimelinePoint},
    },
};

/// Result of a successful `ensure_loaded`/`reload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MergeOutcome {
    /// the requested range was already covered, nothing was fetched
    UpToDate,
    Merged(MergeReport),
}

/// A failed fetch, published on the diagnostics channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDiagnostic {
    pub request_id: Uuid,
    pub serial_number: String,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
    pub error: FetchError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    /// append past `max_loaded_epoch`
    Extend,
    /// swap the whole log for the fetched range
    Replace,
}

/// One device's log and the gate serializing its merges.
#[derive(Default)]
struct DeviceSlot {
    /// held across the remote fetch
    merge_gate: AsyncMutex<()>,
    /// only locked for synchronous truncate+append and for queries
    log: RwLock<DeviceLog>,
}

impl DeviceSlot {
    fn read(&self) -> RwLockReadGuard<'_, DeviceLog> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<R>(&self, f: impl FnOnce(&mut DeviceLog) -> R) -> R {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut log)
    }
}

/// Session-wide cache of device event streams.
///
/// Merges for the same device are serialized; merges for different devices
/// and queries run independently. Queries never wait on the network.
pub struct LogCache {
    source: Arc<dyn DataSource>,
    /// serial number -> slot
    devices: Mutex<HashMap<String, Arc<DeviceSlot>>>,
    diagnostics: broadcast::Sender<FetchDiagnostic>,
}

impl LogCache {
    pub fn new(source: Arc<dyn DataSource>, diagnostics_capacity: usize) -> Self {
        let (diagnostics, _) = broadcast::channel(diagnostics_capacity.max(1));
        Self {
            source,
            devices: Mutex::new(HashMap::new()),
            diagnostics,
        }
    }

    /// Subscribe to fetch failures.
    pub fn diagnostics(&self) -> broadcast::Receiver<FetchDiagnostic> {
        self.diagnostics.subscribe()
    }

    fn slot(&self, serial: &str) -> Option<Arc<DeviceSlot>> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(serial)
            .cloned()
    }

    fn slot_or_create(&self, serial: &str) -> Arc<DeviceSlot> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(serial.to_string())
            .or_default()
            .clone()
    }

    /// Make sure `[start, end]` is loaded, fetching only what is past the
    /// already loaded data.
    ///
    /// A window entirely before loaded data is not backfilled; only the range
    /// after `max_loaded_epoch` is requested.
    pub async fn ensure_loaded(
        &self,
        serial: &str,
        start: i64,
        end: i64,
    ) -> Result<MergeOutcome, FetchError> {
        let slot = self.slot_or_create(serial);
        let _gate = slot.merge_gate.lock().await;
        self.merge(serial, &slot, start, end, MergeMode::Extend).await
    }

    /// Drop everything cached for `serial` and load `[start, end]` from scratch.
    ///
    /// The old contents stay visible to queries until the fetch returns. They
    /// are dropped even when the fetch fails.
    pub async fn reload(
        &self,
        serial: &str,
        start: i64,
        end: i64,
    ) -> Result<MergeOutcome, FetchError> {
        let slot = self.slot_or_create(serial);
        let _gate = slot.merge_gate.lock().await;
        self.merge(serial, &slot, start, end, MergeMode::Replace).await
    }

    pub async fn ensure_loaded_until_now(
        &self,
        serial: &str,
        start: i64,
    ) -> Result<MergeOutcome, FetchError> {
        self.ensure_loaded(serial, start, Timestamp::now().as_millisecond())
            .await
    }

    /// Load several distinct devices concurrently.
    pub async fn preload(
        &self,
        ranges: &[(String, i64)],
        end: i64,
    ) -> Vec<(String, Result<MergeOutcome, FetchError>)> {
        let mut seen = HashSet::new();
        let loads = ranges
            .iter()
            .filter(|(serial, _)| seen.insert(serial.clone()))
            .map(|(serial, start)| async move {
                (serial.clone(), self.ensure_loaded(serial, *start, end).await)
            });
        join_all(loads).await
    }

    /// caller must hold `slot.merge_gate`
    async fn merge(
        &self,
        serial: &str,
        slot: &DeviceSlot,
        start: i64,
        end: i64,
        mode: MergeMode,
    ) -> Result<MergeOutcome, FetchError> {
        let effective_start = match mode {
            MergeMode::Extend => slot.read().effective_start(start),
            MergeMode::Replace => start,
        };
        if effective_start >= end {
            if mode == MergeMode::Replace {
                slot.write(DeviceLog::reset);
            }
            debug!(serial, effective_start, end, "nothing new to load");
            return Ok(MergeOutcome::UpToDate);
        }

        let request_id = Uuid::now_v7();
        let req = FetchRequest {
            serial_number: serial.to_string(),
            start_epoch_ms: effective_start,
            end_epoch_ms: end,
        };

        let span = span!(Level::INFO, "Fetch", s = serial, %request_id);
        let res = self.source.fetch(&req).instrument(span.clone()).await;
        let _enter = span.enter();

        match res {
            Ok(fetched) => {
                let report = slot.write(|log| {
                    if mode == MergeMode::Replace {
                        log.reset();
                    }
                    log.merge(effective_start, fetched.events, fetched.byte_len)
                });
                info!(
                    appended = report.appended,
                    truncated = report.truncated,
                    bytes = report.byte_len,
                    "merged"
                );
                Ok(MergeOutcome::Merged(report))
            }
            Err(error) => {
                warn!("fetch failed: {error}");
                if mode == MergeMode::Replace {
                    slot.write(DeviceLog::reset);
                }
                // no subscribers is fine
                let _ = self.diagnostics.send(FetchDiagnostic {
                    request_id,
                    serial_number: req.serial_number,
                    start_epoch_ms: req.start_epoch_ms,
                    end_epoch_ms: req.end_epoch_ms,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Run `f` against the log of `serial`, `None` when it was never loaded.
    pub fn with_log<R>(&self, serial: &str, f: impl FnOnce(&DeviceLog) -> R) -> Option<R> {
        let slot = self.slot(serial)?;
        let log = slot.read();
        Some(f(&log))
    }

    /// Visit every cached event of `serial` in `[start, end]`, ascending.
    pub fn scan(&self, serial: &str, start: i64, end: i64, mut visit: impl FnMut(&Event)) {
        self.with_log(serial, |log| log.scan(start, end).for_each(&mut visit));
    }

    pub fn timeline(
        &self,
        serial: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<TimelinePoint>, QueryError> {
        self.with_log(serial, |log| timeline::build(log, start, end))
            .unwrap_or_else(|| timeline::build(&DeviceLog::new(), start, end))
    }

    pub fn distinct_readings(&self, serial: &str, start: i64, end: i64) -> Vec<String> {
        self.with_log(serial, |log| readings::distinct_readings(log, start, end))
            .unwrap_or_default()
    }

    pub fn reading_series(
        &self,
        serial: &str,
        reading_id: &str,
        start: i64,
        end: i64,
    ) -> Vec<(i64, f64)> {
        self.with_log(serial, |log| {
            readings::reading_series(log, reading_id, start, end)
        })
        .unwrap_or_default()
    }

    pub fn multi_reading_series(
        &self,
        serial: &str,
        reading_ids: &[String],
        start: i64,
        end: i64,
    ) -> ReadingSeries {
        self.with_log(serial, |log| {
            readings::multi_reading_series(log, reading_ids, start, end)
        })
        .unwrap_or_else(|| readings::multi_reading_series(&DeviceLog::new(), reading_ids, start, end))
    }

    pub fn stats(&self, serial: &str) -> Option<DeviceStats> {
        self.with_log(serial, DeviceLog::stats)
    }

    /// Serial numbers with a log, sorted.
    pub fn devices(&self) -> Vec<String> {
        let mut serials: Vec<String> = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        serials.sort();
        serials
    }
}
