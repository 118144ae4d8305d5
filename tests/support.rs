#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use focuslog_lib::{
    clock::{Clock, ManualClock},
    db::{ActivityRecord, RecordSink},
    notify::Notifier,
    timer::{TimerConfig, TimerController, TimerEvent},
};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

/// Sink that keeps every appended record in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ActivityRecord>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &ActivityRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Sink whose store is always unavailable.
pub struct FailingSink;

#[async_trait]
impl RecordSink for FailingSink {
    async fn append(&self, _record: &ActivityRecord) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub notified: AtomicUsize,
    pub silenced: AtomicUsize,
}

impl CountingNotifier {
    pub fn notified(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }

    pub fn silenced(&self) -> usize {
        self.silenced.load(Ordering::SeqCst)
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self) {
        self.notified.fetch_add(1, Ordering::SeqCst);
    }

    fn silence(&self) {
        self.silenced.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clock that follows tokio's (possibly paused) time from a fixed origin.
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.origin;
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

pub struct Harness {
    pub clock: ManualClock,
    pub sink: MemorySink,
    pub notifier: Arc<CountingNotifier>,
    pub timer: TimerController,
}

/// Controller on a manual clock. The ticker period is long enough that only
/// explicit checks drive completion.
pub fn harness() -> Harness {
    let clock = ManualClock::new(t0());
    let sink = MemorySink::default();
    let notifier = Arc::new(CountingNotifier::default());
    let timer = TimerController::new(
        Arc::new(clock.clone()),
        Arc::new(sink.clone()),
        notifier.clone(),
        quiet_config(),
    );
    Harness {
        clock,
        sink,
        notifier,
        timer,
    }
}

pub fn quiet_config() -> TimerConfig {
    TimerConfig {
        tick_interval: Duration::from_secs(24 * 3600),
        ..TimerConfig::default()
    }
}

pub fn drain(events: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    out
}

pub fn minutes(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}
