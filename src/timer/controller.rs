use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    activity_log::format_remaining,
    clock::Clock,
    db::{ActivityRecord, RecordSink, TerminationKind},
    notify::Notifier,
};

use super::{
    record::{build_record, TimeFormat},
    state::{duration_ms, Phase, Session, TimerState},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("activity must not be empty")]
    EmptyActivity,
    #[error("planned duration must be at least one minute")]
    NonPositiveDuration,
    #[error("cannot {op} while the timer is {phase}")]
    IllegalTransition { op: &'static str, phase: Phase },
}

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub tick_interval: Duration,
    pub heartbeat_every_ticks: u32,
    pub time_format: TimeFormat,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: 10,
            time_format: TimeFormat::default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub activity: Option<String>,
    pub planned_minutes: Option<u32>,
    pub active_ms: u64,
    pub remaining_ms: u64,
}

impl TimerSnapshot {
    pub fn remaining_display(&self) -> String {
        format_remaining(Duration::from_millis(self.remaining_ms))
    }
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    Heartbeat(TimerSnapshot),
    Completed(ActivityRecord),
    Stopped(ActivityRecord),
    PersistFailed { record_id: String, reason: String },
}

/// A terminated session and whether the sink accepted its record.
#[derive(Debug, Clone)]
pub struct FinishedSession {
    pub record: ActivityRecord,
    pub persisted: bool,
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Ticker {
    /// Stops further evaluations and aborts the task outright.
    fn abort(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // The task may be the one finishing the session, so it is left to
        // observe the token rather than being aborted mid-persist.
        self.cancel.cancel();
    }
}

#[derive(Default)]
struct Machine {
    state: TimerState,
    ticker: Option<Ticker>,
}

impl Machine {
    fn cancel_ticker(&mut self) {
        self.ticker.take();
    }
}

struct ControllerInner {
    machine: Mutex<Machine>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RecordSink>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<TimerEvent>,
    config: TimerConfig,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(ticker) = self.machine.get_mut().ticker.take() {
            ticker.abort();
        }
        self.notifier.silence();
    }
}

#[derive(Clone)]
pub struct TimerController {
    inner: Arc<ControllerInner>,
}

impl TimerController {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn RecordSink>,
        notifier: Arc<dyn Notifier>,
        config: TimerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                machine: Mutex::new(Machine::default()),
                clock,
                sink,
                notifier,
                events,
                config,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.machine.lock().await.state.phase
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let now = self.inner.clock.now();
        let machine = self.inner.machine.lock().await;
        snapshot_of(&machine.state, now)
    }

    pub async fn start(&self, activity: &str, minutes: u32) -> Result<TimerSnapshot, TimerError> {
        let activity = activity.trim();
        if activity.is_empty() {
            return Err(TimerError::EmptyActivity);
        }
        if minutes == 0 {
            return Err(TimerError::NonPositiveDuration);
        }

        let snapshot = {
            let mut machine = self.inner.machine.lock().await;
            match machine.state.phase {
                Phase::Idle | Phase::Completed => {}
                phase => return Err(TimerError::IllegalTransition { op: "start", phase }),
            }

            let now = self.inner.clock.now();
            machine
                .state
                .begin_session(Session::new(activity.to_string(), minutes, now));
            machine.ticker = Some(self.spawn_ticker());
            snapshot_of(&machine.state, now)
        };

        self.inner.notifier.silence();
        info!("Started \"{}\" for {} min", activity, minutes);
        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<TimerSnapshot, TimerError> {
        let snapshot = {
            let mut machine = self.inner.machine.lock().await;
            let phase = machine.state.phase;
            if phase != Phase::Running {
                return Err(TimerError::IllegalTransition { op: "pause", phase });
            }

            let now = self.inner.clock.now();
            let opened = machine
                .state
                .session
                .as_mut()
                .is_some_and(|session| session.open_pause(now));
            if !opened {
                return Err(TimerError::IllegalTransition { op: "pause", phase });
            }

            machine.state.phase = Phase::Paused;
            machine.cancel_ticker();
            snapshot_of(&machine.state, now)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn resume(&self) -> Result<TimerSnapshot, TimerError> {
        let snapshot = {
            let mut machine = self.inner.machine.lock().await;
            let phase = machine.state.phase;
            if phase != Phase::Paused {
                return Err(TimerError::IllegalTransition { op: "resume", phase });
            }

            let now = self.inner.clock.now();
            let closed = machine
                .state
                .session
                .as_mut()
                .is_some_and(|session| session.close_pause(now));
            if !closed {
                return Err(TimerError::IllegalTransition { op: "resume", phase });
            }

            machine.state.phase = Phase::Running;
            machine.ticker = Some(self.spawn_ticker());
            snapshot_of(&machine.state, now)
        };

        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Ends the session early. From `Completed` this only acknowledges the
    /// completion and yields no record.
    pub async fn stop(&self) -> Result<Option<FinishedSession>, TimerError> {
        let (record, snapshot) = {
            let mut machine = self.inner.machine.lock().await;
            let now = self.inner.clock.now();
            match machine.state.phase {
                Phase::Running | Phase::Paused => {}
                Phase::Completed => {
                    machine.state.reset();
                    let snapshot = snapshot_of(&machine.state, now);
                    drop(machine);
                    self.inner.notifier.silence();
                    self.emit(TimerEvent::StateChanged(snapshot));
                    return Ok(None);
                }
                phase => return Err(TimerError::IllegalTransition { op: "stop", phase }),
            }

            machine.cancel_ticker();
            let session = machine.state.finish(Phase::Stopped);
            machine.state.reset();
            let Some(mut session) = session else {
                return Err(TimerError::IllegalTransition {
                    op: "stop",
                    phase: Phase::Idle,
                });
            };

            session.close_pause(now);
            let record = build_record(
                &session,
                now,
                TerminationKind::Stopped,
                &self.inner.config.time_format,
            );
            (record, snapshot_of(&machine.state, now))
        };

        self.inner.notifier.silence();
        info!(
            "Stopped \"{}\" after {:.2} of {} min",
            record.activity, record.actual_minutes, record.planned_minutes
        );
        self.emit(TimerEvent::StateChanged(snapshot));
        self.emit(TimerEvent::Stopped(record.clone()));

        let persisted = self.persist(&record).await;
        Ok(Some(FinishedSession { record, persisted }))
    }

    /// Completes the session if its active time has reached the plan.
    ///
    /// Safe to call from any trigger at any time; returns `None` unless this
    /// call performed the completion.
    pub async fn check_completion(&self) -> Option<FinishedSession> {
        let (record, snapshot) = {
            let mut machine = self.inner.machine.lock().await;
            if machine.state.phase != Phase::Running {
                return None;
            }

            let now = self.inner.clock.now();
            let due_at = machine
                .state
                .session
                .as_ref()
                .filter(|session| session.is_due(now))
                .map(|session| due_instant(session, now))?;

            machine.cancel_ticker();
            let session = machine.state.finish(Phase::Completed)?;
            let record = build_record(
                &session,
                due_at,
                TerminationKind::Completed,
                &self.inner.config.time_format,
            );
            machine.state.completed = Some(record.clone());
            (record, snapshot_of(&machine.state, now))
        };

        self.inner.notifier.notify();
        info!(
            "Completed \"{}\" ({} min)",
            record.activity, record.planned_minutes
        );
        self.emit(TimerEvent::StateChanged(snapshot));
        self.emit(TimerEvent::Completed(record.clone()));

        let persisted = self.persist(&record).await;
        Some(FinishedSession { record, persisted })
    }

    /// Re-evaluates after the host may have missed ticks, e.g. when the
    /// process resumes from suspension.
    pub async fn resync(&self) -> Option<FinishedSession> {
        info!("Resynchronizing timer from wall clock");
        let finished = self.check_completion().await;
        if finished.is_none() {
            let snapshot = self.snapshot().await;
            if snapshot.phase.is_active() {
                self.emit(TimerEvent::StateChanged(snapshot));
            }
        }
        finished
    }

    /// Host teardown: cancels the ticker and silences any alert. An active
    /// session is discarded without a record.
    pub async fn shutdown(&self) {
        let mut machine = self.inner.machine.lock().await;
        if let Some(ticker) = machine.ticker.take() {
            ticker.abort();
        }
        if machine.state.phase.is_active() {
            warn!("Shutting down with an active session; it will not be logged");
        }
        machine.state.reset();
        drop(machine);
        self.inner.notifier.silence();
    }

    fn spawn_ticker(&self) -> Ticker {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(
            Arc::downgrade(&self.inner),
            cancel.clone(),
            self.inner.config.tick_interval,
            self.inner.config.heartbeat_every_ticks.max(1),
        ));
        Ticker { handle, cancel }
    }

    async fn persist(&self, record: &ActivityRecord) -> bool {
        match self.inner.sink.append(record).await {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to persist activity record {}: {err:#}", record.id);
                self.emit(TimerEvent::PersistFailed {
                    record_id: record.id.clone(),
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

async fn run_ticker(
    inner: Weak<ControllerInner>,
    cancel: CancellationToken,
    period: Duration,
    heartbeat_every: u32,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(inner) = inner.upgrade() else { break };
        let controller = TimerController { inner };

        if controller.check_completion().await.is_some() {
            break;
        }

        ticks = ticks.wrapping_add(1);
        if ticks % heartbeat_every == 0 {
            let snapshot = controller.snapshot().await;
            if snapshot.phase == Phase::Running && !cancel.is_cancelled() {
                controller.emit(TimerEvent::Heartbeat(snapshot));
            }
        }
    }
}

/// Instant at which active time reached the plan. Derived from the
/// overshoot so a late check records the same end as a punctual one.
fn due_instant(session: &Session, now: DateTime<Utc>) -> DateTime<Utc> {
    let overshoot = session.active_elapsed(now) - session.planned();
    if overshoot > chrono::Duration::zero() {
        now - overshoot
    } else {
        now
    }
}

fn snapshot_of(state: &TimerState, now: DateTime<Utc>) -> TimerSnapshot {
    match (&state.session, &state.completed) {
        (Some(session), _) => TimerSnapshot {
            phase: state.phase,
            activity: Some(session.activity.clone()),
            planned_minutes: Some(session.planned_minutes),
            active_ms: duration_ms(session.active_elapsed(now)),
            remaining_ms: state.remaining_ms(now),
        },
        (None, Some(record)) => TimerSnapshot {
            phase: state.phase,
            activity: Some(record.activity.clone()),
            planned_minutes: Some(record.planned_minutes),
            active_ms: u64::from(record.planned_minutes) * 60_000,
            remaining_ms: 0,
        },
        (None, None) => TimerSnapshot {
            phase: state.phase,
            activity: None,
            planned_minutes: None,
            active_ms: 0,
            remaining_ms: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::NullNotifier;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct DiscardSink;

    #[async_trait]
    impl RecordSink for DiscardSink {
        async fn append(&self, _record: &ActivityRecord) -> Result<()> {
            Ok(())
        }
    }

    fn controller(clock: &ManualClock) -> TimerController {
        TimerController::new(
            Arc::new(clock.clone()),
            Arc::new(DiscardSink),
            Arc::new(NullNotifier),
            TimerConfig {
                tick_interval: Duration::from_secs(3600),
                ..TimerConfig::default()
            },
        )
    }

    #[test]
    fn due_instant_backs_out_overshoot() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let session = Session::new("a".into(), 25, t0);
        let late = t0 + chrono::Duration::minutes(90);
        assert_eq!(due_instant(&session, late), t0 + chrono::Duration::minutes(25));
    }

    #[tokio::test]
    async fn pause_cancels_the_ticker_and_resume_restores_it() {
        let clock = ManualClock::default();
        let timer = controller(&clock);

        timer.start("focus", 25).await.unwrap();
        assert!(timer.inner.machine.lock().await.ticker.is_some());

        timer.pause().await.unwrap();
        assert!(timer.inner.machine.lock().await.ticker.is_none());

        timer.resume().await.unwrap();
        assert!(timer.inner.machine.lock().await.ticker.is_some());

        timer.stop().await.unwrap();
        assert!(timer.inner.machine.lock().await.ticker.is_none());
    }

    #[tokio::test]
    async fn completed_snapshot_keeps_the_finished_activity() {
        let clock = ManualClock::default();
        let timer = controller(&clock);

        timer.start("focus", 1).await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        assert!(timer.check_completion().await.is_some());

        let snapshot = timer.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Completed);
        assert_eq!(snapshot.activity.as_deref(), Some("focus"));
        assert_eq!(snapshot.remaining_ms, 0);
        assert_eq!(snapshot.remaining_display(), "00:00");
    }
}
