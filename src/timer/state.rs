use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::ActivityRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Completed => "completed",
            Phase::Stopped => "stopped",
        }
    }

    /// A session exists only in these phases.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Running | Phase::Paused)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PauseInterval {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PauseInterval {
    pub fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of the pause; an open pause is measured up to `now`.
    pub fn duration_until(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub activity: String,
    pub planned_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub pauses: Vec<PauseInterval>,
}

impl Session {
    pub fn new(activity: String, planned_minutes: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            activity,
            planned_minutes,
            started_at,
            pauses: Vec::new(),
        }
    }

    pub fn planned(&self) -> Duration {
        Duration::minutes(i64::from(self.planned_minutes))
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.last().is_some_and(PauseInterval::is_open)
    }

    /// Returns false if a pause is already open.
    pub fn open_pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paused() {
            return false;
        }
        self.pauses.push(PauseInterval::open(now));
        true
    }

    /// Returns false if there was no open pause to close.
    pub fn close_pause(&mut self, now: DateTime<Utc>) -> bool {
        match self.pauses.last_mut() {
            Some(pause) if pause.is_open() => {
                pause.ended_at = Some(now.max(pause.started_at));
                true
            }
            _ => false,
        }
    }

    pub fn active_elapsed(&self, now: DateTime<Utc>) -> Duration {
        active_elapsed(self, now)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.planned() - self.active_elapsed(now)).max(Duration::zero())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active_elapsed(now) >= self.planned()
    }
}

/// Active (non-paused) time between session start and `now`.
///
/// Computed from the recorded interval boundaries only, so the result does not
/// depend on how often anyone looked at it. A clock reading earlier than the
/// session start yields zero.
pub fn active_elapsed(session: &Session, now: DateTime<Utc>) -> Duration {
    let span = now - session.started_at;
    if span <= Duration::zero() {
        return Duration::zero();
    }

    let paused = session
        .pauses
        .iter()
        .fold(Duration::zero(), |total, pause| total + pause.duration_until(now));

    (span - paused).max(Duration::zero())
}

pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.num_milliseconds()).unwrap_or(0)
}

#[derive(Debug, Clone, Default)]
pub struct TimerState {
    pub phase: Phase,
    pub session: Option<Session>,
    /// Record of the last natural completion, kept while the phase is
    /// `Completed` so consumers can still show what finished.
    pub completed: Option<ActivityRecord>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self, session: Session) {
        *self = Self {
            phase: Phase::Running,
            session: Some(session),
            completed: None,
        };
    }

    pub fn active_ms(&self, now: DateTime<Utc>) -> u64 {
        self.session
            .as_ref()
            .map(|session| duration_ms(session.active_elapsed(now)))
            .unwrap_or(0)
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.phase {
            Phase::Running | Phase::Paused => self
                .session
                .as_ref()
                .map(|session| duration_ms(session.remaining(now)))
                .unwrap_or(0),
            Phase::Idle | Phase::Completed | Phase::Stopped => 0,
        }
    }

    /// Takes the session out, leaving the machine in `phase`.
    pub fn finish(&mut self, phase: Phase) -> Option<Session> {
        self.phase = phase;
        self.session.take()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn elapsed_excludes_closed_pauses() {
        let mut session = Session::new("write".into(), 25, t0());
        assert!(session.open_pause(t0() + mins(5)));
        assert!(session.close_pause(t0() + mins(7)));

        assert_eq!(session.active_elapsed(t0() + mins(17)), mins(15));
    }

    #[test]
    fn elapsed_is_frozen_while_paused() {
        let mut session = Session::new("read".into(), 25, t0());
        session.open_pause(t0() + mins(3));

        assert_eq!(session.active_elapsed(t0() + mins(3)), mins(3));
        assert_eq!(session.active_elapsed(t0() + mins(40)), mins(3));
    }

    #[test]
    fn elapsed_depends_only_on_interval_boundaries() {
        let mut split = Session::new("a".into(), 25, t0());
        for i in 0..4 {
            let start = t0() + mins(2 * i + 1);
            split.open_pause(start);
            split.close_pause(start + Duration::seconds(30));
        }

        let mut single = Session::new("a".into(), 25, t0());
        single.open_pause(t0() + mins(1));
        single.close_pause(t0() + mins(3));

        let now = t0() + mins(20);
        assert_eq!(split.active_elapsed(now), single.active_elapsed(now));
        assert_eq!(split.active_elapsed(now), mins(18));
    }

    #[test]
    fn clock_behind_start_clamps_to_zero() {
        let session = Session::new("a".into(), 25, t0());
        assert_eq!(session.active_elapsed(t0() - mins(2)), Duration::zero());
        assert_eq!(session.remaining(t0() - mins(2)), mins(25));
    }

    #[test]
    fn second_pause_cannot_open_while_one_is_open() {
        let mut session = Session::new("a".into(), 25, t0());
        assert!(session.open_pause(t0()));
        assert!(!session.open_pause(t0() + mins(1)));
        assert_eq!(session.pauses.len(), 1);
        assert!(session.close_pause(t0() + mins(2)));
        assert!(!session.close_pause(t0() + mins(3)));
    }

    #[test]
    fn due_exactly_at_planned_duration() {
        let session = Session::new("a".into(), 25, t0());
        assert!(!session.is_due(t0() + mins(25) - Duration::milliseconds(1)));
        assert!(session.is_due(t0() + mins(25)));
        assert_eq!(session.remaining(t0() + mins(30)), Duration::zero());
    }

    #[test]
    fn remaining_is_zero_outside_active_phases() {
        let mut state = TimerState::new();
        state.begin_session(Session::new("a".into(), 1, t0()));
        assert_eq!(state.remaining_ms(t0()), 60_000);

        state.finish(Phase::Completed);
        assert_eq!(state.remaining_ms(t0()), 0);
        assert!(state.session.is_none());
    }
}
