use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use crate::db::models::{ActivityRecord, TerminationKind};

use super::state::{active_elapsed, duration_ms, Session};

/// `strftime` pattern for the start/end clock strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat(pub String);

impl TimeFormat {
    pub fn render(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&Local).format(&self.0).to_string()
    }
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self("%H:%M".into())
    }
}

pub fn build_record(
    session: &Session,
    ended_at: DateTime<Utc>,
    kind: TerminationKind,
    format: &TimeFormat,
) -> ActivityRecord {
    let actual_minutes = match kind {
        // Recording the plan avoids an off-by-a-tick overshoot.
        TerminationKind::Completed => f64::from(session.planned_minutes),
        TerminationKind::Stopped => {
            duration_ms(active_elapsed(session, ended_at)) as f64 / 60_000.0
        }
    };

    ActivityRecord {
        id: Uuid::new_v4().to_string(),
        activity: session.activity.clone(),
        planned_minutes: session.planned_minutes,
        actual_minutes,
        start_time: format.render(session.started_at),
        end_time: format.render(ended_at),
        started_at: session.started_at,
        ended_at,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn completed_records_the_plan_exactly() {
        let session = Session::new("essay".into(), 25, t0());
        let end = t0() + Duration::minutes(25) + Duration::milliseconds(997);

        let record = build_record(&session, end, TerminationKind::Completed, &TimeFormat::default());
        assert_eq!(record.actual_minutes, 25.0);
        assert_eq!(record.planned_minutes, 25);
        assert!(!record.is_short());
    }

    #[test]
    fn stopped_measures_fractional_minutes() {
        let session = Session::new("essay".into(), 25, t0());
        let end = t0() + Duration::seconds(90);

        let record = build_record(&session, end, TerminationKind::Stopped, &TimeFormat::default());
        assert_eq!(record.actual_minutes, 1.5);
        assert_eq!(record.kind, TerminationKind::Stopped);
        assert!(record.is_short());
    }

    #[test]
    fn stopped_before_start_is_zero() {
        let session = Session::new("essay".into(), 25, t0());
        let record = build_record(
            &session,
            t0() - Duration::seconds(5),
            TerminationKind::Stopped,
            &TimeFormat::default(),
        );
        assert_eq!(record.actual_minutes, 0.0);
    }

    #[test]
    fn ids_are_unique() {
        let session = Session::new("essay".into(), 25, t0());
        let fmt = TimeFormat::default();
        let a = build_record(&session, t0(), TerminationKind::Stopped, &fmt);
        let b = build_record(&session, t0(), TerminationKind::Stopped, &fmt);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn clock_strings_follow_the_pattern() {
        let session = Session::new("essay".into(), 25, t0());
        let fmt = TimeFormat("%H:%M".into());
        let record = build_record(&session, t0(), TerminationKind::Stopped, &fmt);
        assert_eq!(record.start_time.len(), 5);
        assert_eq!(record.start_time, fmt.render(t0()));
    }
}
