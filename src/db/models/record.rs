//! Activity log data models.
//!
//! `ActivityRecord` is the only externally visible schema: activity label,
//! planned and actual minutes, start and end time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TerminationKind {
    Completed,
    Stopped,
}

impl TerminationKind {
    pub const ALL: [TerminationKind; 2] = [TerminationKind::Completed, TerminationKind::Stopped];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationKind::Completed => "Completed",
            TerminationKind::Stopped => "Stopped",
        }
    }
}

/// One finished session as it appears in the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub activity: String,
    pub planned_minutes: u32,
    pub actual_minutes: f64,
    /// Local clock time, rendered once when the record is built.
    pub start_time: String,
    pub end_time: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub kind: TerminationKind,
}

impl ActivityRecord {
    pub fn is_short(&self) -> bool {
        self.actual_minutes < f64::from(self.planned_minutes)
    }
}

