//! Rendering of the activity log: the text table and CSV export.
//!
//! Records keep precise fractional minutes; rounding is only applied here,
//! according to [`MinutesDisplay`].

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::ActivityRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MinutesDisplay {
    /// `MM:SS`, rounded to the nearest second.
    #[default]
    Precise,
    /// Whole minutes, any started minute counts.
    RoundUp,
}

impl MinutesDisplay {
    pub fn render(&self, minutes: f64) -> String {
        match self {
            MinutesDisplay::Precise => format_minutes_mmss(minutes),
            MinutesDisplay::RoundUp => format!("{} min", minutes.max(0.0).ceil() as u64),
        }
    }
}

/// Formats fractional minutes as `MM:SS`; minutes may exceed 59.
pub fn format_minutes_mmss(minutes: f64) -> String {
    let total_seconds = (minutes.max(0.0) * 60.0).round() as u64;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Countdown display, truncated to whole seconds.
pub fn format_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.as_secs();
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

const HEADERS: [&str; 5] = ["Activity", "Planned", "Actual", "Start", "End"];

pub fn render_table(records: &[ActivityRecord], display: MinutesDisplay) -> String {
    if records.is_empty() {
        return "No activities recorded yet.\n".to_string();
    }

    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|record| {
            let mut actual = display.render(record.actual_minutes);
            if record.is_short() {
                actual.push_str(" *");
            }
            [
                record.activity.clone(),
                display.render(f64::from(record.planned_minutes)),
                actual,
                record.start_time.clone(),
                record.end_time.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(rule.join("-+-").as_str());
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

pub fn to_csv(records: &[ActivityRecord], display: MinutesDisplay) -> String {
    let mut csv = String::from("activity,planned,actual,start,end\n");
    for record in records {
        let fields = [
            record.activity.clone(),
            display.render(f64::from(record.planned_minutes)),
            display.render(record.actual_minutes),
            record.start_time.clone(),
            record.end_time.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    csv
}

pub fn export_csv(records: &[ActivityRecord], display: MinutesDisplay, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, to_csv(records, display))
        .with_context(|| format!("failed to write CSV to {}", path.display()))
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
