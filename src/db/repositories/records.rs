use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    helpers::{instant_column, instant_param, kind_column, limit_param, minutes_column},
    models::ActivityRecord,
    Database,
};

const RECORD_COLUMNS: &str = "id, activity, planned_minutes, actual_minutes, start_time, end_time, started_at, ended_at, kind";

fn row_to_record(row: &Row) -> Result<ActivityRecord> {
    let planned_minutes: i64 = row.get("planned_minutes")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;
    let kind: String = row.get("kind")?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        activity: row.get("activity")?,
        planned_minutes: minutes_column(planned_minutes)?,
        actual_minutes: row.get("actual_minutes")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        started_at: instant_column(&started_at, "started_at")?,
        ended_at: instant_column(&ended_at, "ended_at")?,
        kind: kind_column(&kind)?,
    })
}

fn select_records(conn: &Connection, limit: i64, offset: i64) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM activity_records
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?1 OFFSET ?2"
    ))?;

    let mut rows = stmt.query(params![limit, offset])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(row_to_record(row)?);
    }
    Ok(records)
}

impl Database {
    pub async fn insert_record(&self, record: &ActivityRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO activity_records (id, activity, planned_minutes, actual_minutes, start_time, end_time, started_at, ended_at, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.activity,
                    i64::from(record.planned_minutes),
                    record.actual_minutes.max(0.0),
                    record.start_time,
                    record.end_time,
                    instant_param(record.started_at),
                    instant_param(record.ended_at),
                    record.kind.as_str(),
                    instant_param(Utc::now()),
                ],
            )
            .with_context(|| format!("failed to insert activity record {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// All records, newest first.
    pub async fn list_records(&self) -> Result<Vec<ActivityRecord>> {
        // SQLite reads a negative LIMIT as "no limit".
        self.execute(|conn| select_records(conn, -1, 0)).await
    }

    pub async fn list_records_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>> {
        let limit = limit_param(limit)?;
        let offset = limit_param(offset)?;
        self.execute(move |conn| select_records(conn, limit, offset))
            .await
    }

    pub async fn count_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM activity_records", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    /// Returns whether a record was removed.
    pub async fn delete_record(&self, record_id: &str) -> Result<bool> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM activity_records WHERE id = ?1",
                params![record_id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn clear_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let rows_affected = conn.execute("DELETE FROM activity_records", [])?;
            Ok(rows_affected as u64)
        })
        .await
    }
}
