use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Ordered schema steps; entry `i` brings `user_version` from `i` to `i + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

pub fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let target = schema_version();
    let found = user_version(conn)?;

    if found > target {
        bail!("activity log schema v{found} is newer than this build understands (v{target})");
    }
    if found == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (index, (name, sql)) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply {name} (v{})", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    log::info!("Activity log schema migrated from v{found} to v{target}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        assert_eq!(user_version(&conn).unwrap(), schema_version());
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'activity_records'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn newer_database_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", schema_version() + 1)
            .unwrap();
        assert!(run_migrations(&mut conn).is_err());
    }
}
