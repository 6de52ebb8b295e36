//! Cache store schema migrations.
//!
//! The applied schema version is tracked in `_migrations`. Each migration
//! runs in its own transaction together with its version row, so a store is
//! never left between two schema versions.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// One schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Applied in ascending version order.
const MIGRATIONS: &[Migration] =
    &[Migration { version: 1, name: "generations", sql: include_str!("../../migrations/001_generations.sql") }];

/// Bring the store up to the latest schema version.
///
/// A store written by a newer build is refused rather than opened with a
/// schema this build does not understand.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS)).await.map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, migrations: &[Migration]) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if current > latest {
        return Err(Error::MigrationFailed(format!(
            "cache store is at schema version {current}, this build supports up to {latest}"
        )));
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        let failed = |e: rusqlite::Error| {
            Error::MigrationFailed(format!("version {} ({}): {e}", migration.version, migration.name))
        };

        tracing::debug!(version = migration.version, name = migration.name, "applying cache store migration");
        let tx = conn.transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(())
}
