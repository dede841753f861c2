//! Migration runner. Migrations are compiled into the binary so the server
//! and its tests need no filesystem layout beyond the database itself.

use anyhow::Result;
use rusqlite::Connection;

/// Applied in order; names are recorded in _schema_migrations.
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _schema_migrations (name TEXT PRIMARY KEY)",
        [],
    )?;

    for &(name, sql) in MIGRATIONS {
        let applied: bool = conn
            .query_row(
                "SELECT 1 FROM _schema_migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if applied {
            continue;
        }

        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO _schema_migrations (name) VALUES (?1)", [name])?;
    }

    Ok(())
}
