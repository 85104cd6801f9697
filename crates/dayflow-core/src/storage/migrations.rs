//! Database schema migrations for dayflow.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// A no-op since the tables are created by PlannerDb::migrate() directly.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: Add slot audit and learning fields.
///
/// Adds the following columns to the tasks table:
/// - parent_task: optional grouping parent id
/// - reschedule_history: JSON log of slot transitions
/// - completion_history: JSON log of completed executions
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE tasks ADD COLUMN parent_task TEXT;
         ALTER TABLE tasks ADD COLUMN reschedule_history TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE tasks ADD COLUMN completion_history TEXT NOT NULL DEFAULT '[]';",
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_tasks_table(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE tasks (
                id               TEXT PRIMARY KEY,
                owner_id         TEXT NOT NULL,
                title            TEXT NOT NULL,
                kind             TEXT NOT NULL DEFAULT 'normal',
                duration_minutes INTEGER NOT NULL,
                status           TEXT NOT NULL DEFAULT 'todo',
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );",
        )
        .unwrap();
    }

    #[test]
    fn migrates_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        v1_tasks_table(&conn);
        conn.execute(
            "INSERT INTO tasks (id, owner_id, title, duration_minutes, created_at, updated_at)
             VALUES ('t1', 'u1', 'Old task', 30, '2024-01-01T12:00:00Z', '2024-01-01T12:00:00Z')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);

        let history: String = conn
            .query_row(
                "SELECT reschedule_history FROM tasks WHERE id = 't1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(history, "[]");
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        v1_tasks_table(&conn);

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), 2);
    }
}
