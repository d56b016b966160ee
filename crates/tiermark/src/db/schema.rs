use crate::error::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS classification_rules (
            id              INTEGER PRIMARY KEY,
            org_id          TEXT,
            name            TEXT NOT NULL,
            pattern         TEXT NOT NULL,
            level           TEXT NOT NULL DEFAULT 'public',
            data_types      TEXT NOT NULL DEFAULT '[]',
            description     TEXT,
            is_builtin      BOOLEAN NOT NULL DEFAULT 0,
            priority        INTEGER NOT NULL DEFAULT 0,
            enabled         BOOLEAN NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            CHECK ((is_builtin = 1 AND org_id IS NULL) OR (is_builtin = 0 AND org_id IS NOT NULL))
        );

        CREATE TABLE IF NOT EXISTS schedules (
            id              TEXT PRIMARY KEY,
            org_id          TEXT NOT NULL,
            name            TEXT NOT NULL,
            include_paths   TEXT NOT NULL DEFAULT '[]',
            exclude_paths   TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS backups (
            id              TEXT PRIMARY KEY,
            org_id          TEXT NOT NULL,
            schedule_id     TEXT NOT NULL REFERENCES schedules(id),
            started_at      TEXT NOT NULL,
            completed_at    TEXT
        );

        CREATE TABLE IF NOT EXISTS schedule_classifications (
            schedule_id     TEXT PRIMARY KEY REFERENCES schedules(id),
            org_id          TEXT NOT NULL,
            level           TEXT NOT NULL,
            data_types      TEXT NOT NULL DEFAULT '[]',
            auto_classified BOOLEAN NOT NULL DEFAULT 1,
            status          TEXT NOT NULL DEFAULT 'default',
            classified_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS backup_classifications (
            backup_id       TEXT PRIMARY KEY,
            schedule_id     TEXT NOT NULL,
            org_id          TEXT NOT NULL,
            level           TEXT NOT NULL,
            data_types      TEXT NOT NULL DEFAULT '[]',
            paths           TEXT NOT NULL DEFAULT '[]',
            status          TEXT NOT NULL,
            source          TEXT NOT NULL,
            classified_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id              INTEGER PRIMARY KEY,
            timestamp       TEXT DEFAULT (datetime('now')),
            action          TEXT NOT NULL,
            org_id          TEXT,
            schedule_id     TEXT,
            backup_id       TEXT,
            rule_id         INTEGER,
            details         TEXT
        );
        "#,
    )?;

    create_indexes(conn)?;
    create_immutability_triggers(conn)?;
    set_schema_version(conn)?;

    Ok(())
}

fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_rules_org ON classification_rules(org_id);
        CREATE INDEX IF NOT EXISTS idx_rules_builtin ON classification_rules(is_builtin);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_rules_builtin_name
            ON classification_rules(name) WHERE is_builtin = 1;
        CREATE INDEX IF NOT EXISTS idx_schedules_org ON schedules(org_id);
        CREATE INDEX IF NOT EXISTS idx_backups_org ON backups(org_id);
        CREATE INDEX IF NOT EXISTS idx_backups_schedule ON backups(schedule_id);
        CREATE INDEX IF NOT EXISTS idx_schedule_classifications_org ON schedule_classifications(org_id);
        CREATE INDEX IF NOT EXISTS idx_backup_classifications_org_level
            ON backup_classifications(org_id, level);
        CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
        CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log(action);
        "#,
    )?;
    Ok(())
}

/// Backup classifications are audit artifacts: rows may be inserted, never
/// rewritten or removed.
fn create_immutability_triggers(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_backup_classifications_no_update
        BEFORE UPDATE ON backup_classifications
        BEGIN
            SELECT RAISE(ABORT, 'backup classifications are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS trg_backup_classifications_no_delete
        BEFORE DELETE ON backup_classifications
        BEGIN
            SELECT RAISE(ABORT, 'backup classifications are immutable');
        END;
        "#,
    )?;
    Ok(())
}

fn set_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_version LIMIT 1")?;
    let mut rows = stmt.query([])?;

    if let Some(row) = rows.next()? {
        Ok(Some(row.get(0)?))
    } else {
        Ok(None)
    }
}
