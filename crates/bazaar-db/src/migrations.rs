use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            phone         TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            full_name     TEXT,
            role          TEXT NOT NULL DEFAULT 'client',
            blacklisted   INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS devices (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            fingerprint TEXT NOT NULL,
            trusted     INTEGER NOT NULL DEFAULT 0,
            last_seen   TEXT NOT NULL DEFAULT (datetime('now')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, fingerprint)
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            device_id   TEXT NOT NULL REFERENCES devices(id),
            token_hash  TEXT NOT NULL UNIQUE,
            status      TEXT NOT NULL DEFAULT 'active',
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user
            ON refresh_tokens(user_id, status);

        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_device
            ON refresh_tokens(device_id, status);

        CREATE TABLE IF NOT EXISTS chat_members (
            chat_id   TEXT NOT NULL,
            user_id   TEXT NOT NULL REFERENCES users(id),
            role      TEXT NOT NULL DEFAULT 'member',
            joined_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (chat_id, user_id)
        );

        -- Append-only: nothing in this workspace updates or deletes rows here.
        CREATE TABLE IF NOT EXISTS admin_actions (
            id             TEXT PRIMARY KEY,
            admin_id       TEXT NOT NULL,
            action         TEXT NOT NULL,
            target_user_id TEXT,
            target_phone   TEXT,
            details        TEXT NOT NULL DEFAULT '{}',
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_admin_actions_admin
            ON admin_actions(admin_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
