use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            img_url     TEXT NOT NULL DEFAULT '',
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            user1_id    TEXT NOT NULL REFERENCES users(id),
            user2_id    TEXT NOT NULL REFERENCES users(id),
            is_blocked  INTEGER NOT NULL DEFAULT 0,
            blocker_id  TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            CHECK (user1_id <> user2_id)
        );

        -- One conversation per unordered pair, whichever side opened it
        CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair
            ON conversations(min(user1_id, user2_id), max(user1_id, user2_id));

        CREATE INDEX IF NOT EXISTS idx_conversations_user1
            ON conversations(user1_id, updated_at);

        CREATE INDEX IF NOT EXISTS idx_conversations_user2
            ON conversations(user2_id, updated_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
