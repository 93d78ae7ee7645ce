use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                uid         TEXT PRIMARY KEY,
                tg_user_id  TEXT UNIQUE,
                username    TEXT,
                first_name  TEXT,
                last_name   TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE friends (
                user_uid      TEXT NOT NULL REFERENCES users(uid),
                friend_uid    TEXT NOT NULL REFERENCES users(uid),
                streak        INTEGER NOT NULL DEFAULT 0,
                last_meme_at  TEXT,
                PRIMARY KEY (user_uid, friend_uid)
            );

            CREATE TABLE reactions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_uid    TEXT NOT NULL,
                receiver_uid  TEXT NOT NULL,
                meme_message  TEXT NOT NULL,
                reaction      TEXT NOT NULL,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE login_otps (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                uid         TEXT NOT NULL,
                otp         TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_login_otps_uid
                ON login_otps(uid, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (bot sessions)");
        conn.execute_batch(
            "
            CREATE TABLE bot_sessions (
                chat_key    TEXT PRIMARY KEY,
                state       TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }
}
