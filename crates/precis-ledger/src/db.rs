use rusqlite::Connection;

use crate::error::Result;

/// Initialise ledger tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ledger (
            fingerprint TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL,
            url         TEXT NOT NULL,
            status      TEXT NOT NULL,
            thread_id   TEXT,
            summary     TEXT,
            failure     TEXT,
            claimed_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_status
            ON ledger(status, claimed_at);

        CREATE TABLE IF NOT EXISTS deliveries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT NOT NULL,
            target_id   TEXT NOT NULL,
            ok          INTEGER NOT NULL,
            detail      TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deliveries_fingerprint
            ON deliveries(fingerprint, created_at);",
    )?;
    Ok(())
}
