use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS address_tags (
            address     TEXT PRIMARY KEY NOT NULL, -- lowercase hex
            tags        TEXT NOT NULL,             -- comma-separated, lowercase
            source      TEXT,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS risk_assessments (
            address     TEXT PRIMARY KEY NOT NULL,
            result      TEXT NOT NULL, -- JSON
            risk_score  INTEGER NOT NULL,
            assessed_at TEXT NOT NULL  -- RFC 3339
        );

        CREATE INDEX IF NOT EXISTS idx_assessments_score ON risk_assessments(risk_score DESC);
        ",
    )?;
    Ok(())
}
