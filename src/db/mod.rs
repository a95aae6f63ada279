pub mod schema;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::RiskAnalysisResult;
use crate::error::StoreError;
use crate::tags::{normalize_tags, parse_tag_row};

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        // A panic while holding the lock leaves no partial SQLite state behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tags for one address, if tagged.
    pub fn lookup_tags(&self, address: &str) -> Result<Option<Vec<String>>, StoreError> {
        self.lock().lookup_tags(address)
    }

    /// Upsert an administrative tag row.
    pub fn insert_tags(&self, address: &str, tags: &[String], source: Option<&str>) -> Result<(), StoreError> {
        self.lock().insert_tags(address, tags, source)
    }

    /// Bulk-load tags from a `;`-delimited CSV file.
    pub fn load_tags_from_csv(&self, path: &Path) -> Result<usize, StoreError> {
        self.lock().load_tags_from_csv(path)
    }

    /// Load all address tags from DB.
    pub fn all_tags(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        self.lock().all_tags()
    }

    pub fn store_assessment(&self, result: &RiskAnalysisResult) -> Result<(), StoreError> {
        self.lock().store_assessment(result, Utc::now())
    }

    /// A previously stored assessment, only if younger than `ttl`.
    pub fn cached_assessment(&self, address: &str, ttl: Duration) -> Result<Option<RiskAnalysisResult>, StoreError> {
        self.lock().cached_assessment(address, ttl, Utc::now())
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn lookup_tags(&self, address: &str) -> Result<Option<Vec<String>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tags FROM address_tags WHERE address = ?1")?;
        let mut rows = stmt.query(rusqlite::params![address.to_lowercase()])?;
        match rows.next()? {
            Some(row) => {
                let joined: String = row.get(0)?;
                Ok(Some(normalize_tags(joined.split(','))))
            }
            None => Ok(None),
        }
    }

    pub fn insert_tags(&self, address: &str, tags: &[String], source: Option<&str>) -> Result<(), StoreError> {
        let tags = normalize_tags(tags.iter().map(String::as_str));
        self.conn.execute(
            "INSERT OR REPLACE INTO address_tags (address, tags, source, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))",
            rusqlite::params![address.to_lowercase(), tags.join(","), source],
        )?;
        Ok(())
    }

    pub fn all_tags(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT address, tags FROM address_tags")?;
        let rows = stmt.query_map([], |row| {
            let address: String = row.get(0)?;
            let joined: String = row.get(1)?;
            Ok((address, joined))
        })?;
        let mut tags = Vec::new();
        for row in rows {
            let (address, joined) = row?;
            tags.push((address, normalize_tags(joined.split(','))));
        }
        Ok(tags)
    }

    /// Header line is skipped; malformed rows are skipped with a debug log.
    pub fn load_tags_from_csv(&self, path: &Path) -> Result<usize, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let source = path.file_name().and_then(|n| n.to_str());
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO address_tags (address, tags, source, updated_at)
                 VALUES (?1, ?2, ?3, datetime('now'))",
            )?;
            for (line_no, line) in content.lines().enumerate().skip(1) {
                if line.trim().is_empty() {
                    continue;
                }
                let Some((address, tags)) = parse_tag_row(line) else {
                    tracing::debug!("Skipping malformed tag row {}: {line}", line_no + 1);
                    continue;
                };
                stmt.execute(rusqlite::params![address, tags.join(","), source])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn store_assessment(&self, result: &RiskAnalysisResult, now: DateTime<Utc>) -> Result<(), StoreError> {
        let json = serde_json::to_string(result)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO risk_assessments (address, result, risk_score, assessed_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![result.address.to_lowercase(), json, result.risk_score, now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn cached_assessment(
        &self,
        address: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskAnalysisResult>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT result, assessed_at FROM risk_assessments WHERE address = ?1")?;
        let mut rows = stmt.query(rusqlite::params![address.to_lowercase()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let json: String = row.get(0)?;
        let assessed_at: String = row.get(1)?;

        let Ok(assessed_at) = DateTime::parse_from_rfc3339(&assessed_at) else {
            tracing::debug!("Unparsable assessed_at for {address}, treating as stale");
            return Ok(None);
        };
        if now.signed_duration_since(assessed_at.with_timezone(&Utc)) >= ttl {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&json)?))
    }
}
